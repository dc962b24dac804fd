//! Shop settings and catalog seed loading from config.toml
//!
//! The `[shop]` table holds the operating constants that drive the slot grid,
//! lead time and cancellation policy. The `[[treatments]]`, `[[toppings]]` and
//! `[[branches]]` arrays seed the catalog on first run or when entries are missing.

use crate::core::slot_grid::{SlotGrid, parse_time_of_day};
use crate::errors::{Error, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Shop operating constants
    #[serde(default)]
    pub shop: ShopConfig,
    /// Treatments to seed
    #[serde(default)]
    pub treatments: Vec<TreatmentSeed>,
    /// Add-on toppings to seed
    #[serde(default)]
    pub toppings: Vec<ToppingSeed>,
    /// Branches to seed
    #[serde(default)]
    pub branches: Vec<BranchSeed>,
}

/// Raw `[shop]` table as written in config.toml.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    /// IANA timezone name used for the slot grid and calendar days
    pub timezone: String,
    /// First bookable start, `HH:MM`
    pub open_time: String,
    /// Last bookable start, `HH:MM`
    pub last_start_time: String,
    /// Distance between consecutive slots
    pub slot_interval_minutes: u32,
    /// Minimum advance notice for same-day bookings
    pub lead_time_minutes: u32,
    /// Reschedules allowed per appointment
    pub max_reschedule: i32,
    /// Cancellations at least this far ahead get a full refund
    pub full_refund_hours: i64,
    /// Bundle validity when a purchase does not specify one
    pub default_expiry_days: i64,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Bangkok".to_string(),
            open_time: "08:00".to_string(),
            last_start_time: "18:15".to_string(),
            slot_interval_minutes: 45,
            lead_time_minutes: 120,
            max_reschedule: 1,
            full_refund_hours: 24,
            default_expiry_days: 365,
        }
    }
}

/// Catalog entry for a treatment
#[derive(Debug, Deserialize, Clone)]
pub struct TreatmentSeed {
    pub code: String,
    pub title_th: String,
    pub title_en: String,
    pub duration_min: i32,
}

/// Catalog entry for a topping
#[derive(Debug, Deserialize, Clone)]
pub struct ToppingSeed {
    pub code: String,
    /// `"scrub"`, `"mask"` or `"misting"`
    pub category: String,
    pub title_th: String,
    pub title_en: String,
    pub price_thb: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Catalog entry for a branch
#[derive(Debug, Deserialize, Clone)]
pub struct BranchSeed {
    pub id: String,
    pub label: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// Validated shop constants used by the core.
#[derive(Debug, Clone)]
pub struct ShopSettings {
    /// Shop-local timezone
    pub timezone: Tz,
    /// Daily slot grid
    pub grid: SlotGrid,
    /// Minimum advance notice for same-day slots
    pub lead_time: Duration,
    /// Reschedules allowed per appointment
    pub max_reschedule: i32,
    /// Minimum notice for a full refund on cancellation
    pub full_refund_window: Duration,
    /// Default bundle validity
    pub default_expiry_days: i64,
}

impl ShopSettings {
    /// Validates the raw `[shop]` table.
    ///
    /// # Errors
    /// Returns `Error::Config` for an unknown timezone, unparsable times,
    /// a zero slot interval or negative limits.
    pub fn from_config(shop: &ShopConfig) -> Result<Self> {
        let timezone: Tz = shop.timezone.parse().map_err(|_| Error::Config {
            message: format!("Unknown shop timezone '{}'", shop.timezone),
        })?;
        let open = parse_time_of_day(&shop.open_time).map_err(|_| Error::Config {
            message: format!("Invalid open_time '{}'", shop.open_time),
        })?;
        let last_start = parse_time_of_day(&shop.last_start_time).map_err(|_| Error::Config {
            message: format!("Invalid last_start_time '{}'", shop.last_start_time),
        })?;
        let grid = SlotGrid::new(open, last_start, shop.slot_interval_minutes)?;

        if shop.max_reschedule < 0 {
            return Err(Error::Config {
                message: "max_reschedule cannot be negative".to_string(),
            });
        }
        if shop.full_refund_hours < 0 || shop.default_expiry_days <= 0 {
            return Err(Error::Config {
                message: "full_refund_hours and default_expiry_days must be positive".to_string(),
            });
        }

        Ok(Self {
            timezone,
            grid,
            lead_time: Duration::minutes(i64::from(shop.lead_time_minutes)),
            max_reschedule: shop.max_reschedule,
            full_refund_window: Duration::hours(shop.full_refund_hours),
            default_expiry_days: shop.default_expiry_days,
        })
    }
}

impl Default for ShopSettings {
    fn default() -> Self {
        // The default table is known to be valid
        Self {
            timezone: chrono_tz::Asia::Bangkok,
            grid: SlotGrid::default(),
            lead_time: Duration::minutes(120),
            max_reschedule: 1,
            full_refund_window: Duration::hours(24),
            default_expiry_days: 365,
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `CONFIG_PATH`, falling back to ./config.toml
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}
