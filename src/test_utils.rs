//! Shared test utilities.
//!
//! Provides in-memory databases with the catalog seeded, and small helpers
//! for building requests with sensible defaults. All dates live in 2030 so
//! lead-time and past-date rules never depend on the real clock.

use crate::{
    config::{
        database::{create_connection, create_tables},
        settings::{Config, parse_config},
    },
    core::{
        appointment::{BookingRequest, CANCELLATION_POLICY},
        availability::local_instant,
        catalog::{self, require_treatment},
        customer::ensure_customer,
        ledger::{self, PurchaseRequest},
        slot_grid::parse_time_of_day,
    },
    entities::{AppointmentStatus, appointment, blocked_slot},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tempfile::TempDir;

/// Customer that owns the fixtures.
pub const TEST_CUSTOMER: &str = "U_TEST_001";
/// A second customer, for ownership checks.
pub const OTHER_CUSTOMER: &str = "U_TEST_002";
/// The one active branch in the test catalog.
pub const TEST_BRANCH: &str = "branch-003";
/// The one treatment in the test catalog.
pub const TEST_TREATMENT: &str = "smooth";

const TEST_CATALOG: &str = r#"
    [shop]
    timezone = "Asia/Bangkok"

    [[treatments]]
    code = "smooth"
    title_th = "ทรีตเมนต์ผิวเรียบเนียน"
    title_en = "Smooth"
    duration_min = 45

    [[toppings]]
    code = "scrub-coffee"
    category = "scrub"
    title_th = "สครับกาแฟ"
    title_en = "Scrub : coffee"
    price_thb = 150.0

    [[toppings]]
    code = "mask-gold"
    category = "mask"
    title_th = "มาสก์ทองคำ"
    title_en = "Mask : gold"
    price_thb = 300.0

    [[toppings]]
    code = "mask-normal"
    category = "mask"
    title_th = "มาสก์"
    title_en = "Mask : normal"
    price_thb = 200.0

    [[toppings]]
    code = "misting-rose"
    category = "misting"
    title_th = "สเปรย์กุหลาบ"
    title_en = "Misting : rose water"
    price_thb = 100.0
    is_active = false

    [[branches]]
    id = "branch-003"
    label = "Siam ClubGlam 003"

    [[branches]]
    id = "branch-mk"
    label = "Mae Klong"
    is_active = false

    [[branches]]
    id = "branch-bn"
    label = "Bang Na"
    is_active = false
"#;

/// Catalog used by every seeded test database.
#[allow(clippy::missing_panics_doc)]
pub fn test_config() -> Config {
    #[allow(clippy::expect_used)]
    parse_config(TEST_CATALOG).expect("test catalog is valid TOML")
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = create_connection("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(db)
}

/// In-memory database with the test catalog seeded.
pub async fn setup_seeded_db() -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    catalog::seed_catalog(&db, &test_config()).await?;
    Ok(db)
}

/// Seeded `SQLite` file database behind a multi-connection pool.
///
/// Writers on separate pooled connections really do race here, unlike the
/// single-connection in-memory database. Keep the `TempDir` alive for the
/// duration of the test.
pub async fn setup_file_db() -> Result<(Arc<DatabaseConnection>, TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.sqlite").display());
    let db = create_connection(&url).await?;
    create_tables(&db).await?;
    catalog::seed_catalog(&db, &test_config()).await?;
    Ok((Arc::new(db), dir))
}

/// Number of concurrent writers in race tests.
pub const RACERS: usize = 8;

/// Seeded database where `customer_id` holds `sessions` of the test treatment.
pub async fn setup_with_sessions(customer_id: &str, sessions: i64) -> Result<DatabaseConnection> {
    let db = setup_seeded_db().await?;
    add_sessions(&db, customer_id, sessions).await?;
    Ok(db)
}

/// Purchase of the test treatment with default expiry and no price.
pub fn purchase_request(customer_id: &str, sessions: i64) -> PurchaseRequest {
    PurchaseRequest {
        customer_id: customer_id.to_string(),
        display_name: None,
        treatment_code: TEST_TREATMENT.to_string(),
        sessions,
        expires_days: None,
        price_thb: None,
        note: None,
    }
}

/// Buys `sessions` of the test treatment at [`test_now`].
pub async fn add_sessions(db: &DatabaseConnection, customer_id: &str, sessions: i64) -> Result<()> {
    ledger::purchase(db, purchase_request(customer_id, sessions), 365, test_now()).await?;
    Ok(())
}

/// Booking of the test treatment at the test branch without add-ons.
pub fn booking(customer_id: &str, day: &str, time: &str) -> BookingRequest {
    BookingRequest {
        customer_id: customer_id.to_string(),
        treatment_code: TEST_TREATMENT.to_string(),
        branch_id: TEST_BRANCH.to_string(),
        date: date(day),
        time: t(time),
        addon_codes: Vec::new(),
    }
}

/// Fixed clock used by tests: 2030-03-01 09:00 in Bangkok.
pub fn test_now() -> DateTime<Utc> {
    bkk("2030-03-01", "09:00")
}

#[allow(clippy::unwrap_used)]
pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

#[allow(clippy::unwrap_used)]
pub fn t(value: &str) -> NaiveTime {
    parse_time_of_day(value).unwrap()
}

/// Instant for a Bangkok wall-clock time.
#[allow(clippy::unwrap_used)]
pub fn bkk(day: &str, time: &str) -> DateTime<Utc> {
    local_instant(chrono_tz::Asia::Bangkok, date(day), t(time)).unwrap()
}

/// Unsaved appointment model at `scheduled_at`, for pure policy tests.
pub fn appointment_model(scheduled_at: DateTime<Utc>) -> appointment::Model {
    appointment::Model {
        id: 1,
        customer_id: TEST_CUSTOMER.to_string(),
        treatment_id: 1,
        branch_id: TEST_BRANCH.to_string(),
        scheduled_at,
        status: AppointmentStatus::Booked,
        selected_addons: serde_json::json!([]),
        addons_total_thb: 0.0,
        reschedule_count: 0,
        max_reschedule: 1,
        cancellation_policy: CANCELLATION_POLICY.to_string(),
        refund_policy: None,
        cancel_reason: None,
        created_at: test_now(),
        updated_at: test_now(),
    }
}

/// Inserts a booked appointment directly, bypassing booking rules.
pub async fn insert_test_appointment(
    db: &DatabaseConnection,
    customer_id: &str,
    scheduled_at: DateTime<Utc>,
) -> Result<appointment::Model> {
    ensure_customer(db, customer_id, None, test_now()).await?;
    let treatment = require_treatment(db, TEST_TREATMENT).await?;
    let model = appointment::ActiveModel {
        customer_id: Set(customer_id.to_string()),
        treatment_id: Set(treatment.id),
        branch_id: Set(TEST_BRANCH.to_string()),
        scheduled_at: Set(scheduled_at),
        status: Set(AppointmentStatus::Booked),
        selected_addons: Set(serde_json::json!([])),
        addons_total_thb: Set(0.0),
        reschedule_count: Set(0),
        max_reschedule: Set(1),
        cancellation_policy: Set(CANCELLATION_POLICY.to_string()),
        refund_policy: Set(None),
        cancel_reason: Set(None),
        created_at: Set(test_now()),
        updated_at: Set(test_now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model)
}

/// Blocks `[start, end)` at `branch_id`.
pub async fn insert_test_block(
    db: &DatabaseConnection,
    branch_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<blocked_slot::Model> {
    let model = blocked_slot::ActiveModel {
        branch_id: Set(branch_id.to_string()),
        slot_start: Set(start),
        slot_end: Set(end),
        reason: Set(Some("test block".to_string())),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model)
}
