//! Process environment configuration.
//!
//! Secrets and deployment-specific settings are read from environment
//! variables (optionally via `.env`). Values are read through a lookup
//! function so the parsing can be exercised without touching the real
//! process environment.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use std::time::Duration;

/// How customer credentials are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Verify ID tokens against the LINE platform
    Line,
    /// Treat the bearer credential as the customer id (local development only)
    Dev,
}

/// Settings read from the process environment.
#[derive(Debug, Clone)]
pub struct EnvSettings {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    /// Database connection string
    pub database_url: String,
    /// Key used to sign redemption tokens
    pub token_secret: String,
    /// Identity verification mode
    pub identity_mode: IdentityMode,
    /// Bearer credential staff present on staff-only routes
    pub staff_api_key: String,
    /// LINE channel id the ID tokens are issued for
    pub line_channel_id: Option<String>,
    /// Omise secret key; payments are disabled when absent
    pub omise_secret_key: Option<String>,
    /// Bound on every outbound provider call
    pub upstream_timeout: Duration,
}

const DEV_TOKEN_SECRET: &str = "dev-only-token-secret";
const DEV_STAFF_API_KEY: &str = "dev-only-staff-key";

impl EnvSettings {
    /// Reads settings from the real process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns the value of a variable if set.
    ///
    /// # Errors
    /// Returns `Error::Config` when `TOKEN_SECRET`, `STAFF_API_KEY` or
    /// `LINE_CHANNEL_ID` is missing in LINE mode, or when a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let identity_mode = match lookup("IDENTITY_MODE").as_deref() {
            None | Some("line") => IdentityMode::Line,
            Some("dev") => IdentityMode::Dev,
            Some(other) => {
                return Err(Error::Config {
                    message: format!("Unknown IDENTITY_MODE '{other}'"),
                });
            }
        };

        let token_secret = match (lookup("TOKEN_SECRET"), identity_mode) {
            (Some(secret), _) if !secret.is_empty() => secret,
            (_, IdentityMode::Dev) => DEV_TOKEN_SECRET.to_string(),
            (_, IdentityMode::Line) => {
                return Err(Error::Config {
                    message: "TOKEN_SECRET must be set".to_string(),
                });
            }
        };

        let staff_api_key = match (lookup("STAFF_API_KEY"), identity_mode) {
            (Some(key), _) if !key.is_empty() => key,
            (_, IdentityMode::Dev) => DEV_STAFF_API_KEY.to_string(),
            (_, IdentityMode::Line) => {
                return Err(Error::Config {
                    message: "STAFF_API_KEY must be set".to_string(),
                });
            }
        };

        let line_channel_id = lookup("LINE_CHANNEL_ID").filter(|v| !v.is_empty());
        if identity_mode == IdentityMode::Line && line_channel_id.is_none() {
            return Err(Error::Config {
                message: "LINE_CHANNEL_ID must be set when IDENTITY_MODE=line".to_string(),
            });
        }

        let upstream_timeout_secs = match lookup("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| Error::Config {
                message: format!("Invalid UPSTREAM_TIMEOUT_SECS '{raw}': {e}"),
            })?,
            None => 10,
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3001".to_string()),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            token_secret,
            identity_mode,
            staff_api_key,
            line_channel_id,
            omise_secret_key: lookup("OMISE_SECRET_KEY").filter(|v| !v.is_empty()),
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_dev_mode_defaults() {
        let settings = EnvSettings::from_lookup(lookup_from(&[("IDENTITY_MODE", "dev")])).unwrap();
        assert_eq!(settings.identity_mode, IdentityMode::Dev);
        assert_eq!(settings.bind_addr, "0.0.0.0:3001");
        assert_eq!(settings.token_secret, DEV_TOKEN_SECRET);
        assert_eq!(settings.staff_api_key, DEV_STAFF_API_KEY);
        assert_eq!(settings.upstream_timeout, Duration::from_secs(10));
        assert!(settings.omise_secret_key.is_none());
    }

    #[test]
    fn test_line_mode_requires_secrets_and_channel() {
        let missing_secret = EnvSettings::from_lookup(lookup_from(&[
            ("LINE_CHANNEL_ID", "123"),
            ("STAFF_API_KEY", "staff"),
        ]));
        assert!(matches!(missing_secret, Err(Error::Config { .. })));

        let missing_staff_key = EnvSettings::from_lookup(lookup_from(&[
            ("TOKEN_SECRET", "s3cret"),
            ("LINE_CHANNEL_ID", "123"),
        ]));
        assert!(matches!(missing_staff_key, Err(Error::Config { .. })));

        let missing_channel = EnvSettings::from_lookup(lookup_from(&[
            ("TOKEN_SECRET", "s3cret"),
            ("STAFF_API_KEY", "staff"),
        ]));
        assert!(matches!(missing_channel, Err(Error::Config { .. })));

        let ok = EnvSettings::from_lookup(lookup_from(&[
            ("TOKEN_SECRET", "s3cret"),
            ("STAFF_API_KEY", "staff"),
            ("LINE_CHANNEL_ID", "123"),
            ("UPSTREAM_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(ok.identity_mode, IdentityMode::Line);
        assert_eq!(ok.staff_api_key, "staff");
        assert_eq!(ok.upstream_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_unknown_identity_mode_rejected() {
        let result = EnvSettings::from_lookup(lookup_from(&[("IDENTITY_MODE", "mock")]));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
