//! External collaborators behind traits.
//!
//! The HTTP layer holds these as `Arc<dyn ...>` so tests and local
//! development can swap in fakes. Every outbound call is bounded by the
//! client timeout and surfaces failure as `Error::Upstream` or
//! `Error::UpstreamTimeout`.

/// Customer identity verification
pub mod identity;
/// PromptPay charges
pub mod payment;

use crate::errors::Error;
use std::time::Duration;

/// Builds the shared HTTP client with a bounded request timeout.
pub fn http_client(timeout: Duration) -> crate::errors::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config {
            message: format!("Failed to build HTTP client: {e}"),
        })
}

/// Maps a transport-level failure onto the upstream error variants.
pub(crate) fn transport_error(service: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::UpstreamTimeout {
            service: service.to_string(),
        }
    } else {
        Error::Upstream {
            service: service.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
