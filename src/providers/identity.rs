//! Customer identity verification.
//!
//! In LINE mode the bearer credential is a LIFF ID token that is verified
//! against the LINE platform; the token's `sub` claim becomes the customer id.
//! Dev mode trusts the credential as the customer id and is for local use only.

use crate::errors::{Error, Result};
use crate::providers::transport_error;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const LINE_API_BASE: &str = "https://api.line.me";
const SERVICE: &str = "line";

/// A verified customer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    pub customer_id: String,
    pub display_name: Option<String>,
}

/// Turns an opaque bearer credential into a customer identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `credential`.
    ///
    /// # Errors
    /// `Unauthorized` when the credential is rejected; `Upstream` /
    /// `UpstreamTimeout` when the provider cannot be reached.
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity>;
}

/// Verifies LIFF ID tokens with the LINE platform.
#[derive(Clone, Debug)]
pub struct LineIdentityVerifier {
    /// Channel the ID tokens must be issued for
    channel_id: String,
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LineVerifyResponse {
    sub: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LineErrorResponse {
    #[serde(default)]
    error_description: Option<String>,
}

impl LineIdentityVerifier {
    #[must_use]
    pub fn new(channel_id: String, http_client: Client) -> Self {
        Self {
            channel_id,
            http_client,
            base_url: LINE_API_BASE.to_string(),
        }
    }

    /// Points the verifier at a different API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl IdentityVerifier for LineIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity> {
        if credential.trim().is_empty() {
            return Err(Error::Unauthorized {
                message: "missing ID token".to_string(),
            });
        }

        let params = [("id_token", credential), ("client_id", self.channel_id.as_str())];
        let response = self
            .http_client
            .post(format!("{}/oauth2/v2.1/verify", self.base_url))
            .form(&params)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let status = response.status();
        if status.is_client_error() {
            let body: Option<LineErrorResponse> = response.json().await.ok();
            let message = body
                .and_then(|b| b.error_description)
                .unwrap_or_else(|| "ID token rejected".to_string());
            warn!("LINE rejected ID token: {} ({})", message, status);
            return Err(Error::Unauthorized { message });
        }
        if !status.is_success() {
            return Err(Error::Upstream {
                service: SERVICE.to_string(),
                status: Some(status.as_u16()),
                message: "ID token verification failed".to_string(),
            });
        }

        let verified: LineVerifyResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        debug!("LINE ID token verified for {}", verified.sub);

        Ok(VerifiedIdentity {
            customer_id: verified.sub,
            display_name: verified.name,
        })
    }
}

/// Treats the credential itself as the customer id.
#[derive(Clone, Debug, Default)]
pub struct DevIdentityVerifier;

#[async_trait]
impl IdentityVerifier for DevIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity> {
        let customer_id = credential.trim();
        if customer_id.is_empty() {
            return Err(Error::Unauthorized {
                message: "missing customer id".to_string(),
            });
        }
        Ok(VerifiedIdentity {
            customer_id: customer_id.to_string(),
            display_name: None,
        })
    }
}
