//! PromptPay charges through Omise.
//!
//! Only the call contract is implemented: creating a charge and reading its
//! status. Purchases are recorded separately; a confirmed payment does not
//! credit the ledger by itself.

use crate::errors::{Error, Result};
use crate::providers::transport_error;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const OMISE_API_BASE: &str = "https://api.omise.co";
const SERVICE: &str = "omise";
const CURRENCY: &str = "THB";

/// A created PromptPay charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPayCharge {
    pub charge_id: String,
    pub status: String,
    /// Amount in satang
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    /// Scannable QR image; empty when the provider returned none
    pub qr_image_url: String,
}

/// Current state of a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeStatus {
    pub charge_id: String,
    pub status: String,
}

/// Creates and reads payment charges.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a PromptPay charge for `amount_thb`.
    ///
    /// # Errors
    /// `InvalidInput` for a non-positive amount; `Upstream` / `UpstreamTimeout`
    /// when the provider fails.
    async fn create_promptpay_charge(&self, amount_thb: f64, order_id: &str)
    -> Result<PromptPayCharge>;

    /// Reads the status of an existing charge.
    async fn get_charge(&self, charge_id: &str) -> Result<ChargeStatus>;
}

/// Omise REST client.
#[derive(Clone)]
pub struct OmiseClient {
    secret_key: String,
    http_client: Client,
    base_url: String,
}

impl std::fmt::Debug for OmiseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmiseClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct OmiseCharge {
    id: String,
    status: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    source: Option<serde_json::Value>,
}

impl OmiseCharge {
    fn order_id(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("orderId"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
    }

    fn qr_image_url(&self) -> String {
        self.source
            .as_ref()
            .and_then(|s| s.pointer("/scannable_code/image/download_uri"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct OmiseErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl OmiseClient {
    #[must_use]
    pub fn new(secret_key: String, http_client: Client) -> Self {
        Self {
            secret_key,
            http_client,
            base_url: OMISE_API_BASE.to_string(),
        }
    }

    /// Points the client at a different API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn read_charge(&self, response: reqwest::Response) -> Result<OmiseCharge> {
        let status = response.status();
        if !status.is_success() {
            let body: Option<OmiseErrorBody> = response.json().await.ok();
            let message = body
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Omise request failed".to_string());
            warn!("Omise request failed with {}: {}", status, message);
            return Err(Error::Upstream {
                service: SERVICE.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, &e))
    }
}

/// Converts baht to satang, rejecting non-positive or non-finite amounts.
fn to_satang(amount_thb: f64) -> Result<i64> {
    if !amount_thb.is_finite() || amount_thb <= 0.0 {
        return Err(Error::InvalidInput {
            message: "amountTHB must be greater than 0".to_string(),
        });
    }
    #[allow(clippy::cast_possible_truncation)]
    let satang = (amount_thb * 100.0).round() as i64;
    Ok(satang)
}

#[async_trait]
impl PaymentProvider for OmiseClient {
    async fn create_promptpay_charge(
        &self,
        amount_thb: f64,
        order_id: &str,
    ) -> Result<PromptPayCharge> {
        let amount = to_satang(amount_thb)?;
        let amount_field = amount.to_string();
        let params = [
            ("amount", amount_field.as_str()),
            ("currency", CURRENCY),
            ("source[type]", "promptpay"),
            ("metadata[orderId]", order_id),
        ];

        let response = self
            .http_client
            .post(format!("{}/charges", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .form(&params)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        let charge = self.read_charge(response).await?;
        info!("PromptPay charge {} created ({})", charge.id, charge.status);

        Ok(PromptPayCharge {
            order_id: charge.order_id().unwrap_or_else(|| order_id.to_string()),
            qr_image_url: charge.qr_image_url(),
            charge_id: charge.id,
            status: charge.status,
            amount: charge.amount,
            currency: charge.currency,
        })
    }

    async fn get_charge(&self, charge_id: &str) -> Result<ChargeStatus> {
        if charge_id.is_empty() || !charge_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidInput {
                message: format!("Invalid charge id '{charge_id}'"),
            });
        }

        let response = self
            .http_client
            .get(format!("{}/charges/{}", self.base_url, charge_id))
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        let charge = self.read_charge(response).await?;

        Ok(ChargeStatus {
            charge_id: charge.id,
            status: charge.status,
        })
    }
}
