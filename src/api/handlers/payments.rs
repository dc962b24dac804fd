//! PromptPay charge endpoints.

use crate::{
    api::{AppState, handlers::required},
    errors::{Error, Result},
    providers::payment::{ChargeStatus, PaymentProvider, PromptPayCharge},
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPayRequest {
    #[serde(rename = "amountTHB")]
    pub amount_thb: Option<f64>,
    pub order_id: Option<String>,
}

fn provider(state: &AppState) -> Result<&Arc<dyn PaymentProvider>> {
    state.payments.as_ref().ok_or_else(|| Error::Upstream {
        service: "omise".to_string(),
        status: None,
        message: "Payment provider is not configured".to_string(),
    })
}

pub async fn create_promptpay(
    State(state): State<AppState>,
    Json(request): Json<PromptPayRequest>,
) -> Result<Json<PromptPayCharge>> {
    let amount_thb = request.amount_thb.ok_or_else(|| Error::InvalidInput {
        message: "amountTHB is required".to_string(),
    })?;
    let order_id = required(request.order_id.as_deref(), "orderId")?;

    let charge = provider(&state)?
        .create_promptpay_charge(amount_thb, order_id)
        .await?;
    Ok(Json(charge))
}

pub async fn get_charge(
    State(state): State<AppState>,
    Path(charge_id): Path<String>,
) -> Result<Json<ChargeStatus>> {
    let status = provider(&state)?.get_charge(&charge_id).await?;
    Ok(Json(status))
}

/// Acknowledges provider callbacks. Events are logged only.
pub async fn omise_webhook(Json(event): Json<Value>) -> Json<Value> {
    let key = event.get("key").and_then(Value::as_str).unwrap_or("unknown");
    let charge = event
        .pointer("/data/id")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    info!("Omise webhook {} for {}", key, charge);
    Json(json!({ "ok": true }))
}
