//! REST binding over the core operations.
//!
//! Handlers parse and validate request shapes, resolve the caller's identity
//! and call into `core` with an explicit `now`. Business rules live in `core`.

/// Error to response mapping
pub mod error;
/// Request extractors
pub mod extract;
/// Route handlers
pub mod handlers;

use crate::{
    config::settings::ShopSettings,
    core::token::TokenCodec,
    providers::{identity::IdentityVerifier, payment::PaymentProvider},
};
use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub settings: Arc<ShopSettings>,
    pub codec: Arc<TokenCodec>,
    pub identity: Arc<dyn IdentityVerifier>,
    /// Shared key staff present as a bearer credential
    pub staff_api_key: Arc<str>,
    /// `None` when no payment provider is configured
    pub payments: Option<Arc<dyn PaymentProvider>>,
}

/// Builds the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/liff/session", post(handlers::customer::create_session))
        .route("/api/me/treatments", get(handlers::customer::my_treatments))
        .route("/api/my-courses", get(handlers::customer::my_courses))
        .route("/api/me/history", get(handlers::customer::my_history))
        .route("/api/purchases/mock-buy", post(handlers::customer::mock_buy))
        .route("/api/toppings", get(handlers::catalog::list_toppings))
        .route("/api/slots", get(handlers::catalog::list_slots))
        .route("/api/appointments", post(handlers::appointments::create))
        .route("/api/appointments/next", get(handlers::appointments::next))
        .route("/api/appointments/redeem", post(handlers::appointments::redeem_by_token))
        .route("/api/appointments/:id/token", get(handlers::appointments::token))
        .route("/api/appointments/:id/reschedule", post(handlers::appointments::reschedule))
        .route("/api/appointments/:id/cancel", post(handlers::appointments::cancel))
        .route("/api/appointments/:id/redeem", post(handlers::appointments::redeem))
        .route("/api/create-promptpay", post(handlers::payments::create_promptpay))
        .route("/api/charge/:id", get(handlers::payments::get_charge))
        .route("/webhooks/omise", post(handlers::payments::omise_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
