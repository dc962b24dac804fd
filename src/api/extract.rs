//! Bearer-credential customer and staff identities.

use crate::{api::AppState, errors::Error};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use sha2::{Digest, Sha256};

/// The verified customer making the request.
#[derive(Debug, Clone)]
pub struct CustomerIdentity {
    pub customer_id: String,
    pub display_name: Option<String>,
}

/// Reads the credential from an `Authorization: Bearer <credential>` header.
fn bearer_credential(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credential) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !credential.trim().is_empty() {
        Some(credential.trim())
    } else {
        None
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CustomerIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let credential = bearer_credential(parts).ok_or_else(|| Error::Unauthorized {
            message: "missing bearer credential".to_string(),
        })?;

        let app = AppState::from_ref(state);
        let verified = app.identity.verify(credential).await?;
        Ok(Self {
            customer_id: verified.customer_id,
            display_name: verified.display_name,
        })
    }
}

/// A request made with the staff API key.
#[derive(Debug, Clone, Copy)]
pub struct StaffIdentity;

/// Compares digests so the comparison time does not track the matching prefix.
fn staff_key_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let credential = bearer_credential(parts).ok_or_else(|| Error::Unauthorized {
            message: "missing staff credential".to_string(),
        })?;

        let app = AppState::from_ref(state);
        if staff_key_matches(credential, &app.staff_api_key) {
            Ok(Self)
        } else {
            Err(Error::Unauthorized {
                message: "invalid staff credential".to_string(),
            })
        }
    }
}
