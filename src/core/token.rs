//! Redemption token codec.
//!
//! Wire format, `|`-separated:
//!
//! ```text
//! SCGLAM|<customer_id>|<treatment_code>|<appointment_ref>|<unix_seconds>|<signature>
//! ```
//!
//! `appointment_ref` is empty for a walk-in token. The signature is an
//! HMAC-SHA256 over the first five fields (joined with `|`), encoded as
//! URL-safe base64 without padding.

use crate::errors::{Error, Result};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Leading tag of every redemption token.
pub const TOKEN_TAG: &str = "SCGLAM";

const SEPARATOR: char = '|';
const FIELD_COUNT: usize = 6;

type HmacSha256 = Hmac<Sha256>;

/// Decoded token fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionToken {
    pub customer_id: String,
    pub treatment_code: String,
    /// Appointment id the token was issued for; `None` for walk-ins
    pub appointment_ref: Option<i64>,
    /// Issue time in unix seconds
    pub issued_at: i64,
}

/// Signs and verifies redemption tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| Error::Config {
            message: format!("Invalid token secret: {e}"),
        })
    }

    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Builds a signed token string.
    ///
    /// # Errors
    /// `InvalidInput` if the customer id or treatment code is empty or
    /// contains the field separator.
    pub fn encode(
        &self,
        customer_id: &str,
        treatment_code: &str,
        appointment_ref: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        for (name, value) in [("customer_id", customer_id), ("treatment_code", treatment_code)] {
            if value.is_empty() || value.contains(SEPARATOR) {
                return Err(Error::InvalidInput {
                    message: format!("{name} cannot be empty or contain '{SEPARATOR}'"),
                });
            }
        }

        let appointment = appointment_ref.map(|id| id.to_string()).unwrap_or_default();
        let payload = format!(
            "{TOKEN_TAG}|{customer_id}|{treatment_code}|{appointment}|{}",
            now.timestamp()
        );
        let signature = self.sign(&payload)?;
        Ok(format!("{payload}|{signature}"))
    }

    /// Parses a token without checking its signature.
    ///
    /// # Errors
    /// `MalformedToken` for a wrong tag, missing fields or unparsable numbers.
    pub fn decode(token: &str) -> Result<RedemptionToken> {
        let fields: Vec<&str> = token.trim().split(SEPARATOR).collect();
        let malformed = |reason: &str| Error::MalformedToken {
            reason: reason.to_string(),
        };

        if fields.first() != Some(&TOKEN_TAG) {
            return Err(malformed("missing SCGLAM tag"));
        }
        if fields.len() < FIELD_COUNT - 1 {
            return Err(malformed("missing fields"));
        }
        if fields.len() > FIELD_COUNT {
            return Err(malformed("too many fields"));
        }

        let customer_id = fields[1];
        let treatment_code = fields[2];
        if customer_id.is_empty() || treatment_code.is_empty() {
            return Err(malformed("customer id and treatment code are required"));
        }

        let appointment_ref = match fields[3] {
            "" => None,
            raw => Some(
                raw.parse::<i64>()
                    .map_err(|_| malformed("appointment ref is not a number"))?,
            ),
        };
        let issued_at = fields[4]
            .parse::<i64>()
            .map_err(|_| malformed("timestamp is not a number"))?;

        Ok(RedemptionToken {
            customer_id: customer_id.to_string(),
            treatment_code: treatment_code.to_string(),
            appointment_ref,
            issued_at,
        })
    }

    /// Parses a token and checks its signature.
    ///
    /// # Errors
    /// `MalformedToken` as for [`Self::decode`]; `InvalidTokenSignature` when the
    /// signature field is missing or does not match.
    pub fn verify(&self, token: &str) -> Result<RedemptionToken> {
        let decoded = Self::decode(token)?;

        let trimmed = token.trim();
        let (payload, signature) = match trimmed.rsplit_once(SEPARATOR) {
            Some((payload, signature)) if trimmed.split(SEPARATOR).count() == FIELD_COUNT => {
                (payload, signature)
            }
            _ => return Err(Error::InvalidTokenSignature),
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::InvalidTokenSignature)?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidTokenSignature)?;

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::TimeZone;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret")
    }

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 18, 2, 0, 0).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let token = codec()
            .encode("U_TEST_001", "smooth", Some(42), issued())
            .unwrap();
        let fields: Vec<&str> = token.split('|').collect();
        assert_eq!(fields.len(), 6);
        let issued_secs = issued().timestamp().to_string();
        assert_eq!(
            &fields[..5],
            &["SCGLAM", "U_TEST_001", "smooth", "42", issued_secs.as_str()]
        );
        assert!(!fields[5].is_empty());
    }

    #[test]
    fn test_walk_in_token_has_empty_ref() {
        let token = codec().encode("U_TEST_001", "smooth", None, issued()).unwrap();
        let decoded = codec().verify(&token).unwrap();
        assert_eq!(decoded.appointment_ref, None);
        assert_eq!(decoded.customer_id, "U_TEST_001");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for bad in [
            "",
            "GLAM|U1|smooth|1|0|sig",
            "SCGLAM|U1|smooth",
            "SCGLAM||smooth|1|0|sig",
            "SCGLAM|U1|smooth|abc|0|sig",
            "SCGLAM|U1|smooth|1|later|sig",
            "SCGLAM|U1|smooth|1|0|sig|extra",
        ] {
            assert!(
                matches!(TokenCodec::decode(bad), Err(Error::MalformedToken { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_verify_rejects_unsigned_and_tampered() {
        let codec = codec();

        let unsigned = "SCGLAM|U_TEST_001|smooth|42|1899943200";
        assert!(TokenCodec::decode(unsigned).is_ok());
        assert!(matches!(codec.verify(unsigned), Err(Error::InvalidTokenSignature)));

        let token = codec.encode("U_TEST_001", "smooth", Some(42), issued()).unwrap();
        let tampered = token.replacen("U_TEST_001", "U_TEST_002", 1);
        assert!(matches!(codec.verify(&tampered), Err(Error::InvalidTokenSignature)));

        let other_secret = TokenCodec::new("another-secret");
        assert!(matches!(other_secret.verify(&token), Err(Error::InvalidTokenSignature)));
    }

    #[test]
    fn test_encode_rejects_separator_in_fields() {
        assert!(matches!(
            codec().encode("U|1", "smooth", None, issued()),
            Err(Error::InvalidInput { .. })
        ));
    }
}
