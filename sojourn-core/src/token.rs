//! Session token and claims handling.
//!
//! The client never holds the issuer's signing secret, so tokens are decoded
//! with signature validation disabled: the server remains the authority on
//! token validity, and the client only extracts identity and expiry hints.
//! Expiry is evaluated against an injected [`Clock`] rather than inside
//! `jsonwebtoken`, which keeps time-dependent tests deterministic.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock abstraction for token expiry checks.
pub trait Clock: Send + Sync {
    /// Current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// Clock helpers for common test scenarios.
pub mod test_clocks {
    use super::FixedClock;

    /// 2024-01-01 00:00:00 UTC
    pub fn valid() -> FixedClock {
        FixedClock(1704067200)
    }

    /// 2030-01-01 00:00:00 UTC - far future, every token is expired
    pub fn future() -> FixedClock {
        FixedClock(1893456000)
    }
}

// ============================================================================
// CLAIMS
// ============================================================================

/// Claims embedded in a Sojourn session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account identifier as issued)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Numeric user id, when the issuer provides it as a dedicated claim
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Claims {
    /// Derived numeric identity: the dedicated claim when present, otherwise
    /// a numeric `sub`. Normalized here once so callers never re-probe the
    /// claim shape.
    pub fn user_id(&self) -> Option<i64> {
        self.user_id.or_else(|| self.sub.parse().ok())
    }

    /// Check whether the token has expired according to a clock.
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

static CLAIMS_VALIDATION: Lazy<Validation> = Lazy::new(|| {
    let mut validation = Validation::new(Algorithm::HS256);
    // Signature and expiry are validated elsewhere: the client has no
    // signing secret, and expiry goes through the injected clock.
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation
});

/// Decode claims from a raw token without verifying its signature.
pub fn decode_claims(raw: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(raw, &DecodingKey::from_secret(&[]), &CLAIMS_VALIDATION)
        .map(|data| data.claims)
        .map_err(|err| TokenError::DecodeFailed {
            reason: err.to_string(),
        })
}

// ============================================================================
// SESSION TOKEN
// ============================================================================

/// The current session credential: the opaque bearer string plus its decoded
/// claims, captured once at construction.
///
/// A token whose claims cannot be decoded still works as an opaque bearer
/// credential; identity and expiry queries on it fail closed.
#[derive(Clone)]
pub struct SessionToken {
    raw: SecretString,
    claims: Option<Claims>,
}

impl SessionToken {
    /// Wrap a raw token, decoding its claims. Decode failures are logged and
    /// tolerated (`claims` stays `None`).
    pub fn from_raw(raw: &str) -> Self {
        let claims = match decode_claims(raw) {
            Ok(claims) => Some(claims),
            Err(err) => {
                tracing::warn!("session token claims undecodable: {}", err);
                None
            }
        };
        Self {
            raw: SecretString::new(raw.to_string().into()),
            claims,
        }
    }

    /// Expose the raw bearer string (use sparingly: headers and storage).
    pub fn expose_raw(&self) -> &str {
        self.raw.expose_secret()
    }

    /// Decoded claims, if the token was decodable.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// Derived numeric identity, `None` when claims are missing or carry no
    /// usable id.
    pub fn user_id(&self) -> Option<i64> {
        self.claims.as_ref().and_then(|claims| claims.user_id())
    }

    /// Expiry check, failing closed: missing or undecodable claims count as
    /// expired.
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        match &self.claims {
            Some(claims) => claims.is_expired(clock),
            None => true,
        }
    }

    /// The canonical `Authorization` header value for this token.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.raw.expose_secret())
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SessionToken([REDACTED, {} chars], claims: {})",
            self.raw.expose_secret().len(),
            if self.claims.is_some() {
                "decoded"
            } else {
                "undecodable"
            }
        )
    }
}

impl PartialEq for SessionToken {
    fn eq(&self, other: &Self) -> bool {
        self.raw.expose_secret() == other.raw.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn issue_token(claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode test token")
    }

    fn base_claims() -> Claims {
        Claims {
            sub: "traveler-1208".to_string(),
            iat: 1704067200,
            exp: 1704070800,
            user_id: Some(1208),
        }
    }

    #[test]
    fn decode_roundtrips_claims() {
        let claims = base_claims();
        let raw = issue_token(&claims);
        let decoded = decode_claims(&raw).expect("decode");
        assert_eq!(decoded, claims);
    }

    #[test]
    fn malformed_token_is_a_decode_error() {
        let result = decode_claims("not-a-token");
        assert!(matches!(result, Err(TokenError::DecodeFailed { .. })));
    }

    #[test]
    fn user_id_falls_back_to_numeric_sub() {
        let claims = Claims {
            sub: "4471".to_string(),
            iat: 0,
            exp: 0,
            user_id: None,
        };
        assert_eq!(claims.user_id(), Some(4471));

        let claims = Claims {
            sub: "traveler-4471".to_string(),
            iat: 0,
            exp: 0,
            user_id: None,
        };
        assert_eq!(claims.user_id(), None);
    }

    #[test]
    fn dedicated_user_id_claim_wins_over_sub() {
        let claims = Claims {
            sub: "9999".to_string(),
            iat: 0,
            exp: 0,
            user_id: Some(1208),
        };
        assert_eq!(claims.user_id(), Some(1208));
    }

    #[test]
    fn expiry_uses_injected_clock() {
        let claims = base_claims();
        assert!(!claims.is_expired(&test_clocks::valid()));
        assert!(claims.is_expired(&test_clocks::future()));
    }

    #[test]
    fn undecodable_token_fails_closed() {
        let token = SessionToken::from_raw("garbage");
        assert!(token.claims().is_none());
        assert_eq!(token.user_id(), None);
        assert!(token.is_expired(&test_clocks::valid()));
    }

    #[test]
    fn authorization_value_is_bearer_formatted() {
        let raw = issue_token(&base_claims());
        let token = SessionToken::from_raw(&raw);
        assert_eq!(token.authorization_value(), format!("Bearer {}", raw));
    }

    #[test]
    fn debug_output_redacts_the_raw_token() {
        let raw = issue_token(&base_claims());
        let token = SessionToken::from_raw(&raw);
        let debug = format!("{:?}", token);
        assert!(!debug.contains(&raw));
        assert!(debug.contains("REDACTED"));
    }
}
