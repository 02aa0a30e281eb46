//! Bearer token issuance and validation.
//!
//! Tokens are HMAC-signed JWTs carrying the subject (user record id), the
//! account role and an expiry. Nothing is stored server-side: a token stays
//! usable until it expires, and there is no revocation path.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthSettings;
use crate::types::AccessToken;

/// Reasons a presented token is rejected.
///
/// Callers at the HTTP boundary collapse all of these into one opaque
/// "unauthorized" response; the distinction exists for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token could not be decoded at all.
    #[error("malformed token")]
    MalformedToken,
    /// The signature does not match the server secret.
    #[error("invalid token signature")]
    InvalidSignature,
    /// The expiry timestamp is not in the future.
    #[error("token expired")]
    TokenExpired,
    /// The token verified but carries no subject.
    #[error("token has no subject")]
    MissingSubject,
    /// The expiry would fall outside the representable date range.
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
    /// Signing failed while issuing a token.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Format errors point at forged or corrupted input rather than an
    /// ordinary stale login, and are logged louder.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::MalformedToken)
    }
}

/// Claim set as it appears on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    exp: i64,
}

/// Claims extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    /// Subject: the user record id, e.g. `user:abc123`.
    pub subject: String,
    /// Role recorded at issuance, if any.
    pub role: Option<String>,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates access tokens with the process-wide signing secret.
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
}

impl TokenService {
    /// Build the service from the startup auth settings.
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.secret.as_bytes();
        Self {
            algorithm: settings.algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validity: settings.token_ttl,
        }
    }

    /// Validity window applied to every issued token.
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a token for `subject` valid from `now` for the configured window.
    pub fn issue(
        &self,
        subject: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.validity)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = WireClaims {
            sub: Some(subject.to_string()),
            role: Some(role.to_string()),
            iat: Some(now.timestamp()),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map(AccessToken::new)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate `token` as of `now` and return its claims.
    ///
    /// The signature is checked first; expiry is then checked against `now`
    /// rather than the wall clock, so a token is rejected at or after its
    /// `exp` second.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let data = decode::<WireClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                ErrorKind::ExpiredSignature => TokenError::TokenExpired,
                _ => TokenError::MalformedToken,
            }
        })?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::TokenExpired);
        }

        let subject = claims
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(TokenError::MissingSubject)?;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::MalformedToken)?;

        Ok(Claims {
            subject,
            role: claims.role,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str) -> AuthSettings {
        AuthSettings {
            secret: secret.to_string(),
            ..AuthSettings::default()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_round_trip_subject_and_role() {
        let service = TokenService::new(&settings("secret-a"));
        let token = service.issue("u1", "admin", t0()).unwrap();

        let claims = service.validate(token.as_str(), t0()).unwrap();
        assert_eq!(claims.subject, "u1");
        assert_eq!(claims.role.as_deref(), Some("admin"));
        assert_eq!(claims.expires_at, t0() + Duration::minutes(30));
    }

    #[test]
    fn test_valid_before_window_ends() {
        let service = TokenService::new(&settings("secret-a"));
        let token = service.issue("u1", "benevole", t0()).unwrap();

        assert!(service.validate(token.as_str(), t0() + Duration::minutes(29)).is_ok());
    }

    #[test]
    fn test_expired_after_window() {
        let service = TokenService::new(&settings("secret-a"));
        let token = service.issue("u1", "benevole", t0()).unwrap();

        let err = service
            .validate(token.as_str(), t0() + Duration::minutes(31))
            .unwrap_err();
        assert_eq!(err, TokenError::TokenExpired);
    }

    #[test]
    fn test_expired_exactly_at_expiry() {
        let service = TokenService::new(&settings("secret-a"));
        let token = service.issue("u1", "benevole", t0()).unwrap();

        let err = service
            .validate(token.as_str(), t0() + Duration::minutes(30))
            .unwrap_err();
        assert_eq!(err, TokenError::TokenExpired);
    }

    #[test]
    fn test_other_secret_is_invalid_signature() {
        let issuer = TokenService::new(&settings("secret-a"));
        let verifier = TokenService::new(&settings("secret-b"));
        let token = issuer.issue("u1", "admin", t0()).unwrap();

        let err = verifier.validate(token.as_str(), t0()).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn test_other_algorithm_is_invalid_signature() {
        let issuer = TokenService::new(&AuthSettings {
            algorithm: Algorithm::HS512,
            ..settings("secret-a")
        });
        let verifier = TokenService::new(&settings("secret-a"));
        let token = issuer.issue("u1", "admin", t0()).unwrap();

        let err = verifier.validate(token.as_str(), t0()).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn test_tampered_payload_is_invalid_signature() {
        let service = TokenService::new(&settings("secret-a"));
        let token = service.issue("u1", "benevole", t0()).unwrap();

        // Swap in a payload claiming another subject, keep the old signature.
        let other = service.issue("u2", "admin", t0()).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();
        let other_parts: Vec<&str> = other.as_str().split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        let err = service.validate(&forged, t0()).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = TokenService::new(&settings("secret-a"));

        for garbage in ["", "garbage", "not.a.token", "a.b"] {
            let err = service.validate(garbage, t0()).unwrap_err();
            assert_eq!(err, TokenError::MalformedToken, "for {garbage:?}");
            assert!(err.is_format_error());
        }
    }

    #[test]
    fn test_missing_subject_is_rejected() {
        let service = TokenService::new(&settings("secret-a"));
        let claims = WireClaims {
            sub: None,
            role: Some("admin".to_string()),
            iat: None,
            exp: (t0() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret-a"),
        )
        .unwrap();

        let err = service.validate(&token, t0()).unwrap_err();
        assert_eq!(err, TokenError::MissingSubject);
    }

    #[test]
    fn test_blank_subject_is_rejected() {
        let service = TokenService::new(&settings("secret-a"));
        let token = service.issue("  ", "admin", t0()).unwrap();

        let err = service.validate(token.as_str(), t0()).unwrap_err();
        assert_eq!(err, TokenError::MissingSubject);
    }

    #[test]
    fn test_huge_validity_window_fails_to_issue() {
        let settings = AuthSettings::from_parts(
            Some("secret-a".to_string()),
            None,
            Some(200_000_000_000),
        )
        .unwrap();
        let service = TokenService::new(&settings);

        assert_eq!(
            service.issue("user:a", "admin", t0()),
            Err(TokenError::ExpiryOutOfRange)
        );
    }

    #[test]
    fn test_custom_validity_window() {
        let service = TokenService::new(&AuthSettings {
            token_ttl: Duration::minutes(5),
            ..settings("secret-a")
        });
        let token = service.issue("u1", "benevole", t0()).unwrap();

        assert!(service.validate(token.as_str(), t0() + Duration::minutes(4)).is_ok());
        assert_eq!(
            service.validate(token.as_str(), t0() + Duration::minutes(6)),
            Err(TokenError::TokenExpired)
        );
    }
}
