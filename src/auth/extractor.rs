//! Authentication extractor for HTTP requests.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use chrono::{DateTime, Utc};
use http::header::AUTHORIZATION;
use http::request::Parts;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::context::UserContext;
use crate::auth::token::{TokenError, TokenService};
use crate::error::ApiError;

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No bearer token on the request.
    #[error("authentication required")]
    Unauthenticated,
    /// A bearer token was presented but rejected.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
}

/// Turns an `Authorization` header into a [`UserContext`].
pub struct AuthExtractor {
    tokens: Arc<TokenService>,
}

impl AuthExtractor {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Validate the bearer token in `authorization` as of `now`.
    pub fn extract_user(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UserContext, AuthError> {
        let token = bearer_token(authorization).ok_or(AuthError::Unauthenticated)?;
        let claims = self.tokens.validate(token, now)?;
        Ok(UserContext::from_claims(claims))
    }
}

/// The token part of a `Bearer <token>` header value.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let value = authorization?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
    Arc<AuthExtractor>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let extractor = Arc::<AuthExtractor>::from_ref(state);
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        extractor
            .extract_user(authorization, Utc::now())
            .map_err(|e| {
                match &e {
                    AuthError::InvalidToken(inner) if inner.is_format_error() => {
                        warn!("Rejected bearer token on {}: {}", parts.uri.path(), e)
                    }
                    _ => debug!("Rejected request to {}: {}", parts.uri.path(), e),
                }
                ApiError::Unauthorized
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthSettings;
    use chrono::Duration;

    fn extractor() -> AuthExtractor {
        AuthExtractor::new(Arc::new(TokenService::new(&AuthSettings {
            secret: "test-secret".to_string(),
            ..AuthSettings::default()
        })))
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("bearer   abc ")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("abc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn test_extract_user_valid_token() {
        let extractor = extractor();
        let now = Utc::now();
        let token = extractor.tokens().issue("user:jeanne", "admin", now).unwrap();
        let header = format!("Bearer {}", token);

        let ctx = extractor.extract_user(Some(&header), now).unwrap();
        assert_eq!(ctx.subject(), "user:jeanne");
        assert_eq!(ctx.role(), Some("admin"));
    }

    #[test]
    fn test_extract_user_missing_header() {
        assert_eq!(
            extractor().extract_user(None, Utc::now()).unwrap_err(),
            AuthError::Unauthenticated
        );
    }

    #[test]
    fn test_extract_user_expired_token() {
        let extractor = extractor();
        let issued = Utc::now() - Duration::hours(2);
        let token = extractor.tokens().issue("user:jeanne", "admin", issued).unwrap();
        let header = format!("Bearer {}", token);

        assert_eq!(
            extractor.extract_user(Some(&header), Utc::now()).unwrap_err(),
            AuthError::InvalidToken(TokenError::TokenExpired)
        );
    }

    #[tokio::test]
    async fn test_rejection_is_opaque_unauthorized() {
        use axum::response::IntoResponse;

        let state = Arc::new(extractor());
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/ficheslapin")
            .header(AUTHORIZATION, "Bearer not.a.token")
            .body(())
            .unwrap()
            .into_parts();

        let rejection = UserContext::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        let response = rejection.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
