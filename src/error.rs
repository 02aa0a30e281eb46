//! Error types for the storage layer and the HTTP boundary.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use thiserror::Error;
use tracing::error;

use crate::auth::credential::MalformedCredentialHash;

/// Errors raised by the record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique value (e.g. a username) is already taken.
    #[error("{0}")]
    Conflict(String),

    /// The caller is not the record's author.
    #[error("only the author can {0}")]
    WrongAuthor(&'static str),

    /// Input rejected before reaching the database.
    #[error("{0}")]
    Invalid(String),

    /// A stored credential hash could not be decoded.
    #[error(transparent)]
    Credential(#[from] MalformedCredentialHash),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

/// Errors returned by HTTP handlers.
///
/// Every authentication failure maps to the same [`ApiError::Unauthorized`]
/// response so clients cannot tell an expired token from a forged one, or an
/// unknown username from a wrong password.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Details are logged, never sent to the client.
    #[error("Internal server error")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(format!("{} not found", capitalize(what))),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::WrongAuthor(action) => Self::Forbidden(format!("Only the author can {}", action)),
            StoreError::Invalid(msg) => Self::BadRequest(msg),
            StoreError::Credential(e) => {
                error!("Stored credential hash is corrupt: {}", e);
                Self::Internal(e.to_string())
            }
            StoreError::Database(e) => Self::Internal(format!("database error: {}", e)),
            StoreError::Task(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(detail) => {
                error!("Request failed: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let api: ApiError = StoreError::NotFound("fiche lapin").into();
        assert_eq!(api.to_string(), "Fiche lapin not found");
    }

    #[test]
    fn test_wrong_author_is_forbidden() {
        let api: ApiError = StoreError::WrongAuthor("delete this post").into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_internal_hides_detail() {
        let api = ApiError::Internal("connection refused at 10.0.0.3".to_string());
        assert_eq!(api.to_string(), "Internal server error");
    }

    #[test]
    fn test_malformed_credential_is_internal() {
        let malformed = "garbage"
            .parse::<crate::auth::credential::CredentialHash>()
            .unwrap_err();
        let api: ApiError = StoreError::from(malformed).into();
        assert!(matches!(api, ApiError::Internal(_)));
    }
}
