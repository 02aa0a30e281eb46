use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthToken {
    access_token: String,
    token_type: &'static str,
}

/// Exchange a username and password for a bearer token.
///
/// Unknown usernames and wrong passwords get the same 401.
pub(super) async fn get_access_token(
    State(state): State<AppState>,
    Json(login): Json<LoginRequest>,
) -> Result<Json<AuthToken>, ApiError> {
    let Some(user) = state
        .users
        .authenticate(login.username.trim(), &login.password)
        .await?
    else {
        info!("Failed login attempt");
        return Err(ApiError::Unauthorized);
    };

    let token = state
        .tokens()
        .issue(&user.id.to_string(), &user.role, Utc::now())
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Issued access token for {}", user.id);
    Ok(Json(AuthToken {
        access_token: token.into_inner(),
        token_type: "bearer",
    }))
}
