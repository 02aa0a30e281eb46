use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;

use super::{AppState, Pagination, path_id};
use crate::auth::{NewUser, UserContext, UserUpdate};
use crate::db::{USER_TABLE, UserRecord};
use crate::error::ApiError;

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOut {
    pub id: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: String,
}

impl From<UserRecord> for UserOut {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
        }
    }
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    Json(new): Json<NewUser>,
) -> Result<Json<UserOut>, ApiError> {
    let user = state.users.create_user(new).await?;
    Ok(Json(user.into()))
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<UserOut>>, ApiError> {
    let users = state.users.list_users(page.skip(), page.limit()).await?;
    Ok(Json(users.into_iter().map(UserOut::from).collect()))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    _caller: UserContext,
    Path(id): Path<String>,
) -> Result<Json<UserOut>, ApiError> {
    let id = path_id(USER_TABLE, &id, "user")?;
    let user = state.users.get_user(&id).await?;
    Ok(Json(user.into()))
}

pub(super) async fn update_user(
    State(state): State<AppState>,
    caller: UserContext,
    Path(id): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserOut>, ApiError> {
    let id = path_id(USER_TABLE, &id, "user")?;
    state.users.get_user(&id).await?;
    if !caller.owns(&id) {
        return Err(ApiError::Forbidden("You can only modify your own account".to_string()));
    }

    let user = state.users.update_user(&id, update).await?;
    Ok(Json(user.into()))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    caller: UserContext,
    Path(id): Path<String>,
) -> Result<Json<UserOut>, ApiError> {
    let id = path_id(USER_TABLE, &id, "user")?;
    state.users.get_user(&id).await?;
    if !caller.owns(&id) {
        return Err(ApiError::Forbidden("You can only delete your own account".to_string()));
    }

    let user = state.users.delete_user(&id).await?;
    Ok(Json(user.into()))
}
