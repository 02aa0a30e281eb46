use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppState, Pagination, UserOut, path_id};
use crate::auth::UserContext;
use crate::db::{FICHE_LAPIN_TABLE, NewPost, POST_TABLE, PostRecord, QueryBuilder, WithAuthor};
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub(super) struct PostOut {
    id: String,
    title: String,
    content: Option<String>,
    date_creation_post: DateTime<Utc>,
    author_id: String,
    fiche_lapin_id: Option<String>,
    author: Option<UserOut>,
}

impl From<PostRecord> for PostOut {
    fn from(post: PostRecord) -> Self {
        Self {
            id: post.id.to_string(),
            title: post.title,
            content: post.content,
            date_creation_post: post.date_creation_post,
            author_id: post.author_id.to_string(),
            fiche_lapin_id: post.fiche_lapin_id.map(|id| id.to_string()),
            author: None,
        }
    }
}

impl From<WithAuthor<PostRecord>> for PostOut {
    fn from(with: WithAuthor<PostRecord>) -> Self {
        Self {
            author: with.author.map(UserOut::from),
            ..Self::from(with.record)
        }
    }
}

pub(super) async fn create_post(
    State(state): State<AppState>,
    caller: UserContext,
    Json(data): Json<NewPost>,
) -> Result<Json<PostOut>, ApiError> {
    let author = caller.record_id().ok_or(ApiError::Unauthorized)?;
    let post = QueryBuilder::create_post(&state.db, &author, data).await?;
    Ok(Json(post.into()))
}

pub(super) async fn create_post_for_fiche(
    State(state): State<AppState>,
    caller: UserContext,
    Path(fiche_id): Path<String>,
    Json(data): Json<NewPost>,
) -> Result<Json<PostOut>, ApiError> {
    let fiche_id = path_id(FICHE_LAPIN_TABLE, &fiche_id, "fiche lapin")?;
    let author = caller.record_id().ok_or(ApiError::Unauthorized)?;
    let post = QueryBuilder::create_post_for_fiche(&state.db, &fiche_id, &author, data).await?;
    Ok(Json(post.into()))
}

/// `?title=` filter on the post list.
#[derive(Debug, Default, Deserialize)]
pub(super) struct PostFilter {
    title: Option<String>,
}

/// Newest posts, one page at a time. With `title`, every post carrying
/// exactly that title instead.
pub(super) async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<PostOut>>, ApiError> {
    let posts = match filter.title.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(title) => QueryBuilder::find_posts_by_title(&state.db, title).await?,
        None => QueryBuilder::list_posts(&state.db, page.skip(), page.limit()).await?,
    };
    Ok(Json(posts.into_iter().map(PostOut::from).collect()))
}

pub(super) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostOut>, ApiError> {
    let id = path_id(POST_TABLE, &id, "post")?;
    let post = QueryBuilder::get_post(&state.db, &id).await?;
    Ok(Json(post.into()))
}

pub(super) async fn delete_post(
    State(state): State<AppState>,
    caller: UserContext,
    Path(id): Path<String>,
) -> Result<Json<PostOut>, ApiError> {
    let id = path_id(POST_TABLE, &id, "post")?;
    let subject = caller.record_id().ok_or(ApiError::Unauthorized)?;
    let post = QueryBuilder::delete_post(&state.db, &id, &subject).await?;
    Ok(Json(post.into()))
}
