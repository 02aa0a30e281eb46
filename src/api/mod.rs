// REST API for the rabbit registry

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use surrealdb::RecordId;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{AuthExtractor, TokenService, UserStore};
use crate::config::AuthSettings;
use crate::db::Db;
use crate::error::{ApiError, StoreError};
use crate::types::parse_record_id;

mod auth;
mod fiches;
mod posts;
mod users;


pub use users::UserOut;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub auth: Arc<AuthExtractor>,
    pub users: Arc<UserStore>,
}

impl AppState {
    pub fn new(db: Db, settings: &AuthSettings) -> Self {
        let tokens = Arc::new(TokenService::new(settings));
        Self {
            auth: Arc::new(AuthExtractor::new(tokens)),
            users: Arc::new(UserStore::new(db.clone(), settings.password_iterations)),
            db,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        self.auth.tokens()
    }
}

impl FromRef<AppState> for Arc<AuthExtractor> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(hello_world))
        .route("/api", get(hello_api))
        .route("/health", get(health_check))
        .route("/auth/token", post(auth::get_access_token))
        .route("/users", post(users::create_user).get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/ficheslapin",
            post(fiches::create_fiche).get(fiches::list_fiches),
        )
        .route(
            "/ficheslapin/{id}",
            get(fiches::get_fiche)
                .put(fiches::update_fiche)
                .delete(fiches::delete_fiche),
        )
        .route("/posts", post(posts::create_post).get(posts::list_posts))
        .route(
            "/posts/fiches/{fiche_id}/posts",
            post(posts::create_post_for_fiche),
        )
        .route("/posts/{id}", get(posts::get_post).delete(posts::delete_post))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
        .with_state(state)
}

/// CORS for the configured browser origins, with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin `{}`", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn hello_world() -> Json<Value> {
    Json(serde_json::json!({ "Hello": "World" }))
}

async fn hello_api() -> Json<Value> {
    Json(serde_json::json!({ "Hello": "Api" }))
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "message": "Api is running fine!",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// `?skip=&limit=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn skip(&self) -> u32 {
        self.skip.unwrap_or(0)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }
}

/// Parse an id path segment; an id that cannot name a record of `table` is
/// reported as not found.
fn path_id(table: &str, raw: &str, what: &'static str) -> Result<RecordId, ApiError> {
    parse_record_id(table, raw).ok_or_else(|| StoreError::NotFound(what).into())
}
