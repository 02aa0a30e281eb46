// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod types;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{CredentialHash, TokenService, UserContext, UserStore};
pub use config::{AppConfig, AuthSettings};
pub use db::{DatabaseConfig, Db, create_connection, ensure_schema};
pub use error::{ApiError, StoreError};

use anyhow::Result;
use tracing::{info, warn};

/// Connect to the configured database, make sure the schema exists and
/// serve the HTTP API until the process is stopped.
pub async fn serve(config: AppConfig) -> Result<()> {
    if config.auth.is_insecure_default() {
        warn!("JWT_SECRET_KEY is not set; signing tokens with the development secret");
    }

    info!("Using database url: {}", config.database.url);
    let db = create_connection(config.database).await?;
    ensure_schema(&db).await?;

    let state = AppState::new(db, &config.auth);
    let app = create_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
