use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("RABBIT_DB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("RABBIT_DB_NAMESPACE")
                .unwrap_or_else(|_| "spi_loen".to_string()),
            database: env::var("RABBIT_DB_DATABASE")
                .unwrap_or_else(|_| "registry".to_string()),
            username: env::var("RABBIT_DB_USERNAME").ok(),
            password: env::var("RABBIT_DB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Accounts. `password` holds the self-describing credential hash.
        "DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS user_username ON TABLE user COLUMNS username UNIQUE;",

        // Rabbit sheets, owned by their author.
        "DEFINE TABLE IF NOT EXISTS fiche_lapin SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS fiche_lapin_auteur ON TABLE fiche_lapin COLUMNS auteur_id;
         DEFINE INDEX IF NOT EXISTS fiche_lapin_arrivee ON TABLE fiche_lapin COLUMNS numero_arrivee_association;",

        // Notes, optionally attached to a rabbit sheet.
        "DEFINE TABLE IF NOT EXISTS post SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS post_author ON TABLE post COLUMNS author_id;
         DEFINE INDEX IF NOT EXISTS post_fiche ON TABLE post COLUMNS fiche_lapin_id;
         DEFINE INDEX IF NOT EXISTS post_title ON TABLE post COLUMNS title;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
