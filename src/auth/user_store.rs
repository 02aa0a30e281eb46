//! User storage and password login.

use serde::Deserialize;
use surrealdb::RecordId;
use tracing::{debug, info};

use crate::auth::credential::{CredentialHash, verify_password};
use crate::db::Db;
use crate::db::schema::{UserChanges, UserCreate, UserRecord};
use crate::error::StoreError;
use crate::types::Role;

/// Registration payload, password in clear.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default, rename = "firstName", alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastName", alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Profile update payload; blank or absent fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "firstName", alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastName", alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// User store for database operations.
pub struct UserStore {
    db: Db,
    iterations: u32,
}

impl UserStore {
    /// Create a new user store hashing new passwords with `iterations`.
    pub fn new(db: Db, iterations: u32) -> Self {
        Self {
            db,
            iterations: iterations.max(1),
        }
    }

    /// Register a user. The password is hashed off the async runtime.
    pub async fn create_user(&self, new: NewUser) -> Result<UserRecord, StoreError> {
        let username = new.username.trim().to_string();
        if username.is_empty() {
            return Err(StoreError::Invalid("username must not be empty".to_string()));
        }
        if new.password.is_empty() {
            return Err(StoreError::Invalid("password must not be empty".to_string()));
        }
        if self.find_by_username(&username).await?.is_some() {
            return Err(StoreError::Conflict("Username already registered".to_string()));
        }

        let password = self.hash(new.password).await?;
        let create = UserCreate {
            username,
            password: password.to_string(),
            first_name: non_blank(new.first_name),
            last_name: non_blank(new.last_name),
            email: non_blank(new.email),
            role: non_blank(new.role).unwrap_or_else(|| Role::default().into_inner()),
        };

        let user = self.insert_user(create).await?;
        info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Write a new user row. A concurrent registration that slipped past the
    /// username check is caught by the unique index and reported as a
    /// conflict.
    async fn insert_user(&self, create: UserCreate) -> Result<UserRecord, StoreError> {
        let mut res = self
            .db
            .query("CREATE user CONTENT $data")
            .bind(("data", create))
            .await
            .map_err(username_taken)?;

        let users: Vec<UserRecord> = res.take(0).map_err(username_taken)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Task("failed to create user".to_string()))
    }

    /// Page through users ordered by username.
    pub async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<UserRecord>, StoreError> {
        let query = r#"
            SELECT * FROM user
            ORDER BY username
            LIMIT $limit
            START $skip
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("limit", limit))
            .bind(("skip", skip))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users)
    }

    /// Get a user by database ID.
    pub async fn get_user(&self, user_id: &RecordId) -> Result<UserRecord, StoreError> {
        let query = "SELECT * FROM user WHERE id = $id LIMIT 1";

        let mut res = self.db.query(query).bind(("id", user_id.clone())).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users.into_iter().next().ok_or(StoreError::NotFound("user"))
    }

    /// Look up a user by login name.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = "SELECT * FROM user WHERE username = $username LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("username", username.to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Apply the non-blank fields of `update`; a new password is re-hashed.
    pub async fn update_user(
        &self,
        user_id: &RecordId,
        update: UserUpdate,
    ) -> Result<UserRecord, StoreError> {
        let current = self.get_user(user_id).await?;

        let mut changes = UserChanges {
            first_name: non_blank(update.first_name),
            last_name: non_blank(update.last_name),
            email: non_blank(update.email),
            role: non_blank(update.role),
            ..Default::default()
        };

        if let Some(username) = non_blank(update.username)
            && username != current.username
        {
            if self.find_by_username(&username).await?.is_some() {
                return Err(StoreError::Conflict("Username already registered".to_string()));
            }
            changes.username = Some(username);
        }

        if let Some(password) = update.password.filter(|p| !p.is_empty()) {
            changes.password = Some(self.hash(password).await?.to_string());
        }

        if changes.is_empty() {
            return Ok(current);
        }

        let mut res = self
            .db
            .query("UPDATE $id MERGE $changes RETURN AFTER")
            .bind(("id", user_id.clone()))
            .bind(("changes", changes))
            .await
            .map_err(username_taken)?;

        let users: Vec<UserRecord> = res.take(0).map_err(username_taken)?;
        users.into_iter().next().ok_or(StoreError::NotFound("user"))
    }

    /// Delete a user together with their rabbit sheets and every post that
    /// belongs to them or to those sheets. Returns the deleted user.
    pub async fn delete_user(&self, user_id: &RecordId) -> Result<UserRecord, StoreError> {
        let user = self.get_user(user_id).await?;

        let query = r#"
            BEGIN TRANSACTION;
            LET $fiches = (SELECT VALUE id FROM fiche_lapin WHERE auteur_id = $id);
            DELETE post WHERE author_id = $id OR fiche_lapin_id IN $fiches;
            DELETE fiche_lapin WHERE auteur_id = $id;
            DELETE $id;
            COMMIT TRANSACTION;
        "#;

        self.db
            .query(query)
            .bind(("id", user_id.clone()))
            .await?
            .check()?;

        info!("Deleted user {}", user_id);
        Ok(user)
    }

    /// Check a username/password pair.
    ///
    /// Returns `Ok(None)` for an unknown user or a wrong password. Unknown
    /// users still pay for one key derivation so both cases take about as
    /// long. A stored hash that cannot be decoded is an error, not a
    /// mismatch.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let password = password.to_string();

        let Some(user) = self.find_by_username(username).await? else {
            let iterations = self.iterations;
            tokio::task::spawn_blocking(move || CredentialHash::derive(&password, iterations))
                .await?;
            debug!("Login attempt for unknown user");
            return Ok(None);
        };

        let stored = user.password.clone();
        let matched =
            tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await??;

        if matched {
            Ok(Some(user))
        } else {
            debug!("Wrong password for user {}", user.id);
            Ok(None)
        }
    }

    async fn hash(&self, password: String) -> Result<CredentialHash, StoreError> {
        let iterations = self.iterations;
        let hash =
            tokio::task::spawn_blocking(move || CredentialHash::derive(&password, iterations))
                .await?;
        Ok(hash)
    }
}

/// Map a violation of the `user_username` unique index to a conflict.
fn username_taken(e: surrealdb::Error) -> StoreError {
    if e.to_string().contains("`user_username`") {
        StoreError::Conflict("Username already registered".to_string())
    } else {
        StoreError::Database(e)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        DatabaseConfig, FicheLapinDetails, NewFicheLapin, NewPost, QueryBuilder,
        create_connection, ensure_schema,
    };

    const TEST_ITERATIONS: u32 = 1_000;

    async fn setup_test_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    fn new_user(username: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: password.to_string(),
            first_name: Some("Jeanne".to_string()),
            last_name: None,
            email: None,
            role: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_hashes_password() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);

        let user = store.create_user(new_user("jeanne", "carotte")).await.unwrap();

        assert_eq!(user.username, "jeanne");
        assert_eq!(user.role, "benevole");
        assert_ne!(user.password, "carotte");
        assert!(user.password.starts_with("pbkdf2_sha256$1000$"));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        store.create_user(new_user("jeanne", "carotte")).await.unwrap();

        let err = store.create_user(new_user("jeanne", "autre")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        let created = store.create_user(new_user("jeanne", "carotte")).await.unwrap();

        let ok = store.authenticate("jeanne", "carotte").await.unwrap();
        assert_eq!(ok.map(|u| u.id), Some(created.id));

        assert!(store.authenticate("jeanne", "navet").await.unwrap().is_none());
        assert!(store.authenticate("personne", "carotte").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_authenticate_corrupt_hash_is_error() {
        let db = setup_test_db().await;
        db.query("CREATE user CONTENT { username: 'casse', password: 'plaintext', role: 'benevole' }")
            .await
            .unwrap()
            .check()
            .unwrap();
        let store = UserStore::new(db, TEST_ITERATIONS);

        let err = store.authenticate("casse", "plaintext").await.unwrap_err();
        assert!(matches!(err, StoreError::Credential(_)));
    }

    #[tokio::test]
    async fn test_update_user_rehashes_password() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        let user = store.create_user(new_user("jeanne", "carotte")).await.unwrap();

        let updated = store
            .update_user(
                &user.id,
                UserUpdate {
                    password: Some("navet".to_string()),
                    last_name: Some("Lapin".to_string()),
                    email: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.last_name.as_deref(), Some("Lapin"));
        assert_eq!(updated.first_name.as_deref(), Some("Jeanne"));
        assert!(updated.email.is_none());
        assert!(store.authenticate("jeanne", "navet").await.unwrap().is_some());
        assert!(store.authenticate("jeanne", "carotte").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_to_taken_username_is_conflict() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        store.create_user(new_user("jeanne", "a")).await.unwrap();
        let paul = store.create_user(new_user("paul", "b")).await.unwrap();

        let err = store
            .update_user(
                &paul.id,
                UserUpdate {
                    username: Some("jeanne".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_users_paginates() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        for name in ["c", "a", "b"] {
            store.create_user(new_user(name, "pw")).await.unwrap();
        }

        let page = store.list_users(1, 10).await.unwrap();
        let names: Vec<_> = page.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);

        assert_eq!(store.list_users(0, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_user_is_not_found() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        let missing = RecordId::from_table_key("user", "nope");

        let err = store.get_user(&missing).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("user")));
    }

    #[tokio::test]
    async fn test_unique_index_violation_is_conflict() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        store.create_user(new_user("jeanne", "carotte")).await.unwrap();

        // Same row a racing registration would write after its own check.
        let err = store
            .insert_user(UserCreate {
                username: "jeanne".to_string(),
                password: CredentialHash::derive("autre", TEST_ITERATIONS).to_string(),
                first_name: None,
                last_name: None,
                email: None,
                role: Role::default().into_inner(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_delete_user_cascades_to_fiches_and_posts() {
        let db = setup_test_db().await;
        let store = UserStore::new(db.clone(), TEST_ITERATIONS);
        let jeanne = store.create_user(new_user("jeanne", "carotte")).await.unwrap();
        let paul = store.create_user(new_user("paul", "navet")).await.unwrap();

        let fiche = QueryBuilder::create_fiche(
            &db,
            &jeanne.id,
            NewFicheLapin {
                nom: "Caramel".to_string(),
                numero_arrivee_association: 12,
                details: FicheLapinDetails::default(),
            },
        )
        .await
        .unwrap()
        .record;
        let note = |title: &str| NewPost {
            title: title.to_string(),
            content: None,
        };
        let on_fiche = QueryBuilder::create_post_for_fiche(&db, &fiche.id, &paul.id, note("Pesée"))
            .await
            .unwrap()
            .record;
        let by_jeanne = QueryBuilder::create_post(&db, &jeanne.id, note("Réunion"))
            .await
            .unwrap()
            .record;
        let unrelated = QueryBuilder::create_post(&db, &paul.id, note("Vaccins"))
            .await
            .unwrap()
            .record;

        store.delete_user(&jeanne.id).await.unwrap();

        assert!(matches!(
            QueryBuilder::get_fiche(&db, &fiche.id).await,
            Err(StoreError::NotFound(_))
        ));
        for gone in [&on_fiche.id, &by_jeanne.id] {
            assert!(matches!(
                QueryBuilder::get_post(&db, gone).await,
                Err(StoreError::NotFound("post"))
            ));
        }
        let kept = QueryBuilder::get_post(&db, &unrelated.id).await.unwrap();
        assert_eq!(kept.record.title, "Vaccins");
        assert!(store.get_user(&paul.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let store = UserStore::new(setup_test_db().await, TEST_ITERATIONS);
        let user = store.create_user(new_user("jeanne", "carotte")).await.unwrap();

        let deleted = store.delete_user(&user.id).await.unwrap();
        assert_eq!(deleted.username, "jeanne");

        assert!(store.find_by_username("jeanne").await.unwrap().is_none());
        assert!(matches!(
            store.delete_user(&user.id).await,
            Err(StoreError::NotFound("user"))
        ));
    }
}
