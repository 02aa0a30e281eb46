// Record queries for rabbit sheets and posts.
//
// Ownership checks live here rather than in the handlers so every caller
// gets the same not-found / wrong-author ordering.

use std::collections::HashMap;

use chrono::Utc;
use surrealdb::RecordId;
use tracing::info;

use crate::db::Db;
use crate::db::schema::*;
use crate::error::StoreError;

/// A record paired with its author, if the author still exists.
#[derive(Debug, Clone)]
pub struct WithAuthor<T> {
    pub record: T,
    pub author: Option<UserRecord>,
}

pub struct QueryBuilder;

impl QueryBuilder {
    /// Create a rabbit sheet owned by `author`.
    pub async fn create_fiche(
        db: &Db,
        author: &RecordId,
        data: NewFicheLapin,
    ) -> Result<WithAuthor<FicheLapinRecord>, StoreError> {
        let nom = data.nom.trim().to_string();
        if nom.is_empty() {
            return Err(StoreError::Invalid("nom must not be empty".to_string()));
        }
        let author_record = Self::find_user(db, author)
            .await?
            .ok_or(StoreError::NotFound("user"))?;

        let create = FicheLapinCreate {
            nom,
            numero_arrivee_association: data.numero_arrivee_association,
            date_creation_fiche: Utc::now(),
            auteur_id: author.clone(),
            details: data.details,
        };

        let mut res = db
            .query("CREATE fiche_lapin CONTENT $data")
            .bind(("data", create))
            .await?;

        let created: Vec<FicheLapinRecord> = res.take(0)?;
        let fiche = created
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Task("failed to create fiche_lapin record".to_string()))?;

        info!("Created fiche lapin {} by {}", fiche.id, author);
        Ok(WithAuthor {
            record: fiche,
            author: Some(author_record),
        })
    }

    /// All rabbit sheets, optionally restricted to one author.
    pub async fn list_fiches(
        db: &Db,
        author: Option<&RecordId>,
    ) -> Result<Vec<WithAuthor<FicheLapinRecord>>, StoreError> {
        let mut res = match author {
            Some(author) => {
                db.query(
                    r#"
                    SELECT * FROM fiche_lapin
                    WHERE auteur_id = $author
                    ORDER BY numero_arrivee_association
                    "#,
                )
                .bind(("author", author.clone()))
                .await?
            }
            None => {
                db.query("SELECT * FROM fiche_lapin ORDER BY numero_arrivee_association")
                    .await?
            }
        };

        let fiches: Vec<FicheLapinRecord> = res.take(0)?;
        Self::attach_authors(db, fiches, |f| &f.auteur_id).await
    }

    pub async fn get_fiche(
        db: &Db,
        fiche_id: &RecordId,
    ) -> Result<WithAuthor<FicheLapinRecord>, StoreError> {
        let fiche = Self::find_fiche(db, fiche_id)
            .await?
            .ok_or(StoreError::NotFound("fiche lapin"))?;
        let author = Self::find_user(db, &fiche.auteur_id).await?;
        Ok(WithAuthor {
            record: fiche,
            author,
        })
    }

    /// Apply `changes` to a sheet owned by `subject`.
    pub async fn update_fiche(
        db: &Db,
        fiche_id: &RecordId,
        changes: FicheLapinChanges,
        subject: &RecordId,
    ) -> Result<WithAuthor<FicheLapinRecord>, StoreError> {
        let current = Self::find_fiche(db, fiche_id)
            .await?
            .ok_or(StoreError::NotFound("fiche lapin"))?;
        if current.auteur_id != *subject {
            return Err(StoreError::WrongAuthor("modify this rabbit sheet"));
        }
        if changes.nom.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(StoreError::Invalid("nom must not be empty".to_string()));
        }

        let fiche = if changes.is_empty() {
            current
        } else {
            let mut details = current.details;
            details.apply(changes.details);
            let update = FicheLapinUpdate {
                nom: changes.nom.map(|n| n.trim().to_string()).unwrap_or(current.nom),
                numero_arrivee_association: changes
                    .numero_arrivee_association
                    .unwrap_or(current.numero_arrivee_association),
                details,
            };

            let mut res = db
                .query("UPDATE $id MERGE $changes RETURN AFTER")
                .bind(("id", fiche_id.clone()))
                .bind(("changes", update))
                .await?;
            let updated: Vec<FicheLapinRecord> = res.take(0)?;
            updated
                .into_iter()
                .next()
                .ok_or(StoreError::NotFound("fiche lapin"))?
        };

        let author = Self::find_user(db, &fiche.auteur_id).await?;
        Ok(WithAuthor {
            record: fiche,
            author,
        })
    }

    /// Delete a sheet owned by `subject` and the posts attached to it.
    /// Returns the deleted sheet.
    pub async fn delete_fiche(
        db: &Db,
        fiche_id: &RecordId,
        subject: &RecordId,
    ) -> Result<FicheLapinRecord, StoreError> {
        let current = Self::find_fiche(db, fiche_id)
            .await?
            .ok_or(StoreError::NotFound("fiche lapin"))?;
        if current.auteur_id != *subject {
            return Err(StoreError::WrongAuthor("delete this rabbit sheet"));
        }

        db.query(
            r#"
            BEGIN TRANSACTION;
            DELETE post WHERE fiche_lapin_id = $id;
            DELETE $id;
            COMMIT TRANSACTION;
            "#,
        )
        .bind(("id", fiche_id.clone()))
        .await?
        .check()?;

        info!("Deleted fiche lapin {}", fiche_id);
        Ok(current)
    }

    /// Create a free-standing post.
    pub async fn create_post(
        db: &Db,
        author: &RecordId,
        data: NewPost,
    ) -> Result<WithAuthor<PostRecord>, StoreError> {
        Self::insert_post(db, author, None, data).await
    }

    /// Create a post attached to an existing rabbit sheet.
    pub async fn create_post_for_fiche(
        db: &Db,
        fiche_id: &RecordId,
        author: &RecordId,
        data: NewPost,
    ) -> Result<WithAuthor<PostRecord>, StoreError> {
        if Self::find_fiche(db, fiche_id).await?.is_none() {
            return Err(StoreError::NotFound("fiche lapin"));
        }
        Self::insert_post(db, author, Some(fiche_id.clone()), data).await
    }

    /// Newest posts first.
    pub async fn list_posts(
        db: &Db,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<WithAuthor<PostRecord>>, StoreError> {
        let mut res = db
            .query(
                r#"
                SELECT * FROM post
                ORDER BY date_creation_post DESC
                LIMIT $limit
                START $skip
                "#,
            )
            .bind(("limit", limit))
            .bind(("skip", skip))
            .await?;

        let posts: Vec<PostRecord> = res.take(0)?;
        Self::attach_authors(db, posts, |p| &p.author_id).await
    }

    pub async fn get_post(
        db: &Db,
        post_id: &RecordId,
    ) -> Result<WithAuthor<PostRecord>, StoreError> {
        let mut res = db
            .query("SELECT * FROM post WHERE id = $id LIMIT 1")
            .bind(("id", post_id.clone()))
            .await?;

        let posts: Vec<PostRecord> = res.take(0)?;
        let post = posts
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound("post"))?;
        let author = Self::find_user(db, &post.author_id).await?;
        Ok(WithAuthor {
            record: post,
            author,
        })
    }

    /// Every post with exactly this title, newest first.
    pub async fn find_posts_by_title(
        db: &Db,
        title: &str,
    ) -> Result<Vec<WithAuthor<PostRecord>>, StoreError> {
        let mut res = db
            .query(
                r#"
                SELECT * FROM post
                WHERE title = $title
                ORDER BY date_creation_post DESC
                "#,
            )
            .bind(("title", title.trim().to_string()))
            .await?;

        let posts: Vec<PostRecord> = res.take(0)?;
        Self::attach_authors(db, posts, |p| &p.author_id).await
    }

    /// Delete a post written by `subject`.
    pub async fn delete_post(
        db: &Db,
        post_id: &RecordId,
        subject: &RecordId,
    ) -> Result<PostRecord, StoreError> {
        let post = Self::get_post(db, post_id).await?.record;
        if post.author_id != *subject {
            return Err(StoreError::WrongAuthor("delete this post"));
        }

        db.query("DELETE $id")
            .bind(("id", post_id.clone()))
            .await?
            .check()?;

        info!("Deleted post {}", post_id);
        Ok(post)
    }

    async fn insert_post(
        db: &Db,
        author: &RecordId,
        fiche_lapin_id: Option<RecordId>,
        data: NewPost,
    ) -> Result<WithAuthor<PostRecord>, StoreError> {
        let title = data.title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::Invalid("title must not be empty".to_string()));
        }
        let author_record = Self::find_user(db, author)
            .await?
            .ok_or(StoreError::NotFound("user"))?;

        let create = PostCreate {
            title,
            content: data.content,
            date_creation_post: Utc::now(),
            author_id: author.clone(),
            fiche_lapin_id,
        };

        let mut res = db
            .query("CREATE post CONTENT $data")
            .bind(("data", create))
            .await?;

        let created: Vec<PostRecord> = res.take(0)?;
        let post = created
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Task("failed to create post record".to_string()))?;

        Ok(WithAuthor {
            record: post,
            author: Some(author_record),
        })
    }

    async fn find_fiche(
        db: &Db,
        fiche_id: &RecordId,
    ) -> Result<Option<FicheLapinRecord>, StoreError> {
        let mut res = db
            .query("SELECT * FROM fiche_lapin WHERE id = $id LIMIT 1")
            .bind(("id", fiche_id.clone()))
            .await?;

        let fiches: Vec<FicheLapinRecord> = res.take(0)?;
        Ok(fiches.into_iter().next())
    }

    async fn find_user(db: &Db, user_id: &RecordId) -> Result<Option<UserRecord>, StoreError> {
        let mut res = db
            .query("SELECT * FROM user WHERE id = $id LIMIT 1")
            .bind(("id", user_id.clone()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Resolve the authors of `records` with a single lookup.
    async fn attach_authors<T>(
        db: &Db,
        records: Vec<T>,
        author_of: impl Fn(&T) -> &RecordId,
    ) -> Result<Vec<WithAuthor<T>>, StoreError> {
        let mut ids: Vec<RecordId> = records.iter().map(|r| author_of(r).clone()).collect();
        ids.sort_by_key(|id| id.to_string());
        ids.dedup();

        let authors: HashMap<String, UserRecord> = if ids.is_empty() {
            HashMap::new()
        } else {
            let mut res = db
                .query("SELECT * FROM user WHERE id IN $ids")
                .bind(("ids", ids))
                .await?;
            let users: Vec<UserRecord> = res.take(0)?;
            users.into_iter().map(|u| (u.id.to_string(), u)).collect()
        };

        Ok(records
            .into_iter()
            .map(|record| {
                let author = authors.get(&author_of(&record).to_string()).cloned();
                WithAuthor { record, author }
            })
            .collect())
    }
}
