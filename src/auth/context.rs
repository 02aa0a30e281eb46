//! Caller identity for request handlers.

use serde::Serialize;
use surrealdb::RecordId;

use crate::auth::token::Claims;
use crate::db::USER_TABLE;
use crate::types::parse_record_id;

/// Identity of an authenticated caller, taken from a validated bearer token.
///
/// Immutable once created. The subject is the user record id exactly as it
/// was signed into the token.
#[derive(Debug, Clone, Serialize)]
pub struct UserContext {
    subject: String,
    role: Option<String>,
}

impl UserContext {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            subject: claims.subject,
            role: claims.role,
        }
    }

    /// Token subject, e.g. `user:abc123`.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// The caller's user record id, if the subject names one.
    pub fn record_id(&self) -> Option<RecordId> {
        parse_record_id(USER_TABLE, &self.subject)
    }

    /// Whether `id` is the caller's own record.
    pub fn owns(&self, id: &RecordId) -> bool {
        self.record_id().is_some_and(|own| own == *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context(subject: &str) -> UserContext {
        UserContext::from_claims(Claims {
            subject: subject.to_string(),
            role: Some("benevole".to_string()),
            expires_at: Utc::now(),
        })
    }

    #[test]
    fn test_record_id_from_subject() {
        let ctx = context("user:test123");
        assert_eq!(
            ctx.record_id(),
            Some(RecordId::from_table_key("user", "test123"))
        );
        assert_eq!(ctx.role(), Some("benevole"));
    }

    #[test]
    fn test_owns() {
        let ctx = context("user:test123");
        assert!(ctx.owns(&RecordId::from_table_key("user", "test123")));
        assert!(!ctx.owns(&RecordId::from_table_key("user", "other")));
    }

    #[test]
    fn test_foreign_subject_owns_nothing() {
        let ctx = context("fiche_lapin:test123");
        assert!(ctx.record_id().is_none());
        assert!(!ctx.owns(&RecordId::from_table_key("user", "test123")));
    }
}
