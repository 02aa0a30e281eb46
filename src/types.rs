//! NewType wrappers and small value helpers shared across the registry.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a username where a signed access token is expected).

use serde::{Deserialize, Serialize};
use std::fmt;
use surrealdb::RecordId;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_string!(
    /// Compact signed bearer token handed out at login.
    ///
    /// The token is self-contained: possession of a structurally valid,
    /// unexpired, correctly signed token is the only credential checked on
    /// later requests.
    AccessToken
);

newtype_string!(
    /// Role carried by a user account and embedded in its access tokens.
    ///
    /// Known values are `admin`, `fondateur`, `benevole` and `anonyme`, but the
    /// registry stores whatever the account was created with.
    ///
    /// Users pick their own role at registration and may change it later, so
    /// the value is self-asserted. Do not use it to grant access.
    Role
);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const FONDATEUR: &'static str = "fondateur";
    pub const BENEVOLE: &'static str = "benevole";
    pub const ANONYME: &'static str = "anonyme";
}

impl Default for Role {
    fn default() -> Self {
        Self::new(Self::BENEVOLE)
    }
}

/// Parse an API identifier into a record id of the given table.
///
/// Accepts both the full `table:key` form returned by the API and a bare
/// key. Returns `None` for an empty key or an id that names another table.
pub fn parse_record_id(table: &str, raw: &str) -> Option<RecordId> {
    let raw = raw.trim();
    let (tb, key) = match raw.split_once(':') {
        Some((tb, key)) => (tb, key),
        None => (table, raw),
    };
    // Keys that need escaping are printed as `⟨key⟩`.
    let key = key
        .strip_prefix('⟨')
        .and_then(|k| k.strip_suffix('⟩'))
        .unwrap_or(key);
    if tb != table || key.is_empty() {
        return None;
    }
    Some(RecordId::from_table_key(table, key))
}

/// Lenient (de)serialization for optional timestamps.
///
/// Browsers send either full RFC 3339 timestamps or bare `YYYY-MM-DD` dates
/// from `<input type="date">`; both are accepted and normalized to UTC.
pub mod lenient_datetime {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid date or timestamp: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_access_token_newtype() {
        let token = AccessToken::new("a.b.c");
        assert_eq!(token.as_str(), "a.b.c");
        assert_eq!(token.to_string(), "a.b.c");
        assert_eq!(token.into_inner(), "a.b.c".to_string());
    }

    #[test]
    fn test_role_default_is_benevole() {
        assert_eq!(Role::default().as_str(), Role::BENEVOLE);
    }

    #[test]
    fn test_role_serializes_transparently() {
        let json = serde_json::to_string(&Role::new("admin")).unwrap();
        assert_eq!(json, "\"admin\"");
    }

    #[test]
    fn test_parse_record_id_full_form() {
        let id = parse_record_id("user", "user:abc123").unwrap();
        assert_eq!(id, RecordId::from_table_key("user", "abc123"));
    }

    #[test]
    fn test_parse_record_id_bare_key() {
        let id = parse_record_id("post", "xyz").unwrap();
        assert_eq!(id, RecordId::from_table_key("post", "xyz"));
    }

    #[test]
    fn test_parse_record_id_rejects_other_table() {
        assert!(parse_record_id("user", "post:abc").is_none());
        assert!(parse_record_id("user", "").is_none());
        assert!(parse_record_id("user", "user:").is_none());
    }

    #[test]
    fn test_parse_record_id_escaped_key() {
        let id = parse_record_id("user", "user:⟨12-ab⟩").unwrap();
        assert_eq!(id, RecordId::from_table_key("user", "12-ab"));
    }

    #[test]
    fn test_lenient_datetime_accepts_date_only() {
        let dt = lenient_datetime::parse("2024-03-15").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 15));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_lenient_datetime_accepts_rfc3339() {
        let dt = lenient_datetime::parse("2024-03-15T10:30:00.000Z").unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_lenient_datetime_accepts_naive_timestamp() {
        let dt = lenient_datetime::parse("2024-03-15T08:00:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_lenient_datetime_rejects_garbage() {
        assert!(lenient_datetime::parse("next tuesday").is_none());
    }
}
