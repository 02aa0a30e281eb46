use chrono::Duration;
use jsonwebtoken::Algorithm;
use std::{env, fmt, str::FromStr};

use crate::auth::credential::DEFAULT_ITERATIONS;
use crate::db::DatabaseConfig;

/// Signing secret used when none is configured.
///
/// Development only: anyone who reads this file can mint tokens for a server
/// running with it.
pub const INSECURE_DEV_SECRET: &str = "should-be-an-environment-variable";

/// Default access token lifetime in minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// Origins allowed by CORS when none are configured (local frontends).
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:3000"];

/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Authentication settings, fixed for the lifetime of the process.
#[derive(Clone)]
pub struct AuthSettings {
    /// HMAC signing secret for access tokens.
    pub secret: String,
    /// Symmetric JWT algorithm (HS256, HS384 or HS512).
    pub algorithm: Algorithm,
    /// Validity window of every issued token.
    pub token_ttl: Duration,
    /// PBKDF2 iteration count for newly hashed passwords.
    pub password_iterations: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret: INSECURE_DEV_SECRET.to_string(),
            algorithm: Algorithm::HS256,
            token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            password_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("token_ttl", &self.token_ttl)
            .field("password_iterations", &self.password_iterations)
            .finish()
    }
}

impl AuthSettings {
    /// Build settings from optional raw values (CLI flags or environment).
    ///
    /// A missing or blank secret falls back to [`INSECURE_DEV_SECRET`]; check
    /// [`AuthSettings::is_insecure_default`] before serving traffic.
    pub fn from_parts(
        secret: Option<String>,
        algorithm: Option<&str>,
        ttl_minutes: Option<i64>,
    ) -> anyhow::Result<Self> {
        let secret = secret
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| INSECURE_DEV_SECRET.to_string());

        let algorithm = match algorithm {
            Some(name) => parse_hmac_algorithm(name)?,
            None => Algorithm::HS256,
        };

        let ttl_minutes = ttl_minutes.unwrap_or(DEFAULT_TOKEN_TTL_MINUTES);
        if ttl_minutes <= 0 {
            return Err(anyhow::anyhow!(
                "token lifetime must be positive, got {} minutes",
                ttl_minutes
            ));
        }

        let token_ttl = Duration::try_minutes(ttl_minutes).ok_or_else(|| {
            anyhow::anyhow!("token lifetime of {} minutes is out of range", ttl_minutes)
        })?;

        Ok(Self {
            secret,
            algorithm,
            token_ttl,
            password_iterations: DEFAULT_ITERATIONS,
        })
    }

    /// Read `JWT_SECRET_KEY`, `JWT_SECRET_ALGORITHM` and
    /// `JWT_EXPIRATION_MINUTES` from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let ttl = match env::var("JWT_EXPIRATION_MINUTES") {
            Ok(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                anyhow::anyhow!("JWT_EXPIRATION_MINUTES must be an integer, got `{}`", raw)
            })?),
            Err(_) => None,
        };
        let algorithm = env::var("JWT_SECRET_ALGORITHM").ok();
        Self::from_parts(env::var("JWT_SECRET_KEY").ok(), algorithm.as_deref(), ttl)
    }

    /// Whether the development fallback secret is in use.
    pub fn is_insecure_default(&self) -> bool {
        self.secret == INSECURE_DEV_SECRET
    }
}

/// Parse a JWT algorithm name, accepting only the HMAC family.
pub fn parse_hmac_algorithm(name: &str) -> anyhow::Result<Algorithm> {
    let algorithm = Algorithm::from_str(name.trim().to_ascii_uppercase().as_str())
        .map_err(|_| anyhow::anyhow!("unknown JWT algorithm `{}`", name))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(anyhow::anyhow!(
            "JWT algorithm {:?} is not a shared-secret algorithm (use HS256, HS384 or HS512)",
            other
        )),
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

/// Everything the HTTP server needs, assembled once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub database: DatabaseConfig,
    pub auth: AuthSettings,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            database: DatabaseConfig::default(),
            auth: AuthSettings::default(),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AuthSettings::default();
        assert!(settings.is_insecure_default());
        assert_eq!(settings.algorithm, Algorithm::HS256);
        assert_eq!(settings.token_ttl, Duration::minutes(30));
        assert_eq!(settings.password_iterations, 600_000);
    }

    #[test]
    fn test_from_parts_with_secret() {
        let settings =
            AuthSettings::from_parts(Some("s3cr3t".to_string()), Some("hs512"), Some(60)).unwrap();
        assert!(!settings.is_insecure_default());
        assert_eq!(settings.algorithm, Algorithm::HS512);
        assert_eq!(settings.token_ttl, Duration::minutes(60));
    }

    #[test]
    fn test_blank_secret_falls_back() {
        let settings = AuthSettings::from_parts(Some("   ".to_string()), None, None).unwrap();
        assert!(settings.is_insecure_default());
    }

    #[test]
    fn test_rejects_asymmetric_algorithm() {
        assert!(parse_hmac_algorithm("RS256").is_err());
        assert!(parse_hmac_algorithm("none").is_err());
        assert_eq!(parse_hmac_algorithm("HS384").unwrap(), Algorithm::HS384);
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        assert!(AuthSettings::from_parts(None, None, Some(0)).is_err());
        assert!(AuthSettings::from_parts(None, None, Some(-5)).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_ttl() {
        assert!(AuthSettings::from_parts(None, None, Some(i64::MAX)).is_err());
        assert!(AuthSettings::from_parts(None, None, Some(i64::MAX / 60 + 1)).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = AuthSettings::from_parts(Some("hunter2".to_string()), None, None).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("http://a.test/, ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_app_config_default_origins() {
        let config = AppConfig::default();
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.bind, "0.0.0.0:8000");
    }
}
