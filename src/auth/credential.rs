//! Password credential hashing and verification.
//!
//! Passwords are stretched with PBKDF2-HMAC-SHA256 over a random per-password
//! salt. The result is stored as one self-describing string:
//!
//! ```text
//! pbkdf2_sha256$<iterations>$<base64(salt)>$<base64(derived-key)>
//! ```
//!
//! Because the algorithm tag, iteration count and salt travel with the derived
//! key, verification needs no outside knowledge of the parameters and the
//! iteration count can be raised for new hashes without migrating old ones.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Algorithm tag written as the first field of every credential hash.
pub const ALGORITHM_TAG: &str = "pbkdf2_sha256";

/// Default PBKDF2 iteration count for new hashes.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (one SHA-256 block).
pub const KEY_LEN: usize = 32;

const FIELD_DELIMITER: char = '$';

/// A stored credential hash could not be decoded.
///
/// This is a data-integrity failure, distinct from a wrong password.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed credential hash: {reason}")]
pub struct MalformedCredentialHash {
    reason: &'static str,
}

impl MalformedCredentialHash {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    /// Which part of the encoded value was rejected.
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

/// Decoded form of a stored credential hash.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHash {
    iterations: u32,
    salt: Vec<u8>,
    derived_key: Vec<u8>,
}

impl CredentialHash {
    /// Derive a credential hash for `password` with a fresh random salt.
    ///
    /// An `iterations` of 0 is raised to 1, so every derived hash also parses
    /// back from its stored form.
    pub fn derive(password: &str, iterations: u32) -> Self {
        let mut salt = vec![0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        Self::derive_with_salt(password, salt, iterations)
    }

    fn derive_with_salt(password: &str, salt: Vec<u8>, iterations: u32) -> Self {
        let iterations = iterations.max(1);
        let derived_key = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
        Self {
            iterations,
            salt,
            derived_key,
        }
    }

    /// Check `password` against this hash.
    ///
    /// The recomputed key is compared in constant time.
    pub fn matches(&self, password: &str) -> bool {
        let candidate = pbkdf2_sha256(password.as_bytes(), &self.salt, self.iterations);
        candidate.ct_eq(&self.derived_key).into()
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

// Keep key material out of logs.
impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHash")
            .field("algorithm", &ALGORITHM_TAG)
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ALGORITHM_TAG}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            self.iterations,
            STANDARD.encode(&self.salt),
            STANDARD.encode(&self.derived_key),
        )
    }
}

impl FromStr for CredentialHash {
    type Err = MalformedCredentialHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(FIELD_DELIMITER).collect();
        let [algorithm, iterations, salt, derived_key] = fields.as_slice() else {
            return Err(MalformedCredentialHash::new("expected four '$'-delimited fields"));
        };

        if *algorithm != ALGORITHM_TAG {
            return Err(MalformedCredentialHash::new("unsupported algorithm tag"));
        }

        let iterations: u32 = iterations
            .parse()
            .map_err(|_| MalformedCredentialHash::new("iteration count is not a number"))?;
        if iterations == 0 {
            return Err(MalformedCredentialHash::new("iteration count is zero"));
        }

        let salt = STANDARD
            .decode(salt)
            .map_err(|_| MalformedCredentialHash::new("salt is not valid base64"))?;
        let derived_key = STANDARD
            .decode(derived_key)
            .map_err(|_| MalformedCredentialHash::new("derived key is not valid base64"))?;
        if derived_key.is_empty() {
            return Err(MalformedCredentialHash::new("derived key is empty"));
        }

        Ok(Self {
            iterations,
            salt,
            derived_key,
        })
    }
}

/// Hash `password` with the default iteration count.
pub fn hash_password(password: &str) -> CredentialHash {
    CredentialHash::derive(password, DEFAULT_ITERATIONS)
}

/// Verify `password` against an encoded credential hash.
///
/// Returns `Ok(false)` for a wrong password and `Err` only when the stored
/// value cannot be decoded.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, MalformedCredentialHash> {
    let hash: CredentialHash = stored.parse()?;
    Ok(hash.matches(password))
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut key = vec![0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    key
}
