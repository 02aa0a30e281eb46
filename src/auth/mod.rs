//! Authentication: password credentials, bearer tokens and caller identity.
//!
//! - **Credentials**: passwords are stored as salted PBKDF2-HMAC-SHA256
//!   hashes in a self-describing text form (see [`credential`]).
//! - **Tokens**: a successful login yields an HMAC-signed JWT naming the
//!   user record as subject (see [`token`]).
//! - **Context**: handlers that need a caller take a [`UserContext`]
//!   argument; extraction fails with a uniform 401 for every kind of bad
//!   token.
//!
//! ## Usage
//!
//! ```ignore
//! let user = users.authenticate(&form.username, &form.password).await?;
//! let token = tokens.issue(&user.id.to_string(), &user.role, Utc::now())?;
//! ```

pub mod credential;
mod context;
mod extractor;
pub mod token;
mod user_store;

pub use context::UserContext;
pub use credential::{CredentialHash, MalformedCredentialHash, hash_password, verify_password};
pub use extractor::{AuthError, AuthExtractor, bearer_token};
pub use token::{Claims, TokenError, TokenService};
pub use user_store::{NewUser, UserStore, UserUpdate};
