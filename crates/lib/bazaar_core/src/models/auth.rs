//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! types in `bazaar_api::models`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::auth::password::PasswordHash;

/// A registered user.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    /// Lower-cased, trimmed.
    pub email: String,
    pub username: String,
    pub password_hash: PasswordHash,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated registration data ready to persist.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: String,
    pub password_hash: PasswordHash,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

/// Email + plaintext password presented at login. Request-scoped only.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — user email.
    pub sub: String,
    /// User ID.
    pub id: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Access + refresh token handed to a client after login or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Token-creation record to persist alongside an issued pair.
///
/// `refresh_token` holds the SHA-256 hex digest, never the token itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCreate {
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    /// `true` while active, `false` once revoked.
    pub status: bool,
    pub created_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A persisted [`TokenCreate`].
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub status: bool,
    pub created_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Active and not yet expired as of `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status && self.expires_at > now
    }
}
