//! Persistence traits for identities and issued tokens.
//!
//! Callers receive a store explicitly (usually an `Arc<dyn …>` in app state);
//! nothing here is global.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::{Identity, NewIdentity, PasswordHash, TokenCreate, TokenRecord};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated (e.g. email already registered).
    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// User records.
///
/// Emails passed in are expected to be normalised already
/// (see `auth::registration::normalize_email`).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch a user by email.
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;

    /// Fetch a user by ID.
    async fn find_identity_by_id(&self, id: i64) -> StoreResult<Option<Identity>>;

    /// Insert a new user. Fails with [`StoreError::Duplicate`] if the email exists.
    async fn create_identity(&self, new: NewIdentity) -> StoreResult<Identity>;

    /// Replace a user's password hash. Returns `false` if the user is gone.
    async fn update_password_hash(&self, id: i64, hash: &PasswordHash) -> StoreResult<bool>;
}

/// Token-creation records.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a token-creation record. An active record for a user who
    /// already has one fails with [`StoreError::Duplicate`].
    async fn insert_token(&self, token: TokenCreate) -> StoreResult<TokenRecord>;

    /// Revoke the user's active records and insert `token`, as one step.
    ///
    /// Concurrent calls for the same user serialise, so the user ends with
    /// exactly one active record.
    async fn replace_user_token(&self, token: TokenCreate) -> StoreResult<TokenRecord>;

    /// Find an active record by refresh-token hash. Expiry is the caller's check.
    async fn find_active_token(&self, refresh_hash: &str) -> StoreResult<Option<TokenRecord>>;

    /// Mark the record with this refresh-token hash revoked. Returns whether
    /// one was active; of two concurrent callers only one sees `true`.
    async fn revoke_token(&self, refresh_hash: &str) -> StoreResult<bool>;

    /// Revoke every active record for a user. Returns how many were revoked.
    async fn revoke_user_tokens(&self, user_id: i64) -> StoreResult<u64>;
}
