//! PostgreSQL store backed by an sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{IdentityStore, StoreError, StoreResult, TokenStore};
use crate::models::auth::{Identity, NewIdentity, PasswordHash, TokenCreate, TokenRecord};

type IdentityRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
);

type TokenRow = (i64, i64, String, String, bool, DateTime<Utc>, DateTime<Utc>);

const IDENTITY_COLUMNS: &str =
    "id, email, username, password_hash, first_name, last_name, phone_number, created_at";

const TOKEN_COLUMNS: &str =
    "id, user_id, access_token, refresh_token, status, created_date, expires_at";

fn identity_from_row(row: IdentityRow) -> Identity {
    let (id, email, username, password_hash, first_name, last_name, phone_number, created_at) =
        row;
    Identity {
        id,
        email,
        username,
        password_hash: PasswordHash::from_stored(password_hash),
        first_name,
        last_name,
        phone_number,
        created_at,
    }
}

fn token_from_row(row: TokenRow) -> TokenRecord {
    let (id, user_id, access_token, refresh_token, status, created_date, expires_at) = row;
    TokenRecord {
        id,
        user_id,
        access_token,
        refresh_token,
        status,
        created_date,
        expires_at,
    }
}

fn token_insert_error(e: sqlx::Error, user_id: i64) -> StoreError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(format!("active token for user {user_id}"))
        }
        other => StoreError::Db(other),
    }
}

async fn insert_token_in(
    tx: &mut Transaction<'_, Postgres>,
    token: &TokenCreate,
) -> StoreResult<TokenRecord> {
    let row = sqlx::query_as::<_, TokenRow>(&format!(
        "INSERT INTO tokens (user_id, access_token, refresh_token, status, created_date, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {TOKEN_COLUMNS}"
    ))
    .bind(token.user_id)
    .bind(&token.access_token)
    .bind(&token.refresh_token)
    .bind(token.status)
    .bind(token.created_date)
    .bind(token.expires_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| token_insert_error(e, token.user_id))?;
    Ok(token_from_row(row))
}

/// Identity and token store on PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users WHERE email = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(identity_from_row))
    }

    async fn find_identity_by_id(&self, id: i64) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(identity_from_row))
    }

    async fn create_identity(&self, new: NewIdentity) -> StoreResult<Identity> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "INSERT INTO users (email, username, password_hash, first_name, last_name, phone_number) \
             VALUES (lower($1), $2, $3, $4, $5, $6) \
             RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(&new.email)
        .bind(&new.username)
        .bind(new.password_hash.as_str())
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(format!("email {}", new.email))
            }
            other => StoreError::Db(other),
        })?;
        Ok(identity_from_row(row))
    }

    async fn update_password_hash(&self, id: i64, hash: &PasswordHash) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, token: TokenCreate) -> StoreResult<TokenRecord> {
        let mut tx = self.pool.begin().await?;
        let record = insert_token_in(&mut tx, &token).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn replace_user_token(&self, token: TokenCreate) -> StoreResult<TokenRecord> {
        let mut tx = self.pool.begin().await?;
        // The user row lock serialises replacements for the same user.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(token.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE tokens SET status = FALSE WHERE user_id = $1 AND status")
            .bind(token.user_id)
            .execute(&mut *tx)
            .await?;
        let record = insert_token_in(&mut tx, &token).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn find_active_token(&self, refresh_hash: &str) -> StoreResult<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE refresh_token = $1 AND status"
        ))
        .bind(refresh_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(token_from_row))
    }

    async fn revoke_token(&self, refresh_hash: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE tokens SET status = FALSE WHERE refresh_token = $1 AND status")
                .bind(refresh_hash)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_user_tokens(&self, user_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE tokens SET status = FALSE WHERE user_id = $1 AND status")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
