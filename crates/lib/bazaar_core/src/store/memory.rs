//! In-memory store, used by tests and `--in-memory` dev mode.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::{IdentityStore, StoreError, StoreResult, TokenStore};
use crate::models::auth::{Identity, NewIdentity, PasswordHash, TokenCreate, TokenRecord};

/// In-memory identity and token store.
pub struct MemoryStore {
    users: RwLock<HashMap<i64, Identity>>,
    tokens: RwLock<Vec<TokenRecord>>,
    next_user_id: AtomicI64,
    next_token_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            tokens: RwLock::new(Vec::new()),
            next_user_id: AtomicI64::new(1),
            next_token_id: AtomicI64::new(1),
        }
    }

    fn record_from(&self, token: TokenCreate) -> TokenRecord {
        TokenRecord {
            id: self.next_token_id.fetch_add(1, Ordering::SeqCst),
            user_id: token.user_id,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            status: token.status,
            created_date: token.created_date,
            expires_at: token.expires_at,
        }
    }

    /// All token records for a user, oldest first.
    pub fn tokens_for_user(&self, user_id: i64) -> Vec<TokenRecord> {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_identity_by_id(&self, id: i64) -> StoreResult<Option<Identity>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(&id).cloned())
    }

    async fn create_identity(&self, new: NewIdentity) -> StoreResult<Identity> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&new.email)) {
            return Err(StoreError::Duplicate(format!("email {}", new.email)));
        }
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let identity = Identity {
            id,
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            phone_number: new.phone_number,
            created_at: Utc::now(),
        };
        users.insert(id, identity.clone());
        Ok(identity)
    }

    async fn update_password_hash(&self, id: i64, hash: &PasswordHash) -> StoreResult<bool> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = hash.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: TokenCreate) -> StoreResult<TokenRecord> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        if token.status && tokens.iter().any(|t| t.status && t.user_id == token.user_id) {
            return Err(StoreError::Duplicate(format!(
                "active token for user {}",
                token.user_id
            )));
        }
        let record = self.record_from(token);
        tokens.push(record.clone());
        Ok(record)
    }

    async fn replace_user_token(&self, token: TokenCreate) -> StoreResult<TokenRecord> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        for t in tokens
            .iter_mut()
            .filter(|t| t.status && t.user_id == token.user_id)
        {
            t.status = false;
        }
        let record = self.record_from(token);
        tokens.push(record.clone());
        Ok(record)
    }

    async fn find_active_token(&self, refresh_hash: &str) -> StoreResult<Option<TokenRecord>> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        Ok(tokens
            .iter()
            .find(|t| t.status && t.refresh_token == refresh_hash)
            .cloned())
    }

    async fn revoke_token(&self, refresh_hash: &str) -> StoreResult<bool> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        let mut revoked = false;
        for t in tokens
            .iter_mut()
            .filter(|t| t.status && t.refresh_token == refresh_hash)
        {
            t.status = false;
            revoked = true;
        }
        Ok(revoked)
    }

    async fn revoke_user_tokens(&self, user_id: i64) -> StoreResult<u64> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        let mut count = 0;
        for t in tokens
            .iter_mut()
            .filter(|t| t.status && t.user_id == user_id)
        {
            t.status = false;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::refresh::{hash_refresh_token, token_record};
    use chrono::Duration;

    fn new_identity(email: &str) -> NewIdentity {
        NewIdentity {
            email: email.into(),
            username: "ann".into(),
            password_hash: PasswordHash::from_stored("$2b$04$placeholder".into()),
            first_name: None,
            last_name: None,
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_identity() {
        let store = MemoryStore::new();
        let created = store
            .create_identity(new_identity("ann@example.com"))
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let by_email = store
            .find_identity_by_email("ANN@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = store.find_identity_by_id(created.id).await.unwrap();
        assert!(by_id.is_some());
        assert!(store.find_identity_by_id(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store
            .create_identity(new_identity("ann@example.com"))
            .await
            .unwrap();
        let err = store
            .create_identity(new_identity("Ann@Example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_password_hash_replaces_hash() {
        let store = MemoryStore::new();
        let user = store
            .create_identity(new_identity("ann@example.com"))
            .await
            .unwrap();
        let new_hash = PasswordHash::from_stored("$2b$04$other".into());
        assert!(store.update_password_hash(user.id, &new_hash).await.unwrap());
        let reloaded = store.find_identity_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, new_hash);
        assert!(!store.update_password_hash(42, &new_hash).await.unwrap());
    }

    fn record(user_id: i64, refresh: &str) -> TokenCreate {
        token_record(user_id, "access", refresh, Duration::days(1), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn token_revocation() {
        let store = MemoryStore::new();
        store.insert_token(record(1, "r1")).await.unwrap();
        store.insert_token(record(2, "r2")).await.unwrap();

        let h1 = hash_refresh_token("r1");
        assert!(store.find_active_token(&h1).await.unwrap().is_some());
        assert!(store.revoke_token(&h1).await.unwrap());
        assert!(store.find_active_token(&h1).await.unwrap().is_none());
        assert!(!store.revoke_token(&h1).await.unwrap());

        assert_eq!(store.revoke_user_tokens(1).await.unwrap(), 0);
        assert_eq!(store.revoke_user_tokens(2).await.unwrap(), 1);
        assert!(store.tokens_for_user(2).iter().all(|t| !t.status));
    }

    #[tokio::test]
    async fn second_active_insert_is_a_duplicate() {
        let store = MemoryStore::new();
        store.insert_token(record(1, "r1")).await.unwrap();
        let err = store.insert_token(record(1, "r2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.tokens_for_user(1).len(), 1);
    }

    #[tokio::test]
    async fn replace_leaves_one_active_record() {
        let store = MemoryStore::new();
        store.insert_token(record(1, "r1")).await.unwrap();
        let (a, b) = tokio::join!(
            store.replace_user_token(record(1, "r2")),
            store.replace_user_token(record(1, "r3")),
        );
        a.unwrap();
        b.unwrap();

        let records = store.tokens_for_user(1);
        assert_eq!(records.len(), 3);
        assert_eq!(records.iter().filter(|t| t.status).count(), 1);
        assert!(
            store
                .find_active_token(&hash_refresh_token("r1"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
