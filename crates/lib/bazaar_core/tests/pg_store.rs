//! `PgStore` against a live PostgreSQL database.
//!
//! Set `DATABASE_URL` to run these; without it every test returns early.
//! Each test registers users under a random email so runs do not collide.

use bazaar_core::auth::password::hash_password;
use bazaar_core::auth::refresh::{hash_refresh_token, token_record};
use bazaar_core::models::auth::{Identity, NewIdentity, TokenCreate};
use bazaar_core::store::{IdentityStore, PgStore, StoreError, TokenStore};
use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sqlx::postgres::PgPoolOptions;

async fn test_store() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to test database");
    bazaar_core::migrate::migrate(&pool)
        .await
        .expect("run migrations");
    Some(PgStore::new(pool))
}

fn unique_email() -> String {
    let suffix: String = rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("user-{}@example.com", suffix.to_lowercase())
}

fn new_identity(email: &str) -> NewIdentity {
    NewIdentity {
        email: email.into(),
        username: "ann".into(),
        password_hash: hash_password("abcdefg1", 4).unwrap(),
        first_name: Some("Ann".into()),
        last_name: None,
        phone_number: None,
    }
}

async fn create_user(store: &PgStore) -> Identity {
    store
        .create_identity(new_identity(&unique_email()))
        .await
        .unwrap()
}

fn record(user_id: i64, refresh: &str) -> TokenCreate {
    token_record(user_id, "access", refresh, Duration::days(1), Utc::now()).unwrap()
}

async fn active_count(store: &PgStore, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM tokens WHERE user_id = $1 AND status")
        .bind(user_id)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn identity_lookup_ignores_email_case() {
    let Some(store) = test_store().await else {
        return;
    };
    let email = unique_email();
    let created = store.create_identity(new_identity(&email)).await.unwrap();
    assert_eq!(created.email, email);
    assert_eq!(created.first_name.as_deref(), Some("Ann"));

    let found = store
        .find_identity_by_email(&email.to_uppercase())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.password_hash, created.password_hash);

    assert!(store.find_identity_by_id(created.id).await.unwrap().is_some());
    assert!(store.find_identity_by_id(-1).await.unwrap().is_none());
    assert!(
        store
            .find_identity_by_email(&unique_email())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_email_maps_to_duplicate() {
    let Some(store) = test_store().await else {
        return;
    };
    let email = unique_email();
    store.create_identity(new_identity(&email)).await.unwrap();
    let err = store
        .create_identity(new_identity(&email.to_uppercase()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)), "{err:?}");
}

#[tokio::test]
async fn update_password_hash_reports_missing_user() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = create_user(&store).await;
    let new_hash = hash_password("newpassw0rd", 4).unwrap();

    assert!(store.update_password_hash(user.id, &new_hash).await.unwrap());
    let reloaded = store.find_identity_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(reloaded.password_hash, new_hash);
    assert!(!store.update_password_hash(-1, &new_hash).await.unwrap());
}

#[tokio::test]
async fn token_lifecycle() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = create_user(&store).await;
    let refresh = format!("refresh-{}", unique_email());
    let hash = hash_refresh_token(&refresh);

    let stored = store.insert_token(record(user.id, &refresh)).await.unwrap();
    assert_eq!(stored.user_id, user.id);
    assert!(stored.status);
    assert_eq!(stored.refresh_token, hash);

    let found = store.find_active_token(&hash).await.unwrap().unwrap();
    assert_eq!(found.id, stored.id);

    assert!(store.revoke_token(&hash).await.unwrap());
    assert!(!store.revoke_token(&hash).await.unwrap());
    assert!(store.find_active_token(&hash).await.unwrap().is_none());
}

#[tokio::test]
async fn one_active_token_per_user() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = create_user(&store).await;
    store.insert_token(record(user.id, &unique_email())).await.unwrap();

    let err = store
        .insert_token(record(user.id, &unique_email()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)), "{err:?}");

    assert_eq!(store.revoke_user_tokens(user.id).await.unwrap(), 1);
    assert_eq!(store.revoke_user_tokens(user.id).await.unwrap(), 0);
    assert_eq!(active_count(&store, user.id).await, 0);
}

#[tokio::test]
async fn concurrent_replacements_leave_one_active_token() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = create_user(&store).await;
    let first = unique_email();
    store.insert_token(record(user.id, &first)).await.unwrap();

    let (a, b) = tokio::join!(
        store.replace_user_token(record(user.id, &unique_email())),
        store.replace_user_token(record(user.id, &unique_email())),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(active_count(&store, user.id).await, 1);
    assert!(
        store
            .find_active_token(&hash_refresh_token(&first))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn concurrent_revokes_of_one_token_have_one_winner() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = create_user(&store).await;
    let refresh = unique_email();
    store.insert_token(record(user.id, &refresh)).await.unwrap();

    let hash = hash_refresh_token(&refresh);
    let (a, b) = tokio::join!(store.revoke_token(&hash), store.revoke_token(&hash));
    assert_eq!(a.unwrap() as u8 + b.unwrap() as u8, 1);
}
