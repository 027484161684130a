//! # bazaar_api
//!
//! HTTP API library for Bazaar.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use bazaar_core::auth::AuthError;
use bazaar_core::auth::jwt::TokenIssuer;
use bazaar_core::auth::password::{CredentialProcessor, PasswordPolicy};
use bazaar_core::auth::refresh::check_refresh_ttl;
use bazaar_core::store::{IdentityStore, MemoryStore, TokenStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User records.
    pub identities: Arc<dyn IdentityStore>,
    /// Token-creation records.
    pub tokens: Arc<dyn TokenStore>,
    /// Access token signer/verifier.
    pub issuer: Arc<TokenIssuer>,
    /// Password policy and bcrypt cost.
    pub credentials: CredentialProcessor,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Build state from config and stores. Fails on an unusable JWT secret,
    /// bcrypt cost or token lifetime.
    pub fn new(
        config: ApiConfig,
        identities: Arc<dyn IdentityStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, AuthError> {
        let issuer = TokenIssuer::new(config.jwt_secret.as_bytes(), config.access_token_ttl)?;
        check_refresh_ttl(config.refresh_token_ttl)?;
        let credentials = CredentialProcessor::new(PasswordPolicy::default(), config.bcrypt_cost)?;
        Ok(Self {
            identities,
            tokens,
            issuer: Arc::new(issuer),
            credentials,
            config,
        })
    }

    /// State over a fresh [`MemoryStore`].
    pub fn in_memory(config: ApiConfig) -> Result<Self, AuthError> {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/signup", post(auth::signup_handler))
        .route("/login", post(auth::login_handler))
        .route("/token/refresh", post(auth::refresh_handler))
        .route("/logout", post(auth::logout_handler))
        .route("/users/change-password", post(auth::change_password_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/users/me", get(users::me_handler))
        .route("/users/{user_id}", get(users::get_user_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
