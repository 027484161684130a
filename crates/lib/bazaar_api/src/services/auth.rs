//! Authentication service — signup/login/refresh flows over `bazaar_core`.
//!
//! Every dependency is passed in explicitly. bcrypt work runs on the blocking
//! pool, never on an executor thread.

use bazaar_core::auth::AuthError;
use bazaar_core::auth::jwt::TokenIssuer;
use bazaar_core::auth::password::{CredentialProcessor, PasswordHash};
use bazaar_core::auth::refresh::{generate_refresh_token, hash_refresh_token, token_record};
use bazaar_core::auth::registration::{RegistrationForm, normalize_email};
use bazaar_core::models::auth::{Credentials, Identity, TokenPair};
use bazaar_core::store::{IdentityStore, TokenStore};
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Run CPU-bound auth work off the async executor.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task: {e}")))?
        .map_err(AppError::from)
}

/// Check a plaintext password against a stored hash on the blocking pool.
async fn password_matches(
    processor: &CredentialProcessor,
    candidate: String,
    hash: PasswordHash,
) -> AppResult<bool> {
    let processor = processor.clone();
    blocking(move || processor.verify(&candidate, &hash)).await
}

/// Spend one bcrypt check on a candidate with no matching user.
async fn burn_unknown(processor: &CredentialProcessor, candidate: String) {
    let processor = processor.clone();
    let _ = blocking(move || {
        processor.verify_unknown(&candidate);
        Ok(())
    })
    .await;
}

fn invalid_refresh() -> AppError {
    AppError::Unauthorized("Invalid refresh token".into())
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register a new user account.
///
/// Field validation and the password policy both run before any bcrypt work.
pub async fn register(
    identities: &dyn IdentityStore,
    processor: &CredentialProcessor,
    form: RegistrationForm,
) -> AppResult<Identity> {
    let valid = form.validate()?;
    valid.check_password(processor)?;

    if identities
        .find_identity_by_email(valid.email())
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let processor = processor.clone();
    let new = blocking(move || valid.into_new_identity(&processor)).await?;
    let user = identities.create_identity(new).await?;

    info!(user_id = user.id, "user registered");
    Ok(user)
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Resolve credentials to an identity.
///
/// Unknown email and wrong password fail identically. For an unknown email a
/// verify still runs against a dummy hash so both paths cost one bcrypt check.
pub async fn authenticate(
    identities: &dyn IdentityStore,
    processor: &CredentialProcessor,
    credentials: Credentials,
) -> AppResult<Identity> {
    let email = normalize_email(&credentials.email);
    let Credentials { password, .. } = credentials;

    let Some(user) = identities.find_identity_by_email(&email).await? else {
        burn_unknown(processor, password).await;
        warn!("login rejected");
        return Err(AuthError::AuthenticationFailed.into());
    };

    if !password_matches(processor, password, user.password_hash.clone()).await? {
        warn!("login rejected");
        return Err(AuthError::AuthenticationFailed.into());
    }

    Ok(user)
}

/// Issue a fresh pair for `user`, replacing any refresh token it already
/// holds in one store operation.
async fn issue_pair(
    tokens: &dyn TokenStore,
    issuer: &TokenIssuer,
    refresh_ttl: Duration,
    user: &Identity,
) -> AppResult<TokenPair> {
    let ttl = issuer.access_ttl();
    let access_token = issuer.issue_access_token(&user.email, user.id, ttl)?;
    let refresh_token = generate_refresh_token();
    let record = token_record(
        user.id,
        &access_token,
        &refresh_token,
        refresh_ttl,
        Utc::now(),
    )?;
    let stored = tokens.replace_user_token(record).await?;
    debug!(user_id = user.id, token_id = stored.id, "refresh token rotated");

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: ttl.num_seconds(),
    })
}

/// Authenticate with email + password and issue a token pair.
pub async fn login(
    identities: &dyn IdentityStore,
    tokens: &dyn TokenStore,
    processor: &CredentialProcessor,
    issuer: &TokenIssuer,
    refresh_ttl: Duration,
    credentials: Credentials,
) -> AppResult<TokenPair> {
    let user = authenticate(identities, processor, credentials).await?;
    let pair = issue_pair(tokens, issuer, refresh_ttl, &user).await?;
    info!(user_id = user.id, "user logged in");
    Ok(pair)
}

// ---------------------------------------------------------------------------
// Refresh & logout
// ---------------------------------------------------------------------------

/// Exchange a refresh token for a new pair (single-use rotation).
///
/// The presented record is revoked before anything is issued; a caller that
/// loses that race to a concurrent refresh gets `Unauthorized`.
pub async fn refresh(
    identities: &dyn IdentityStore,
    tokens: &dyn TokenStore,
    issuer: &TokenIssuer,
    refresh_ttl: Duration,
    refresh_token: &str,
) -> AppResult<TokenPair> {
    let token_hash = hash_refresh_token(refresh_token);
    let record = tokens
        .find_active_token(&token_hash)
        .await?
        .ok_or_else(invalid_refresh)?;

    if !tokens.revoke_token(&token_hash).await? {
        debug!(user_id = record.user_id, "refresh token already consumed");
        return Err(invalid_refresh());
    }
    if !record.is_usable(Utc::now()) {
        return Err(invalid_refresh());
    }

    let user = identities
        .find_identity_by_id(record.user_id)
        .await?
        .ok_or_else(invalid_refresh)?;

    issue_pair(tokens, issuer, refresh_ttl, &user).await
}

/// Revoke the presented refresh token. Unknown tokens are ignored.
pub async fn logout(tokens: &dyn TokenStore, refresh_token: Option<&str>) -> AppResult<()> {
    if let Some(token) = refresh_token {
        tokens.revoke_token(&hash_refresh_token(token)).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Password change & lookup
// ---------------------------------------------------------------------------

/// Replace a user's password after checking the old one.
///
/// All refresh tokens of the user are revoked afterwards.
pub async fn change_password(
    identities: &dyn IdentityStore,
    tokens: &dyn TokenStore,
    processor: &CredentialProcessor,
    credentials: Credentials,
    new_password: String,
) -> AppResult<()> {
    processor.validate(&new_password)?;
    let user = authenticate(identities, processor, credentials).await?;

    let processor = processor.clone();
    let hash = blocking(move || processor.validate_and_hash(&new_password)).await?;
    if !identities.update_password_hash(user.id, &hash).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    tokens.revoke_user_tokens(user.id).await?;

    info!(user_id = user.id, "password changed");
    Ok(())
}

/// Fetch a user by ID.
pub async fn get_user(identities: &dyn IdentityStore, user_id: i64) -> AppResult<Identity> {
    identities
        .find_identity_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}
