//! JWT access token issuance and verification.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info, warn};

use super::AuthError;
use crate::models::auth::TokenClaims;

/// Default access token lifetime: 20 minutes.
pub const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 20;

/// Shortest signing secret accepted for HS256.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest access token lifetime accepted by [`TokenIssuer::new`].
pub const MAX_ACCESS_TTL_DAYS: i64 = 365;

/// Signs and verifies HS256 access tokens with a server-held secret.
///
/// Stateless: nothing about issued tokens is recorded here.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer. A secret shorter than [`MIN_SECRET_LEN`] bytes, or a
    /// TTL outside `0..=`[`MAX_ACCESS_TTL_DAYS`] days, is a configuration
    /// error.
    pub fn new(secret: &[u8], access_ttl: Duration) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        if access_ttl < Duration::zero() {
            return Err(AuthError::Config("access token TTL is negative".into()));
        }
        if access_ttl > Duration::days(MAX_ACCESS_TTL_DAYS) {
            return Err(AuthError::Config(format!(
                "access token TTL exceeds {MAX_ACCESS_TTL_DAYS} days"
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
        })
    }

    /// Lifetime used for tokens minted on login and refresh.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Generate a signed access token for an authenticated identity.
    pub fn issue_access_token(
        &self,
        email: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        self.issue_access_token_at(email, user_id, ttl, Utc::now())
    }

    /// Same as [`Self::issue_access_token`] with an explicit issue time.
    pub fn issue_access_token_at(
        &self,
        email: &str,
        user_id: i64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal(format!("token expiry out of range: {ttl}")))?;
        let claims = TokenClaims {
            sub: email.to_string(),
            id: user_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token against the current time.
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_access_token_at(token, Utc::now())
    }

    /// Verify a token as of `now`.
    ///
    /// The signature is checked before expiry, so a tampered token is always
    /// `TokenInvalid` even when it is also stale. `exp <= now` is expired.
    pub fn verify_access_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    debug!(error = %e, "rejected access token");
                    AuthError::TokenInvalid(e.to_string())
                }
            })?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
///
/// When neither variable is set a random secret is generated once and kept in
/// the platform data directory so tokens survive restarts.
pub fn resolve_jwt_secret() -> String {
    for var in ["JWT_SECRET", "AUTH_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(error = %e, "could not create JWT secret directory");
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(error = %e, "JWT secret not persisted; tokens will not survive restart"),
    }
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bazaar")
        .join("jwt-secret")
}
