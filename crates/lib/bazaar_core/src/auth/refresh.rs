//! Refresh token generation, hashing and record building.
//!
//! Refresh tokens are opaque random strings. Only their SHA-256 digest is
//! persisted.

use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

use super::AuthError;
use crate::models::auth::TokenCreate;

/// Default refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;

/// Longest refresh token lifetime accepted at startup.
pub const MAX_REFRESH_TTL_DAYS: i64 = 3650;

/// Reject a refresh lifetime outside `0..=`[`MAX_REFRESH_TTL_DAYS`] days.
pub fn check_refresh_ttl(ttl: Duration) -> Result<(), AuthError> {
    if ttl < Duration::zero() || ttl > Duration::days(MAX_REFRESH_TTL_DAYS) {
        return Err(AuthError::Config(format!(
            "refresh token TTL must be between 0 and {MAX_REFRESH_TTL_DAYS} days"
        )));
    }
    Ok(())
}

/// Generate a cryptographically random refresh token (64 alphanumeric chars).
pub fn generate_refresh_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a refresh token for storage.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the active record for a freshly issued pair.
pub fn token_record(
    user_id: i64,
    access_token: &str,
    refresh_token: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<TokenCreate, AuthError> {
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Internal(format!("refresh expiry out of range: {ttl}")))?;
    Ok(TokenCreate {
        user_id,
        access_token: access_token.to_string(),
        refresh_token: hash_refresh_token(refresh_token),
        status: true,
        created_date: now,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_tokens_are_random_alphanumeric() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = hash_refresh_token("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn record_stores_digest_not_token() {
        let now = Utc::now();
        let record = token_record(9, "access", "refresh-plain", Duration::days(30), now).unwrap();
        assert_eq!(record.user_id, 9);
        assert!(record.status);
        assert_ne!(record.refresh_token, "refresh-plain");
        assert_eq!(record.refresh_token, hash_refresh_token("refresh-plain"));
        assert_eq!(record.expires_at - record.created_date, Duration::days(30));
    }

    #[test]
    fn out_of_range_refresh_ttl_is_rejected() {
        assert!(check_refresh_ttl(Duration::days(30)).is_ok());
        assert!(check_refresh_ttl(Duration::zero()).is_ok());
        for ttl in [
            Duration::days(-1),
            Duration::days(MAX_REFRESH_TTL_DAYS + 1),
            Duration::MAX,
        ] {
            assert!(matches!(check_refresh_ttl(ttl), Err(AuthError::Config(_))));
        }
    }

    #[test]
    fn overflowing_record_expiry_is_an_error() {
        let err = token_record(9, "access", "refresh", Duration::MAX, Utc::now()).unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
