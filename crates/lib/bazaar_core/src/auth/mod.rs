//! Authentication logic.
//!
//! Provides the password policy and bcrypt hashing, JWT access tokens,
//! refresh-token helpers, and registration input validation shared by
//! `bazaar_api` and any other frontend.

pub mod jwt;
pub mod password;
pub mod refresh;
pub mod registration;

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Password policy rule that a candidate password failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRule {
    /// Fewer than `min` characters.
    TooShort { min: usize },
    /// More than `max` bytes; bcrypt would ignore the rest.
    TooLong { max: usize },
    /// No decimal digit present.
    MissingDigit,
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyRule::TooShort { min } => {
                write!(f, "Password must be at least {min} characters long")
            }
            PolicyRule::TooLong { max } => write!(f, "Password must be at most {max} bytes"),
            PolicyRule::MissingDigit => f.write_str("Password must contain at least one number"),
        }
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    PolicyViolation(PolicyRule),

    /// Wrong email or wrong password. Deliberately carries no detail.
    #[error("Could not validate user.")]
    AuthenticationFailed,

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
