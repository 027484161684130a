//! Registration input validation.
//!
//! Turns a raw signup form into a [`ValidatedRegistration`], and only that
//! type can become a [`NewIdentity`], by running the password through
//! [`CredentialProcessor::validate_and_hash`].

use super::AuthError;
use super::password::CredentialProcessor;
use crate::models::auth::NewIdentity;

/// Minimum phone number length when one is given.
pub const MIN_PHONE_LENGTH: usize = 10;

/// Raw signup input as received from a client.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

/// Signup input whose non-password fields passed validation.
#[derive(Clone)]
pub struct ValidatedRegistration {
    email: String,
    username: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone_number: Option<String>,
}

impl std::fmt::Debug for ValidatedRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedRegistration")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Trim and lower-case an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `local@domain.tld` with no whitespace.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Trim an optional field; blank becomes `None`.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RegistrationForm {
    /// Check every field except password strength.
    ///
    /// A missing password is rejected here: there is no fallback password.
    pub fn validate(self) -> Result<ValidatedRegistration, AuthError> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(AuthError::Validation("Username must not be empty".into()));
        }

        let email = normalize_email(&self.email);
        if email.is_empty() {
            return Err(AuthError::Validation("Email must not be empty".into()));
        }
        if !looks_like_email(&email) {
            return Err(AuthError::Validation(
                "Email is not a valid email address".into(),
            ));
        }

        let password = match self.password {
            Some(p) if !p.is_empty() => p,
            _ => return Err(AuthError::Validation("Password is required".into())),
        };

        let phone_number = optional(self.phone_number);
        if let Some(phone) = &phone_number
            && phone.chars().count() < MIN_PHONE_LENGTH
        {
            return Err(AuthError::Validation(format!(
                "Phone number must be at least {MIN_PHONE_LENGTH} digits"
            )));
        }

        Ok(ValidatedRegistration {
            email,
            username,
            password,
            first_name: optional(self.first_name),
            last_name: optional(self.last_name),
            phone_number,
        })
    }
}

impl ValidatedRegistration {
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Check the password policy only, without hashing.
    pub fn check_password(&self, processor: &CredentialProcessor) -> Result<(), AuthError> {
        processor.validate(&self.password)
    }

    /// Enforce the password policy, hash, and produce the record to persist.
    ///
    /// CPU-heavy: call from a blocking context.
    pub fn into_new_identity(
        self,
        processor: &CredentialProcessor,
    ) -> Result<NewIdentity, AuthError> {
        let password_hash = processor.validate_and_hash(&self.password)?;
        Ok(NewIdentity {
            email: self.email,
            username: self.username,
            password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
        })
    }
}
