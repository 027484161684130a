//! Password policy and hashing via bcrypt.
//!
//! A [`PasswordHash`] can only come out of [`hash_password`] (gated by
//! [`validate_password`] in [`CredentialProcessor::validate_and_hash`]) or be
//! loaded back from storage inside this crate. Nothing turns raw user input
//! into one directly.

use std::fmt;
use std::sync::Arc;

use unicode_general_category::{GeneralCategory, get_general_category};

use super::{AuthError, PolicyRule};

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

const DUMMY_PASSWORD: &str = "bazaar-dummy-password-0";

/// Password strength rules enforced at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_digit: true,
        }
    }
}

/// A bcrypt hash as stored in the `users.password_hash` column.
///
/// Other crates cannot wrap arbitrary text as a hash:
///
/// ```compile_fail
/// use bazaar_core::auth::password::PasswordHash;
/// let _ = PasswordHash::from_stored("plaintext".to_string());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a hash read back from storage.
    pub(crate) fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

/// Unicode general category Nd: `'7'`, `'٣'`, `'७'`, but not `'½'` or `'Ⅻ'`.
fn is_decimal_digit(c: char) -> bool {
    get_general_category(c) == GeneralCategory::DecimalNumber
}

/// Check a plaintext password against the policy.
///
/// Length is checked first so an empty or short password fails before any
/// further work. Inputs over [`MAX_PASSWORD_BYTES`] are refused since bcrypt
/// would ignore the tail.
pub fn validate_password(policy: &PasswordPolicy, password: &str) -> Result<(), AuthError> {
    if password.chars().count() < policy.min_length {
        return Err(AuthError::PolicyViolation(PolicyRule::TooShort {
            min: policy.min_length,
        }));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::PolicyViolation(PolicyRule::TooLong {
            max: MAX_PASSWORD_BYTES,
        }));
    }
    if policy.require_digit && !password.chars().any(is_decimal_digit) {
        return Err(AuthError::PolicyViolation(PolicyRule::MissingDigit));
    }
    Ok(())
}

/// Hash a password with bcrypt (random salt).
pub fn hash_password(password: &str, cost: u32) -> Result<PasswordHash, AuthError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::PolicyViolation(PolicyRule::TooLong {
            max: MAX_PASSWORD_BYTES,
        }));
    }
    bcrypt::hash(password, cost)
        .map(PasswordHash)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
///
/// A candidate longer than [`MAX_PASSWORD_BYTES`] never matches: no stored
/// hash was made from one. A hash that bcrypt cannot parse is an internal
/// error, never a match.
pub fn verify_password(password: &str, hash: &PasswordHash) -> Result<bool, AuthError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }
    bcrypt::verify(password, hash.as_str())
        .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// Policy plus cost: validates, hashes and verifies passwords.
///
/// Also holds a dummy hash at the same cost, so a login naming an unknown
/// email spends the same bcrypt time as a wrong password.
#[derive(Debug, Clone)]
pub struct CredentialProcessor {
    pub policy: PasswordPolicy,
    pub cost: u32,
    dummy: Arc<PasswordHash>,
}

impl CredentialProcessor {
    /// Fails if bcrypt rejects `cost`; call once at startup.
    pub fn new(policy: PasswordPolicy, cost: u32) -> Result<Self, AuthError> {
        let dummy = bcrypt::hash(DUMMY_PASSWORD, cost)
            .map_err(|e| AuthError::Config(format!("bcrypt cost {cost}: {e}")))?;
        Ok(Self {
            policy,
            cost,
            dummy: Arc::new(PasswordHash(dummy)),
        })
    }

    pub fn validate(&self, password: &str) -> Result<(), AuthError> {
        validate_password(&self.policy, password)
    }

    pub fn hash(&self, password: &str) -> Result<PasswordHash, AuthError> {
        hash_password(password, self.cost)
    }

    /// Validate, then hash. The policy check runs before any bcrypt work.
    pub fn validate_and_hash(&self, password: &str) -> Result<PasswordHash, AuthError> {
        self.validate(password)?;
        self.hash(password)
    }

    pub fn verify(&self, candidate: &str, hash: &PasswordHash) -> Result<bool, AuthError> {
        verify_password(candidate, hash)
    }

    /// Burn one bcrypt verification for a candidate with no matching user.
    pub fn verify_unknown(&self, candidate: &str) {
        let _ = verify_password(candidate, &self.dummy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> CredentialProcessor {
        CredentialProcessor::new(PasswordPolicy::default(), 4).unwrap()
    }

    #[test]
    fn short_passwords_are_rejected() {
        for pw in ["", "a1", "short1", "1234567"] {
            let err = processor().validate_and_hash(pw).unwrap_err();
            assert!(
                matches!(
                    err,
                    AuthError::PolicyViolation(PolicyRule::TooShort { min: 8 })
                ),
                "{pw:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn short1_reports_minimum_length() {
        let err = processor().validate_and_hash("short1").unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));
    }

    #[test]
    fn passwords_without_digits_are_rejected() {
        let err = processor().validate_and_hash("noDigitsHere").unwrap_err();
        assert!(matches!(
            err,
            AuthError::PolicyViolation(PolicyRule::MissingDigit)
        ));
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 7 characters, 13 bytes.
        let err = validate_password(&PasswordPolicy::default(), "ééééé1é").unwrap_err();
        assert!(matches!(
            err,
            AuthError::PolicyViolation(PolicyRule::TooShort { .. })
        ));
    }

    #[test]
    fn non_ascii_decimal_digits_satisfy_digit_rule() {
        let policy = PasswordPolicy::default();
        assert!(validate_password(&policy, "password٣").is_ok());
        assert!(validate_password(&policy, "password७").is_ok());
    }

    #[test]
    fn other_numeric_characters_are_not_digits() {
        let policy = PasswordPolicy::default();
        for pw in ["password½", "passwordⅫ", "password²"] {
            assert!(
                matches!(
                    validate_password(&policy, pw),
                    Err(AuthError::PolicyViolation(PolicyRule::MissingDigit))
                ),
                "{pw:?} accepted"
            );
        }
    }

    #[test]
    fn digit_rule_can_be_disabled() {
        let policy = PasswordPolicy {
            min_length: 8,
            require_digit: false,
        };
        assert!(validate_password(&policy, "noDigitsHere").is_ok());
    }

    #[test]
    fn passwords_over_72_bytes_are_rejected() {
        let exact = "a1".repeat(36);
        assert!(validate_password(&PasswordPolicy::default(), &exact).is_ok());

        let long = format!("{exact}X");
        let err = processor().validate_and_hash(&long).unwrap_err();
        assert!(matches!(
            err,
            AuthError::PolicyViolation(PolicyRule::TooLong { max: 72 })
        ));
        assert!(matches!(
            hash_password(&long, 4),
            Err(AuthError::PolicyViolation(PolicyRule::TooLong { .. }))
        ));
    }

    #[test]
    fn candidates_sharing_a_72_byte_prefix_do_not_match() {
        let p = processor();
        let real = "a1".repeat(36);
        let hash = p.validate_and_hash(&real).unwrap();
        assert!(p.verify(&real, &hash).unwrap());
        assert!(!p.verify(&format!("{real}Y"), &hash).unwrap());
    }

    #[test]
    fn valid_password_hashes_and_verifies() {
        let p = processor();
        let hash = p.validate_and_hash("abcdefg1").unwrap();
        assert_ne!(hash.as_str(), "abcdefg1");
        assert!(hash.as_str().starts_with("$2"));
        assert!(p.verify("abcdefg1", &hash).unwrap());
        assert!(!p.verify("abcdefg2", &hash).unwrap());
    }

    #[test]
    fn hashing_is_salted() {
        let p = processor();
        let a = p.validate_and_hash("abcdefg1").unwrap();
        let b = p.validate_and_hash("abcdefg1").unwrap();
        assert_ne!(a, b);
        assert!(p.verify("abcdefg1", &a).unwrap());
        assert!(p.verify("abcdefg1", &b).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        let bogus = PasswordHash::from_stored("not-a-bcrypt-hash".into());
        assert!(matches!(
            verify_password("abcdefg1", &bogus),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn debug_does_not_print_hash() {
        let hash = processor().hash("abcdefg1").unwrap();
        assert_eq!(format!("{hash:?}"), "PasswordHash(..)");
    }

    #[test]
    fn invalid_cost_fails_at_construction() {
        let err = CredentialProcessor::new(PasswordPolicy::default(), 99).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn dummy_hash_is_a_real_bcrypt_hash() {
        let p = processor();
        assert!(p.dummy.as_str().starts_with("$2"));
        assert!(!p.verify("abcdefg1", &p.dummy).unwrap());
        p.verify_unknown("abcdefg1");
    }
}
