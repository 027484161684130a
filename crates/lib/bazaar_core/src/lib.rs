//! # bazaar_core
//!
//! Core domain logic for Bazaar: password policy and hashing, access/refresh
//! token issuance, and the persistence traits the API layer talks to.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
