//! Business flows called by handlers.

pub mod auth;
