//! Middleware components for the Commons API
//!
//! This module provides the identity extractor for Axum handlers:
//! - `Identity`: the upstream-authenticated user id, 401 if missing/invalid

pub mod identity;

pub use identity::{Identity, IDENTITY_HEADER};
