//! Persistence boundaries for the messaging core
//!
//! The document store, community membership, and user account data are owned
//! by external collaborators; these repositories are the only code that talks
//! to them. The delivery engine depends on the traits (`MessageStore`,
//! `MembershipDirectory`), which keeps it testable without a database.

pub mod community;
pub mod message;
pub mod user;

pub use community::{CommunityRepository, MembershipDirectory};
pub use message::{DeleteScope, MessageRepository, MessageStore, MAX_HISTORY_LIMIT};
pub use user::UserRepository;

use thiserror::Error;

/// Errors surfaced by the persistence boundaries
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced row does not exist
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// Database query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
