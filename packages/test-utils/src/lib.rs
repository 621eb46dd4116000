//! Shared test utilities for the Commons workspace
//!
//! This crate provides in-memory implementations of the messaging core's
//! persistence, membership, and notification boundaries, so delivery
//! semantics can be tested without a database.
//!
//! # Mocks
//!
//! - [`MemoryMessageStore`] - In-memory message store with an optional
//!   artificial latency for timeout tests
//! - [`StaticMembership`] - Hand-assembled community membership directory
//! - [`RecordingNotifier`] - Records offline hand-offs for assertions
//!
//! # Example
//!
//! ```rust,ignore
//! use commons_test_utils::{MemoryMessageStore, StaticMembership, RecordingNotifier};
//!
//! let store = Arc::new(MemoryMessageStore::new());
//! let membership = Arc::new(StaticMembership::new());
//! membership.add_member(community_id, user_id);
//! ```

mod membership;
mod notify;
mod store;

pub use membership::StaticMembership;
pub use notify::RecordingNotifier;
pub use store::MemoryMessageStore;
