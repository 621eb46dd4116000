//! HTTP route handlers for the Commons API
//!
//! This module contains all REST endpoint handlers including:
//! - The message fallback path (history, send, delete, mark-read)
//! - Push-token registration for the external notification dispatcher
//! - Health check and status endpoints

pub mod health;
pub mod messages;
pub mod push;

pub use health::{health_router, HealthState};
pub use messages::{messages_router, MessagesState};
pub use push::{push_router, PushState};
