//! Event-channel handlers for real-time messaging
//!
//! This module contains:
//! - The connection registry (who is online, on which connections)
//! - The room manager (live push subscriptions per conversation)
//! - The wire protocol types
//! - The per-connection protocol handler and the upgrade endpoint

pub mod connection;
pub mod events;
pub mod handler;
pub mod rooms;
pub mod session;

pub use connection::ConnectionRegistry;
pub use handler::ws_handler;
pub use rooms::RoomManager;
