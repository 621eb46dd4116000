//! Business logic services for the Commons messaging core
//!
//! This module contains:
//! - The delivery engine shared by the event channel and the HTTP fallback
//! - The media storage boundary for multipart uploads
//! - The hand-off boundary to the external notification dispatcher

pub mod delivery;
pub mod media;
pub mod notify;

pub use delivery::{DeliveryService, DeliveryError, OutgoingMessage, DEFAULT_PERSIST_TIMEOUT};
pub use media::{LocalMediaStore, MediaError, MediaStore};
pub use notify::{LogNotifier, Notifier};
