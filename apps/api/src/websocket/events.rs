//! Event-channel protocol types
//!
//! This module defines the message protocol for client-server communication
//! over the event channel. Events are serialized as JSON with stable
//! kebab-case names shared with the clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ConversationId, MediaRef, Message};

// =============================================================================
// Client -> Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Subscribe this connection to a conversation's live push
    JoinRoom(RoomPayload),

    /// Unsubscribe this connection from a conversation
    LeaveRoom(RoomPayload),

    /// Send a message to a conversation
    SendMessage(SendMessagePayload),

    /// Mark messages in a conversation as read
    MarkRead(MarkReadPayload),

    /// Heartbeat to keep the connection alive
    Heartbeat,
}

// =============================================================================
// Server -> Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Connection established successfully
    Connected(ConnectedPayload),

    /// Delivery confirmation for the sender's own message
    MessageAck(MessagePayload),

    /// A new message from another participant
    MessageNew(MessagePayload),

    /// Messages were read by a recipient
    MessageRead(MessageReadPayload),

    /// Messages were deleted
    MessageDeleted(MessageDeletedPayload),

    /// Heartbeat response
    Pong { server_time: i64 },

    /// Error occurred
    Error(ErrorPayload),
}

// =============================================================================
// Payload Types
// =============================================================================

/// Payload for Connected event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// Server-assigned id for this connection
    pub connection_id: Uuid,
}

/// Payload for JoinRoom / LeaveRoom events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPayload {
    pub conversation: ConversationId,
}

/// Payload for SendMessage client event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessagePayload {
    /// Conversation to deliver into
    pub conversation: ConversationId,

    /// Text body (may be omitted for media-only messages)
    #[serde(default)]
    pub text: Option<String>,

    /// Media reference produced by the out-of-band upload step
    #[serde(default)]
    pub media: Option<MediaRef>,
}

/// Payload for MarkRead client event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadPayload {
    pub conversation: ConversationId,
    pub message_ids: Vec<Uuid>,
}

/// Payload carrying a full message (ack and broadcast share the shape,
/// but are distinct events so the sender can reconcile optimistic state)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message: Message,
}

/// Payload for MessageRead server event, sent to the messages' sender
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReadPayload {
    pub conversation: ConversationId,
    pub message_ids: Vec<Uuid>,
    pub reader_id: Uuid,
}

/// Payload for MessageDeleted server event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeletedPayload {
    pub conversation: ConversationId,
    pub message_ids: Vec<Uuid>,
}

/// Payload for Error event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::new("INVALID_EVENT", message)
    }

    pub fn invalid_identity(message: impl Into<String>) -> Self {
        Self::new("INVALID_IDENTITY", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn empty_message() -> Self {
        Self::new(
            "EMPTY_MESSAGE",
            "Message must contain text or a media attachment",
        )
    }

    pub fn delivery_failed(message: impl Into<String>) -> Self {
        Self::new("DELIVERY_FAILED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
