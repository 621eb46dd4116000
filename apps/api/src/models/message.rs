//! Message models
//!
//! This module contains the persisted message record and the input types used
//! by the delivery pipeline. Once created, a message's sender and conversation
//! reference never change; only the read-state mutates, and deletion is a
//! tombstone (`deleted_at`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::conversation::ConversationId;

/// Kind tag for a media attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Returns the string representation of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to a media attachment uploaded out-of-band
///
/// The URL is opaque to the messaging core; serving the file is external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Opaque URL or path of the stored attachment
    pub url: String,

    /// Attachment kind tag
    pub kind: MediaKind,
}

/// Message record from the messages table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (server-assigned)
    pub id: Uuid,

    /// Conversation this message belongs to
    pub conversation_id: ConversationId,

    /// User who sent the message
    pub sender_id: Uuid,

    /// Text body (None for media-only messages)
    pub body: Option<String>,

    /// Media attachment URL, if any
    pub media_url: Option<String>,

    /// Media attachment kind, if any
    pub media_kind: Option<MediaKind>,

    /// Users who have read this message
    pub read_by: Vec<Uuid>,

    /// Creation timestamp (server-assigned)
    pub created_at: DateTime<Utc>,

    /// Tombstone timestamp (None if not deleted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// The media attachment, if any
    pub fn media(&self) -> Option<MediaRef> {
        match (&self.media_url, self.media_kind) {
            (Some(url), Some(kind)) => Some(MediaRef {
                url: url.clone(),
                kind,
            }),
            _ => None,
        }
    }

    /// Whether the given user has read this message
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.contains(&user_id)
    }
}

/// Input for appending a message to the store
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Conversation the message belongs to
    pub conversation_id: ConversationId,

    /// Sending user
    pub sender_id: Uuid,

    /// Text body (already validated non-empty when present)
    pub body: Option<String>,

    /// Media attachment reference
    pub media: Option<MediaRef>,
}

/// A newly-recorded read receipt: which message, and who sent it
///
/// `mark_read` returns one receipt per message that actually transitioned to
/// read, so re-marking produces nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReceipt {
    /// The message that was marked read
    pub message_id: Uuid,

    /// The message's sender (the receipt's audience)
    pub sender_id: Uuid,
}

/// Cursor-based page of conversation history
#[derive(Debug, Clone, Copy)]
pub struct HistoryPage {
    /// Only messages created strictly before this instant
    pub before: Option<DateTime<Utc>>,

    /// Maximum number of messages to return
    pub limit: i64,
}

impl Default for HistoryPage {
    fn default() -> Self {
        Self {
            before: None,
            limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: ConversationId::direct(Uuid::new_v4(), Uuid::new_v4()),
            sender_id: Uuid::new_v4(),
            body: Some("hello".to_string()),
            media_url: None,
            media_kind: None,
            read_by: vec![],
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_media_requires_url_and_kind() {
        let mut msg = sample_message();
        assert!(msg.media().is_none());

        msg.media_url = Some("/media/abc.jpg".to_string());
        assert!(msg.media().is_none());

        msg.media_kind = Some(MediaKind::Image);
        let media = msg.media().unwrap();
        assert_eq!(media.url, "/media/abc.jpg");
        assert_eq!(media.kind, MediaKind::Image);
    }

    #[test]
    fn test_is_read_by() {
        let mut msg = sample_message();
        let reader = Uuid::new_v4();

        assert!(!msg.is_read_by(reader));
        msg.read_by.push(reader);
        assert!(msg.is_read_by(reader));
    }

    #[test]
    fn test_media_kind_serialization() {
        assert_eq!(serde_json::to_string(&MediaKind::Image).unwrap(), "\"image\"");
        assert_eq!(serde_json::to_string(&MediaKind::Video).unwrap(), "\"video\"");
        assert_eq!(MediaKind::Video.to_string(), "video");
    }

    #[test]
    fn test_message_serialization_skips_empty_tombstone() {
        let msg = sample_message();
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("deleted_at").is_none());
        assert_eq!(json["body"], "hello");
    }
}
