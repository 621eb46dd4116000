//! Offline notification hand-off
//!
//! Push delivery itself is owned by an external dispatcher; the delivery
//! engine only hands it the recipients that had zero live connections when a
//! message was stored. The dispatcher resolves registered push tokens and
//! platforms on its side.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Message;

/// Boundary to the external notification dispatcher
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hand off a stored message for recipients with no live connection
    async fn notify_offline(&self, recipients: &[Uuid], message: &Message);
}

/// Notifier that only records the hand-off in the logs
///
/// Used when no dispatcher is wired up; delivery is then satisfied by
/// persistence alone and recipients see the message on their next fetch.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_offline(&self, recipients: &[Uuid], message: &Message) {
        tracing::debug!(
            message_id = %message.id,
            conversation = %message.conversation_id,
            recipients = recipients.len(),
            "Offline recipients handed to notification dispatcher"
        );
    }
}
