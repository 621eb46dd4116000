//! Recording notifier

use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use commons_api::models::Message;
use commons_api::services::Notifier;

/// A single recorded offline hand-off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Recipients that had no live connection
    pub recipients: Vec<Uuid>,

    /// The stored message's id
    pub message_id: Uuid,
}

/// Notifier that records every hand-off for assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    handoffs: Mutex<Vec<Handoff>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded hand-offs, in order
    pub fn handoffs(&self) -> Vec<Handoff> {
        self.handoffs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_offline(&self, recipients: &[Uuid], message: &Message) {
        let mut recipients = recipients.to_vec();
        recipients.sort();

        self.handoffs.lock().unwrap().push(Handoff {
            recipients,
            message_id: message.id,
        });
    }
}
