//! Delivery engine
//!
//! One pipeline (validate, persist, fan out) shared by the event channel
//! and the HTTP fallback path, so a client retrying over HTTP after a failed
//! socket send observes identical semantics.
//!
//! Fan-out rules: the sender's own connections receive `message-ack`; other
//! recipients receive `message-new`. For a direct thread the peer is reached
//! through the connection registry whether or not they joined the room; for a
//! community, room membership governs live push. Recipients with zero live
//! connections are handed to the notification boundary and otherwise pick the
//! message up from history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    ConversationId, HistoryPage, MediaRef, Message, NewMessage, ReadReceipt,
};
use crate::repositories::{DeleteScope, MembershipDirectory, MessageStore, StoreError};
use crate::services::notify::Notifier;
use crate::websocket::connection::ConnectionRegistry;
use crate::websocket::events::{
    MessageDeletedPayload, MessagePayload, MessageReadPayload, ServerEvent,
};
use crate::websocket::rooms::RoomManager;

/// Default bound on a single persistence call
pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outgoing message content, before persistence
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    /// Text body
    pub text: Option<String>,

    /// Media reference produced by the upload step
    pub media: Option<MediaRef>,
}

/// Errors surfaced by the delivery engine
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Neither text nor media present
    #[error("message must contain text or a media attachment")]
    EmptyMessage,

    /// Acting user is not part of the conversation
    #[error("not a participant of this conversation")]
    NotParticipant,

    /// The store did not answer within the configured bound
    #[error("persistence timed out")]
    Timeout,

    /// The store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The delivery engine shared by both transports
///
/// Constructed once at process start and cloned into the handlers; the
/// registries it holds are the process-local live state.
#[derive(Clone)]
pub struct DeliveryService {
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn MembershipDirectory>,
    notifier: Arc<dyn Notifier>,
    registry: ConnectionRegistry,
    rooms: RoomManager,
    persist_timeout: Duration,
}

impl DeliveryService {
    /// Create a new delivery service
    pub fn new(
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn MembershipDirectory>,
        notifier: Arc<dyn Notifier>,
        registry: ConnectionRegistry,
        rooms: RoomManager,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            registry,
            rooms,
            persist_timeout,
        }
    }

    /// Check that a user may act on a conversation
    ///
    /// Direct threads admit exactly their two participants; communities admit
    /// current members per the external directory.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        conversation: &ConversationId,
    ) -> Result<(), DeliveryError> {
        match conversation {
            ConversationId::Direct(a, b) => {
                if *a == user_id || *b == user_id {
                    Ok(())
                } else {
                    Err(DeliveryError::NotParticipant)
                }
            }
            ConversationId::Community(community_id) => {
                if self.directory.is_member(*community_id, user_id).await? {
                    Ok(())
                } else {
                    Err(DeliveryError::NotParticipant)
                }
            }
        }
    }

    /// Send a message: validate, persist, fan out
    ///
    /// Returns the persisted message (also delivered to the sender's own
    /// connections as `message-ack`). A missed push because a connection
    /// dropped mid-send is not resent; persistence alone satisfies delivery.
    pub async fn send(
        &self,
        sender_id: Uuid,
        conversation: ConversationId,
        outgoing: OutgoingMessage,
    ) -> Result<Message, DeliveryError> {
        let body = outgoing
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if body.is_none() && outgoing.media.is_none() {
            return Err(DeliveryError::EmptyMessage);
        }

        self.authorize(sender_id, &conversation).await?;

        let message = self
            .persist(NewMessage {
                conversation_id: conversation,
                sender_id,
                body,
                media: outgoing.media,
            })
            .await?;

        debug!(
            message_id = %message.id,
            conversation = %conversation,
            sender_id = %sender_id,
            "Message persisted"
        );

        // Delivery confirmation to the sender's own connections
        self.registry.send_to_user(
            sender_id,
            ServerEvent::MessageAck(MessagePayload {
                message: message.clone(),
            }),
        );

        self.fan_out(sender_id, &conversation, &message).await;

        Ok(message)
    }

    /// Paginated history for a conversation
    pub async fn history(
        &self,
        user_id: Uuid,
        conversation: ConversationId,
        page: HistoryPage,
    ) -> Result<Vec<Message>, DeliveryError> {
        self.authorize(user_id, &conversation).await?;
        let messages = self.bounded(self.store.list(&conversation, page)).await?;
        Ok(messages)
    }

    /// Mark messages read and notify their senders
    ///
    /// Only messages that actually transition produce receipts, so marking an
    /// already-read message emits nothing.
    pub async fn mark_read(
        &self,
        reader_id: Uuid,
        conversation: ConversationId,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReadReceipt>, DeliveryError> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.authorize(reader_id, &conversation).await?;

        let receipts = self
            .bounded(self.store.mark_read(&conversation, reader_id, message_ids))
            .await?;

        // One read-receipt event per affected sender
        let mut by_sender: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for receipt in &receipts {
            by_sender
                .entry(receipt.sender_id)
                .or_default()
                .push(receipt.message_id);
        }

        for (sender_id, ids) in by_sender {
            self.registry.send_to_user(
                sender_id,
                ServerEvent::MessageRead(MessageReadPayload {
                    conversation,
                    message_ids: ids,
                    reader_id,
                }),
            );
        }

        Ok(receipts)
    }

    /// Delete messages and notify live subscribers
    ///
    /// Non-admin requesters may only delete their own messages; community
    /// admins (per the external directory) may delete any. Returns the ids
    /// actually tombstoned.
    pub async fn delete(
        &self,
        requester_id: Uuid,
        conversation: ConversationId,
        message_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, DeliveryError> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.authorize(requester_id, &conversation).await?;

        let scope = match conversation {
            ConversationId::Community(community_id)
                if self.directory.is_admin(community_id, requester_id).await? =>
            {
                DeleteScope::Any
            }
            _ => DeleteScope::Sender(requester_id),
        };

        let deleted = self
            .bounded(self.store.delete(&conversation, message_ids, scope))
            .await?;

        if !deleted.is_empty() {
            let event = ServerEvent::MessageDeleted(MessageDeletedPayload {
                conversation,
                message_ids: deleted.clone(),
            });
            for connection_id in self.rooms.subscribers(&conversation) {
                if let Err(e) = self.registry.send_to_connection(connection_id, event.clone()) {
                    debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Failed to push deletion event"
                    );
                }
            }
        }

        Ok(deleted)
    }

    async fn persist(&self, message: NewMessage) -> Result<Message, DeliveryError> {
        self.bounded(self.store.append(message)).await
    }

    /// Apply the configured persistence bound to a store call
    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, DeliveryError> {
        match timeout(self.persist_timeout, fut).await {
            Ok(result) => result.map_err(DeliveryError::from),
            Err(_) => Err(DeliveryError::Timeout),
        }
    }

    /// Push `message-new` to recipients and hand offline ones to the notifier
    async fn fan_out(&self, sender_id: Uuid, conversation: &ConversationId, message: &Message) {
        let event = ServerEvent::MessageNew(MessagePayload {
            message: message.clone(),
        });

        match conversation {
            ConversationId::Direct(_, _) => {
                // The peer is an eligible recipient whether or not they joined
                // the room; room membership only matters for communities.
                let Some(peer) = conversation.direct_peer(sender_id) else {
                    return;
                };

                if self.registry.is_online(peer) {
                    let sent = self.registry.send_to_user(peer, event);
                    debug!(peer = %peer, connections = sent, "Direct message pushed");
                } else {
                    self.notifier.notify_offline(&[peer], message).await;
                }
            }
            ConversationId::Community(community_id) => {
                let mut pushed = 0;
                for connection_id in self.rooms.subscribers(conversation) {
                    if self.registry.user_of(connection_id) == Some(sender_id) {
                        continue;
                    }
                    if self
                        .registry
                        .send_to_connection(connection_id, event.clone())
                        .is_ok()
                    {
                        pushed += 1;
                    }
                }
                debug!(
                    community_id = %community_id,
                    connections = pushed,
                    "Community message pushed"
                );

                // Members without any live connection get the external
                // notification hand-off; the message itself is already visible
                // on their next history fetch.
                match self.directory.members_of(*community_id).await {
                    Ok(members) => {
                        let offline: Vec<Uuid> = members
                            .into_iter()
                            .filter(|m| *m != sender_id && !self.registry.is_online(*m))
                            .collect();
                        if !offline.is_empty() {
                            self.notifier.notify_offline(&offline, message).await;
                        }
                    }
                    Err(e) => {
                        // The message is persisted; notification is best-effort
                        warn!(
                            community_id = %community_id,
                            error = %e,
                            "Could not resolve members for offline hand-off"
                        );
                    }
                }
            }
        }
    }
}
