//! Per-connection protocol dispatch
//!
//! An `EventSession` terminates the protocol for one identified connection,
//! translating client events into calls on the room manager and the delivery
//! engine. Malformed or unauthorized events answer with an `error` event and
//! never tear the connection down.

use uuid::Uuid;

use super::connection::ConnectionRegistry;
use super::events::{
    ClientEvent, ErrorPayload, MarkReadPayload, RoomPayload, SendMessagePayload, ServerEvent,
};
use super::rooms::RoomManager;
use crate::models::ConversationId;
use crate::services::delivery::{DeliveryError, DeliveryService, OutgoingMessage};

/// Handles protocol events for a single identified connection
pub struct EventSession {
    user_id: Uuid,
    connection_id: Uuid,
    registry: ConnectionRegistry,
    rooms: RoomManager,
    delivery: DeliveryService,
}

impl EventSession {
    /// Create a new session for an identified connection
    pub fn new(
        user_id: Uuid,
        connection_id: Uuid,
        registry: ConnectionRegistry,
        rooms: RoomManager,
        delivery: DeliveryService,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            registry,
            rooms,
            delivery,
        }
    }

    /// Handle an incoming client event
    pub async fn handle_event(&self, event: ClientEvent) {
        self.registry.touch(self.connection_id);

        match event {
            ClientEvent::JoinRoom(RoomPayload { conversation }) => {
                self.handle_join(conversation).await
            }
            ClientEvent::LeaveRoom(RoomPayload { conversation }) => {
                self.rooms.leave(self.connection_id, conversation);
            }
            ClientEvent::SendMessage(payload) => self.handle_send(payload).await,
            ClientEvent::MarkRead(payload) => self.handle_mark_read(payload).await,
            ClientEvent::Heartbeat => self.handle_heartbeat(),
        }
    }

    /// Join a room, enforcing conversation membership
    async fn handle_join(&self, conversation: ConversationId) {
        match self.delivery.authorize(self.user_id, &conversation).await {
            Ok(()) => {
                self.rooms.join(self.connection_id, conversation);
            }
            Err(e) => {
                tracing::debug!(
                    user_id = %self.user_id,
                    conversation = %conversation,
                    error = %e,
                    "Room join rejected"
                );
                self.send_error(delivery_error_payload(&e));
            }
        }
    }

    /// Send a message through the shared delivery engine
    ///
    /// On success the engine already delivered the ack to this user's
    /// connections; only failures need a reply here.
    async fn handle_send(&self, payload: SendMessagePayload) {
        let outgoing = OutgoingMessage {
            text: payload.text,
            media: payload.media,
        };

        if let Err(e) = self
            .delivery
            .send(self.user_id, payload.conversation, outgoing)
            .await
        {
            tracing::warn!(
                user_id = %self.user_id,
                conversation = %payload.conversation,
                error = %e,
                "Send failed"
            );
            self.send_error(delivery_error_payload(&e));
        }
    }

    /// Mark messages read; receipts go to the senders, failures come back here
    async fn handle_mark_read(&self, payload: MarkReadPayload) {
        if let Err(e) = self
            .delivery
            .mark_read(self.user_id, payload.conversation, &payload.message_ids)
            .await
        {
            tracing::debug!(
                user_id = %self.user_id,
                conversation = %payload.conversation,
                error = %e,
                "Mark-read failed"
            );
            self.send_error(delivery_error_payload(&e));
        }
    }

    fn handle_heartbeat(&self) {
        let server_time = chrono::Utc::now().timestamp_millis();
        self.send_to_self(ServerEvent::Pong { server_time });
    }

    /// Send an event back to this connection
    pub fn send_to_self(&self, event: ServerEvent) {
        if let Err(e) = self.registry.send_to_connection(self.connection_id, event) {
            tracing::debug!(
                user_id = %self.user_id,
                connection_id = %self.connection_id,
                error = %e,
                "Failed to send event to own connection"
            );
        }
    }

    /// Send an error event back to this connection
    pub fn send_error(&self, error: ErrorPayload) {
        self.send_to_self(ServerEvent::Error(error));
    }
}

/// Convert a DeliveryError to a wire error payload
///
/// Store internals are sanitized; full details are logged server-side.
fn delivery_error_payload(error: &DeliveryError) -> ErrorPayload {
    match error {
        DeliveryError::EmptyMessage => ErrorPayload::empty_message(),
        DeliveryError::NotParticipant => {
            ErrorPayload::forbidden("Not a participant of this conversation")
        }
        DeliveryError::Timeout => {
            ErrorPayload::delivery_failed("Send timed out. Please try again.")
        }
        DeliveryError::Store(_) => {
            ErrorPayload::delivery_failed("A storage error occurred. Please try again.")
        }
    }
}
