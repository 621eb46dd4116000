//! Event-channel upgrade handler and socket lifecycle
//!
//! Authentication is owned by the upstream gateway; the already-authenticated
//! client identifies itself with its user id at upgrade time. Each accepted
//! socket gets a server-assigned connection id, an entry in the connection
//! registry, and a per-connection task pair: one forwarding pushed events out,
//! one processing incoming frames in arrival order.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::connection::ConnectionRegistry;
use super::events::{ClientEvent, ConnectedPayload, ErrorPayload, ServerEvent};
use super::rooms::RoomManager;
use super::session::EventSession;
use crate::services::delivery::DeliveryService;

/// Query parameters for an event-channel connection
#[derive(Debug, Deserialize)]
pub struct WsQueryParams {
    /// Identity of the already-authenticated client
    pub user_id: Uuid,
}

/// Event-channel upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQueryParams>,
    Extension(registry): Extension<ConnectionRegistry>,
    Extension(rooms): Extension<RoomManager>,
    Extension(delivery): Extension<DeliveryService>,
) -> Response {
    if params.user_id.is_nil() {
        tracing::warn!("Event-channel connection rejected: nil user id");
        return ws.on_upgrade(|mut socket| async move {
            let error =
                ServerEvent::Error(ErrorPayload::invalid_identity("user_id must not be nil"));
            if let Ok(json) = serde_json::to_string(&error) {
                let _ = socket.send(Message::Text(json)).await;
            }
            let _ = socket.close().await;
        });
    }

    let user_id = params.user_id;
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, registry, rooms, delivery))
}

/// Handle an established event-channel connection
async fn handle_socket(
    socket: WebSocket,
    user_id: Uuid,
    registry: ConnectionRegistry,
    rooms: RoomManager,
    delivery: DeliveryService,
) {
    let connection_id = Uuid::new_v4();

    // Channel feeding events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    registry.register(user_id, connection_id, tx);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Confirm the connection before anything else
    let connected = ServerEvent::Connected(ConnectedPayload { connection_id });
    match serde_json::to_string(&connected) {
        Ok(json) => {
            if ws_sender.send(Message::Text(json)).await.is_err() {
                tracing::warn!(
                    user_id = %user_id,
                    connection_id = %connection_id,
                    "Failed to send connected event"
                );
                registry.unregister(connection_id);
                return;
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize connected event");
            registry.unregister(connection_id);
            return;
        }
    }

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "Event-channel connection established"
    );

    // Forward pushed events to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        tracing::debug!(connection_id = %connection_id, "Socket send failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize server event");
                }
            }
        }
    });

    // Process incoming frames sequentially: one client's events are handled in
    // arrival order, while other connections run in their own tasks.
    let session = EventSession::new(
        user_id,
        connection_id,
        registry.clone(),
        rooms.clone(),
        delivery,
    );
    let recv_registry = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => session.handle_event(event).await,
                    Err(e) => {
                        tracing::debug!(
                            connection_id = %connection_id,
                            error = %e,
                            "Ignoring unrecognized client event"
                        );
                        session.send_error(ErrorPayload::invalid_event(e.to_string()));
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Received unsupported binary frame"
                    );
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Transport keepalive counts as activity
                    recv_registry.touch(connection_id);
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Close frame received");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Socket error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, then abort the other
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Disconnect cleanup: unregister, then drop room memberships
    registry.unregister(connection_id);
    rooms.leave_all(connection_id);

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "Event-channel connection closed"
    );
}
