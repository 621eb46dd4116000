//! Message REST route handlers
//!
//! The HTTP fallback path for messaging, used when a client's live channel is
//! unavailable. Sending goes through the same delivery engine as the event
//! channel, so the two paths cannot drift apart:
//! - `GET    /conversations/:id/messages` - paginated history
//! - `POST   /conversations/:id/messages` - send (JSON or multipart)
//! - `DELETE /conversations/:id/messages` - delete by ids
//! - `PATCH  /conversations/:id/messages/read` - mark read by ids

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Identity;
use crate::models::{ConversationId, HistoryPage, MediaKind, MediaRef, Message};
use crate::services::delivery::{DeliveryService, OutgoingMessage};
use crate::services::media::MediaStore;

/// Shared application state for message handlers
#[derive(Clone)]
pub struct MessagesState {
    /// The delivery engine shared with the event channel
    pub delivery: DeliveryService,

    /// Storage boundary for multipart attachments
    pub media: Arc<dyn MediaStore>,
}

impl MessagesState {
    /// Create new messages state
    pub fn new(delivery: DeliveryService, media: Arc<dyn MediaStore>) -> Self {
        Self { delivery, media }
    }
}

/// Create the messages router
pub fn messages_router(state: MessagesState) -> Router {
    Router::new()
        .route(
            "/:id/messages",
            get(get_history).post(send_message).delete(delete_messages),
        )
        .route("/:id/messages/read", patch(mark_read))
        .with_state(state)
}

// ========== Request/Response Types ==========

/// Query parameters for history pagination
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Only messages created strictly before this instant (RFC 3339)
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,

    /// Maximum number of messages to return
    #[serde(default)]
    pub limit: Option<i64>,
}

/// JSON body for sending a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Text body (may be omitted for media-only messages)
    #[serde(default)]
    pub text: Option<String>,

    /// Media reference from a prior upload
    #[serde(default)]
    pub media: Option<MediaRef>,
}

/// Body for deleting messages
#[derive(Debug, Deserialize)]
pub struct DeleteMessagesRequest {
    pub message_ids: Vec<Uuid>,
}

/// Body for marking messages read
#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub message_ids: Vec<Uuid>,
}

/// History response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<Message>,
}

/// Deletion response: the ids actually deleted
#[derive(Debug, Serialize)]
pub struct DeleteMessagesResponse {
    pub deleted: Vec<Uuid>,
}

/// Mark-read response: the ids that transitioned to read
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub read: Vec<Uuid>,
}

fn parse_conversation(id: &str) -> ApiResult<ConversationId> {
    id.parse()
        .map_err(|e: crate::models::ParseConversationIdError| {
            ApiError::ValidationError(format!("invalid conversation id: {}", e))
        })
}

// ========== Route Handlers ==========

/// Paginated conversation history
///
/// # Response
/// - 200 OK: messages in ascending creation order
/// - 403 Forbidden: requester is not part of the conversation
async fn get_history(
    State(state): State<MessagesState>,
    identity: Identity,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let conversation = parse_conversation(&id)?;

    let page = HistoryPage {
        before: params.before,
        limit: params.limit.unwrap_or_else(|| HistoryPage::default().limit),
    };

    let messages = state
        .delivery
        .history(identity.user_id, conversation, page)
        .await?;

    Ok(Json(HistoryResponse { messages }))
}

/// Send a message over the HTTP fallback path
///
/// Accepts either a JSON body (`text`, optional `media` reference from a prior
/// upload) or a multipart form with a `text` field and an `image`/`video`
/// file part stored through the media boundary.
///
/// # Response
/// - 201 Created: the persisted message, identical to the event-channel ack
/// - 400 Bad Request: empty payload
/// - 403 Forbidden: sender is not part of the conversation
/// - 503 Service Unavailable: persistence timed out; the client may retry
async fn send_message(
    State(state): State<MessagesState>,
    identity: Identity,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<impl IntoResponse> {
    let conversation = parse_conversation(&id)?;

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let outgoing = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::Multipart(e.to_string()))?;
        read_multipart(multipart, state.media.as_ref()).await?
    } else {
        let Json(body) = Json::<SendMessageRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::InvalidBody(e.to_string()))?;
        OutgoingMessage {
            text: body.text,
            media: body.media,
        }
    };

    let message = state
        .delivery
        .send(identity.user_id, conversation, outgoing)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Delete messages
///
/// # Response
/// - 200 OK: the ids actually deleted (non-admins only delete their own)
async fn delete_messages(
    State(state): State<MessagesState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(body): Json<DeleteMessagesRequest>,
) -> ApiResult<Json<DeleteMessagesResponse>> {
    let conversation = parse_conversation(&id)?;

    let deleted = state
        .delivery
        .delete(identity.user_id, conversation, &body.message_ids)
        .await?;

    Ok(Json(DeleteMessagesResponse { deleted }))
}

/// Mark messages read
///
/// # Response
/// - 200 OK: the ids that actually transitioned (re-marking returns empty)
async fn mark_read(
    State(state): State<MessagesState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(body): Json<MarkReadRequest>,
) -> ApiResult<Json<MarkReadResponse>> {
    let conversation = parse_conversation(&id)?;

    let receipts = state
        .delivery
        .mark_read(identity.user_id, conversation, &body.message_ids)
        .await?;

    Ok(Json(MarkReadResponse {
        read: receipts.into_iter().map(|r| r.message_id).collect(),
    }))
}

/// Read a multipart send request: a `text` field plus one optional
/// `image`/`video` file part
async fn read_multipart(
    mut multipart: Multipart,
    media_store: &dyn MediaStore,
) -> ApiResult<OutgoingMessage> {
    let mut text = None;
    let mut media: Option<MediaRef> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "text" => {
                text = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Multipart(e.to_string()))?,
                );
            }
            "image" | "video" | "media" => {
                if media.is_some() {
                    return Err(ApiError::Multipart(
                        "only one attachment per message".into(),
                    ));
                }

                let kind = attachment_kind(&name, field.content_type())?;
                let file_name = field.file_name().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?;

                media = Some(
                    media_store
                        .save(kind, file_name.as_deref(), &bytes)
                        .await?,
                );
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(OutgoingMessage { text, media })
}

/// Resolve the attachment kind from the field name or content type
fn attachment_kind(field_name: &str, content_type: Option<&str>) -> ApiResult<MediaKind> {
    match field_name {
        "image" => Ok(MediaKind::Image),
        "video" => Ok(MediaKind::Video),
        _ => match content_type {
            Some(ct) if ct.starts_with("image/") => Ok(MediaKind::Image),
            Some(ct) if ct.starts_with("video/") => Ok(MediaKind::Video),
            other => Err(ApiError::Multipart(format!(
                "unsupported media content type: {}",
                other.unwrap_or("missing")
            ))),
        },
    }
}
