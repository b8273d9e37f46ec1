//! HTTP route handlers for the chat API.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::chat::{
    ChatError, ChatService, ConversationKey, ConversationSummary, FeedEvent, Message,
    ParticipantId, Session,
};

use super::state::AppState;

type ApiError = (StatusCode, String);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/conversations", get(list_conversations))
        .route(
            "/api/conversations/{other}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/conversations/{other}/feed", get(message_feed))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "rehomebud-chat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Conversation list entry, seen from the caller's side.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationDto {
    /// Conversation key.
    pub key: ConversationKey,
    /// The participant on the other side.
    pub other: ParticipantId,
    /// Preview of the latest message.
    pub last_message: String,
    /// Time of the latest summary write.
    pub updated_at: DateTime<Utc>,
}

impl ConversationDto {
    fn from_summary(summary: ConversationSummary, me: &ParticipantId) -> Self {
        let other = summary
            .other_participant(me)
            .unwrap_or(me)
            .clone();
        Self {
            key: summary.key,
            other,
            last_message: summary.last_message,
            updated_at: summary.updated_at,
        }
    }
}

/// Send message request.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Message text.
    pub text: String,
}

/// Payload of a `stale` feed event.
#[derive(Debug, Serialize)]
struct StaleDto<'a> {
    error: &'a str,
    retry_in_ms: u64,
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    state
        .auth
        .authenticate(headers)
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, "not signed in".to_string()))
}

fn parse_participant(raw: &str) -> Result<ParticipantId, ApiError> {
    ParticipantId::new(raw)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid participant: {e}")))
}

fn store_error(err: &ChatError) -> ApiError {
    if err.is_transient() {
        (StatusCode::SERVICE_UNAVAILABLE, format!("Store unavailable: {err}"))
    } else {
        tracing::error!("Chat store error: {err}");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Store error: {err}"))
    }
}

/// List the caller's conversations, most recent first.
async fn list_conversations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let session = authenticate(&state, &headers)?;
    let summaries = state
        .chat
        .conversations(&session)
        .await
        .map_err(|e| store_error(&e))?;

    let me = session.principal();
    Ok(Json(
        summaries
            .into_iter()
            .map(|summary| ConversationDto::from_summary(summary, me))
            .collect(),
    ))
}

/// One-shot read of the conversation with `other`.
async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(other): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let session = authenticate(&state, &headers)?;
    let other = parse_participant(&other)?;
    let key = ChatService::conversation_key(&session, &other);

    let messages = state.chat.history(&key).await.map_err(|e| store_error(&e))?;
    Ok(Json(messages))
}

/// Send a message to `other`.
///
/// `201` with the stored message, or `204` when the text is blank.
async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(other): Path<String>,
    Json(request): Json<SendRequest>,
) -> Result<Response, ApiError> {
    let session = authenticate(&state, &headers)?;
    let other = parse_participant(&other)?;

    let sent = state
        .chat
        .send_as(&session, &other, &request.text)
        .await
        .map_err(|e| store_error(&e))?;

    Ok(match sent {
        Some(message) => (StatusCode::CREATED, Json(message)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Follow the conversation with `other` as server-sent events.
///
/// Every change yields a `snapshot` event carrying the full ordered list.
/// Read failures yield `stale` events while the feed retries. The feed is
/// cancelled when the client disconnects.
async fn message_feed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(other): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = authenticate(&state, &headers)?;
    let other = parse_participant(&other)?;
    let key = ChatService::conversation_key(&session, &other);

    tracing::debug!(conversation = %key, "Opening feed stream");
    let feed = state.chat.subscribe(&key);
    let events = feed
        .filter_map(|event| async move { convert_event(&event) })
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(20))))
}

fn convert_event(event: &FeedEvent) -> Option<Event> {
    let (name, data) = match event {
        FeedEvent::Snapshot(messages) => ("snapshot", serde_json::to_string(messages.as_ref())),
        FeedEvent::Stale { error, retry_in } => (
            "stale",
            serde_json::to_string(&StaleDto {
                error,
                retry_in_ms: u64::try_from(retry_in.as_millis()).unwrap_or(u64::MAX),
            }),
        ),
    };
    match data {
        Ok(data) => Some(Event::default().event(name).data(data)),
        Err(err) => {
            tracing::warn!("Dropping unserializable feed event: {err}");
            None
        }
    }
}
