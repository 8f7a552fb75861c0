//! HTTP route handlers for the confab API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use confab_ai::ChatMessage;
use confab_chat::{Attachment, ChatEvent, ChatStore, StoreError};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chats", get(list_chats).post(create_chat))
        .route("/api/chats/{name}", delete(delete_chat))
        .route("/api/chats/{name}/select", post(select_chat))
        .route("/api/active/clear", post(clear_active))
        .route("/api/export", get(export_history))
        .route("/api/models", get(list_models))
        .route("/api/respond", post(respond))
        .fallback_service(ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "confab",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// One chat in the sidebar listing.
#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub name: String,
    pub message_count: usize,
}

/// Snapshot of the store the page renders from.
#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    /// Chats in creation order
    pub chats: Vec<ChatSummary>,
    /// Name of the active chat
    pub active: String,
    /// Messages of the active chat
    pub messages: Vec<ChatMessage>,
}

fn snapshot(store: &ChatStore) -> ChatsResponse {
    ChatsResponse {
        chats: store
            .chats()
            .iter()
            .map(|c| ChatSummary {
                name: c.name().to_string(),
                message_count: c.messages().len(),
            })
            .collect(),
        active: store.active_name().to_string(),
        messages: store.active_messages().to_vec(),
    }
}

fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match e {
        StoreError::InvalidName => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::ProtectedChat => StatusCode::CONFLICT,
    };
    (status, e.to_string())
}

/// List chats and the active conversation.
async fn list_chats(State(state): State<Arc<AppState>>) -> Json<ChatsResponse> {
    let store = state.store.lock().await;
    Json(snapshot(&store))
}

/// Chat creation request.
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    /// Name of the chat to create
    pub name: String,
}

/// Create a chat and make it active.
async fn create_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateChatRequest>,
) -> Result<Json<ChatsResponse>, (StatusCode, String)> {
    let mut store = state.store.lock().await;
    store.create_chat(&request.name).map_err(store_error)?;
    Ok(Json(snapshot(&store)))
}

/// Delete a chat by name.
async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ChatsResponse>, (StatusCode, String)> {
    let mut store = state.store.lock().await;
    store.delete_chat(&name).map_err(store_error)?;
    Ok(Json(snapshot(&store)))
}

/// Make a chat active.
async fn select_chat(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ChatsResponse>, (StatusCode, String)> {
    let mut store = state.store.lock().await;
    store.select_chat(&name).map_err(store_error)?;
    Ok(Json(snapshot(&store)))
}

/// Clear the active chat's history.
async fn clear_active(State(state): State<Arc<AppState>>) -> Json<ChatsResponse> {
    let mut store = state.store.lock().await;
    store.clear_active();
    Json(snapshot(&store))
}

/// Download the whole store as a JSON file.
async fn export_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store.lock().await;
    let body = store.export_all();
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"chat_history.json\"",
            ),
        ],
        body,
    )
}

/// List models installed on the backend.
async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let models = state
        .ollama
        .list_models()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("Model server error: {e}")))?;

    Ok(Json(serde_json::json!({ "models": models })))
}

/// An uploaded file, base64-encoded for JSON transport.
#[derive(Debug, Deserialize)]
pub struct AttachmentDto {
    /// Original filename, used for MIME guessing when `mime` is absent
    pub name: Option<String>,
    /// Base64-encoded file bytes
    pub data: String,
    /// Declared MIME type
    pub mime: Option<String>,
}

/// Question submission.
#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    /// The user's question
    pub message: String,
    /// Optional file attachment used as context
    pub attachment: Option<AttachmentDto>,
}

fn decode_attachment(dto: AttachmentDto) -> Result<Attachment, (StatusCode, String)> {
    let bytes = BASE64_STANDARD.decode(dto.data.as_bytes()).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Invalid attachment encoding: {e}"),
        )
    })?;

    let mime = dto
        .mime
        .filter(|m| !m.is_empty())
        .or_else(|| {
            dto.name.as_deref().map(|n| {
                mime_guess::from_path(n)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            })
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(Attachment::new(bytes, mime))
}

fn sse_event(event: &ChatEvent) -> Event {
    let name = match event {
        ChatEvent::TurnStart { .. } => "turn_start",
        ChatEvent::Warning { .. } => "warning",
        ChatEvent::Delta { .. } => "delta",
        ChatEvent::TurnEnd { .. } => "turn_end",
        ChatEvent::Error { .. } => "error",
    };
    match Event::default().event(name).json_data(event) {
        Ok(e) => e,
        Err(e) => Event::default()
            .event("error")
            .data(format!("event serialization failed: {e}")),
    }
}

/// Submit a question and stream the reply back as server-sent events.
///
/// The turn runs on its own task; this handler relays its events. Closing
/// the SSE connection aborts the turn, which discards the partial reply
/// without committing it.
async fn respond(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RespondRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    if request.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Message must not be empty".to_string(),
        ));
    }

    let attachment = request.attachment.map(decode_attachment).transpose()?;

    // Subscribe before spawning so no event is missed.
    let mut events = state.responder.subscribe();
    let cancel = CancellationToken::new();

    let task_state = state.clone();
    let task_cancel = cancel.clone();
    let message = request.message;
    tokio::spawn(async move {
        let mut store = task_state.store.lock().await;
        if let Err(e) = task_state
            .responder
            .respond(&mut store, &message, attachment.as_ref(), &task_cancel)
            .await
        {
            // Already surfaced to the page as a terminal error event.
            tracing::warn!("turn failed: {e}");
        }
    });

    let stream = async_stream::stream! {
        // Dropping the guard (client gone or stream finished) aborts the turn.
        let _guard = cancel.drop_guard();

        loop {
            match events.recv().await {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    yield Ok(sse_event(&event));
                    if terminal {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "SSE relay lagged behind turn events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
