//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::{sse_stream, DisconnectGuard};
use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, InstructionRequest, ModelResponse, SessionSnapshot,
    SuccessResponse,
};
use super::AppState;
use crate::runtime::{Session, TurnError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the page
        .route("/", get(serve_page))
        // Static assets
        .route("/assets/*path", get(serve_static))
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/close", post(close_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/instruction", post(apply_instruction))
        // Model info
        .route("/api/model", get(get_model))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Page
// ============================================================

async fn serve_page() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let session = state.sessions.create().await;
    Json(snapshot(&state, &session))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = lookup(&state, &id).await?;
    Ok(Json(snapshot(&state, &session)))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    validate_id(&id)?;
    let success = state.sessions.remove(&id).await;
    Ok(Json(SuccessResponse { success }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = lookup(&state, &id).await?;

    // Subscribe to updates
    let (session_state, broadcast_rx) = session.subscribe_with_state();
    let init = SessionSnapshot::new(
        session.id(),
        session_state,
        session.is_turn_pending(),
        state.turns.model_id(),
    );
    let guard = DisconnectGuard::new(Arc::clone(&state.sessions), session.id());

    tracing::debug!(session_id = %id, "SSE subscriber connected");

    Ok(sse_stream(init, broadcast_rx, guard))
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let session = lookup(&state, &id).await?;

    // The reply streams to subscribers; this request returns right away
    match state.turns.handle_user_turn(&session, &req.text) {
        Ok(turn) => Ok(Json(ChatResponse {
            queued: turn.is_some(),
        })),
        Err(e @ TurnError::Busy) => Err(AppError::Conflict(e.to_string())),
    }
}

async fn apply_instruction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InstructionRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = lookup(&state, &id).await?;
    session.apply_new_instruction(req.instruction);
    tracing::info!(session_id = %id, "Persona applied, transcript reset");
    Ok(Json(snapshot(&state, &session)))
}

// ============================================================
// Model Info
// ============================================================

async fn get_model(State(state): State<AppState>) -> Json<ModelResponse> {
    Json(ModelResponse {
        model: state.turns.model_id().to_string(),
    })
}

async fn get_version() -> &'static str {
    concat!("gemini-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Helpers
// ============================================================

fn validate_id(id: &str) -> Result<(), AppError> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| AppError::BadRequest("Invalid session id".to_string()))
}

/// Resolve a live session. Unknown ids are never created here: the page
/// starts a new session when it sees the 404.
async fn lookup(state: &AppState, id: &str) -> Result<Arc<Session>, AppError> {
    validate_id(id)?;
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
}

fn snapshot(state: &AppState, session: &Session) -> SessionSnapshot {
    SessionSnapshot::new(
        session.id(),
        session.state(),
        session.is_turn_pending(),
        state.turns.model_id(),
    )
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
