//! API request and response types

use crate::session::{Message, SessionState};
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Request to replace the persona instruction
#[derive(Debug, Deserialize)]
pub struct InstructionRequest {
    pub instruction: String,
}

/// Full view of one session, sent on load and as the SSE `init` event
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub instruction: String,
    pub messages: Vec<Message>,
    pub turn_pending: bool,
    pub model: String,
}

impl SessionSnapshot {
    pub fn new(id: &str, state: SessionState, turn_pending: bool, model: &str) -> Self {
        Self {
            id: id.to_string(),
            instruction: state.instruction,
            messages: state.transcript,
            turn_pending,
            model: model.to_string(),
        }
    }
}

/// Response for chat action
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// False when the prompt was blank and nothing happened
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Model shown in the sidebar
#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub model: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
