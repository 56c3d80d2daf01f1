//! Events pushed to the view whenever session state changes

use super::Message;
use serde::Serialize;

/// Incremental update for subscribers of one session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A message was appended to the transcript
    Message { message: Message },
    /// The persona changed and the transcript was cleared
    Reset { instruction: String },
    /// A turn is now pending
    TurnStarted,
    /// Reply text accumulated so far
    Partial { content: String },
    /// The pending turn failed; no reply was appended
    TurnFailed { message: String },
    /// The pending turn is over, successfully or not
    TurnFinished,
}

impl SessionEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Message { .. } => "message",
            SessionEvent::Reset { .. } => "reset",
            SessionEvent::TurnStarted => "turn_started",
            SessionEvent::Partial { .. } => "partial",
            SessionEvent::TurnFailed { .. } => "turn_failed",
            SessionEvent::TurnFinished => "turn_finished",
        }
    }
}
