//! HTTP API for the chat page

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::{SessionManager, TurnController};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub turns: Arc<TurnController>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, turns: Arc<TurnController>) -> Self {
        Self { sessions, turns }
    }
}
