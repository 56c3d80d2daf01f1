//! Session state types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Persona used until the user applies their own
pub const DEFAULT_INSTRUCTION: &str =
    "You are a helpful AI assistant that provides concise and relevant answers.";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[cfg(test)]
    pub fn role(&self) -> Role {
        self.role
    }

    #[cfg(test)]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Transcript plus the active persona instruction
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub transcript: Vec<Message>,
    pub instruction: String,
}

impl SessionState {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            transcript: Vec::new(),
            instruction: instruction.into(),
        }
    }
}
