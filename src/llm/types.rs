//! Common types for LLM interactions

use super::LlmError;
use futures::stream::BoxStream;

/// Generation request: the active persona plus the latest prompt.
///
/// Earlier turns of the transcript are deliberately absent; the model only
/// ever sees the current instruction and the current prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub instruction: String,
    pub prompt: String,
}

impl GenerateRequest {
    pub fn new(instruction: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            prompt: prompt.into(),
        }
    }
}

/// One unit of a streamed response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    /// Text fragment, absent for terminal or metadata-only chunks
    pub text: Option<String>,
}

#[cfg(test)]
impl Chunk {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            text: Some(s.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }
}

/// Finite, forward-only stream of response chunks
pub type ChunkStream = BoxStream<'static, Result<Chunk, LlmError>>;
