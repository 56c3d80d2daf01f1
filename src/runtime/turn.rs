//! One request/response turn
//!
//! A turn appends the user message, streams the reply for
//! (instruction, prompt), publishes partial text as it arrives and appends
//! the assistant message once the stream is exhausted. Failures are
//! reported to the view and leave the user message in place.

use super::accumulate::Accumulator;
use super::Session;
use crate::llm::{GenerateRequest, LlmError, LlmService};
use crate::session::{Message, SessionEvent};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors that prevent a turn from starting
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("A reply is still being generated for this session")]
    Busy,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply appended to the transcript
    Completed { content: String },
    /// The call failed; `message` is what the user was shown
    Failed { message: String },
    /// The persona changed mid-turn, so the reply was dropped
    Superseded,
}

/// Orchestrates turns against the generation capability
pub struct TurnController {
    llm: Arc<dyn LlmService>,
}

impl TurnController {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Run one turn for `prompt`.
    ///
    /// Blank prompts are ignored and return `Ok(None)`. Otherwise the user
    /// message is appended before this returns and the reply streams on a
    /// spawned task, whose handle resolves to the outcome. A session with a
    /// turn already pending rejects the prompt with [`TurnError::Busy`].
    pub fn handle_user_turn(
        self: &Arc<Self>,
        session: &Arc<Session>,
        prompt: &str,
    ) -> Result<Option<JoinHandle<TurnOutcome>>, TurnError> {
        if prompt.trim().is_empty() {
            return Ok(None);
        }
        let permit = session.try_claim_turn()?;

        let (generation, instruction) = session.begin_turn(prompt);
        session.publish(SessionEvent::TurnStarted);
        tracing::info!(session_id = %session.id(), "Turn started");

        let request = GenerateRequest::new(instruction, prompt);
        let controller = Arc::clone(self);
        let session = Arc::clone(session);

        Ok(Some(tokio::spawn(async move {
            let outcome = controller.complete(&session, generation, &request).await;
            log_outcome(session.id(), &outcome);

            // Release the slot before announcing, so snapshots taken on
            // `turn_finished` no longer report a pending turn
            drop(permit);
            session.publish(SessionEvent::TurnFinished);
            outcome
        })))
    }

    async fn complete(
        &self,
        session: &Session,
        generation: u64,
        request: &GenerateRequest,
    ) -> TurnOutcome {
        match self.stream_reply(session, generation, request).await {
            Ok(content) => {
                if session.append_if_current(generation, Message::assistant(content.clone())) {
                    TurnOutcome::Completed { content }
                } else {
                    TurnOutcome::Superseded
                }
            }
            Err(e) => {
                let message = describe_failure(&e);
                session.publish(SessionEvent::TurnFailed {
                    message: message.clone(),
                });
                TurnOutcome::Failed { message }
            }
        }
    }

    async fn stream_reply(
        &self,
        session: &Session,
        generation: u64,
        request: &GenerateRequest,
    ) -> Result<String, LlmError> {
        let mut stream = self.llm.generate(request).await?;
        let mut acc = Accumulator::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if acc.push(&chunk) && session.generation() == generation {
                session.publish(SessionEvent::Partial {
                    content: acc.text().to_string(),
                });
            }
        }

        Ok(acc.into_text())
    }
}

fn log_outcome(session_id: &str, outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed { content } => {
            tracing::info!(session_id = %session_id, reply_len = content.len(), "Turn completed");
        }
        TurnOutcome::Failed { message } => {
            tracing::warn!(session_id = %session_id, error = %message, "Turn failed");
        }
        TurnOutcome::Superseded => {
            tracing::info!(session_id = %session_id, "Persona changed during turn, dropping reply");
        }
    }
}

/// User-facing annotation of a failed turn
pub fn describe_failure(error: &LlmError) -> String {
    if error.kind.is_provider_reported() {
        format!("API Error: {}", error.message)
    } else {
        format!("Unexpected Error: {}", error.message)
    }
}
