//! Mock LLM service for testing
//!
//! Replays scripted chunk sequences without any network I/O.

use super::{Chunk, ChunkStream, GenerateRequest, LlmError, LlmService};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

enum Script {
    Stream {
        items: Vec<Result<Chunk, LlmError>>,
        gate: Option<oneshot::Receiver<()>>,
    },
    OpenError(LlmError),
}

/// Mock LLM service that returns queued streams
pub struct MockLlmService {
    scripts: Mutex<VecDeque<Script>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<GenerateRequest>>,
}

#[allow(dead_code)]
impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a stream that yields the given chunks and then ends
    pub fn queue_chunks(&self, chunks: Vec<Chunk>) {
        self.queue_items(chunks.into_iter().map(Ok).collect());
    }

    /// Queue a stream of arbitrary items, including mid-stream errors
    pub fn queue_items(&self, items: Vec<Result<Chunk, LlmError>>) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Stream { items, gate: None });
    }

    /// Queue a stream that yields nothing until the returned sender fires
    pub fn queue_gated(&self, chunks: Vec<Chunk>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.scripts.lock().unwrap().push_back(Script::Stream {
            items: chunks.into_iter().map(Ok).collect(),
            gate: Some(rx),
        });
        tx
    }

    /// Queue a failure when opening the stream
    pub fn queue_error(&self, error: LlmError) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::OpenError(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn generate(&self, request: &GenerateRequest) -> Result<ChunkStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::OpenError(LlmError::network("No mock response queued")));

        match script {
            Script::OpenError(e) => Err(e),
            Script::Stream { items, gate } => {
                let items = futures::stream::iter(items);
                match gate {
                    None => Ok(items.boxed()),
                    Some(rx) => Ok(futures::stream::once(async move {
                        let _ = rx.await;
                        items
                    })
                    .flatten()
                    .boxed()),
                }
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
