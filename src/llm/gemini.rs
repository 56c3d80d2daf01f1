//! Google Gemini provider implementation
//!
//! Uses the REST `streamGenerateContent` endpoint with `alt=sse`, so each
//! SSE event carries one partial `GenerateContentResponse`.

use super::sse::response_data_events;
use super::types::{Chunk, ChunkStream, GenerateRequest};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    url: String,
    model_id: String,
}

impl GeminiService {
    pub fn new(
        api_key: String,
        model: &str,
        api_base: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base = api_base.trim_end_matches('/');
        let url = format!("{base}/models/{model}:streamGenerateContent?alt=sse");

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url,
            model_id: model.to_string(),
        })
    }

    /// The instruction travels as the first part of the single user turn,
    /// followed by the prompt.
    fn translate_request(request: &GenerateRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![
                    GeminiPart {
                        text: Some(request.instruction.clone()),
                    },
                    GeminiPart {
                        text: Some(request.prompt.clone()),
                    },
                ],
            }],
        }
    }

    /// Parse one SSE payload into a chunk.
    ///
    /// Only the first part of the first candidate contributes text; payloads
    /// without candidates or parts (usage metadata, finish markers) become
    /// empty chunks.
    pub(crate) fn parse_chunk(data: &str) -> Result<Chunk, LlmError> {
        let resp: GeminiStreamResponse = serde_json::from_str(data).map_err(|e| {
            tracing::debug!(body = %data, "Unparseable stream payload");
            LlmError::unknown(format!("Failed to parse stream payload: {e}"))
        })?;

        if let Some(error) = resp.error {
            return Err(provider_error(error));
        }

        let text = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text);

        Ok(Chunk { text })
    }
}

fn provider_error(error: GeminiError) -> LlmError {
    match error.code.and_then(|c| u16::try_from(c).ok()) {
        Some(code) => LlmError::from_status(code, error.message),
        None => LlmError::provider(error.message),
    }
}

/// Classify a failure while reading the response body
fn stream_error(e: &std::io::Error) -> LlmError {
    let timed_out = e.kind() == std::io::ErrorKind::TimedOut
        || e.get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);
    if timed_out {
        LlmError::timeout(format!("Stream timed out: {e}"))
    } else {
        LlmError::network(format!("Stream interrupted: {e}"))
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn generate(&self, request: &GenerateRequest) -> Result<ChunkStream, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

            // Parse error response
            if let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(&body) {
                return Err(LlmError::from_status(status.as_u16(), error_resp.error.message));
            }
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let chunks = response_data_events(response).map(|event| match event {
            Ok(data) => Self::parse_chunk(&data),
            Err(e) => Err(stream_error(&e)),
        });

        Ok(chunks.boxed())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// Non-text parts (function calls, inline data) deserialize with `text: None`
#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    code: Option<i64>,
    #[allow(dead_code)]
    status: Option<String>,
}
