//! Chat completions wire types (OpenAI-compatible). Client ↔ provider JSON.

use serde::{Deserialize, Serialize};

use crate::transcript::Turn;

/// Client → provider: streaming chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Turn],
    pub stream: bool,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [Turn]) -> Self {
        Self {
            model,
            messages,
            stream: true,
        }
    }
}

/// Provider → client: one streamed `chat.completion.chunk`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Provider → client: `{"error": {...}}` body, in an HTTP error response or
/// inside the event stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

/// One decoded `data:` payload from the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Text to append to the reply. Empty deltas are not reported.
    Delta(String),
    /// A chunk that carried no text (role announcement, finish reason).
    Empty,
    /// The provider reported an error mid-stream.
    Error(String),
    /// `[DONE]` sentinel.
    Done,
}

impl ProviderEvent {
    pub fn from_data(data: &str) -> Result<Self, String> {
        let data = data.trim();
        if data == "[DONE]" {
            return Ok(ProviderEvent::Done);
        }
        let value: serde_json::Value = serde_json::from_str(data).map_err(|e| e.to_string())?;
        if value.get("error").is_some() {
            let envelope: ErrorEnvelope =
                serde_json::from_value(value).map_err(|e| e.to_string())?;
            return Ok(ProviderEvent::Error(envelope.error.message));
        }
        let chunk: CompletionChunk = serde_json::from_value(value).map_err(|e| e.to_string())?;
        let text = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .unwrap_or_default();
        if text.is_empty() {
            Ok(ProviderEvent::Empty)
        } else {
            Ok(ProviderEvent::Delta(text))
        }
    }
}

/// Best-effort message from an HTTP error body; falls back to the raw text.
pub fn error_message_from_body(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    }
}
