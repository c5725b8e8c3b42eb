//! Streaming chat completions client: send the transcript, receive the reply
//! as a lazy sequence of text fragments decoded from server-sent events.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream};
use futures_util::StreamExt;

use crate::config::ApiSettings;
use crate::messages::{self, CompletionRequest, ProviderEvent};
use crate::sse::SseDecoder;
use crate::transcript::Turn;

/// Reply fragments in arrival order. Ends when the provider signals completion;
/// an `Err` item ends the reply early.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Failure of a streaming completion call, before or during the stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("provider error: {0}")]
    Provider(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Transport(e.to_string())
    }
}

/// Anything that can turn a transcript into a stream of reply fragments.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Start a completion over the full transcript (system turn included).
    async fn stream_completion(&self, turns: &[Turn]) -> Result<FragmentStream, CompletionError>;
}

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl CompletionClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionSource for CompletionClient {
    async fn stream_completion(&self, turns: &[Turn]) -> Result<FragmentStream, CompletionError> {
        log::info!(
            "completion request to {} model={} turns={}",
            self.endpoint,
            self.model,
            turns.len()
        );
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest::new(&self.model, turns))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = messages::error_message_from_body(&body);
            log::warn!("completion request failed with {}: {}", status, message);
            let status = status.as_u16();
            return Err(match status {
                401 | 403 => CompletionError::Auth { status, message },
                _ => CompletionError::Api { status, message },
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Ok(fragments(body))
    }
}

struct EventReader {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl EventReader {
    /// Queue the text of each payload; stops at `[DONE]`.
    fn decode(&mut self, payloads: Vec<String>) -> Result<(), CompletionError> {
        for data in payloads {
            if self.finished {
                break;
            }
            match ProviderEvent::from_data(&data).map_err(CompletionError::Malformed)? {
                ProviderEvent::Delta(text) => self.pending.push_back(text),
                ProviderEvent::Empty => {}
                ProviderEvent::Error(message) => return Err(CompletionError::Provider(message)),
                ProviderEvent::Done => self.finished = true,
            }
        }
        Ok(())
    }
}

fn fragments(body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>) -> FragmentStream {
    let reader = EventReader {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    let stream = stream::try_unfold(reader, |mut reader| async move {
        loop {
            if let Some(fragment) = reader.pending.pop_front() {
                return Ok(Some((fragment, reader)));
            }
            if reader.finished {
                return Ok(None);
            }
            match reader.body.next().await {
                Some(Ok(bytes)) => {
                    let payloads = reader.decoder.push(&bytes);
                    reader.decode(payloads)?;
                }
                Some(Err(e)) => return Err(CompletionError::Transport(e.to_string())),
                None => {
                    let tail = reader.decoder.finish().into_iter().collect();
                    reader.decode(tail)?;
                    reader.finished = true;
                }
            }
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(chunks: Vec<&'static str>) -> BoxStream<'static, Result<Vec<u8>, reqwest::Error>> {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec()))).boxed()
    }

    async fn collect(chunks: Vec<&'static str>) -> Vec<Result<String, CompletionError>> {
        fragments(body_of(chunks)).collect().await
    }

    #[tokio::test]
    async fn fragments_in_arrival_order() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"lo!\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;
        assert_eq!(out, vec![Ok("Hel".to_string()), Ok("lo!".to_string())]);
    }

    #[tokio::test]
    async fn nothing_after_done_is_read() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ])
        .await;
        assert_eq!(out, vec![Ok("a".to_string())]);
    }

    #[tokio::test]
    async fn end_of_body_without_done_ends_normally() {
        let out = collect(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}"]).await;
        assert_eq!(out, vec![Ok("x".to_string())]);
    }

    #[tokio::test]
    async fn in_stream_error_ends_with_err() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"part\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n\n",
        ])
        .await;
        assert_eq!(
            out,
            vec![
                Ok("part".to_string()),
                Err(CompletionError::Provider("overloaded".into()))
            ]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_reported() {
        let out = collect(vec!["data: {oops\n\n"]).await;
        assert!(matches!(out.as_slice(), [Err(CompletionError::Malformed(_))]));
    }

    #[test]
    fn error_display_includes_cause() {
        let e = CompletionError::Auth {
            status: 401,
            message: "Invalid API Key".into(),
        };
        assert!(e.to_string().contains("Invalid API Key"));
    }
}
