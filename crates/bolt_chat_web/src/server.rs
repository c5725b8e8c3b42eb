//! HTTP + WebSocket listener. `GET /` serves the page, `GET /healthz` answers
//! `ok`, and a WebSocket upgrade on `/ws` starts a chat session.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::commands::{self, AppState, Incoming};
use crate::protocol::{ClientMessage, ServerMessage};

/// The single-page UI.
pub const INDEX_HTML: &str = include_str!("../static/index.html");

const MAX_HEAD_BYTES: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Request line and headers of an HTTP/1.1 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn parse(head: &str) -> Option<Self> {
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let target = request_line.next()?;
        let path = target.split('?').next().unwrap_or(target).to_string();
        let headers = lines
            .take_while(|l| !l.is_empty())
            .filter_map(|l| {
                let (name, value) = l.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();
        Some(Self {
            method,
            path,
            headers,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_websocket_upgrade(&self) -> bool {
        let upgrade = self
            .header("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        let connection = self.header("connection").is_some_and(|v| {
            v.split(',')
                .any(|t| t.trim().eq_ignore_ascii_case("upgrade"))
        });
        upgrade && connection && self.header("sec-websocket-key").is_some()
    }
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                log::warn!("connection {} error: {}", addr, e);
            }
        });
    }
}

async fn respond(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &str,
) -> Result<(), ConnectionError> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body,
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Handshake callback: only `/ws` is a session endpoint.
fn accept_session_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == "/ws" {
        return Ok(response);
    }
    let mut rejection = ErrorResponse::new(Some("not found".to_string()));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<AppState>,
) -> Result<(), ConnectionError> {
    // Peek so an upgrade request reaches the handshake with every byte intact,
    // including frames the client pipelined behind it.
    let mut peek_buf = vec![0u8; MAX_HEAD_BYTES];
    let peeked = stream.peek(&mut peek_buf).await?;
    if peeked == 0 {
        return Ok(());
    }
    let head = RequestHead::parse(&String::from_utf8_lossy(&peek_buf[..peeked]));

    if head.as_ref().is_some_and(RequestHead::is_websocket_upgrade) {
        let ws = tokio_tungstenite::accept_hdr_async(stream, accept_session_path).await?;
        handle_socket(ws, state).await;
        return Ok(());
    }

    // Plain HTTP: consume what was peeked; the connection closes after one response.
    let consumed = stream.read(&mut peek_buf).await?;
    let request = match RequestHead::parse(&String::from_utf8_lossy(&peek_buf[..consumed])) {
        Some(r) => r,
        None => {
            return respond(&mut stream, "400 Bad Request", "text/plain", "bad request").await;
        }
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") | ("GET", "/index.html") => {
            respond(&mut stream, "200 OK", "text/html; charset=utf-8", INDEX_HTML).await
        }
        ("GET", "/healthz") => respond(&mut stream, "200 OK", "text/plain", "ok").await,
        ("GET", "/ws") => {
            respond(&mut stream, "426 Upgrade Required", "text/plain", "websocket only").await
        }
        _ => respond(&mut stream, "404 Not Found", "text/plain", "not found").await,
    }
}

fn decode(frame: Result<Message, tokio_tungstenite::tungstenite::Error>) -> Incoming {
    match frame {
        Ok(Message::Text(text)) => match ClientMessage::from_json(&text) {
            Ok(command) => Incoming::Command(command),
            Err(message) => Incoming::Invalid(message),
        },
        Ok(Message::Close(_)) => Incoming::Closed,
        Ok(_) => Incoming::Ignored,
        Err(e) => {
            log::debug!("websocket read error: {}", e);
            Incoming::Closed
        }
    }
}

/// Run one chat session over an accepted WebSocket.
async fn handle_socket(ws: WebSocketStream<TcpStream>, state: Arc<AppState>) {
    log::info!("session opened");
    let (mut sink, source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    log::error!("failed to encode {:?}: {}", msg, e);
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    commands::run_session(source.map(decode), tx, &state).await;

    // The session dropped its senders; the writer flushes what is queued and closes.
    let _ = writer.await;
    log::info!("session closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE: &str = "GET /ws?x=1 HTTP/1.1\r\nHost: localhost\r\nUpgrade: WebSocket\r\nConnection: keep-alive, Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn parses_request_line_and_headers() {
        let head = RequestHead::parse(UPGRADE).unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.path, "/ws");
        assert_eq!(head.header("host"), Some("localhost"));
        assert_eq!(
            head.header("SEC-WEBSOCKET-KEY"),
            Some("dGhlIHNhbXBsZSBub25jZQ==")
        );
        assert!(head.is_websocket_upgrade());
    }

    #[test]
    fn plain_get_is_not_an_upgrade() {
        let head = RequestHead::parse("GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(head.path, "/");
        assert!(!head.is_websocket_upgrade());
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(RequestHead::parse("").is_none());
        assert!(RequestHead::parse("GET\r\n\r\n").is_none());
    }

    fn request_for(path: &str) -> Request {
        Request::builder().uri(path).body(()).unwrap()
    }

    #[test]
    fn handshake_accepts_only_the_session_path() {
        assert!(accept_session_path(&request_for("/ws"), Response::new(())).is_ok());
        assert!(accept_session_path(&request_for("/ws?reconnect=1"), Response::new(())).is_ok());

        let rejected = accept_session_path(&request_for("/chat"), Response::new(())).unwrap_err();
        assert_eq!(rejected.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn page_talks_to_the_session_socket() {
        assert!(INDEX_HTML.contains("/ws"));
        assert!(INDEX_HTML.contains("chat_log.txt") || INDEX_HTML.contains("file_name"));
        assert!(INDEX_HTML.contains("stream_chunk"));
    }

    /// Body of the page's `case '<kind>':` branch, up to its `break;`.
    fn page_branch(kind: &str) -> &'static str {
        let label = format!("case '{}':", kind);
        let start = INDEX_HTML.find(&label).unwrap() + label.len();
        let len = INDEX_HTML[start..].find("break;").unwrap();
        &INDEX_HTML[start..start + len]
    }

    #[test]
    fn page_unlocks_input_only_when_a_turn_ends() {
        for kind in ["links", "stream_error", "stream_cancelled", "prompt_skipped"] {
            assert!(page_branch(kind).contains("setStreaming(false)"), "{}", kind);
        }
        assert!(!page_branch("error").contains("setStreaming"));
    }
}
