//! WebSocket message types between the page and the server. JSON objects with a
//! `type` discriminator.

use bolt_chat_client::{Links, Turn};
use serde::{Deserialize, Serialize};

/// Page → server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Submit { prompt: String },
    Clear,
    Export,
    Cancel,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("invalid message: {}", e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Thinking,
    Complete,
}

/// Server → page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full conversation (system turn excluded); sent on connect and after clear.
    History { turns: Vec<Turn> },
    UserTurn { content: String },
    Status { state: StatusState },
    /// `display` is the reply so far with the streaming cursor appended.
    StreamChunk { chunk: String, display: String },
    StreamEnd { content: String },
    /// The turn failed; nothing was committed and the page may submit again.
    StreamError { message: String },
    StreamCancelled,
    /// The prompt was blank after trimming; no turn was started.
    PromptSkipped,
    Links(Links),
    Export { file_name: String, contents: String },
    /// A rejected command (invalid, or sent while busy). Does not end a turn.
    Error { message: String },
    /// The session cannot start; the server closes the socket after sending it.
    Fatal { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_messages() {
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"submit","prompt":"hi"}"#).unwrap(),
            ClientMessage::Submit {
                prompt: "hi".into()
            }
        );
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"clear"}"#).unwrap(),
            ClientMessage::Clear
        );
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"cancel"}"#).unwrap(),
            ClientMessage::Cancel
        );
    }

    #[test]
    fn rejects_unknown_or_incomplete_messages() {
        assert!(ClientMessage::from_json(r#"{"type":"reboot"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"submit"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn server_messages_carry_type_tag() {
        let links = Links {
            search: "s".into(),
            video: "v".into(),
            encyclopedia: "e".into(),
        };
        assert_eq!(
            serde_json::to_value(ServerMessage::Links(links)).unwrap(),
            json!({"type": "links", "search": "s", "video": "v", "encyclopedia": "e"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Status {
                state: StatusState::Thinking
            })
            .unwrap(),
            json!({"type": "status", "state": "thinking"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::History {
                turns: vec![Turn::user("q")]
            })
            .unwrap(),
            json!({"type": "history", "turns": [{"role": "user", "content": "q"}]})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::StreamCancelled).unwrap(),
            json!({"type": "stream_cancelled"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::PromptSkipped).unwrap(),
            json!({"type": "prompt_skipped"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::StreamError {
                message: "boom".into()
            })
            .unwrap(),
            json!({"type": "stream_error", "message": "boom"})
        );
    }
}
