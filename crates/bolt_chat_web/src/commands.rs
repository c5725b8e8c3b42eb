//! Per-connection chat session: page commands in, rendered turn events out.
//! The session loop is independent of the socket so it can be driven by any
//! stream of incoming frames and any outgoing channel.

use bolt_chat_client::{
    ApiSettings, CompletionClient, CompletionError, Config, Links, SessionController, Turn,
    TurnOutcome, TurnStatus, TurnView,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::{ClientMessage, ServerMessage, StatusState};

/// Reply sent when the page issues a command while a reply is streaming.
pub const BUSY_MESSAGE: &str = "A reply is still streaming; wait for it to finish or cancel it.";

/// Settings shared by every session the server starts.
#[derive(Debug, Clone)]
pub struct AppState {
    api: Result<ApiSettings, String>,
    system_prompt: String,
    encyclopedia_lang: String,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api: config.api_settings().map_err(|e| e.to_string()),
            system_prompt: config.system_prompt().to_string(),
            encyclopedia_lang: config.encyclopedia_lang().to_string(),
        }
    }

    /// `api` of `Err(message)` makes every session fail to start with `message`.
    pub fn new(
        api: Result<ApiSettings, String>,
        system_prompt: impl Into<String>,
        encyclopedia_lang: impl Into<String>,
    ) -> Self {
        Self {
            api,
            system_prompt: system_prompt.into(),
            encyclopedia_lang: encyclopedia_lang.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_ok()
    }

    pub fn start_session(&self) -> Result<SessionController<CompletionClient>, String> {
        let api = self.api.as_ref().map_err(Clone::clone)?;
        bolt_chat_client::start_session_with(api, &self.system_prompt, &self.encyclopedia_lang)
            .map_err(|e| e.to_string())
    }
}

/// [`TurnView`] that forwards every render call to the page as a message.
pub struct ChannelView {
    tx: UnboundedSender<ServerMessage>,
}

impl ChannelView {
    pub fn new(tx: UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }

    fn send(&self, msg: ServerMessage) {
        // The writer is gone only after the socket closed; the loop notices that itself.
        let _ = self.tx.send(msg);
    }
}

impl TurnView for ChannelView {
    fn user_turn(&mut self, prompt: &str) {
        self.send(ServerMessage::UserTurn {
            content: prompt.to_string(),
        });
    }

    fn status(&mut self, status: TurnStatus) {
        let state = match status {
            TurnStatus::Thinking => StatusState::Thinking,
            TurnStatus::Complete => StatusState::Complete,
        };
        self.send(ServerMessage::Status { state });
    }

    fn reply_progress(&mut self, fragment: &str, display: &str) {
        self.send(ServerMessage::StreamChunk {
            chunk: fragment.to_string(),
            display: display.to_string(),
        });
    }

    fn reply_complete(&mut self, reply: &str) {
        self.send(ServerMessage::StreamEnd {
            content: reply.to_string(),
        });
    }

    fn links(&mut self, links: &Links) {
        self.send(ServerMessage::Links(links.clone()));
    }

    fn error(&mut self, message: &str) {
        self.send(ServerMessage::StreamError {
            message: message.to_string(),
        });
    }

    fn history(&mut self, turns: &[Turn]) {
        self.send(ServerMessage::History {
            turns: turns.to_vec(),
        });
    }
}

/// One decoded frame from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Command(ClientMessage),
    Invalid(String),
    /// Ping, pong, binary: nothing to do.
    Ignored,
    Closed,
}

/// How a streaming turn ended.
enum TurnEnd {
    Finished(Result<TurnOutcome, CompletionError>),
    Cancelled,
    Disconnected,
}

/// Drive one session until the page disconnects.
pub async fn run_session<S>(
    mut incoming: S,
    tx: UnboundedSender<ServerMessage>,
    state: &AppState,
) where
    S: Stream<Item = Incoming> + Unpin,
{
    let mut session = match state.start_session() {
        Ok(s) => s,
        Err(message) => {
            log::warn!("session not started: {}", message);
            let _ = tx.send(ServerMessage::Fatal { message });
            return;
        }
    };
    let mut view = ChannelView::new(tx.clone());
    view.history(session.transcript().conversation());

    while let Some(frame) = incoming.next().await {
        let command = match frame {
            Incoming::Command(c) => c,
            Incoming::Invalid(message) => {
                let _ = tx.send(ServerMessage::Error { message });
                continue;
            }
            Incoming::Ignored => continue,
            Incoming::Closed => break,
        };

        match command {
            ClientMessage::Submit { prompt } => {
                let end = {
                    let turn = session.submit(&prompt, &mut view);
                    tokio::pin!(turn);
                    loop {
                        tokio::select! {
                            biased;
                            outcome = &mut turn => break TurnEnd::Finished(outcome),
                            frame = incoming.next() => match frame {
                                None | Some(Incoming::Closed) => break TurnEnd::Disconnected,
                                Some(Incoming::Command(ClientMessage::Cancel)) => {
                                    break TurnEnd::Cancelled
                                }
                                Some(Incoming::Command(_)) => {
                                    let _ = tx.send(ServerMessage::Error {
                                        message: BUSY_MESSAGE.to_string(),
                                    });
                                }
                                Some(Incoming::Invalid(message)) => {
                                    let _ = tx.send(ServerMessage::Error { message });
                                }
                                Some(Incoming::Ignored) => {}
                            },
                        }
                    }
                };
                match end {
                    TurnEnd::Finished(Ok(TurnOutcome::Skipped)) => {
                        let _ = tx.send(ServerMessage::PromptSkipped);
                    }
                    // Failures were already sent through the view.
                    TurnEnd::Finished(_) => {}
                    TurnEnd::Cancelled => {
                        session.cancel();
                        let _ = tx.send(ServerMessage::StreamCancelled);
                    }
                    TurnEnd::Disconnected => {
                        session.cancel();
                        break;
                    }
                }
            }
            ClientMessage::Clear => session.clear_history(&mut view),
            ClientMessage::Export => {
                let log = session.export_log();
                let _ = tx.send(ServerMessage::Export {
                    file_name: log.file_name.to_string(),
                    contents: log.contents,
                });
            }
            // Nothing is streaming.
            ClientMessage::Cancel => {}
        }
    }
}
