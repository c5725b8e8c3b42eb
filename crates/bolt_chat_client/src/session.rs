//! One conversational session: submit a prompt, stream the reply into a view,
//! commit the finished reply and render follow-up links.
//!
//! The controller is owned by exactly one session (a WebSocket connection or a
//! terminal run). Awaiting the next reply fragment is the only suspension point.

use futures_util::StreamExt;

use crate::client::{CompletionError, CompletionSource};
use crate::links::{LinkGenerator, Links};
use crate::transcript::{TranscriptStore, Turn};

/// Appended to the displayed reply while it is still streaming.
pub const CURSOR: &str = "▌";

/// File name offered for transcript downloads.
pub const EXPORT_FILE_NAME: &str = "chat_log.txt";

/// Where the controller is in the current turn. `Completed` and `Failed`
/// report how the last turn ended and accept new input like `AwaitingUserInput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingUserInput,
    UserSubmitted,
    Streaming,
    Completed,
    Failed,
}

/// Progress indicator shown next to the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Thinking,
    Complete,
}

/// Output sink for a session. Calls arrive synchronously, in order.
pub trait TurnView: Send {
    /// The submitted prompt, shown before any reply text.
    fn user_turn(&mut self, prompt: &str);
    fn status(&mut self, status: TurnStatus);
    /// A fragment arrived. `display` is the reply so far plus [`CURSOR`].
    fn reply_progress(&mut self, fragment: &str, display: &str);
    /// The committed reply, without cursor.
    fn reply_complete(&mut self, reply: &str);
    fn links(&mut self, links: &Links);
    fn error(&mut self, message: &str);
    /// Redraw the whole conversation (system turn excluded).
    fn history(&mut self, turns: &[Turn]);
}

/// Result of a successful [`SessionController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank prompt; nothing happened.
    Skipped,
    /// A turn is already in flight.
    Busy,
    Completed { reply: String, links: Links },
}

/// Transcript download: file name plus contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedLog {
    pub file_name: &'static str,
    pub contents: String,
}

pub struct SessionController<S> {
    source: S,
    transcript: TranscriptStore,
    links: LinkGenerator,
    state: SessionState,
    last_error: Option<CompletionError>,
}

impl<S: CompletionSource> SessionController<S> {
    /// Start a session with a transcript holding only `system_prompt`.
    pub fn start(source: S, system_prompt: &str, links: LinkGenerator) -> Self {
        Self {
            source,
            transcript: TranscriptStore::new(system_prompt),
            links,
            state: SessionState::AwaitingUserInput,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    /// Error of the most recent failed turn, cleared by the next successful one.
    pub fn last_error(&self) -> Option<&CompletionError> {
        self.last_error.as_ref()
    }

    /// Run one turn. Blank prompts are ignored. On failure the error is shown
    /// in `view`, no assistant turn is committed and the session stays usable.
    pub async fn submit(
        &mut self,
        prompt: &str,
        view: &mut dyn TurnView,
    ) -> Result<TurnOutcome, CompletionError> {
        if prompt.trim().is_empty() {
            return Ok(TurnOutcome::Skipped);
        }
        if self.in_flight() {
            return Ok(TurnOutcome::Busy);
        }

        self.state = SessionState::UserSubmitted;
        self.transcript.append(Turn::user(prompt));
        view.user_turn(prompt);
        log::info!(
            "turn submitted ({} chars, transcript {} turns)",
            prompt.chars().count(),
            self.transcript.len()
        );

        match self.stream_reply(view).await {
            Ok(reply) => {
                self.transcript.append(Turn::assistant(reply.clone()));
                view.reply_complete(&reply);
                view.status(TurnStatus::Complete);

                let links = self.links.links_for(prompt);
                view.links(&links);

                self.last_error = None;
                self.state = SessionState::Completed;
                Ok(TurnOutcome::Completed { reply, links })
            }
            Err(e) => {
                log::warn!("turn failed: {}", e);
                view.error(&format!("An error occurred: {}", e));
                self.last_error = Some(e.clone());
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn stream_reply(&mut self, view: &mut dyn TurnView) -> Result<String, CompletionError> {
        self.state = SessionState::Streaming;
        view.status(TurnStatus::Thinking);

        let mut fragments = self.source.stream_completion(self.transcript.turns()).await?;
        let mut full_response = String::new();
        let mut count = 0usize;
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            full_response.push_str(&fragment);
            count += 1;
            view.reply_progress(&fragment, &format!("{}{}", full_response, CURSOR));
        }
        log::info!("stream finished after {} fragments", count);
        Ok(full_response)
    }

    /// Abandon a turn whose future was dropped mid-stream. Nothing is committed.
    pub fn cancel(&mut self) {
        if self.in_flight() {
            log::info!("turn cancelled");
            self.state = SessionState::AwaitingUserInput;
        }
    }

    /// Reset to the system turn and redraw an empty conversation.
    pub fn clear_history(&mut self, view: &mut dyn TurnView) {
        self.transcript.clear();
        self.last_error = None;
        self.state = SessionState::AwaitingUserInput;
        view.history(self.transcript.conversation());
    }

    pub fn export_log(&self) -> ExportedLog {
        ExportedLog {
            file_name: EXPORT_FILE_NAME,
            contents: self.transcript.export(),
        }
    }

    /// False while a turn is between submission and its terminal state.
    pub fn accepts_input(&self) -> bool {
        !self.in_flight()
    }

    fn in_flight(&self) -> bool {
        matches!(
            self.state,
            SessionState::UserSubmitted | SessionState::Streaming
        )
    }
}
