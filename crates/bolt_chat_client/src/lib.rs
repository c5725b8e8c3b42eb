//! Shared Bolt Chat library (config, transcript, streaming completion client,
//! session loop). Used by the web UI and the terminal client.

pub mod client;
pub mod config;
pub mod links;
pub mod messages;
pub mod session;
pub mod sse;
pub mod transcript;

pub use client::{CompletionClient, CompletionError, CompletionSource, FragmentStream};
pub use config::{default_config_path, ApiSection, ApiSettings, ChatSection, Config, ConfigError, ServerSection};
pub use links::{LinkGenerator, Links};
pub use session::{
    ExportedLog, SessionController, SessionState, TurnOutcome, TurnStatus, TurnView, CURSOR,
    EXPORT_FILE_NAME,
};
pub use transcript::{Role, TranscriptStore, Turn};

/// Start a session against the configured provider.
pub fn start_session(config: &Config) -> Result<SessionController<CompletionClient>, StartError> {
    let api = config.api_settings()?;
    start_session_with(&api, config.system_prompt(), config.encyclopedia_lang())
}

/// Start a session from already-resolved provider settings.
pub fn start_session_with(
    api: &ApiSettings,
    system_prompt: &str,
    encyclopedia_lang: &str,
) -> Result<SessionController<CompletionClient>, StartError> {
    let client = CompletionClient::new(api)?;
    Ok(SessionController::start(
        client,
        system_prompt,
        LinkGenerator::new(encyclopedia_lang),
    ))
}

/// Why a session could not start.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] CompletionError),
}
