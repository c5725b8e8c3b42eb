//! Bolt Chat web UI: serves the single-page app and runs one chat session per
//! WebSocket connection.

pub mod commands;
pub mod protocol;
pub mod server;

use std::sync::Arc;

use bolt_chat_client::Config;
use tokio::net::TcpListener;

pub use commands::AppState;

/// Bind the configured address and serve until the listener fails.
pub async fn run(config: &Config) -> std::io::Result<()> {
    let state = AppState::from_config(config);
    if !state.is_configured() {
        log::warn!("API key missing; sessions will show a configuration error");
    }
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Bolt Chat running at http://{}", listener.local_addr()?);
    server::serve(listener, Arc::new(state)).await
}
