//! bolt-chat-web: serve the Bolt Chat page.

use bolt_chat_client::config::{self, ConfigLocation};
use std::process;

fn config_flag() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    let pos = args.iter().position(|a| a == "--config")?;
    match args.get(pos + 1) {
        Some(path) => Some(path.clone()),
        None => {
            eprintln!("Error: --config needs a path");
            process::exit(2);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let location = config::resolve_config_path(config_flag().as_deref());
    let cfg = match config::load_from(&location) {
        Ok(c) => c,
        Err(e) => {
            if let ConfigLocation::Explicit(p) | ConfigLocation::Default(p) = &location {
                eprintln!("Error: failed to load config from {}: {}", p.display(), e);
            } else {
                eprintln!("Error: failed to load config: {}", e);
            }
            process::exit(1);
        }
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    if let Err(e) = rt.block_on(bolt_chat_web_lib::run(&cfg)) {
        eprintln!("Error: server stopped: {}", e);
        process::exit(1);
    }
}
