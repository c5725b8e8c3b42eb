//! bolt-chat: terminal client for Bolt Chat.
//! Reads config, then either answers a single question given as an argument or
//! reads prompts from stdin line by line, streaming each reply to stdout.

use bolt_chat_client::config::{self, ConfigLocation};
use bolt_chat_client::{
    CompletionClient, Links, SessionController, Turn, TurnStatus, TurnView, EXPORT_FILE_NAME,
};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;

const USAGE: &str = "usage: bolt-chat [--config PATH] [QUESTION...]

Without a question, prompts are read from stdin, one per line.
Commands: /clear, /export [PATH], /quit";

struct Args {
    config: Option<String>,
    question: Option<String>,
}

fn parse_args() -> Args {
    let mut config = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => config = Some(path),
                None => {
                    eprintln!("Error: --config needs a path\n{}", USAGE);
                    process::exit(2);
                }
            },
            "-h" | "--help" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            _ => words.push(arg),
        }
    }
    let question = Some(words.join(" ")).filter(|q| !q.trim().is_empty());
    Args { config, question }
}

/// Writes the reply to stdout as it streams; errors go to stderr.
struct TerminalView {
    out: io::Stdout,
}

impl TurnView for TerminalView {
    fn user_turn(&mut self, _prompt: &str) {}

    fn status(&mut self, status: TurnStatus) {
        if status == TurnStatus::Thinking {
            log::debug!("waiting for reply");
        }
    }

    fn reply_progress(&mut self, fragment: &str, _display: &str) {
        let mut out = self.out.lock();
        let _ = write!(out, "{}", fragment);
        let _ = out.flush();
    }

    fn reply_complete(&mut self, _reply: &str) {
        let _ = writeln!(self.out.lock());
    }

    fn links(&mut self, links: &Links) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "\nLinks:");
        let _ = writeln!(out, "  search:       {}", links.search);
        let _ = writeln!(out, "  video:        {}", links.video);
        let _ = writeln!(out, "  encyclopedia: {}", links.encyclopedia);
    }

    fn error(&mut self, message: &str) {
        // Partial reply text may be on the current line.
        let _ = writeln!(self.out.lock());
        eprintln!("Error: {}", message);
    }

    fn history(&mut self, turns: &[Turn]) {
        let _ = writeln!(self.out.lock(), "(history cleared, {} turns)", turns.len());
    }
}

fn export_to(session: &SessionController<CompletionClient>, path: &Path) -> io::Result<usize> {
    let log = session.export_log();
    std::fs::write(path, &log.contents)?;
    Ok(log.contents.len())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = parse_args();
    let location = config::resolve_config_path(args.config.as_deref());
    let cfg = match config::load_from(&location) {
        Ok(c) => c,
        Err(e) => {
            let shown = match &location {
                ConfigLocation::Explicit(p) | ConfigLocation::Default(p) => p.display().to_string(),
                ConfigLocation::None => "<none>".into(),
            };
            eprintln!("Error: failed to load config from {}: {}", shown, e);
            process::exit(1);
        }
    };

    let mut session = match bolt_chat_client::start_session(&cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    let mut view = TerminalView { out: io::stdout() };

    if let Some(question) = args.question {
        if rt.block_on(session.submit(&question, &mut view)).is_err() {
            process::exit(1);
        }
        return;
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error: failed to read stdin: {}", e);
                process::exit(1);
            }
        };
        let input = line.trim();
        match input.split_once(' ').map_or((input, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/clear", _) => session.clear_history(&mut view),
            ("/export", rest) => {
                let path = if rest.is_empty() { EXPORT_FILE_NAME } else { rest };
                match export_to(&session, Path::new(path)) {
                    Ok(n) => println!("saved {} bytes to {}", n, path),
                    Err(e) => eprintln!("Error: failed to write {}: {}", path, e),
                }
            }
            _ => {
                // Failures are already reported by the view; keep reading.
                let _ = rt.block_on(session.submit(input, &mut view));
            }
        }
    }
}
