//! Storefront shell - drive the storefront client core from a terminal.
//!
//! Simulates what the browser application does: every `go` passes through
//! the navigation guard, sessions persist in the token store between runs,
//! and toasts expire on their own while the shell waits for input.

mod shell;

use std::io::{self, Write};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storefront_core::config::Config;
use storefront_core::notify::{forwarder_from_config, NotificationQueue, ToastEvent};
use storefront_core::router::{Navigator, RouteGuard, RouteTable};
use storefront_core::FileTokenStore;

use shell::{format_toast, parse_command, Command, Outcome, Shell};

// ============================================================================
// Constants
// ============================================================================

/// When set, logs go to a daily rolling file in this directory instead of stderr
const ENV_LOG_DIR: &str = "STOREFRONT_LOG_DIR";

const LOG_FILE_PREFIX: &str = "storefront.log";

const PROMPT: &str = "> ";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn prompt() -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", PROMPT)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    info!("Storefront shell starting");

    let config = Config::load().context("Failed to load configuration")?;
    let data_dir = config.data_dir()?;
    let store = FileTokenStore::open(&data_dir);
    info!(path = %store.path().display(), "Using token store");

    let toasts = NotificationQueue::new(forwarder_from_config(config.telemetry.as_ref()))
        .with_default_ttl(config.toast_ttl())
        .with_context("release", env!("CARGO_PKG_VERSION"))
        .with_context("apiBaseUrl", config.api_base_url.clone());
    let navigator = Navigator::new(RouteTable::storefront(), RouteGuard::default(), store);
    let mut shell = Shell::new(navigator, toasts);

    // Initial page load; an OAuth redirect arrives as the first URL
    let initial_url = std::env::args().nth(1).unwrap_or_else(|| "/".to_string());
    let mut events = shell.toasts().subscribe();
    if let Outcome::Continue(lines) = shell.execute(Command::Go(initial_url)) {
        for line in lines {
            println!("{}", line);
        }
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(command)) => match shell.execute(command) {
                        Outcome::Continue(lines) => {
                            for line in lines {
                                println!("{}", line);
                            }
                        }
                        Outcome::Quit => break,
                    },
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
                prompt()?;
            }
            event = events.recv() => match event {
                Ok(ToastEvent::Shown(entry)) => println!("[toast] {}", format_toast(&entry)),
                Ok(ToastEvent::Expired(id)) => println!("[toast] #{} expired", id),
                Ok(ToastEvent::Dismissed(_)) => {}
                Err(RecvError::Lagged(missed)) => println!("[toast] {} updates skipped", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!(location = %shell.navigator().current(), "Storefront shell shutting down");
    Ok(())
}
