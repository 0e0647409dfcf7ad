//! paster - clipboard history watcher
//!
//! Runs the clipboard core against the system clipboard and speaks the
//! panel protocol on stdin/stdout, one JSON object per line.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paster::panel::OutputFormat;
use paster::services::SystemClipboard;
use paster::{App, Config};

/// paster - Clipboard history cards
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Config file path (default: ~/.config/paster/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Clipboard poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Number of cards to keep
    #[arg(long)]
    capacity: Option<usize>,

    /// Print human-readable lines instead of JSON
    #[arg(long)]
    text: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries panel messages.
    let filter = if args.debug {
        "paster=debug,info"
    } else {
        "paster=info,warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = if let Some(path) = args.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    if let Some(interval) = args.poll_interval_ms {
        config.watcher.poll_interval_ms = interval;
    }
    if let Some(capacity) = args.capacity {
        config.store.capacity = capacity;
    }

    let format = if args.text {
        OutputFormat::Text
    } else {
        OutputFormat::Json
    };

    let mut app = App::new(config, Arc::new(SystemClipboard))?;
    app.run(format).await
}
