//! history-replay
//!
//! Feeds newline-delimited JSON history events through the history writer
//! into the sharded MySQL history tables.
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌───────────┐    ┌──────────┐
//! │  NDJSON  │───▶│ HistoryWriter│───▶│  Flusher  │───▶│ 20 x SQL │
//! │ (stdin)  │    │  (buffer)    │    │ (100 ms)  │    │ workers  │
//! └──────────┘    └──────────────┘    └───────────┘    └──────────┘
//! ```
//!
//! Usage: `history-replay [--env dev] [--grace-secs 30] [FILE]`

use std::fs::File;
use std::io::{self, BufReader};
use std::time::Duration;

use anyhow::{Context, Result};
use ledger_history::config::AppConfig;
use ledger_history::history::HistoryService;
use ledger_history::logging::init_logging;
use ledger_history::replay::replay;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_grace() -> Duration {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--grace-secs" && i + 1 < args.len() {
            if let Ok(secs) = args[i + 1].parse() {
                return Duration::from_secs(secs);
            }
        }
    }
    Duration::from_secs(30)
}

/// First positional argument that is not a flag value
fn get_input_file() -> Option<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        if args[i].starts_with('-') {
            i += 2;
            continue;
        }
        return Some(args[i].clone());
    }
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);

    tracing::info!(env = %env, db = %config.history.db.name, "Starting history replay");

    let service = HistoryService::connect(&config.history)
        .await
        .context("Failed to start history service")?;
    let writer = service.writer();

    // Appends are synchronous, like the engine thread that normally drives them
    let input = get_input_file();
    let stats = tokio::task::spawn_blocking(move || match input {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("Failed to open {}", path))?;
            replay(BufReader::new(file), &writer)
        }
        None => replay(io::stdin().lock(), &writer),
    })
    .await
    .context("Replay task panicked")??;

    tracing::info!(
        applied = stats.applied,
        skipped = stats.skipped,
        "Replay input consumed, flushing"
    );

    let pool_stats = service.shutdown(get_grace()).await;
    if pool_stats.abandoned > 0 {
        anyhow::bail!("{} history batches were not written", pool_stats.abandoned);
    }

    tracing::info!(
        batches = pool_stats.executed,
        retries = pool_stats.failed_attempts,
        "History replay complete"
    );
    Ok(())
}
