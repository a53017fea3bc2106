//! LedgerMirror CLI - replay ledger entry change and transaction streams

mod commands;
mod jsonl;

use clap::{Parser, Subcommand};
use ledgermirror_core::{IngestContext, MirrorConfig};
use ledgermirror_ingest::LoggingChangeReader;
use ledgermirror_state::MemoryHistoryStore;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::jsonl::{JsonLinesChangeReader, JsonLinesTransactionReader};

#[derive(Parser)]
#[command(name = "ledgermirror")]
#[command(about = "LedgerMirror - ledger entry change ingestion")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines change file into a fresh in-memory store
    Replay {
        /// Change file, one JSON change per line
        #[arg(long)]
        changes: PathBuf,

        /// Ledger the changes belong to
        #[arg(long, default_value = "1")]
        sequence: u32,

        /// Override the configured max batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Replay a JSON-lines transaction file into a fresh in-memory store
    Transactions {
        /// Transaction file, one JSON transaction with its changes per line
        #[arg(long)]
        transactions: PathBuf,

        /// Ledger the transactions belong to
        #[arg(long, default_value = "1")]
        sequence: u32,

        /// Replay the changes of failed transactions too
        #[arg(long)]
        include_failed: bool,
    },

    /// Count the changes in a JSON-lines change file
    Stats {
        /// Change file, one JSON change per line
        #[arg(long)]
        changes: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<MirrorConfig> {
    let config = match path {
        Some(path) => MirrorConfig::load(path)?,
        None => MirrorConfig::default(),
    };
    Ok(config)
}

/// Cancel `ctx` on Ctrl-C
fn cancel_on_interrupt(ctx: &IngestContext) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling ingestion");
            ctx.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = IngestContext::new();
    cancel_on_interrupt(&ctx);

    match cli.command {
        Commands::Replay {
            changes,
            sequence,
            batch_size,
        } => {
            if let Some(batch_size) = batch_size {
                config.ingest.max_batch_size = batch_size;
                config.validate()?;
            }
            info!("Replaying {} as ledger {}", changes.display(), sequence);

            let reader = JsonLinesChangeReader::open(&changes).await?;
            let mut reader = LoggingChangeReader::new(reader, config.ingest.log_frequency);
            let store = MemoryHistoryStore::new();

            let report =
                commands::replay(&ctx, &mut reader, &store, sequence, &config.ingest).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Transactions {
            transactions,
            sequence,
            include_failed,
        } => {
            if include_failed {
                config.ingest.ingest_failed_transactions = true;
            }
            info!(
                "Replaying transactions from {} as ledger {}",
                transactions.display(),
                sequence
            );

            let mut reader = JsonLinesTransactionReader::open(&transactions).await?;
            let store = MemoryHistoryStore::new();

            let report = commands::replay_transactions(
                &ctx,
                &mut reader,
                &store,
                sequence,
                &config.ingest,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Stats { changes } => {
            let reader = JsonLinesChangeReader::open(&changes).await?;
            let mut reader = LoggingChangeReader::new(reader, config.ingest.log_frequency);

            let stats = commands::stats(&ctx, &mut reader).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
