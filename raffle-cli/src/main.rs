mod commands;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::CliConfig;
use raffle_core::{backend_from_config, LedgerError, RaffleConfig, Storage, SyncManager, SystemClock};
use raffle_draw::{DrawError, DrawSession};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "raffle")]
#[command(about = "Raffle console - draw unique prize winners from a shared session")]
#[command(version)]
struct Cli {
    /// Data directory for settings and the local session cache
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show prize and sync status
    Status,

    /// Draw the next winner
    Draw,

    /// List winners in rank order
    Winners,

    /// Remove a winner and return their prize
    Delete {
        /// Participant id of the winner
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Clear every winner and restore all prizes
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Participant pool commands
    #[command(subcommand)]
    Pool(commands::PoolCommands),

    /// Export winners
    #[command(subcommand)]
    Export(commands::ExportCommands),

    /// Whole-session snapshots
    #[command(subcommand)]
    Snapshot(commands::SnapshotCommands),

    /// Print every session change until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cli_config = CliConfig::new(cli.data_dir, cli.verbose);

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(cli_config.log_filter()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(cli_config.data_dir())
        .await
        .with_context(|| format!("creating data directory {}", cli_config.data_dir().display()))?;

    tracing::debug!("Using data directory {}", cli_config.data_dir().display());

    let config = RaffleConfig::load(&cli_config.config_path())
        .await
        .with_context(|| format!("loading {}", cli_config.config_path().display()))?;

    let storage = Arc::new(
        Storage::new(&cli_config.cache_path())
            .await
            .context("opening local session cache")?,
    );

    let backend = backend_from_config(&config)?;
    let sync = Arc::new(SyncManager::connect(&config, storage, backend, Arc::new(SystemClock)).await?);
    let session = DrawSession::new(sync.clone(), config.clone());

    // Execute command
    let result = match cli.command {
        Commands::Status => commands::handle_status(&session, &config).await,
        Commands::Draw => commands::handle_draw(&session, &config).await,
        Commands::Winners => commands::handle_winners(&session).await,
        Commands::Delete { id, yes } => commands::handle_delete(&session, &id, yes).await,
        Commands::Reset { yes } => commands::handle_reset(&session, yes).await,
        Commands::Pool(cmd) => commands::handle_pool_command(cmd, &session).await,
        Commands::Export(cmd) => commands::handle_export_command(cmd, &session).await,
        Commands::Snapshot(cmd) => commands::handle_snapshot_command(cmd, &session).await,
        Commands::Watch => commands::handle_watch(&session).await,
    };

    // let queued pushes reach the backend before exiting
    sync.flush().await;

    if let Err(e) = result {
        match &e {
            DrawError::DrawInProgress => {
                eprintln!("Error: A draw is already running");
            }
            DrawError::Ledger(LedgerError::NotFound { id }) => {
                eprintln!("Error: No winner with id '{}'", id);
                eprintln!("Use 'raffle winners' to see current winners");
            }
            DrawError::Core(core) if core.is_user_input() => {
                eprintln!("Error: Could not read input file: {}", core);
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
