use super::{confirm, output_path, write_output};
use clap::Subcommand;
use raffle_core::{codec, RaffleError};
use raffle_draw::{DrawSession, Result};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Winners as CSV (opens cleanly in spreadsheet tools)
    Csv {
        /// Output file path (defaults to raffle-winners-DATE.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Winners as JSON
    Json {
        /// Output file path (defaults to raffle-winners-DATE.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Save the whole session (participants and winners)
    Export {
        /// Output file path (defaults to raffle-data-DATE.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the whole session from a snapshot file
    Import {
        /// Snapshot file
        file: PathBuf,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn handle_export_command(cmd: ExportCommands, session: &DrawSession) -> Result<()> {
    let state = session.state();
    let winners = state.prize_ledger.winners();

    if winners.is_empty() {
        println!("No winners to export yet.");
        return Ok(());
    }

    match cmd {
        ExportCommands::Csv { output } => {
            let path = output_path(output, codec::winners_csv_file_name);
            write_output(&path, &codec::export_delimited(winners)).await?;
        }
        ExportCommands::Json { output } => {
            let path = output_path(output, codec::winners_json_file_name);
            write_output(&path, &codec::export_document(winners)?).await?;
        }
    }

    Ok(())
}

pub async fn handle_snapshot_command(cmd: SnapshotCommands, session: &DrawSession) -> Result<()> {
    let sync = session.sync();

    match cmd {
        SnapshotCommands::Export { output } => {
            let path = output_path(output, codec::session_file_name);
            let contents = codec::export_session(&session.state(), sync.clock().now())?;
            write_output(&path, &contents).await?;
        }

        SnapshotCommands::Import { file, yes } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .map_err(RaffleError::from)?;
            let snapshot = codec::import_session(&text, sync.total_prizes(), sync.clock().now())?;

            println!("Snapshot contents:");
            println!("  Participants: {}", snapshot.participant_pool.len());
            println!("  Winners: {}", snapshot.prize_ledger.winners().len());
            println!("  Prizes remaining: {}", snapshot.prize_ledger.remaining());

            if !confirm("Replace the current session with this snapshot?", yes)? {
                println!("Import cancelled");
                return Ok(());
            }

            session.restore(snapshot).await?;
            println!("Session restored from {}", file.display());
        }
    }

    Ok(())
}
