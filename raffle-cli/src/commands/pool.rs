use super::{output_path, write_output};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_core::codec;
use raffle_draw::{DrawSession, Result};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum PoolCommands {
    /// Replace the participant pool from a .csv, .txt, .xlsx or .xls file
    Import {
        /// Participant file
        file: PathBuf,
    },
    /// Show participants
    List {
        /// Maximum rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Save the participant pool as JSON
    Export {
        /// Output file path (defaults to employee-list-DATE.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn handle_pool_command(cmd: PoolCommands, session: &DrawSession) -> Result<()> {
    match cmd {
        PoolCommands::Import { file } => {
            println!("Importing participants from {}...", file.display());
            let records = codec::import_participants_file(&file).await?;

            let state = session.replace_pool(records).await?;
            println!("Imported {} participants", state.participant_pool.len());

            let winners = state.prize_ledger.winners().len();
            if winners > 0 {
                println!(
                    "{} existing winners kept; use 'raffle reset' to start over",
                    winners
                );
            }
        }

        PoolCommands::List { limit } => {
            let state = session.state();
            let pool = &state.participant_pool;

            if pool.is_empty() {
                println!("No participants loaded.");
                println!("Import a list with: raffle pool import <file>");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Department", "Status"]);

            for participant in pool.iter().take(limit) {
                let status = if state.prize_ledger.contains(&participant.id) {
                    "Winner"
                } else {
                    "Eligible"
                };
                table.add_row(vec![
                    participant.id.as_str(),
                    participant.name.as_str(),
                    participant.department.as_str(),
                    status,
                ]);
            }

            println!("{}", table);
            if pool.len() > limit {
                println!("Showing {} of {} participants", limit, pool.len());
            }
        }

        PoolCommands::Export { output } => {
            let state = session.state();
            let path = output_path(output, codec::participant_list_file_name);
            let contents = codec::export_participant_list(
                &state.participant_pool,
                session.sync().clock().now(),
            )?;
            write_output(&path, &contents).await?;
        }
    }

    Ok(())
}
