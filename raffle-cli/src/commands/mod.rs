pub mod draw;
pub mod export;
pub mod pool;
pub mod status;

pub use draw::{handle_delete, handle_draw, handle_reset, handle_winners};
pub use export::{handle_export_command, handle_snapshot_command, ExportCommands, SnapshotCommands};
pub use pool::{handle_pool_command, PoolCommands};
pub use status::{handle_status, handle_watch};

use chrono::NaiveDate;
use dialoguer::Confirm;
use raffle_core::RaffleError;
use raffle_draw::Result;
use std::path::{Path, PathBuf};

/// Ask before a destructive change unless `assume_yes` is set.
pub(crate) fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(RaffleError::from)?;
    Ok(confirmed)
}

pub(crate) async fn write_output(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(RaffleError::from)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub(crate) fn output_path(output: Option<PathBuf>, default_name: impl Fn(NaiveDate) -> String) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(default_name(chrono::Local::now().date_naive())))
}
