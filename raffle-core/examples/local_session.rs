use raffle_core::codec;
use raffle_core::{RaffleConfig, SessionPatch, Storage, SyncManager, SystemClock};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    let storage = Arc::new(Storage::new(&temp_dir.path().join("raffle.db")).await?);
    let config = RaffleConfig::default();

    // No remote configured, so this session runs local-only
    let sync = SyncManager::connect(&config, storage, None, Arc::new(SystemClock)).await?;
    println!("Sync mode: {}", sync.mode());

    let pool = codec::parse_participant_records(
        "id,name,department\n1001,Alice,HR\n1002,Bob,IT\n1003,Carol,Sales",
    );
    let state = sync.write(SessionPatch::pool(pool)).await?;
    println!("Loaded {} participants", state.participant_pool.len());

    let mut ledger = state.prize_ledger.clone();
    let first = &state.participant_pool[0];
    ledger.record_draw(raffle_core::Winner::new(
        first.clone(),
        chrono::Utc::now(),
        config.display_timestamp(chrono::Utc::now()),
        ledger.next_rank(),
    ))?;
    let state = sync.write(SessionPatch::ledger(ledger)).await?;

    println!("\nWinners:");
    print!("{}", codec::export_delimited(state.prize_ledger.winners()));
    println!("\n\nRemaining prizes: {}", state.prize_ledger.remaining());

    Ok(())
}
