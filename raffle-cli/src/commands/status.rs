use super::draw::winners_table;
use raffle_core::{LedgerState, RaffleConfig, SharedSessionState, SyncMode};
use raffle_draw::{DrawSession, Result};

pub async fn handle_status(session: &DrawSession, config: &RaffleConfig) -> Result<()> {
    let sync = session.sync();
    let state = session.state();

    println!("Session Status:");
    println!("  Client: {}", sync.client_id());
    println!("  Sync: {}", sync.mode());
    if let Some(remote) = &config.remote {
        println!("  Remote: {}", remote.url);
    }
    println!(
        "  Last updated: {}",
        config.display_timestamp(state.last_updated)
    );
    println!();
    println!("  Participants: {}", state.participant_pool.len());
    println!("  Still eligible: {}", state.available_participants().len());

    match state.prize_ledger.state() {
        LedgerState::Active { remaining } => {
            println!("  Prizes remaining: {}/{}", remaining, state.prize_ledger.total());
        }
        LedgerState::Exhausted => {
            println!("  Prizes remaining: 0 (all drawn)");
        }
    }

    if sync.mode() == SyncMode::Degraded {
        println!();
        println!("Running on the local cache only. Changes are not shared.");
    }

    Ok(())
}

pub async fn handle_watch(session: &DrawSession) -> Result<()> {
    let sync = session.sync();
    let mut states = sync.subscribe();
    let mut modes = sync.watch_mode();

    println!("Watching session ({}). Press Ctrl-C to stop.", sync.mode());
    print_summary(&states.borrow_and_update());
    let _ = modes.borrow_and_update();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                print_summary(&state);
            }
            changed = modes.changed() => {
                if changed.is_err() {
                    break;
                }
                let mode = *modes.borrow_and_update();
                println!("Sync mode is now {}", mode);
            }
        }
    }

    println!("Stopped watching");
    Ok(())
}

fn print_summary(state: &SharedSessionState) {
    let ledger = &state.prize_ledger;
    println!(
        "[{}] {} participants, {} winners, {} prizes remaining",
        state.last_updated.format("%H:%M:%S"),
        state.participant_pool.len(),
        ledger.winners().len(),
        ledger.remaining()
    );

    if !ledger.winners().is_empty() {
        println!("{}", winners_table(ledger.winners()));
    }
}
