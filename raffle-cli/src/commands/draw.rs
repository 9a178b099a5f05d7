use super::confirm;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_core::{RaffleConfig, Winner};
use raffle_draw::{DrawOutcome, DrawSession, Result};

pub async fn handle_draw(session: &DrawSession, config: &RaffleConfig) -> Result<()> {
    let rank = session.state().prize_ledger.next_rank();
    if !config.reveal_delay().is_zero() {
        println!("Drawing prize {}...", rank);
    }

    match session.draw().await? {
        DrawOutcome::Winner(winner) => {
            println!("Prize {} winner!", winner.prize_rank);
            println!("  ID: {}", winner.id());
            println!("  Name: {}", winner.name());
            if !winner.department().is_empty() {
                println!("  Department: {}", winner.department());
            }
            println!("  Drawn at: {}", winner.display_timestamp);

            let remaining = session.state().prize_ledger.remaining();
            println!();
            println!("Prizes remaining: {}", remaining);
        }
        DrawOutcome::Exhausted => {
            println!("All prizes have been drawn.");
            println!("Use 'raffle reset' to start over");
        }
        DrawOutcome::NoParticipants => {
            println!("No participants loaded.");
            println!("Import a list with: raffle pool import <file>");
        }
        DrawOutcome::NoEligibleParticipants => {
            println!("Every participant has already won a prize.");
        }
    }

    Ok(())
}

pub async fn handle_winners(session: &DrawSession) -> Result<()> {
    let state = session.state();
    let winners = state.prize_ledger.winners();

    if winners.is_empty() {
        println!("No winners yet.");
        println!("Draw one with: raffle draw");
        return Ok(());
    }

    println!("{}", winners_table(winners));
    println!(
        "{} of {} prizes drawn",
        winners.len(),
        state.prize_ledger.total()
    );
    Ok(())
}

pub async fn handle_delete(session: &DrawSession, id: &str, yes: bool) -> Result<()> {
    if !confirm(&format!("Remove winner '{}' and return their prize?", id), yes)? {
        println!("Delete cancelled");
        return Ok(());
    }

    let removed = session.delete_winner(id).await?;
    println!(
        "Removed {} ({}), prize {} returned",
        removed.name(),
        removed.id(),
        removed.prize_rank
    );
    Ok(())
}

pub async fn handle_reset(session: &DrawSession, yes: bool) -> Result<()> {
    if !confirm("Clear every winner and start the draw over?", yes)? {
        println!("Reset cancelled");
        return Ok(());
    }

    let state = session.reset().await?;
    println!(
        "Reset complete. {} prizes available, {} participants kept",
        state.prize_ledger.remaining(),
        state.participant_pool.len()
    );
    Ok(())
}

pub(crate) fn winners_table(winners: &[Winner]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Rank", "ID", "Name", "Department", "Drawn At"]);

    for winner in winners {
        table.add_row(vec![
            winner.prize_rank.to_string(),
            winner.id().to_string(),
            winner.name().to_string(),
            winner.department().to_string(),
            winner.display_timestamp.clone(),
        ]);
    }

    table
}
