//! Prize ledger state machine.
//!
//! Invariants held after every transition:
//! - `remaining + winners.len()` equals the prize total fixed at creation
//! - ranks run `1..=winners.len()` in draw order
//! - no participant id appears twice

use crate::error::LedgerError;
use crate::types::Winner;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_TOTAL_PRIZES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    Active { remaining: u32 },
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeLedger {
    remaining: u32,
    winners: Vec<Winner>,
}

impl Default for PrizeLedger {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_PRIZES)
    }
}

impl PrizeLedger {
    pub fn new(total_prizes: u32) -> Self {
        Self {
            remaining: total_prizes,
            winners: Vec::new(),
        }
    }

    pub fn total(&self) -> u32 {
        self.remaining + self.winners.len() as u32
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn winners(&self) -> &[Winner] {
        &self.winners
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn state(&self) -> LedgerState {
        if self.is_exhausted() {
            LedgerState::Exhausted
        } else {
            LedgerState::Active {
                remaining: self.remaining,
            }
        }
    }

    /// Rank the next successful draw will receive.
    pub fn next_rank(&self) -> u32 {
        self.winners.len() as u32 + 1
    }

    pub fn contains(&self, id: &str) -> bool {
        self.winners.iter().any(|w| w.id() == id)
    }

    pub fn winner_ids(&self) -> impl Iterator<Item = &str> {
        self.winners.iter().map(Winner::id)
    }

    /// Append a freshly drawn winner. The rank is always set to the next
    /// contiguous slot, whatever the caller stamped.
    pub fn record_draw(&mut self, mut winner: Winner) -> Result<(), LedgerError> {
        if self.remaining == 0 {
            return Err(LedgerError::AlreadyExhausted);
        }

        if self.contains(winner.id()) {
            return Err(LedgerError::DuplicateWinner {
                id: winner.id().to_string(),
            });
        }

        let rank = self.next_rank();
        if winner.prize_rank != rank {
            tracing::debug!(
                "Winner {} stamped with rank {}, recording as {}",
                winner.id(),
                winner.prize_rank,
                rank
            );
            winner.prize_rank = rank;
        }

        self.remaining -= 1;
        self.winners.push(winner);
        Ok(())
    }

    /// Remove a winner and give the prize back. Later winners shift down one
    /// rank; draw order is kept.
    pub fn delete(&mut self, id: &str) -> Result<Winner, LedgerError> {
        let pos = self
            .winners
            .iter()
            .position(|w| w.id() == id)
            .ok_or_else(|| LedgerError::NotFound { id: id.to_string() })?;

        let removed = self.winners.remove(pos);
        self.remaining += 1;
        self.renumber();

        Ok(removed)
    }

    pub fn reset(&mut self) {
        let total = self.total();
        self.winners.clear();
        self.remaining = total;
    }

    fn renumber(&mut self) {
        for (i, winner) in self.winners.iter_mut().enumerate() {
            winner.prize_rank = i as u32 + 1;
        }
    }

    /// Structural check for documents arriving from outside the process.
    pub fn check_invariants(&self, total_prizes: u32) -> Result<(), String> {
        if self.total() != total_prizes {
            return Err(format!(
                "ledger holds {} remaining and {} winners, expected {} prizes in total",
                self.remaining,
                self.winners.len(),
                total_prizes
            ));
        }

        let mut seen = HashSet::new();
        for (i, winner) in self.winners.iter().enumerate() {
            if winner.prize_rank != i as u32 + 1 {
                return Err(format!(
                    "winner {} has rank {} at position {}",
                    winner.id(),
                    winner.prize_rank,
                    i + 1
                ));
            }
            if !seen.insert(winner.id()) {
                return Err(format!("winner {} appears more than once", winner.id()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticipantRecord;
    use chrono::Utc;

    fn winner(id: &str, rank: u32) -> Winner {
        Winner::new(
            ParticipantRecord::new(id, format!("Name {}", id), "Ops"),
            Utc::now(),
            String::new(),
            rank,
        )
    }

    fn ranks(ledger: &PrizeLedger) -> Vec<u32> {
        ledger.winners().iter().map(|w| w.prize_rank).collect()
    }

    fn ids(ledger: &PrizeLedger) -> Vec<&str> {
        ledger.winner_ids().collect()
    }

    #[test]
    fn test_initial_state() {
        let ledger = PrizeLedger::default();
        assert_eq!(ledger.remaining(), 10);
        assert!(ledger.winners().is_empty());
        assert_eq!(ledger.state(), LedgerState::Active { remaining: 10 });
    }

    #[test]
    fn test_draw_conserves_total() {
        let mut ledger = PrizeLedger::new(10);
        for i in 0..4 {
            ledger.record_draw(winner(&format!("{}", 1000 + i), i + 1)).unwrap();
            assert_eq!(ledger.total(), 10);
        }
        assert_eq!(ledger.remaining(), 6);
        assert_eq!(ranks(&ledger), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_draw_rejects_duplicate() {
        let mut ledger = PrizeLedger::new(10);
        ledger.record_draw(winner("1001", 1)).unwrap();

        let err = ledger.record_draw(winner("1001", 2)).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateWinner { id: "1001".into() });
        assert_eq!(ledger.remaining(), 9);
        assert_eq!(ledger.winners().len(), 1);
    }

    #[test]
    fn test_draw_when_exhausted_does_not_mutate() {
        let mut ledger = PrizeLedger::new(2);
        ledger.record_draw(winner("1", 1)).unwrap();
        ledger.record_draw(winner("2", 2)).unwrap();
        assert_eq!(ledger.state(), LedgerState::Exhausted);

        let before = ledger.clone();
        assert_eq!(
            ledger.record_draw(winner("3", 3)),
            Err(LedgerError::AlreadyExhausted)
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_draw_restamps_rank() {
        let mut ledger = PrizeLedger::new(10);
        ledger.record_draw(winner("1", 7)).unwrap();
        assert_eq!(ranks(&ledger), vec![1]);
    }

    #[test]
    fn test_delete_middle_renumbers() {
        let mut ledger = PrizeLedger::new(10);
        for (i, id) in ["1001", "1002", "1003"].iter().enumerate() {
            ledger.record_draw(winner(id, i as u32 + 1)).unwrap();
        }

        let removed = ledger.delete("1002").unwrap();
        assert_eq!(removed.prize_rank, 2);
        assert_eq!(ids(&ledger), vec!["1001", "1003"]);
        assert_eq!(ranks(&ledger), vec![1, 2]);
        assert_eq!(ledger.remaining(), 8);
        assert_eq!(ledger.total(), 10);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut ledger = PrizeLedger::new(10);
        ledger.record_draw(winner("1001", 1)).unwrap();

        let before = ledger.clone();
        assert_eq!(
            ledger.delete("9999"),
            Err(LedgerError::NotFound { id: "9999".into() })
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_exhausted_is_not_absorbing() {
        let mut ledger = PrizeLedger::new(1);
        ledger.record_draw(winner("1", 1)).unwrap();
        assert!(ledger.is_exhausted());

        ledger.delete("1").unwrap();
        assert_eq!(ledger.state(), LedgerState::Active { remaining: 1 });
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut ledger = PrizeLedger::new(10);
        ledger.reset();
        assert_eq!(ledger, PrizeLedger::new(10));

        for i in 0..10 {
            ledger.record_draw(winner(&i.to_string(), i + 1)).unwrap();
        }
        ledger.reset();
        assert_eq!(ledger, PrizeLedger::new(10));

        ledger.reset();
        assert_eq!(ledger.remaining(), 10);
        assert!(ledger.winners().is_empty());
    }

    #[test]
    fn test_mixed_sequence_keeps_invariants() {
        let mut ledger = PrizeLedger::new(10);
        let mut next = 0;
        let ops = ["d", "d", "d", "x1", "d", "x0", "d", "d", "x3", "d"];

        for op in ops {
            if op == "d" {
                ledger.record_draw(winner(&format!("p{}", next), 0)).unwrap();
                next += 1;
            } else {
                let pos: usize = op[1..].parse().unwrap();
                let id = ledger.winners()[pos].id().to_string();
                ledger.delete(&id).unwrap();
            }
            assert!(ledger.check_invariants(10).is_ok());
        }

        // p1, p0 and p5 were deleted; survivors keep draw order
        assert_eq!(ids(&ledger), vec!["p2", "p3", "p4", "p6"]);
        assert_eq!(ranks(&ledger), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_check_invariants_rejects_gap() {
        let mut ledger = PrizeLedger::new(10);
        ledger.record_draw(winner("1", 1)).unwrap();
        ledger.record_draw(winner("2", 2)).unwrap();
        ledger.winners[1].prize_rank = 3;

        assert!(ledger.check_invariants(10).is_err());
        assert!(PrizeLedger::new(10).check_invariants(12).is_err());
    }
}
