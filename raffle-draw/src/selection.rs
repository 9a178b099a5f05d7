use raffle_core::{Clock, ParticipantRecord, PrizeLedger, RaffleConfig, Winner};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(Winner),
    /// Everyone in the pool has already won, or the pool is empty.
    NotAvailable,
}

/// Pick one participant who has not won yet, each with equal probability,
/// and stamp them as the winner of `prize_rank`.
///
/// `prize_rank` is taken as given; the ledger keeps ranks contiguous.
pub fn select_unique_winner<R: Rng + ?Sized>(
    ledger: &PrizeLedger,
    pool: &[ParticipantRecord],
    prize_rank: u32,
    rng: &mut R,
    clock: &dyn Clock,
    config: &RaffleConfig,
) -> Selection {
    let drawn: HashSet<&str> = ledger.winner_ids().collect();
    let available: Vec<&ParticipantRecord> = pool
        .iter()
        .filter(|p| !drawn.contains(p.id.as_str()))
        .collect();

    let Some(chosen) = available.choose(rng) else {
        return Selection::NotAvailable;
    };

    let now = clock.now();
    Selection::Selected(Winner::new(
        (*chosen).clone(),
        now,
        config.display_timestamp(now),
        prize_rank,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use raffle_core::FixedClock;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn pool(ids: &[&str]) -> Vec<ParticipantRecord> {
        ids.iter()
            .map(|id| ParticipantRecord::new(*id, format!("Name {}", id), ""))
            .collect()
    }

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
    }

    fn draw_into(
        ledger: &mut PrizeLedger,
        pool: &[ParticipantRecord],
        rng: &mut StdRng,
    ) -> Selection {
        let selection = select_unique_winner(
            ledger,
            pool,
            ledger.next_rank(),
            rng,
            &clock(),
            &RaffleConfig::default(),
        );
        if let Selection::Selected(winner) = &selection {
            ledger.record_draw(winner.clone()).unwrap();
        }
        selection
    }

    #[test]
    fn test_empty_pool_is_not_available() {
        let mut rng = StdRng::seed_from_u64(1);
        let selection = select_unique_winner(
            &PrizeLedger::new(10),
            &[],
            1,
            &mut rng,
            &clock(),
            &RaffleConfig::default(),
        );
        assert_eq!(selection, Selection::NotAvailable);
    }

    #[test]
    fn test_winner_is_stamped() {
        let mut rng = StdRng::seed_from_u64(7);
        let Selection::Selected(winner) = select_unique_winner(
            &PrizeLedger::new(10),
            &pool(&["1001"]),
            4,
            &mut rng,
            &clock(),
            &RaffleConfig::default(),
        ) else {
            panic!("expected a winner");
        };

        assert_eq!(winner.id(), "1001");
        assert_eq!(winner.prize_rank, 4);
        assert_eq!(winner.created_at, clock().now());
        assert_eq!(winner.display_timestamp, "01/03/2026 16:00:00");
    }

    #[test]
    fn test_three_participants_three_draws() {
        let pool = pool(&["1001", "1002", "1003"]);
        let mut ledger = PrizeLedger::new(10);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..3 {
            assert!(matches!(
                draw_into(&mut ledger, &pool, &mut rng),
                Selection::Selected(_)
            ));
        }

        assert_eq!(ledger.remaining(), 7);
        let ranks: Vec<u32> = ledger.winners().iter().map(|w| w.prize_rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);

        let mut ids: Vec<&str> = ledger.winner_ids().collect();
        ids.sort();
        assert_eq!(ids, vec!["1001", "1002", "1003"]);

        assert_eq!(draw_into(&mut ledger, &pool, &mut rng), Selection::NotAvailable);
        assert_eq!(ledger.remaining(), 7);
    }

    #[test]
    fn test_never_repeats_a_winner() {
        let pool: Vec<ParticipantRecord> = (0..50)
            .map(|i| ParticipantRecord::new(format!("{}", 2000 + i), "x", ""))
            .collect();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut ledger = PrizeLedger::new(10);
            while !ledger.is_exhausted() {
                draw_into(&mut ledger, &pool, &mut rng);
            }

            let unique: HashSet<&str> = ledger.winner_ids().collect();
            assert_eq!(unique.len(), 10);
            assert!(ledger.check_invariants(10).is_ok());
        }
    }

    #[test]
    fn test_previous_winners_are_excluded() {
        let pool = pool(&["1001", "1002"]);
        let mut ledger = PrizeLedger::new(10);
        let mut rng = StdRng::seed_from_u64(3);

        let first = draw_into(&mut ledger, &pool, &mut rng);
        let Selection::Selected(first) = first else {
            panic!("expected a winner");
        };

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let Selection::Selected(next) = select_unique_winner(
                &ledger,
                &pool,
                2,
                &mut rng,
                &clock(),
                &RaffleConfig::default(),
            ) else {
                panic!("expected a winner");
            };
            assert_ne!(next.id(), first.id());
        }
    }

    #[test]
    fn test_roughly_uniform() {
        let pool = pool(&["a", "b", "c", "d"]);
        let ledger = PrizeLedger::new(10);
        let mut rng = StdRng::seed_from_u64(2026);
        let mut counts: HashMap<String, u32> = HashMap::new();

        for _ in 0..4000 {
            if let Selection::Selected(w) = select_unique_winner(
                &ledger,
                &pool,
                1,
                &mut rng,
                &clock(),
                &RaffleConfig::default(),
            ) {
                *counts.entry(w.id().to_string()).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        for count in counts.values() {
            assert!((850..1150).contains(count), "skewed count {}", count);
        }
    }
}
