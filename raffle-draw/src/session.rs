use crate::selection::{select_unique_winner, Selection};
use crate::{DrawError, Result};
use parking_lot::Mutex;
use raffle_core::{
    ParticipantRecord, RaffleConfig, SessionPatch, SharedSessionState, SyncManager, Winner,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of a draw request. Only `Winner` changes the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DrawOutcome {
    Winner(Winner),
    Exhausted,
    NoParticipants,
    NoEligibleParticipants,
}

/// Operator actions against one shared session.
#[derive(Clone)]
pub struct DrawSession {
    inner: Arc<Inner>,
}

struct Inner {
    sync: Arc<SyncManager>,
    config: RaffleConfig,
    rng: Mutex<StdRng>,
    drawing: AtomicBool,
}

/// Clears the in-progress flag however the draw ends.
struct DrawGuard(Arc<Inner>);

impl Drop for DrawGuard {
    fn drop(&mut self) {
        self.0.drawing.store(false, Ordering::SeqCst);
    }
}

impl DrawSession {
    pub fn new(sync: Arc<SyncManager>, config: RaffleConfig) -> Self {
        Self::with_rng(sync, config, StdRng::from_entropy())
    }

    pub fn with_rng(sync: Arc<SyncManager>, config: RaffleConfig, rng: StdRng) -> Self {
        Self {
            inner: Arc::new(Inner {
                sync,
                config,
                rng: Mutex::new(rng),
                drawing: AtomicBool::new(false),
            }),
        }
    }

    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.inner.sync
    }

    pub fn state(&self) -> SharedSessionState {
        self.inner.sync.read()
    }

    pub fn is_drawing(&self) -> bool {
        self.inner.drawing.load(Ordering::SeqCst)
    }

    /// Draw the next winner.
    ///
    /// The reveal delay and the ledger update run on their own task, so
    /// dropping the returned future does not abandon a started draw.
    pub async fn draw(&self) -> Result<DrawOutcome> {
        if self
            .inner
            .drawing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DrawError::DrawInProgress);
        }
        let guard = DrawGuard(self.inner.clone());

        let state = self.inner.sync.read();
        if state.prize_ledger.is_exhausted() {
            return Ok(DrawOutcome::Exhausted);
        }
        if state.participant_pool.is_empty() {
            return Ok(DrawOutcome::NoParticipants);
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _guard = guard;
            inner.reveal_and_record().await
        })
        .await
        .map_err(|e| DrawError::Internal(format!("draw task failed: {}", e)))?
    }

    pub async fn delete_winner(&self, id: &str) -> Result<Winner> {
        let mut ledger = self.inner.sync.read().prize_ledger;
        let removed = ledger.delete(id)?;

        self.inner.sync.write(SessionPatch::ledger(ledger)).await?;
        tracing::info!("Removed winner {} (was rank {})", removed.id(), removed.prize_rank);
        Ok(removed)
    }

    /// Clear all winners. The participant pool is kept.
    pub async fn reset(&self) -> Result<SharedSessionState> {
        let mut ledger = self.inner.sync.read().prize_ledger;
        ledger.reset();

        let state = self.inner.sync.write(SessionPatch::ledger(ledger)).await?;
        tracing::info!("Prize ledger reset, {} prizes available", state.prize_ledger.remaining());
        Ok(state)
    }

    /// Swap in a new participant pool. Existing winners stay on the ledger.
    pub async fn replace_pool(&self, records: Vec<ParticipantRecord>) -> Result<SharedSessionState> {
        let count = records.len();
        let state = self.inner.sync.write(SessionPatch::pool(records)).await?;
        tracing::info!("Participant pool replaced with {} records", count);
        Ok(state)
    }

    /// Replace the whole session with a previously exported snapshot.
    pub async fn restore(&self, snapshot: SharedSessionState) -> Result<SharedSessionState> {
        snapshot.validate(self.inner.sync.total_prizes())?;

        let state = self.inner.sync.write(SessionPatch::replace(snapshot)).await?;
        tracing::info!(
            "Session restored: {} participants, {} winners",
            state.participant_pool.len(),
            state.prize_ledger.winners().len()
        );
        Ok(state)
    }
}

impl Inner {
    async fn reveal_and_record(&self) -> Result<DrawOutcome> {
        tokio::time::sleep(self.config.reveal_delay()).await;

        // another client may have drawn during the reveal
        let state = self.sync.read();
        let mut ledger = state.prize_ledger;
        if ledger.is_exhausted() {
            return Ok(DrawOutcome::Exhausted);
        }

        let selection = {
            let mut rng = self.rng.lock();
            select_unique_winner(
                &ledger,
                &state.participant_pool,
                ledger.next_rank(),
                &mut *rng,
                self.sync.clock().as_ref(),
                &self.config,
            )
        };

        let winner = match selection {
            Selection::Selected(winner) => winner,
            Selection::NotAvailable => {
                tracing::info!("Every participant has already won");
                return Ok(DrawOutcome::NoEligibleParticipants);
            }
        };

        if let Err(e) = ledger.record_draw(winner.clone()) {
            tracing::error!("Ledger rejected selected winner {}: {}", winner.id(), e);
            debug_assert!(false, "ledger rejected a selected winner: {}", e);
            return Err(e.into());
        }

        self.sync.write(SessionPatch::ledger(ledger)).await?;

        tracing::info!(
            "Prize {} goes to {} ({})",
            winner.prize_rank,
            winner.name(),
            winner.id()
        );
        Ok(DrawOutcome::Winner(winner))
    }
}
