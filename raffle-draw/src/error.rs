use raffle_core::{LedgerError, RaffleError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DrawError>;

#[derive(Error, Debug)]
pub enum DrawError {
    #[error("Raffle core error: {0}")]
    Core(#[from] RaffleError),

    #[error("A draw is already in progress")]
    DrawInProgress,

    #[error("Ledger rejected update: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrawError {
    /// `NotFound` on delete is an ordinary miss, not a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DrawError::Ledger(LedgerError::NotFound { .. })
                | DrawError::Core(RaffleError::Ledger(LedgerError::NotFound { .. }))
        )
    }
}
