//! Raffle core - prize ledger, shared session sync and interchange formats
//!
//! Every client holds a cached copy of one shared session document (the
//! participant pool plus the prize ledger), mirrors it into a local SQLite
//! cache and keeps it in step with a remote document store when one is
//! configured.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod ledger;
pub mod storage;
pub mod sync;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{RaffleConfig, RemoteConfig};
pub use error::{LedgerError, RaffleError, Result};
pub use ledger::{LedgerState, PrizeLedger};
pub use storage::Storage;
pub use sync::{backend_from_config, MemoryBackend, RemoteBackend, SyncManager, SyncMode};
pub use types::{ParticipantRecord, SessionPatch, SharedSessionState, Winner};
