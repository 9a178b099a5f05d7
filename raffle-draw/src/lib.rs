//! Raffle draws
//!
//! Picks unique winners uniformly at random from a participant pool and
//! drives draw, delete and reset through the shared session.

pub mod error;
pub mod selection;
pub mod session;

pub use error::{DrawError, Result};
pub use selection::{select_unique_winner, Selection};
pub use session::{DrawOutcome, DrawSession};
