use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaffleError>;

#[derive(Error, Debug)]
pub enum RaffleError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported file format: .{extension} (expected .csv, .txt, .xlsx or .xls)")]
    UnsupportedFormat { extension: String },

    #[error("No participant records found in input")]
    NoRecords,

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Dialog error: {0}")]
    Dialog(String),
}

/// Rejected prize ledger transitions.
///
/// `AlreadyExhausted` and `DuplicateWinner` mean an upstream component let an
/// invalid draw through; `NotFound` is an ordinary miss on delete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No prizes remaining")]
    AlreadyExhausted,

    #[error("Participant {id} has already won")]
    DuplicateWinner { id: String },

    #[error("No winner with id {id}")]
    NotFound { id: String },
}

impl RaffleError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    pub fn spreadsheet(msg: impl Into<String>) -> Self {
        Self::Spreadsheet(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn dialog(msg: impl Into<String>) -> Self {
        Self::Dialog(msg.into())
    }

    /// Errors caused by the operator's input file rather than the system.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_)
                | Self::UnsupportedFormat { .. }
                | Self::NoRecords
                | Self::Spreadsheet(_)
        )
    }
}

impl From<reqwest::Error> for RaffleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RaffleError::Timeout(err.to_string())
        } else {
            RaffleError::Network(err.to_string())
        }
    }
}

// conversion from dialoguer::Error
impl From<dialoguer::Error> for RaffleError {
    fn from(err: dialoguer::Error) -> Self {
        RaffleError::Dialog(err.to_string())
    }
}
