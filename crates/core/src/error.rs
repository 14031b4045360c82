use crate::episode::EpisodeStatus;

#[derive(Debug, thiserror::Error)]
pub enum HmoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read catalog file: {0}")]
    CatalogRead(std::io::Error),
    #[error("catalog schema mismatch at {path}: {message}")]
    CatalogSchema { path: String, message: String },
    #[error("invalid coverage rule {rule_id}: {reason}")]
    InvalidCoverageRule { rule_id: String, reason: String },
    #[error("duplicate {kind} in catalog: {id}")]
    DuplicateCatalogEntry { kind: &'static str, id: String },

    #[error("payment amount must be positive, got {0}")]
    InvalidPaymentAmount(i64),
    #[error("bill {0} is closed to payments")]
    BillClosed(String),

    #[error("episode {0} is locked for audit")]
    EpisodeLocked(String),
    #[error("episode cannot move from {from:?} to {to:?}")]
    InvalidEpisodeTransition {
        from: EpisodeStatus,
        to: EpisodeStatus,
    },
}

pub type HmoResult<T> = std::result::Result<T, HmoError>;
