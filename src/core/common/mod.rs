pub mod error;
pub mod types;

pub use error::RecoveryError;
pub use types::{Lsn, PageId, TransactionId};

/// Result type used throughout the recovery core.
pub type Result<T> = std::result::Result<T, RecoveryError>;
