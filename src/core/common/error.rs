//! Error taxonomy for recovery.
//!
//! Every failure surfaces to the caller as a distinct variant. Recovery never
//! skips a record it cannot interpret and never invents page state.

use crate::core::common::types::{Lsn, PageId};
use std::io;

/// Errors that can occur while loading a scenario or running recovery.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error in {source_name} at line {line}: {message}")]
    Parse { source_name: String, line: usize, message: String },

    #[error("Malformed log record at LSN {lsn}: {reason}")]
    MalformedRecord { lsn: Lsn, reason: String },

    #[error("LSN ordering violation: LSN {found} follows LSN {previous}")]
    LsnOrdering { previous: Lsn, found: Lsn },

    #[error("Master checkpoint LSN {0} does not address a CHECKPOINT record")]
    CheckpointNotFound(Lsn),

    #[error("UPDATE at LSN {lsn} references page {page} which is not in the page store")]
    UnknownPage { lsn: Lsn, page: PageId },

    #[error("Serialization error in {target}: {message}")]
    Serialization { target: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RecoveryError {
    /// Builds a `MalformedRecord` error.
    pub fn malformed(lsn: Lsn, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { lsn, reason: reason.into() }
    }

    /// Builds a `Serialization` error for output rendered as `target`.
    pub fn serialization(target: &str, error: &serde_json::Error) -> Self {
        Self::Serialization { target: target.to_string(), message: error.to_string() }
    }
}
