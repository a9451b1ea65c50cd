//! Recovery Types
//!
//! This module defines the core types and enums used throughout the recovery process.
//! These types represent the state of transactions, recovery phases, and the
//! per-phase counters reported alongside the result.

use crate::core::common::types::{Lsn, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents the state of a transaction as last seen in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Transaction has begun (or written updates) but no outcome is logged
    Active,
    /// A COMMIT record is known for the transaction
    Committed,
    /// An ABORT record is known for the transaction
    Aborted,
    /// An END record is known for the transaction
    Ended,
}

impl TransactionState {
    /// Returns the lowercase name used in the log payloads and the report.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
            TransactionState::Ended => "ended",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionState {
    type Err = String;

    /// Parses the status strings found in checkpoint payloads. `running` and
    /// `aborting` are accepted as synonyms of `active` and `aborted`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" | "running" => Ok(TransactionState::Active),
            "committed" => Ok(TransactionState::Committed),
            "aborted" | "aborting" => Ok(TransactionState::Aborted),
            "ended" => Ok(TransactionState::Ended),
            other => Err(format!("unknown transaction status '{other}'")),
        }
    }
}

/// Represents the current state of the recovery process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryState {
    /// Recovery has not started
    #[default]
    NotStarted,
    /// Currently in the Analysis phase
    Analysis,
    /// Currently in the Redo phase
    Redo,
    /// Currently in the Undo phase
    Undo,
    /// Recovery has completed successfully
    Completed,
    /// Recovery failed with an error
    Failed,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryState::NotStarted => write!(f, "Not Started"),
            RecoveryState::Analysis => write!(f, "Analysis Phase"),
            RecoveryState::Redo => write!(f, "Redo Phase"),
            RecoveryState::Undo => write!(f, "Undo Phase"),
            RecoveryState::Completed => write!(f, "Completed"),
            RecoveryState::Failed => write!(f, "Failed"),
        }
    }
}

/// Information about a transaction during recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    /// The transaction ID
    pub tx_id: TransactionId,
    /// The last known state of the transaction
    pub state: TransactionState,
    /// The LSN of the last log record for this transaction
    pub last_lsn: Lsn,
    /// Whether a COMMIT is known for this transaction. Stays set when a later
    /// END moves `state` to `Ended`.
    pub commit_seen: bool,
}

impl TransactionInfo {
    /// Creates a new TransactionInfo for an active transaction.
    pub fn new_active(tx_id: TransactionId, last_lsn: Lsn) -> Self {
        Self { tx_id, state: TransactionState::Active, last_lsn, commit_seen: false }
    }

    /// Creates a TransactionInfo from a checkpoint payload entry.
    pub fn from_checkpoint(tx_id: TransactionId, state: TransactionState, last_lsn: Lsn) -> Self {
        Self { tx_id, state, last_lsn, commit_seen: state == TransactionState::Committed }
    }

    /// Records an UPDATE written by this transaction.
    pub fn record_update(&mut self, lsn: Lsn) {
        self.last_lsn = lsn;
        if self.state != TransactionState::Committed {
            self.state = TransactionState::Active;
        }
    }

    /// Marks the transaction as committed.
    pub fn commit(&mut self, lsn: Lsn) {
        self.state = TransactionState::Committed;
        self.last_lsn = lsn;
        self.commit_seen = true;
    }

    /// Marks the transaction as aborted.
    pub fn abort(&mut self, lsn: Lsn) {
        self.state = TransactionState::Aborted;
        self.last_lsn = lsn;
    }

    /// Marks the transaction as ended.
    pub fn end(&mut self, lsn: Lsn) {
        self.state = TransactionState::Ended;
        self.last_lsn = lsn;
    }

    /// Returns true if the transaction is a winner: a COMMIT is known for it.
    /// Anything else (active, aborted, ended without commit) is a loser.
    #[must_use]
    pub const fn is_winner(&self) -> bool {
        self.commit_seen
    }
}

/// Counters collected while scanning the log in the Analysis phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStatistics {
    /// Number of log records scanned forward
    pub records_scanned: usize,
    /// LSN the forward scan started from (`None` for an empty scan range)
    pub scan_start_lsn: Option<Lsn>,
}

/// Counters collected during the Redo phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedoStatistics {
    /// The LSN from which redo started
    pub redo_lsn: Option<Lsn>,
    /// Number of UPDATE records considered
    pub updates_considered: usize,
    /// Number of UPDATE records reapplied
    pub updates_redone: usize,
    /// Number of UPDATE records skipped because the page already reflected them
    pub updates_skipped: usize,
}

/// Counters collected during the Undo phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndoStatistics {
    /// Number of log records visited by the backward scan
    pub records_scanned: usize,
    /// Number of loser UPDATE records considered
    pub loser_updates_considered: usize,
    /// Number of UPDATE records reverted
    pub updates_undone: usize,
}
