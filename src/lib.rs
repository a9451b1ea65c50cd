#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::all)]

//! # Miniaries: ARIES-style crash recovery for a page store
//!
//! `miniaries` recovers a small page store from a write-ahead log after a crash.
//! It features:
//! - Analysis from the master checkpoint, rebuilding the transaction and dirty page tables
//! - Idempotent redo that repeats history from the smallest recLSN
//! - Undo of loser transactions in a single backward pass, without compensation records
//! - A deterministic, diff-friendly report of every decision
//!
//! Winners are the transactions whose COMMIT is in the log; everything else is
//! rolled back.

pub mod core;

// Re-export key types for easier use by library consumers
pub use crate::core::common::{RecoveryError, Result};
pub use crate::core::config::RecoveryConfig;
pub use crate::core::recovery::{recover, RecoveryManager, RecoveryReport};
pub use crate::core::scenario::{recover_dir, write_outputs, Scenario};
pub use crate::core::storage::page_store::{Page, PageStore};
pub use crate::core::wal::log_record::LogRecord;
