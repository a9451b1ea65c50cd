//! Crash Recovery
//!
//! This module implements ARIES-style recovery for the page store, in a
//! simplified variant: winners are the transactions with a known COMMIT, and
//! undo writes no compensation log records.
//!
//! Recovery consists of three phases:
//! 1. **Analysis Phase**: Rebuilds the transaction and dirty page tables from the
//!    master checkpoint forward and splits transactions into winners and losers.
//! 2. **Redo Phase**: Repeats history from the smallest recLSN, skipping updates
//!    the pages already reflect.
//! 3. **Undo Phase**: Scans the log backwards and reverts losers' updates that are
//!    still the latest effect on their page.
//!
//! ## Module Structure
//!
//! - `analysis`: Implementation of the Analysis phase
//! - `redo`: Implementation of the Redo phase
//! - `undo`: Implementation of the Undo phase
//! - `tables`: Transaction and dirty page tables used during recovery
//! - `report`: Structured outcome and its text rendering
//! - `types`: Common types and enums used throughout recovery

pub mod analysis;
pub mod redo;
pub mod report;
pub mod tables;
pub mod types;
pub mod undo;

pub use analysis::{AnalysisPhase, AnalysisResult};
pub use redo::RedoPhase;
pub use report::RecoveryReport;
pub use tables::{DirtyPageTable, TransactionTable};
pub use types::{RecoveryState, TransactionInfo, TransactionState};
pub use undo::UndoPhase;

use crate::core::common::types::{Lsn, TransactionId};
use crate::core::common::{RecoveryError, Result};
use crate::core::scenario::Scenario;
use crate::core::storage::page_store::PageStore;
use crate::core::wal::log_record::LogRecord;
use crate::core::wal::reader::check_lsn_order;
use log::{info, warn};
use std::collections::BTreeSet;
use self::types::{AnalysisStatistics, RedoStatistics, UndoStatistics};

/// Runs the Analysis phase over `log`, seeded from `checkpoint_lsn` (0 = none).
pub fn analysis(log: &[LogRecord], checkpoint_lsn: Lsn) -> Result<AnalysisResult> {
    AnalysisPhase::new(log, checkpoint_lsn).analyze()
}

/// Runs the Redo phase and returns the reapplied LSNs in increasing order.
///
/// Fails with `LsnOrdering` unless `log` is strictly increasing in LSN.
pub fn redo(log: &[LogRecord], dirty_page_table: &DirtyPageTable, pages: &mut PageStore) -> Result<Vec<Lsn>> {
    RedoPhase::new(dirty_page_table).redo(log, pages)
}

/// Runs the Undo phase and returns the reverted LSNs in decreasing order.
///
/// Fails with `LsnOrdering` unless `log` is strictly increasing in LSN.
pub fn undo(log: &[LogRecord], losers: &BTreeSet<TransactionId>, pages: &mut PageStore) -> Result<Vec<Lsn>> {
    UndoPhase::new(losers).undo(log, pages)
}

/// Runs a full recovery of `scenario` and returns the final pages and the report.
pub fn recover(scenario: Scenario) -> Result<(PageStore, RecoveryReport)> {
    RecoveryManager::new().recover(scenario)
}

/// The main recovery manager that orchestrates the recovery process.
///
/// It sequences the three phases, hands each one the state produced by the
/// previous one, and keeps the per-phase counters of the last run.
#[derive(Debug, Default)]
pub struct RecoveryManager {
    state: RecoveryState,
    analysis_statistics: AnalysisStatistics,
    redo_statistics: RedoStatistics,
    undo_statistics: UndoStatistics,
}

impl RecoveryManager {
    /// Creates a new recovery manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Performs the complete recovery process.
    ///
    /// This method executes all three phases of recovery:
    /// 1. Analysis phase to build transaction and dirty page tables
    /// 2. Redo phase to restore the page state at crash time
    /// 3. Undo phase to roll back loser transactions
    pub fn recover(&mut self, scenario: Scenario) -> Result<(PageStore, RecoveryReport)> {
        let result = self.run_phases(scenario);
        match &result {
            Ok(_) => self.state = RecoveryState::Completed,
            Err(e) => {
                warn!("Recovery failed during {}: {}", self.state, e);
                self.state = RecoveryState::Failed;
            }
        }
        result
    }

    fn run_phases(&mut self, scenario: Scenario) -> Result<(PageStore, RecoveryReport)> {
        let Scenario { log, mut pages, master_checkpoint_lsn } = scenario;

        self.state = RecoveryState::Analysis;
        check_lsn_order(&log)?;
        check_page_references(&log, &pages)?;

        info!(
            "Starting recovery: {} log records, {} pages, master checkpoint LSN {}",
            log.len(),
            pages.len(),
            master_checkpoint_lsn
        );

        // Phase 1: Analysis
        let analysis_result = analysis(&log, master_checkpoint_lsn)?;
        self.analysis_statistics = analysis_result.statistics;
        if !analysis_result.recovery_needed() {
            info!("No dirty pages and no losers, pages are already consistent");
        }

        // Phase 2: Redo
        self.state = RecoveryState::Redo;
        let mut redo_phase = RedoPhase::new(&analysis_result.dirty_page_table);
        let redone_lsns = redo_phase.redo(&log, &mut pages)?;
        self.redo_statistics = redo_phase.get_statistics();

        // Phase 3: Undo
        self.state = RecoveryState::Undo;
        let mut undo_phase = UndoPhase::new(&analysis_result.losers);
        let undone_lsns = undo_phase.undo(&log, &mut pages)?;
        self.undo_statistics = undo_phase.get_statistics();

        let AnalysisResult { transaction_table, dirty_page_table, winners, losers, .. } = analysis_result;
        let report = RecoveryReport {
            winners: winners.into_iter().collect(),
            losers: losers.into_iter().collect(),
            transaction_table,
            dirty_page_table,
            redone_lsns,
            undone_lsns,
            final_pages: pages.clone(),
        };

        info!(
            "Recovery completed: {} redone, {} undone",
            report.redone_lsns.len(),
            report.undone_lsns.len()
        );
        Ok((pages, report))
    }

    /// Returns the state reached by the last run.
    pub const fn state(&self) -> RecoveryState {
        self.state
    }

    pub const fn analysis_statistics(&self) -> AnalysisStatistics {
        self.analysis_statistics
    }

    pub const fn redo_statistics(&self) -> RedoStatistics {
        self.redo_statistics
    }

    pub const fn undo_statistics(&self) -> UndoStatistics {
        self.undo_statistics
    }
}

/// Fails with `UnknownPage` for the first UPDATE whose page is not in `pages`,
/// wherever it sits in the log. Redo and Undo only visit part of the log, so
/// they cannot be relied on to notice.
fn check_page_references(log: &[LogRecord], pages: &PageStore) -> Result<()> {
    let missing = log.iter().find_map(|record| match record {
        LogRecord::Update { lsn, page_id, .. } if !pages.contains(page_id) => Some((*lsn, page_id)),
        _ => None,
    });
    match missing {
        Some((lsn, page_id)) => Err(RecoveryError::UnknownPage { lsn, page: page_id.clone() }),
        None => Ok(()),
    }
}
