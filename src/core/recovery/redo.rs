//! Redo Phase Implementation
//!
//! The Redo phase is the second phase of recovery.
//! It repeats history by reapplying every logged UPDATE from the redo LSN forward,
//! for winners and losers alike.
//!
//! Key responsibilities:
//! - Start from the minimum recLSN in the Dirty Page Table
//! - Apply an UPDATE only if the page LSN is less than the log record LSN
//! - Advance the page LSN to the record LSN after each applied update

use crate::core::common::types::{Lsn, PageId};
use crate::core::common::Result;
use crate::core::recovery::tables::DirtyPageTable;
use crate::core::recovery::types::{RecoveryState, RedoStatistics};
use crate::core::storage::page_store::PageStore;
use crate::core::wal::log_record::LogRecord;
use crate::core::wal::reader::check_lsn_order;
use log::{debug, info};

/// The Redo phase of recovery.
pub struct RedoPhase<'a> {
    /// The dirty page table from the Analysis phase
    dirty_page_table: &'a DirtyPageTable,
    /// The LSN to start redoing from
    redo_lsn: Option<Lsn>,
    /// Current state of the redo phase
    state: RecoveryState,
    /// Counters collected during redo
    statistics: RedoStatistics,
}

impl<'a> RedoPhase<'a> {
    /// Creates a new `RedoPhase` with the given dirty page table.
    #[must_use]
    pub fn new(dirty_page_table: &'a DirtyPageTable) -> Self {
        let redo_lsn = dirty_page_table.min_recovery_lsn();

        Self {
            dirty_page_table,
            redo_lsn,
            state: RecoveryState::NotStarted,
            statistics: RedoStatistics { redo_lsn, ..RedoStatistics::default() },
        }
    }

    /// Performs the complete redo phase over `pages`.
    ///
    /// # Returns
    /// * `Ok(lsns)` - the LSNs actually reapplied, in increasing order
    /// * `Err(RecoveryError::LsnOrdering)` - `log` is not in strictly increasing LSN order
    /// * `Err(RecoveryError::UnknownPage)` - an UPDATE targets a page missing from `pages`
    pub fn redo(&mut self, log: &[LogRecord], pages: &mut PageStore) -> Result<Vec<Lsn>> {
        self.state = RecoveryState::Redo;
        check_lsn_order(log)?;

        // If there's no redo LSN, nothing was dirty at crash time
        let Some(redo_lsn) = self.redo_lsn else {
            info!("Dirty page table is empty, skipping redo phase");
            self.state = RecoveryState::Completed;
            return Ok(Vec::new());
        };

        info!(
            "Starting redo phase from LSN {} ({} dirty pages)",
            redo_lsn,
            self.dirty_page_table.len()
        );

        let mut redone = Vec::new();
        for record in log.iter().filter(|record| record.lsn() >= redo_lsn) {
            if let LogRecord::Update { lsn, page_id, after, .. } = record {
                if self.redo_update(*lsn, page_id, *after, pages)? {
                    redone.push(*lsn);
                }
            }
        }

        self.state = RecoveryState::Completed;
        info!(
            "Redo phase completed: {} updates redone, {} already reflected on disk",
            self.statistics.updates_redone, self.statistics.updates_skipped
        );
        Ok(redone)
    }

    /// Redoes one update. Returns true if it was applied.
    fn redo_update(
        &mut self,
        lsn: Lsn,
        page_id: &PageId,
        after_image: i64,
        pages: &mut PageStore,
    ) -> Result<bool> {
        self.statistics.updates_considered += 1;
        let page = pages.page_for_update(page_id, lsn)?;

        // Only redo if page LSN < log record LSN
        if page.get_lsn() < lsn {
            page.apply(after_image, lsn);
            self.statistics.updates_redone += 1;
            debug!("Redid LSN {} on page {} (value={})", lsn, page_id, after_image);
            Ok(true)
        } else {
            self.statistics.updates_skipped += 1;
            debug!("Skipped LSN {} on page {}: pageLSN={}", lsn, page_id, page.get_lsn());
            Ok(false)
        }
    }

    /// Returns the redo LSN determined for this phase.
    #[must_use]
    pub const fn get_redo_lsn(&self) -> Option<Lsn> {
        self.redo_lsn
    }

    /// Returns the current state of the redo phase.
    #[must_use]
    pub const fn get_state(&self) -> RecoveryState {
        self.state
    }

    /// Returns statistics about the redo phase.
    #[must_use]
    pub const fn get_statistics(&self) -> RedoStatistics {
        self.statistics
    }
}
