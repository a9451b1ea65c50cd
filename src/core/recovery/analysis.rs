//! Analysis Phase Implementation
//!
//! This module implements the Analysis phase of recovery.
//! The Analysis phase scans the log forward from the master checkpoint (or from
//! the first record when there is none) to determine:
//!
//! 1. The last known state of every transaction (Transaction Table)
//! 2. Which pages were dirty and from which LSN (Dirty Page Table)
//! 3. Which transactions are winners (COMMIT known) and which are losers
//! 4. The starting point for the Redo phase

use crate::core::common::types::{Lsn, TransactionId};
use crate::core::common::{RecoveryError, Result};
use crate::core::recovery::tables::{DirtyPageTable, TransactionTable};
use crate::core::recovery::types::{AnalysisStatistics, TransactionInfo};
use crate::core::wal::log_record::LogRecord;
use log::{debug, info};
use std::collections::BTreeSet;

/// Result of the Analysis phase containing the built tables and recovery information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Transaction table built during analysis
    pub transaction_table: TransactionTable,
    /// Dirty page table built during analysis
    pub dirty_page_table: DirtyPageTable,
    /// Transactions with a known COMMIT
    pub winners: BTreeSet<TransactionId>,
    /// All other transactions in the transaction table
    pub losers: BTreeSet<TransactionId>,
    /// LSN to start the Redo phase from
    pub redo_lsn: Option<Lsn>,
    /// LSN of the checkpoint used as the seed, if any
    pub checkpoint_lsn: Option<Lsn>,
    /// Counters for the forward scan
    pub statistics: AnalysisStatistics,
}

impl AnalysisResult {
    /// Creates a new empty AnalysisResult.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of dirty pages that may need redo.
    pub fn dirty_page_count(&self) -> usize {
        self.dirty_page_table.len()
    }

    /// Returns true if recovery has work to do (losers to undo or dirty pages to redo).
    pub fn recovery_needed(&self) -> bool {
        !self.losers.is_empty() || !self.dirty_page_table.is_empty()
    }
}

/// The Analysis phase implementation.
pub struct AnalysisPhase<'a> {
    /// The full log, ordered by LSN
    log: &'a [LogRecord],
    /// Master checkpoint LSN; 0 means no checkpoint
    checkpoint_lsn: Lsn,
    /// Current analysis result being built
    result: AnalysisResult,
}

impl<'a> AnalysisPhase<'a> {
    /// Creates a new Analysis phase over `log` seeded from `checkpoint_lsn`.
    pub fn new(log: &'a [LogRecord], checkpoint_lsn: Lsn) -> Self {
        Self { log, checkpoint_lsn, result: AnalysisResult::new() }
    }

    /// Performs the Analysis phase of recovery.
    ///
    /// # Errors
    /// Returns `RecoveryError::CheckpointNotFound` if a non-zero checkpoint LSN
    /// does not address a CHECKPOINT record.
    pub fn analyze(mut self) -> Result<AnalysisResult> {
        info!("Starting analysis phase (master checkpoint LSN {})", self.checkpoint_lsn);

        // Step 1: Seed tables from the checkpoint (if any)
        self.initialize_from_checkpoint()?;

        // Step 2: Scan forward from the checkpoint to the end of the log
        self.scan_forward_from_checkpoint();

        // Step 3: Split the transaction table into winners and losers
        self.classify_transactions();

        // Step 4: Determine redo starting LSN
        self.result.redo_lsn = self.result.dirty_page_table.min_recovery_lsn();

        info!(
            "Analysis phase completed: {} records scanned, {} winners, {} losers, {} dirty pages",
            self.result.statistics.records_scanned,
            self.result.winners.len(),
            self.result.losers.len(),
            self.result.dirty_page_count()
        );
        Ok(self.result)
    }

    /// Initializes the transaction and dirty page tables from the master checkpoint.
    fn initialize_from_checkpoint(&mut self) -> Result<()> {
        if self.checkpoint_lsn == 0 {
            debug!("No master checkpoint, scanning the whole log");
            return Ok(());
        }

        let log = self.log;
        let checkpoint_lsn = self.checkpoint_lsn;
        let checkpoint = log.iter().find(|record| record.lsn() == checkpoint_lsn);
        let Some(LogRecord::Checkpoint { dirty_pages, transactions, .. }) = checkpoint else {
            return Err(RecoveryError::CheckpointNotFound(self.checkpoint_lsn));
        };

        for (tx_id, entry) in transactions {
            self.result.transaction_table.insert(TransactionInfo::from_checkpoint(
                tx_id.clone(),
                entry.state,
                entry.last_lsn,
            ));
        }
        for (page_id, rec_lsn) in dirty_pages {
            self.result.dirty_page_table.mark_dirty(page_id, *rec_lsn);
        }

        self.result.checkpoint_lsn = Some(self.checkpoint_lsn);
        debug!(
            "Seeded {} transactions and {} dirty pages from checkpoint at LSN {}",
            transactions.len(),
            dirty_pages.len(),
            self.checkpoint_lsn
        );
        Ok(())
    }

    /// Scans forward from the checkpoint (inclusive) to the end of the log.
    fn scan_forward_from_checkpoint(&mut self) {
        let start_lsn = self.checkpoint_lsn;
        let log = self.log;

        for record in log.iter().filter(|record| record.lsn() >= start_lsn) {
            if self.result.statistics.scan_start_lsn.is_none() {
                self.result.statistics.scan_start_lsn = Some(record.lsn());
            }
            self.process_log_record(record);
            self.result.statistics.records_scanned += 1;
        }
    }

    /// Processes a single log record during the forward scan.
    fn process_log_record(&mut self, record: &LogRecord) {
        let table = &mut self.result.transaction_table;
        match record {
            LogRecord::Begin { lsn, tx_id } => table.begin_transaction(tx_id, *lsn),
            LogRecord::Update { lsn, tx_id, page_id, .. } => {
                table.update_transaction(tx_id, *lsn);
                if self.result.dirty_page_table.mark_dirty(page_id, *lsn) {
                    debug!("Page {} dirtied at LSN {}", page_id, lsn);
                }
            }
            LogRecord::Commit { lsn, tx_id } => table.commit_transaction(tx_id, *lsn),
            LogRecord::Abort { lsn, tx_id } => table.abort_transaction(tx_id, *lsn),
            LogRecord::End { lsn, tx_id } => table.end_transaction(tx_id, *lsn),
            LogRecord::Checkpoint { .. } => {
                // The seed checkpoint was applied up front; any other is ignored
            }
            LogRecord::Other { lsn, kind } => debug!("Ignoring {} record at LSN {}", kind, lsn),
        }
    }

    fn classify_transactions(&mut self) {
        self.result.winners = self.result.transaction_table.winners();
        self.result.losers = self.result.transaction_table.losers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::common::types::PageId;
    use crate::core::recovery::test_support::{begin, checkpoint, commit, end, abort, tx_set, update};
    use crate::core::recovery::types::TransactionState;

    #[test]
    fn test_analysis_empty_log() {
        let result = AnalysisPhase::new(&[], 0).analyze().unwrap();

        assert!(result.transaction_table.is_empty());
        assert!(result.dirty_page_table.is_empty());
        assert!(result.winners.is_empty());
        assert!(result.losers.is_empty());
        assert_eq!(result.redo_lsn, None);
        assert_eq!(result.checkpoint_lsn, None);
        assert_eq!(result.statistics.records_scanned, 0);
        assert!(!result.recovery_needed());
    }

    #[test]
    fn test_analysis_winner_and_loser() {
        let log = vec![
            begin(1, "T1"),
            update(2, "T1", "P1", 0, 5),
            commit(3, "T1"),
            begin(4, "T2"),
            update(5, "T2", "P1", 5, 9),
        ];
        let result = AnalysisPhase::new(&log, 0).analyze().unwrap();

        assert_eq!(result.winners, tx_set(&["T1"]));
        assert_eq!(result.losers, tx_set(&["T2"]));
        assert_eq!(result.dirty_page_table.len(), 1);
        assert_eq!(result.dirty_page_table.get(&PageId::from("P1")).unwrap().recovery_lsn, 2);
        assert_eq!(result.redo_lsn, Some(2));
        assert_eq!(result.statistics.records_scanned, 5);
        assert_eq!(result.statistics.scan_start_lsn, Some(1));

        let t1 = result.transaction_table.get(&TransactionId::from("T1")).unwrap();
        assert_eq!(t1.state, TransactionState::Committed);
        assert_eq!(t1.last_lsn, 3);
        let t2 = result.transaction_table.get(&TransactionId::from("T2")).unwrap();
        assert_eq!(t2.state, TransactionState::Active);
        assert_eq!(t2.last_lsn, 5);
        assert!(result.recovery_needed());
    }

    #[test]
    fn test_unrecognized_records_are_skipped() {
        let log = vec![
            begin(1, "T1"),
            LogRecord::Other { lsn: 2, kind: "PREPARE".to_string() },
            commit(3, "T1"),
        ];
        let result = AnalysisPhase::new(&log, 0).analyze().unwrap();

        assert_eq!(result.winners, tx_set(&["T1"]));
        assert_eq!(result.transaction_table.len(), 1);
        assert!(result.dirty_page_table.is_empty());
        assert_eq!(result.statistics.records_scanned, 3);
    }

    #[test]
    fn test_end_after_commit_stays_winner() {
        let log = vec![begin(1, "T1"), commit(2, "T1"), end(3, "T1")];
        let result = AnalysisPhase::new(&log, 0).analyze().unwrap();

        assert_eq!(result.winners, tx_set(&["T1"]));
        let t1 = result.transaction_table.get(&TransactionId::from("T1")).unwrap();
        assert_eq!(t1.state, TransactionState::Ended);
        assert_eq!(t1.last_lsn, 3);
    }

    #[test]
    fn test_aborted_and_ended_without_commit_are_losers() {
        let log = vec![
            begin(1, "T1"),
            update(2, "T1", "P1", 0, 1),
            abort(3, "T1"),
            end(4, "T2"),
        ];
        let result = AnalysisPhase::new(&log, 0).analyze().unwrap();

        assert!(result.winners.is_empty());
        assert_eq!(result.losers, tx_set(&["T1", "T2"]));
        assert_eq!(
            result.transaction_table.get(&TransactionId::from("T1")).unwrap().state,
            TransactionState::Aborted
        );
        assert_eq!(
            result.transaction_table.get(&TransactionId::from("T2")).unwrap().state,
            TransactionState::Ended
        );
    }

    #[test]
    fn test_dirty_page_keeps_first_update_lsn() {
        let log = vec![
            update(1, "T1", "P1", 0, 1),
            update(2, "T1", "P2", 0, 1),
            update(3, "T2", "P1", 1, 2),
        ];
        let result = AnalysisPhase::new(&log, 0).analyze().unwrap();

        assert_eq!(result.dirty_page_table.get(&PageId::from("P1")).unwrap().recovery_lsn, 1);
        assert_eq!(result.dirty_page_table.get(&PageId::from("P2")).unwrap().recovery_lsn, 2);
        // UPDATE without BEGIN still registers the transaction
        assert_eq!(result.losers, tx_set(&["T1", "T2"]));
    }

    #[test]
    fn test_checkpoint_seed_equals_payload() {
        let log = vec![
            begin(1, "T1"),
            update(2, "T1", "P1", 0, 5),
            checkpoint(3, &[("P1", 2)], &[("T1", TransactionState::Active, 2)]),
        ];
        let result = AnalysisPhase::new(&log, 3).analyze().unwrap();

        assert_eq!(result.checkpoint_lsn, Some(3));
        assert_eq!(result.statistics.records_scanned, 1);
        assert_eq!(result.statistics.scan_start_lsn, Some(3));
        assert_eq!(result.transaction_table.len(), 1);
        let t1 = result.transaction_table.get(&TransactionId::from("T1")).unwrap();
        assert_eq!((t1.state, t1.last_lsn), (TransactionState::Active, 2));
        assert_eq!(result.dirty_page_table.len(), 1);
        assert_eq!(result.dirty_page_table.get(&PageId::from("P1")).unwrap().recovery_lsn, 2);
    }

    #[test]
    fn test_checkpoint_then_forward_scan() {
        let log = vec![
            begin(1, "T1"),
            update(2, "T1", "P1", 0, 5),
            begin(3, "T2"),
            checkpoint(
                4,
                &[("P1", 2)],
                &[("T1", TransactionState::Active, 2), ("T2", TransactionState::Active, 3)],
            ),
            commit(5, "T1"),
            update(6, "T2", "P2", 0, 7),
            update(7, "T2", "P1", 5, 6),
        ];
        let result = AnalysisPhase::new(&log, 4).analyze().unwrap();

        assert_eq!(result.winners, tx_set(&["T1"]));
        assert_eq!(result.losers, tx_set(&["T2"]));
        // P1 keeps the checkpoint's recLSN; P2 is added by the scan
        assert_eq!(result.dirty_page_table.get(&PageId::from("P1")).unwrap().recovery_lsn, 2);
        assert_eq!(result.dirty_page_table.get(&PageId::from("P2")).unwrap().recovery_lsn, 6);
        assert_eq!(result.redo_lsn, Some(2));
        assert_eq!(result.transaction_table.get(&TransactionId::from("T2")).unwrap().last_lsn, 7);
        assert_eq!(result.statistics.records_scanned, 4);
    }

    #[test]
    fn test_committed_in_checkpoint_is_winner() {
        let log = vec![checkpoint(1, &[], &[("T1", TransactionState::Committed, 0)])];
        let result = AnalysisPhase::new(&log, 1).analyze().unwrap();
        assert_eq!(result.winners, tx_set(&["T1"]));
        assert!(result.losers.is_empty());
    }

    #[test]
    fn test_other_checkpoints_are_ignored() {
        let log = vec![
            checkpoint(1, &[("P9", 1)], &[("T9", TransactionState::Active, 1)]),
            begin(2, "T1"),
            checkpoint(3, &[("P8", 3)], &[("T8", TransactionState::Active, 3)]),
        ];
        let result = AnalysisPhase::new(&log, 1).analyze().unwrap();

        assert!(!result.dirty_page_table.contains(&PageId::from("P8")));
        assert!(!result.transaction_table.contains(&TransactionId::from("T8")));
        assert_eq!(result.losers, tx_set(&["T1", "T9"]));
    }

    #[test]
    fn test_checkpoint_lsn_must_address_checkpoint() {
        let log = vec![begin(1, "T1"), update(2, "T1", "P1", 0, 1)];

        assert!(matches!(
            AnalysisPhase::new(&log, 2).analyze(),
            Err(RecoveryError::CheckpointNotFound(2))
        ));
        assert!(matches!(
            AnalysisPhase::new(&log, 10).analyze(),
            Err(RecoveryError::CheckpointNotFound(10))
        ));
    }

    #[test]
    fn test_partition_covers_every_transaction() {
        let log = vec![
            begin(1, "T1"),
            update(2, "T2", "P1", 0, 1),
            commit(3, "T3"),
            end(4, "T4"),
            abort(5, "T5"),
        ];
        let result = AnalysisPhase::new(&log, 0).analyze().unwrap();

        let all: BTreeSet<_> = result.winners.union(&result.losers).cloned().collect();
        assert_eq!(all, tx_set(&["T1", "T2", "T3", "T4", "T5"]));
        assert!(result.winners.is_disjoint(&result.losers));
    }
}
