//! Undo Phase Implementation
//!
//! The Undo phase is the third and final phase of recovery.
//! It reverts the effects of loser transactions so that only committed work
//! remains on the pages.
//!
//! Key responsibilities:
//! - Scan the whole log backwards, from the highest LSN to the lowest
//! - Revert a loser's UPDATE only if it is still the latest effect on its page
//!   (`pageLSN == LSN`)
//! - Restore the before-image and rewind the page LSN to the previous UPDATE of
//!   that page (or 0 if there is none)
//!
//! No compensation log records are written: undo is a single backward pass.

use crate::core::common::types::{Lsn, PageId, TransactionId};
use crate::core::common::Result;
use crate::core::recovery::types::{RecoveryState, UndoStatistics};
use crate::core::storage::page_store::PageStore;
use crate::core::wal::log_record::LogRecord;
use crate::core::wal::reader::check_lsn_order;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

/// The Undo phase implementation.
pub struct UndoPhase<'a> {
    /// Loser transactions from the Analysis phase
    losers: &'a BTreeSet<TransactionId>,
    /// Current state of the undo phase
    state: RecoveryState,
    /// Counters collected during undo
    statistics: UndoStatistics,
}

impl<'a> UndoPhase<'a> {
    /// Creates a new Undo phase for the given loser transactions.
    #[must_use]
    pub fn new(losers: &'a BTreeSet<TransactionId>) -> Self {
        Self { losers, state: RecoveryState::NotStarted, statistics: UndoStatistics::default() }
    }

    /// Performs the Undo phase of recovery.
    ///
    /// Returns the LSNs that were reverted, in decreasing order. `log` must be
    /// in strictly increasing LSN order, otherwise `RecoveryError::LsnOrdering`
    /// is returned and no page is touched.
    pub fn undo(&mut self, log: &[LogRecord], pages: &mut PageStore) -> Result<Vec<Lsn>> {
        self.state = RecoveryState::Undo;
        check_lsn_order(log)?;

        if self.losers.is_empty() {
            info!("No loser transactions found, skipping undo phase");
            self.state = RecoveryState::Completed;
            return Ok(Vec::new());
        }

        info!("Starting undo phase for {} loser transactions", self.losers.len());

        let update_history = UpdateHistory::build(log);
        let mut undone = Vec::new();

        for record in log.iter().rev() {
            self.statistics.records_scanned += 1;

            let LogRecord::Update { lsn, tx_id, page_id, before, .. } = record else {
                continue;
            };
            if !self.losers.contains(tx_id) {
                continue;
            }

            self.statistics.loser_updates_considered += 1;
            let page = pages.page_for_update(page_id, *lsn)?;

            if page.get_lsn() == *lsn {
                let previous_lsn = update_history.previous_update(page_id, *lsn);
                page.apply(*before, previous_lsn);
                undone.push(*lsn);
                self.statistics.updates_undone += 1;
                debug!(
                    "Undid LSN {} of {} on page {} (value={}, pageLSN={})",
                    lsn, tx_id, page_id, before, previous_lsn
                );
            } else {
                debug!(
                    "Skipped undo of LSN {} on page {}: pageLSN={}",
                    lsn,
                    page_id,
                    page.get_lsn()
                );
            }
        }

        self.state = RecoveryState::Completed;
        info!(
            "Undo phase completed: {} records scanned, {} updates undone",
            self.statistics.records_scanned, self.statistics.updates_undone
        );
        Ok(undone)
    }

    /// Returns the current state of the undo phase.
    #[must_use]
    pub const fn get_state(&self) -> RecoveryState {
        self.state
    }

    /// Returns statistics about the undo phase.
    #[must_use]
    pub const fn get_statistics(&self) -> UndoStatistics {
        self.statistics
    }
}

/// LSNs of the UPDATE records of each page, in log order.
struct UpdateHistory {
    by_page: HashMap<PageId, Vec<Lsn>>,
}

impl UpdateHistory {
    fn build(log: &[LogRecord]) -> Self {
        let mut by_page: HashMap<PageId, Vec<Lsn>> = HashMap::new();
        for record in log {
            if let LogRecord::Update { lsn, page_id, .. } = record {
                by_page.entry(page_id.clone()).or_default().push(*lsn);
            }
        }
        Self { by_page }
    }

    /// LSN of the latest UPDATE of `page_id` strictly before `lsn`, or 0.
    /// Relies on the per-page lists being sorted, which holds for an ordered log.
    fn previous_update(&self, page_id: &PageId, lsn: Lsn) -> Lsn {
        self.by_page
            .get(page_id)
            .and_then(|lsns| {
                let idx = lsns.partition_point(|&candidate| candidate < lsn);
                idx.checked_sub(1).map(|prev| lsns[prev])
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::common::RecoveryError;
    use crate::core::recovery::test_support::{begin, commit, page_store, tx_set, update};
    use crate::core::storage::page_store::Page;

    #[test]
    fn test_undo_reverts_loser_update() {
        let log = vec![
            begin(1, "T1"),
            update(2, "T1", "P1", 0, 5),
            commit(3, "T1"),
            begin(4, "T2"),
            update(5, "T2", "P1", 5, 9),
        ];
        let losers = tx_set(&["T2"]);
        // State after redo
        let mut pages = page_store(&[("P1", 9, 5)]);

        let mut undo_phase = UndoPhase::new(&losers);
        let undone = undo_phase.undo(&log, &mut pages).unwrap();

        assert_eq!(undone, vec![5]);
        assert_eq!(pages.get(&PageId::from("P1")), Some(&Page::new(5, 2)));
        assert_eq!(undo_phase.get_state(), RecoveryState::Completed);
        let stats = undo_phase.get_statistics();
        assert_eq!(stats.records_scanned, 5);
        assert_eq!(stats.loser_updates_considered, 1);
        assert_eq!(stats.updates_undone, 1);
    }

    #[test]
    fn test_undo_unwinds_chained_updates() {
        let log = vec![
            update(1, "T1", "P1", 0, 1),
            update(2, "T1", "P1", 1, 2),
            update(3, "T1", "P1", 2, 3),
        ];
        let losers = tx_set(&["T1"]);
        let mut pages = page_store(&[("P1", 3, 3)]);

        let undone = UndoPhase::new(&losers).undo(&log, &mut pages).unwrap();

        assert_eq!(undone, vec![3, 2, 1]);
        assert!(undone.windows(2).all(|pair| pair[0] > pair[1]));
        assert_eq!(pages.get(&PageId::from("P1")), Some(&Page::new(0, 0)));
    }

    #[test]
    fn test_undo_skips_superseded_update() {
        // T2 (loser) wrote P1, then T1 (winner) overwrote it
        let log = vec![
            update(1, "T2", "P1", 0, 4),
            update(2, "T1", "P1", 4, 8),
            commit(3, "T1"),
        ];
        let losers = tx_set(&["T2"]);
        let mut pages = page_store(&[("P1", 8, 2)]);

        let undone = UndoPhase::new(&losers).undo(&log, &mut pages).unwrap();

        assert!(undone.is_empty());
        assert_eq!(pages.get(&PageId::from("P1")), Some(&Page::new(8, 2)));
    }

    #[test]
    fn test_undo_ignores_winners() {
        let log = vec![update(1, "T1", "P1", 0, 4), commit(2, "T1"), update(3, "T2", "P2", 0, 6)];
        let losers = tx_set(&["T2"]);
        let mut pages = page_store(&[("P1", 4, 1), ("P2", 6, 3)]);

        let undone = UndoPhase::new(&losers).undo(&log, &mut pages).unwrap();

        assert_eq!(undone, vec![3]);
        assert_eq!(pages.get(&PageId::from("P1")), Some(&Page::new(4, 1)));
        assert_eq!(pages.get(&PageId::from("P2")), Some(&Page::new(0, 0)));
    }

    #[test]
    fn test_undo_correctness_property() {
        let log = vec![
            update(1, "T1", "P1", 0, 10),
            update(2, "T2", "P2", 0, 20),
            update(3, "T2", "P1", 10, 11),
            commit(4, "T1"),
        ];
        let losers = tx_set(&["T2"]);
        let mut pages = page_store(&[("P1", 11, 3), ("P2", 20, 2)]);
        let before_undo = pages.clone();

        let undone = UndoPhase::new(&losers).undo(&log, &mut pages).unwrap();
        assert_eq!(undone, vec![3, 2]);

        for lsn in undone {
            let Some(LogRecord::Update { page_id, before, after, .. }) =
                log.iter().find(|record| record.lsn() == lsn)
            else {
                panic!("undone LSN {lsn} is not an UPDATE");
            };
            assert_eq!(before_undo.get(page_id).unwrap().value, *after);
            let page = pages.get(page_id).unwrap();
            assert_eq!(page.value, *before);
            assert_ne!(page.get_lsn(), lsn);
        }
        assert_eq!(pages.get(&PageId::from("P1")), Some(&Page::new(10, 1)));
    }

    #[test]
    fn test_undo_without_losers() {
        let log = vec![update(1, "T1", "P1", 0, 1)];
        let losers = BTreeSet::new();
        let mut pages = page_store(&[("P1", 1, 1)]);

        let mut undo_phase = UndoPhase::new(&losers);
        assert!(undo_phase.undo(&log, &mut pages).unwrap().is_empty());
        assert_eq!(pages.get(&PageId::from("P1")), Some(&Page::new(1, 1)));
        assert_eq!(undo_phase.get_statistics().records_scanned, 0);
    }

    #[test]
    fn test_undo_rejects_unordered_log() {
        let log = vec![update(4, "T2", "P1", 0, 1), update(2, "T2", "P1", 1, 2)];
        let losers = tx_set(&["T2"]);
        let mut pages = page_store(&[("P1", 2, 2)]);

        assert!(matches!(
            UndoPhase::new(&losers).undo(&log, &mut pages),
            Err(RecoveryError::LsnOrdering { previous: 4, found: 2 })
        ));
        assert_eq!(pages.get(&PageId::from("P1")), Some(&Page::new(2, 2)));
    }

    #[test]
    fn test_undo_unknown_page_is_an_error() {
        let log = vec![update(4, "T2", "P5", 0, 1)];
        let losers = tx_set(&["T2"]);
        let mut pages = page_store(&[("P1", 0, 0)]);

        assert!(matches!(
            UndoPhase::new(&losers).undo(&log, &mut pages),
            Err(RecoveryError::UnknownPage { lsn: 4, .. })
        ));
    }

    #[test]
    fn test_previous_update_lookup() {
        let log = vec![
            update(2, "T1", "P1", 0, 1),
            update(4, "T1", "P2", 0, 1),
            update(7, "T2", "P1", 1, 2),
        ];
        let history = UpdateHistory::build(&log);

        assert_eq!(history.previous_update(&PageId::from("P1"), 7), 2);
        assert_eq!(history.previous_update(&PageId::from("P1"), 2), 0);
        assert_eq!(history.previous_update(&PageId::from("P2"), 4), 0);
        assert_eq!(history.previous_update(&PageId::from("P3"), 9), 0);
    }
}
