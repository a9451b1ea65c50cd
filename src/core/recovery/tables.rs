//! Recovery Tables
//!
//! This module implements the Transaction Table and Dirty Page Table used during
//! recovery. Both are built during the Analysis phase and are read-only afterwards.
//! They are ordered maps so that every rendering of them is deterministic.

use crate::core::common::types::{Lsn, PageId, TransactionId};
use crate::core::recovery::types::{TransactionInfo, TransactionState};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// The Transaction Table tracks the state of all transactions seen during recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionTable {
    /// Map from transaction ID to transaction information
    transactions: BTreeMap<TransactionId, TransactionInfo>,
}

impl TransactionTable {
    /// Creates a new empty transaction table.
    pub fn new() -> Self {
        Self { transactions: BTreeMap::new() }
    }

    /// Adds or replaces a transaction in the table.
    pub fn insert(&mut self, tx_info: TransactionInfo) {
        self.transactions.insert(tx_info.tx_id.clone(), tx_info);
    }

    /// Gets transaction information by ID.
    pub fn get(&self, tx_id: &TransactionId) -> Option<&TransactionInfo> {
        self.transactions.get(tx_id)
    }

    /// Returns true if the transaction table contains the given transaction ID.
    pub fn contains(&self, tx_id: &TransactionId) -> bool {
        self.transactions.contains_key(tx_id)
    }

    /// Returns the number of transactions in the table.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns true if the transaction table is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns an iterator over all transactions in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&TransactionId, &TransactionInfo)> {
        self.transactions.iter()
    }

    /// Returns the entry for `tx_id`, inserting it as active at `lsn` if absent.
    fn entry(&mut self, tx_id: &TransactionId, lsn: Lsn) -> &mut TransactionInfo {
        self.transactions
            .entry(tx_id.clone())
            .or_insert_with(|| TransactionInfo::new_active(tx_id.clone(), lsn))
    }

    /// Registers a BEGIN. An existing entry is left untouched.
    pub fn begin_transaction(&mut self, tx_id: &TransactionId, lsn: Lsn) {
        self.entry(tx_id, lsn);
    }

    /// Registers an UPDATE written by `tx_id`, creating the entry if needed.
    pub fn update_transaction(&mut self, tx_id: &TransactionId, lsn: Lsn) {
        self.entry(tx_id, lsn).record_update(lsn);
    }

    /// Marks a transaction as committed, creating the entry if needed.
    pub fn commit_transaction(&mut self, tx_id: &TransactionId, lsn: Lsn) {
        self.entry(tx_id, lsn).commit(lsn);
    }

    /// Marks a transaction as aborted, creating the entry if needed.
    pub fn abort_transaction(&mut self, tx_id: &TransactionId, lsn: Lsn) {
        self.entry(tx_id, lsn).abort(lsn);
    }

    /// Marks a transaction as ended, creating the entry if needed.
    pub fn end_transaction(&mut self, tx_id: &TransactionId, lsn: Lsn) {
        self.entry(tx_id, lsn).end(lsn);
    }

    /// Transactions with a known COMMIT.
    pub fn winners(&self) -> BTreeSet<TransactionId> {
        self.transactions
            .values()
            .filter(|tx_info| tx_info.is_winner())
            .map(|tx_info| tx_info.tx_id.clone())
            .collect()
    }

    /// Every other transaction in the table.
    pub fn losers(&self) -> BTreeSet<TransactionId> {
        self.transactions
            .values()
            .filter(|tx_info| !tx_info.is_winner())
            .map(|tx_info| tx_info.tx_id.clone())
            .collect()
    }
}

/// Serialized as `{"T1": {"status": "committed", "lastLSN": 3}, ...}`.
impl Serialize for TransactionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry {
            status: TransactionState,
            #[serde(rename = "lastLSN")]
            last_lsn: Lsn,
        }

        let mut map = serializer.serialize_map(Some(self.transactions.len()))?;
        for (tx_id, tx_info) in &self.transactions {
            map.serialize_entry(tx_id, &Entry { status: tx_info.state, last_lsn: tx_info.last_lsn })?;
        }
        map.end()
    }
}

/// Information about a dirty page during recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirtyPageInfo {
    /// The page ID
    #[serde(skip)]
    pub page_id: PageId,
    /// The LSN of the first log record that dirtied this page
    #[serde(rename = "recLSN")]
    pub recovery_lsn: Lsn,
}

impl DirtyPageInfo {
    /// Creates a new DirtyPageInfo.
    pub fn new(page_id: PageId, recovery_lsn: Lsn) -> Self {
        Self { page_id, recovery_lsn }
    }
}

/// The Dirty Page Table tracks pages that may need to be redone during recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DirtyPageTable {
    /// Map from page ID to dirty page information
    pages: BTreeMap<PageId, DirtyPageInfo>,
}

impl DirtyPageTable {
    /// Creates a new empty dirty page table.
    pub fn new() -> Self {
        Self { pages: BTreeMap::new() }
    }

    /// Adds `page_id` with `recovery_lsn` unless the page is already present.
    ///
    /// The first LSN to dirty a page wins; later updates never move its recLSN.
    /// Returns true if the page was inserted.
    pub fn mark_dirty(&mut self, page_id: &PageId, recovery_lsn: Lsn) -> bool {
        if self.pages.contains_key(page_id) {
            return false;
        }
        self.pages.insert(page_id.clone(), DirtyPageInfo::new(page_id.clone(), recovery_lsn));
        true
    }

    /// Gets dirty page information by page ID.
    pub fn get(&self, page_id: &PageId) -> Option<&DirtyPageInfo> {
        self.pages.get(page_id)
    }

    /// Returns true if the dirty page table contains the given page ID.
    pub fn contains(&self, page_id: &PageId) -> bool {
        self.pages.contains_key(page_id)
    }

    /// Returns the number of dirty pages in the table.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if the dirty page table is empty.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns an iterator over all dirty pages in page ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&PageId, &DirtyPageInfo)> {
        self.pages.iter()
    }

    /// Returns the minimum recovery LSN across all dirty pages.
    ///
    /// This is used to determine the starting point for the Redo phase.
    pub fn min_recovery_lsn(&self) -> Option<Lsn> {
        self.pages.values().map(|page_info| page_info.recovery_lsn).min()
    }
}
