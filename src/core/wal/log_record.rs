use crate::core::common::types::{Lsn, PageId, TransactionId};
use crate::core::common::RecoveryError;
use crate::core::recovery::types::TransactionState;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Transaction Table entry carried by a CHECKPOINT record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointTransaction {
    pub state: TransactionState,
    pub last_lsn: Lsn,
}

/// One immutable WAL entry. Each kind carries only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Begin {
        lsn: Lsn,
        tx_id: TransactionId,
    },
    Update {
        lsn: Lsn,
        tx_id: TransactionId,
        page_id: PageId,
        before: i64,
        after: i64,
    },
    Commit {
        lsn: Lsn,
        tx_id: TransactionId,
    },
    Abort {
        lsn: Lsn,
        tx_id: TransactionId,
    },
    End {
        lsn: Lsn,
        tx_id: TransactionId,
    },
    Checkpoint {
        lsn: Lsn,
        /// Snapshot of the Dirty Page Table: page -> recLSN
        dirty_pages: BTreeMap<PageId, Lsn>,
        /// Snapshot of the Transaction Table
        transactions: BTreeMap<TransactionId, CheckpointTransaction>,
    },
    /// A record kind recovery does not interpret. It keeps its place in the
    /// LSN sequence and is otherwise skipped by every phase.
    Other {
        lsn: Lsn,
        /// The upper-cased tag as found in the log
        kind: String,
    },
}

impl LogRecord {
    /// Returns the LSN of the record.
    #[must_use]
    pub const fn lsn(&self) -> Lsn {
        match self {
            LogRecord::Begin { lsn, .. }
            | LogRecord::Update { lsn, .. }
            | LogRecord::Commit { lsn, .. }
            | LogRecord::Abort { lsn, .. }
            | LogRecord::End { lsn, .. }
            | LogRecord::Checkpoint { lsn, .. }
            | LogRecord::Other { lsn, .. } => *lsn,
        }
    }

    /// Returns the transaction the record belongs to, if it is transaction-scoped.
    #[must_use]
    pub const fn tx_id(&self) -> Option<&TransactionId> {
        match self {
            LogRecord::Begin { tx_id, .. }
            | LogRecord::Update { tx_id, .. }
            | LogRecord::Commit { tx_id, .. }
            | LogRecord::Abort { tx_id, .. }
            | LogRecord::End { tx_id, .. } => Some(tx_id),
            LogRecord::Checkpoint { .. } | LogRecord::Other { .. } => None,
        }
    }

    /// Returns the page written by the record, for UPDATE records.
    #[must_use]
    pub const fn page_id(&self) -> Option<&PageId> {
        match self {
            LogRecord::Update { page_id, .. } => Some(page_id),
            _ => None,
        }
    }

    /// Returns the tag used for this record kind in the on-disk log.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            LogRecord::Begin { .. } => "BEGIN",
            LogRecord::Update { .. } => "UPDATE",
            LogRecord::Commit { .. } => "COMMIT",
            LogRecord::Abort { .. } => "ABORT",
            LogRecord::End { .. } => "END",
            LogRecord::Checkpoint { .. } => "CHECKPOINT",
            LogRecord::Other { kind, .. } => kind.as_str(),
        }
    }
}

/// A recLSN in a checkpoint DPT payload, either bare (`"P1": 3`) or as an
/// entry (`"P1": {"recLSN": 3}`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawRecLsn {
    Bare(Lsn),
    Entry {
        #[serde(rename = "recLSN")]
        rec_lsn: Lsn,
    },
}

impl RawRecLsn {
    const fn rec_lsn(self) -> Lsn {
        match self {
            RawRecLsn::Bare(lsn) | RawRecLsn::Entry { rec_lsn: lsn } => lsn,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCheckpointTransaction {
    status: String,
    #[serde(rename = "lastLSN")]
    last_lsn: Lsn,
}

/// The on-disk shape of a log line: one flat object whose populated fields
/// depend on `type`. Converted into [`LogRecord`] with per-tag validation.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawLogRecord {
    #[serde(rename = "LSN")]
    lsn: Lsn,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    tx: Option<TransactionId>,
    #[serde(default)]
    page: Option<PageId>,
    #[serde(default)]
    before: Option<i64>,
    #[serde(default)]
    after: Option<i64>,
    #[serde(rename = "DPT", default)]
    dpt: Option<BTreeMap<PageId, RawRecLsn>>,
    #[serde(rename = "TT", default)]
    tt: Option<BTreeMap<TransactionId, RawCheckpointTransaction>>,
}

/// Extracts a field that the record's tag requires.
fn required<T>(value: Option<T>, lsn: Lsn, kind: &str, field: &str) -> Result<T, RecoveryError> {
    value.ok_or_else(|| RecoveryError::malformed(lsn, format!("{kind} record is missing '{field}'")))
}

impl TryFrom<RawLogRecord> for LogRecord {
    type Error = RecoveryError;

    fn try_from(raw: RawLogRecord) -> Result<Self, Self::Error> {
        let lsn = raw.lsn;
        if lsn == 0 {
            return Err(RecoveryError::malformed(lsn, "LSN 0 is reserved"));
        }

        let kind = raw.kind.to_ascii_uppercase();
        let record = match kind.as_str() {
            "BEGIN" => LogRecord::Begin { lsn, tx_id: required(raw.tx, lsn, &kind, "tx")? },
            "COMMIT" => LogRecord::Commit { lsn, tx_id: required(raw.tx, lsn, &kind, "tx")? },
            "ABORT" => LogRecord::Abort { lsn, tx_id: required(raw.tx, lsn, &kind, "tx")? },
            "END" => LogRecord::End { lsn, tx_id: required(raw.tx, lsn, &kind, "tx")? },
            "UPDATE" => LogRecord::Update {
                lsn,
                tx_id: required(raw.tx, lsn, &kind, "tx")?,
                page_id: required(raw.page, lsn, &kind, "page")?,
                before: required(raw.before, lsn, &kind, "before")?,
                after: required(raw.after, lsn, &kind, "after")?,
            },
            "CHECKPOINT" => {
                let dirty_pages = raw
                    .dpt
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(page_id, rec)| (page_id, rec.rec_lsn()))
                    .collect();

                let mut transactions = BTreeMap::new();
                for (tx_id, entry) in raw.tt.unwrap_or_default() {
                    let state = entry
                        .status
                        .parse::<TransactionState>()
                        .map_err(|e| RecoveryError::malformed(lsn, format!("TT entry {tx_id}: {e}")))?;
                    transactions.insert(tx_id, CheckpointTransaction { state, last_lsn: entry.last_lsn });
                }

                LogRecord::Checkpoint { lsn, dirty_pages, transactions }
            }
            _ => LogRecord::Other { lsn, kind: kind.clone() },
        };

        Ok(record)
    }
}
