//! Recovery Report
//!
//! The structured outcome of one recovery run and its deterministic text form.
//! Every section is sorted by key so the text can be compared byte for byte
//! against a golden file.

use crate::core::common::types::{Lsn, TransactionId};
use crate::core::common::{RecoveryError, Result};
use crate::core::recovery::tables::{DirtyPageTable, TransactionTable};
use crate::core::storage::page_store::PageStore;
use serde::Serialize;
use std::fmt::{self, Write as _};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Sorted winner transactions
    pub winners: Vec<TransactionId>,
    /// Sorted loser transactions
    pub losers: Vec<TransactionId>,
    #[serde(rename = "TT")]
    pub transaction_table: TransactionTable,
    #[serde(rename = "DPT")]
    pub dirty_page_table: DirtyPageTable,
    #[serde(rename = "redoneLSNs")]
    pub redone_lsns: Vec<Lsn>,
    #[serde(rename = "undoneLSNs")]
    pub undone_lsns: Vec<Lsn>,
    pub final_pages: PageStore,
}

impl RecoveryReport {
    /// Renders the report as diff-friendly text.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Renders the report as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RecoveryError::serialization("report", &e))
    }
}

/// `['T1', 'T2']`
fn quoted_list<'a>(items: impl IntoIterator<Item = &'a TransactionId>) -> String {
    let quoted: Vec<String> = items.into_iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// `[2, 5]`
fn lsn_list(lsns: &[Lsn]) -> String {
    let rendered: Vec<String> = lsns.iter().map(Lsn::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();

        writeln!(out, "== Analysis ==")?;
        writeln!(out, "winners: {}", quoted_list(&self.winners))?;
        writeln!(out, "losers: {}", quoted_list(&self.losers))?;
        writeln!(out, "TT:")?;
        for (tx_id, tx_info) in self.transaction_table.iter() {
            writeln!(out, "  {}: status={} lastLSN={}", tx_id, tx_info.state, tx_info.last_lsn)?;
        }
        writeln!(out, "DPT:")?;
        for (page_id, page_info) in self.dirty_page_table.iter() {
            writeln!(out, "  {}: recLSN={}", page_id, page_info.recovery_lsn)?;
        }
        writeln!(out)?;

        writeln!(out, "== Redo ==")?;
        writeln!(out, "redoneLSNs: {}", lsn_list(&self.redone_lsns))?;
        writeln!(out)?;

        writeln!(out, "== Undo ==")?;
        writeln!(out, "undoneLSNs: {}", lsn_list(&self.undone_lsns))?;
        writeln!(out)?;

        writeln!(out, "== Final Pages ==")?;
        for (page_id, page) in self.final_pages.iter() {
            writeln!(out, "{}: value={} pageLSN={}", page_id, page.value, page.page_lsn)?;
        }

        f.write_str(&out)
    }
}
