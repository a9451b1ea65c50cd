//! Page Store
//!
//! The in-memory image of the on-disk pages at crash time. Each page holds a
//! single integer value and the LSN of the last log record applied to it.
//! Redo and Undo are the only writers.

use crate::core::common::types::{Lsn, PageId};
use crate::core::common::{RecoveryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A single page: its logical content and its pageLSN.
///
/// Field order matches the sorted key order of the persisted JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "pageLSN")]
    pub page_lsn: Lsn,
    pub value: i64,
}

impl Page {
    pub const fn new(value: i64, page_lsn: Lsn) -> Self {
        Self { page_lsn, value }
    }

    pub const fn get_lsn(&self) -> Lsn {
        self.page_lsn
    }

    /// Writes `value` as the effect of the record at `lsn`.
    pub fn apply(&mut self, value: i64, lsn: Lsn) {
        self.value = value;
        self.page_lsn = lsn;
    }
}

/// Mapping from page id to page, ordered by page id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageStore {
    pages: BTreeMap<PageId, Page>,
}

impl PageStore {
    /// Creates an empty page store.
    pub fn new() -> Self {
        Self { pages: BTreeMap::new() }
    }

    /// Adds or replaces a page.
    pub fn insert(&mut self, page_id: PageId, page: Page) {
        self.pages.insert(page_id, page);
    }

    pub fn get(&self, page_id: &PageId) -> Option<&Page> {
        self.pages.get(page_id)
    }

    /// Returns the page targeted by the UPDATE at `lsn`.
    ///
    /// A page missing from the snapshot is an error: inventing a zero page
    /// would hide lost data.
    pub fn page_for_update(&mut self, page_id: &PageId, lsn: Lsn) -> Result<&mut Page> {
        self.pages
            .get_mut(page_id)
            .ok_or_else(|| RecoveryError::UnknownPage { lsn, page: page_id.clone() })
    }

    pub fn contains(&self, page_id: &PageId) -> bool {
        self.pages.contains_key(page_id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterates pages in page id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PageId, &Page)> {
        self.pages.iter()
    }

    /// Parses a page snapshot: `{"P1": {"value": 0, "pageLSN": 0}, ...}`.
    pub fn from_json_str(source_name: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RecoveryError::Parse {
            source_name: source_name.to_string(),
            line: e.line(),
            message: e.to_string(),
        })
    }

    /// Loads a page snapshot from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&path.display().to_string(), &contents)
    }

    /// Renders the pages as pretty JSON with sorted keys and a trailing newline.
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| RecoveryError::serialization("page store", &e))?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the pages to `path` in the format of [`PageStore::to_pretty_json`].
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_pretty_json()?)?;
        Ok(())
    }
}

impl FromIterator<(PageId, Page)> for PageStore {
    fn from_iter<I: IntoIterator<Item = (PageId, Page)>>(iter: I) -> Self {
        Self { pages: iter.into_iter().collect() }
    }
}
