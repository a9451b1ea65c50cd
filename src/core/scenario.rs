//! Scenario loading and artifact writing.
//!
//! A scenario directory holds the log, the page snapshot taken at crash time,
//! and the master record naming the checkpoint to start Analysis from.

use crate::core::common::types::Lsn;
use crate::core::common::{RecoveryError, Result};
use crate::core::config::RecoveryConfig;
use crate::core::recovery::{RecoveryManager, RecoveryReport};
use crate::core::storage::page_store::PageStore;
use crate::core::wal::log_record::LogRecord;
use crate::core::wal::reader::{WalReader, WalReaderConfig};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Everything recovery needs as input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Log records in LSN order
    pub log: Vec<LogRecord>,
    /// Page snapshot at crash time
    pub pages: PageStore,
    /// LSN of the master checkpoint record, 0 for none
    pub master_checkpoint_lsn: Lsn,
}

#[derive(Debug, Default, Deserialize)]
struct MasterRecord {
    #[serde(default)]
    master_ckpt_lsn: Lsn,
}

impl Scenario {
    /// Loads a scenario from `dir` using the file names in `config`.
    pub fn load(dir: &Path, config: &RecoveryConfig) -> Result<Self> {
        let reader_config =
            WalReaderConfig { validate_lsn_ordering: config.validate_lsn_ordering, ..WalReaderConfig::default() };
        let log = WalReader::new(dir.join(&config.wal_file), reader_config).read_all_records()?;
        let pages = PageStore::load_from_file(&dir.join(&config.pages_file))?;
        let master_checkpoint_lsn = read_master_checkpoint_lsn(&dir.join(&config.master_file))?;

        info!(
            "Loaded scenario {}: {} log records, {} pages, master checkpoint LSN {}",
            dir.display(),
            log.len(),
            pages.len(),
            master_checkpoint_lsn
        );
        Ok(Self { log, pages, master_checkpoint_lsn })
    }
}

/// Reads `master_ckpt_lsn` from the master record. A missing file or key means 0.
pub fn read_master_checkpoint_lsn(path: &Path) -> Result<Lsn> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No master record at {}, scanning the whole log", path.display());
            return Ok(0);
        }
        Err(e) => return Err(RecoveryError::Io(e)),
    };

    let master: MasterRecord = serde_json::from_str(&contents).map_err(|e| RecoveryError::Parse {
        source_name: path.display().to_string(),
        line: e.line(),
        message: e.to_string(),
    })?;
    Ok(master.master_ckpt_lsn)
}

/// Loads the scenario in `dir` and recovers it.
pub fn recover_dir(dir: &Path, config: &RecoveryConfig) -> Result<(PageStore, RecoveryReport)> {
    let scenario = Scenario::load(dir, config)?;
    RecoveryManager::new().recover(scenario)
}

/// Writes the text report and the recovered pages into `dir`.
///
/// Returns the paths written.
pub fn write_outputs(
    dir: &Path,
    report: &RecoveryReport,
    pages: &PageStore,
    config: &RecoveryConfig,
) -> Result<[PathBuf; 2]> {
    let report_path = dir.join(&config.report_file);
    let pages_path = dir.join(&config.pages_output_file);

    // Render both before touching the directory
    let report_text = report.render();
    let pages_json = pages.to_pretty_json()?;

    fs::write(&report_path, report_text)?;
    fs::write(&pages_path, pages_json)?;
    debug!("Wrote {} and {}", report_path.display(), pages_path.display());

    Ok([report_path, pages_path])
}
