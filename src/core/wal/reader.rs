// src/core/wal/reader.rs
//
// WAL Reader Component
//
// Reads a write-ahead log stored as JSON Lines: one JSON object per line,
// ordered by LSN. Blank lines and lines starting with '#' are skipped.
//
//   # comment
//   {"LSN": 1, "type": "BEGIN", "tx": "T1"}
//   {"LSN": 2, "type": "UPDATE", "tx": "T1", "page": "P1", "before": 0, "after": 5}

use crate::core::common::types::Lsn;
use crate::core::common::{RecoveryError, Result};
use crate::core::wal::log_record::{LogRecord, RawLogRecord};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Configuration for WAL Reader operations
#[derive(Debug, Clone, Copy)]
pub struct WalReaderConfig {
    /// Buffer size for reading the WAL file (in bytes)
    pub buffer_size: usize,
    /// Whether to reject records whose LSN does not strictly increase
    pub validate_lsn_ordering: bool,
}

impl Default for WalReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192, // 8KB buffer
            validate_lsn_ordering: true,
        }
    }
}

/// Iterator over the records of a JSON Lines log.
pub struct WalRecordIterator<R: BufRead> {
    lines: Lines<R>,
    source_name: String,
    config: WalReaderConfig,
    line_number: usize,
    last_lsn: Option<Lsn>,
    records_read: usize,
}

impl<R: BufRead> WalRecordIterator<R> {
    /// Creates an iterator over `reader`; `source_name` is used in error messages.
    pub fn new(reader: R, source_name: impl Into<String>, config: WalReaderConfig) -> Self {
        Self {
            lines: reader.lines(),
            source_name: source_name.into(),
            config,
            line_number: 0,
            last_lsn: None,
            records_read: 0,
        }
    }

    /// Get the number of records read so far
    #[must_use]
    pub const fn records_read(&self) -> usize {
        self.records_read
    }

    /// Reads the next log record, skipping blank and comment lines.
    ///
    /// # Errors
    /// Returns `RecoveryError` if:
    /// - I/O errors occur while reading
    /// - a line is not valid JSON for a log record
    /// - a record is missing a field its type requires
    /// - LSN ordering validation is enabled and the LSN does not increase
    pub fn next_record(&mut self) -> Result<Option<LogRecord>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line?;
            self.line_number = self.line_number.saturating_add(1);

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let raw: RawLogRecord = serde_json::from_str(trimmed).map_err(|e| RecoveryError::Parse {
                source_name: self.source_name.clone(),
                line: self.line_number,
                message: e.to_string(),
            })?;
            let record = LogRecord::try_from(raw)?;

            if self.config.validate_lsn_ordering {
                let current_lsn = record.lsn();
                if let Some(previous) = self.last_lsn {
                    if current_lsn <= previous {
                        return Err(RecoveryError::LsnOrdering { previous, found: current_lsn });
                    }
                }
                self.last_lsn = Some(current_lsn);
            }

            self.records_read = self.records_read.saturating_add(1);
            return Ok(Some(record));
        }
    }
}

impl<R: BufRead> Iterator for WalRecordIterator<R> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// High-level WAL Reader over a log file on disk.
#[derive(Debug)]
pub struct WalReader {
    wal_file_path: PathBuf,
    config: WalReaderConfig,
}

impl WalReader {
    /// Create a new WAL Reader
    pub fn new<P: AsRef<Path>>(wal_file_path: P, config: WalReaderConfig) -> Self {
        Self { wal_file_path: wal_file_path.as_ref().to_path_buf(), config }
    }

    /// Create a WAL Reader with default configuration
    pub fn with_defaults<P: AsRef<Path>>(wal_file_path: P) -> Self {
        Self::new(wal_file_path, WalReaderConfig::default())
    }

    /// Create an iterator over all records in the WAL file
    pub fn iter_records(&self) -> Result<WalRecordIterator<BufReader<File>>> {
        let file = File::open(&self.wal_file_path)?;
        let reader = BufReader::with_capacity(self.config.buffer_size, file);
        Ok(WalRecordIterator::new(reader, self.wal_file_path.display().to_string(), self.config))
    }

    /// Read all records from the WAL file into a vector
    pub fn read_all_records(&self) -> Result<Vec<LogRecord>> {
        let records = self.iter_records()?.collect::<Result<Vec<_>>>()?;
        debug!("Read {} log records from {}", records.len(), self.wal_file_path.display());
        Ok(records)
    }
}

/// Parses a whole JSON Lines log held in memory.
pub fn parse_log(source_name: &str, text: &str) -> Result<Vec<LogRecord>> {
    WalRecordIterator::new(text.as_bytes(), source_name, WalReaderConfig::default()).collect()
}

/// Checks that LSNs strictly increase across `records`.
pub fn check_lsn_order(records: &[LogRecord]) -> Result<()> {
    for pair in records.windows(2) {
        let (previous, found) = (pair[0].lsn(), pair[1].lsn());
        if found <= previous {
            return Err(RecoveryError::LsnOrdering { previous, found });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::common::types::TransactionId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_LOG: &str = r#"
# crash after T2's update
{"LSN": 1, "type": "BEGIN", "tx": "T1"}
{"LSN": 2, "type": "UPDATE", "tx": "T1", "page": "P1", "before": 0, "after": 5}

{"LSN": 3, "type": "COMMIT", "tx": "T1"}
"#;

    #[test]
    fn test_parse_log_skips_blank_and_comment_lines() {
        let records = parse_log("sample", SAMPLE_LOG).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records.iter().map(LogRecord::lsn).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(records[2], LogRecord::Commit { lsn: 3, tx_id: TransactionId::from("T1") });
    }

    #[test]
    fn test_empty_log() {
        assert!(parse_log("empty", "").unwrap().is_empty());
        assert!(parse_log("comments", "# nothing here\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_error_reports_line_number() {
        let text = "{\"LSN\": 1, \"type\": \"BEGIN\", \"tx\": \"T1\"}\nnot json\n";
        match parse_log("broken", text) {
            Err(RecoveryError::Parse { source_name, line, .. }) => {
                assert_eq!(source_name, "broken");
                assert_eq!(line, 2);
            }
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_lsn_ordering_violation() {
        let text = "{\"LSN\": 2, \"type\": \"BEGIN\", \"tx\": \"T1\"}\n{\"LSN\": 2, \"type\": \"COMMIT\", \"tx\": \"T1\"}\n";
        assert!(matches!(
            parse_log("dup", text),
            Err(RecoveryError::LsnOrdering { previous: 2, found: 2 })
        ));
    }

    #[test]
    fn test_ordering_validation_can_be_disabled() {
        let text = "{\"LSN\": 5, \"type\": \"BEGIN\", \"tx\": \"T1\"}\n{\"LSN\": 3, \"type\": \"BEGIN\", \"tx\": \"T2\"}\n";
        let config = WalReaderConfig { validate_lsn_ordering: false, ..WalReaderConfig::default() };
        let mut iterator = WalRecordIterator::new(text.as_bytes(), "unordered", config);
        assert!(iterator.next_record().unwrap().is_some());
        assert!(iterator.next_record().unwrap().is_some());
        assert!(iterator.next_record().unwrap().is_none());
        assert_eq!(iterator.records_read(), 2);

        let records = parse_log("unordered", text);
        assert!(records.is_err());
    }

    #[test]
    fn test_check_lsn_order() {
        let records = parse_log("sample", SAMPLE_LOG).unwrap();
        assert!(check_lsn_order(&records).is_ok());

        let reversed: Vec<_> = records.into_iter().rev().collect();
        assert!(matches!(
            check_lsn_order(&reversed),
            Err(RecoveryError::LsnOrdering { previous: 3, found: 2 })
        ));
    }

    #[test]
    fn test_wal_reader_reads_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(SAMPLE_LOG.as_bytes()).unwrap();

        let reader = WalReader::with_defaults(temp_file.path());
        let records = reader.read_all_records().unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_wal_reader_missing_file() {
        let reader = WalReader::with_defaults("/nonexistent/path/wal.jsonl");
        assert!(matches!(reader.read_all_records(), Err(RecoveryError::Io(_))));
    }
}
