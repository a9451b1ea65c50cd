// src/core/wal/mod.rs

pub mod log_record;
pub mod reader;

pub use log_record::{CheckpointTransaction, LogRecord};
pub use reader::{check_lsn_order, parse_log, WalReader, WalReaderConfig, WalRecordIterator};
