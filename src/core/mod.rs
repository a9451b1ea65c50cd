pub mod common;
pub mod config;
pub mod recovery;
pub mod scenario;
pub mod storage;
pub mod wal;
pub use self::config::RecoveryConfig;
