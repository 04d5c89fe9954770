//! File discovery

pub mod scanner;

pub use scanner::{scan, ScanOptions, BACKUP_DIR_PREFIX};
