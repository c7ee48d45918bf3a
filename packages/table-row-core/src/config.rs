//! Store configuration.

use std::path::PathBuf;

/// Configuration for the file-backed row store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding one JSON file per table
    pub data_dir: PathBuf,
    /// Maximum retry attempts for transient I/O errors
    pub max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}
