//! Storage-specific error types.
//!
//! All store operations return [`StorageError`] on failure. Any of them is
//! fatal to the current cycle but never to the process.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Opening, writing, flushing or reading the log failed.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    /// A sample could not be encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record in the log could not be decoded.
    #[error("corrupt record at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
