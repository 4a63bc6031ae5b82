//! Storage Layer
//!
//! Append-only time series of latency samples in a flat JSON-lines file.
//!
//! # Components
//!
//! - [`LatencySample`]: one record per responsive host per cycle
//! - [`TimeSeriesStore`]: `append` / `append_all` / `read_all` over the log
//! - [`CorruptRecordPolicy`]: what `read_all` does with a malformed line
//!
//! Exactly one writer is active per cycle and reads only happen between
//! cycles, so the file itself carries no locking.

mod error;
mod file;
mod types;

pub use error::StorageError;
pub use file::{CorruptRecordPolicy, DEFAULT_STORE_PATH, TimeSeriesStore};
pub use types::LatencySample;
