//! JSON-lines time-series store.
//!
//! One self-describing JSON object per line, appended in arrival order.
//! No index, no random access, no in-place update; the file only grows.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::storage::StorageError;
use crate::storage::types::LatencySample;

/// Default log file, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = "responseTimes.json";

/// How [`TimeSeriesStore::read_all`] treats a line it cannot decode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CorruptRecordPolicy {
    /// Fail the whole read with [`StorageError::Corrupt`].
    #[default]
    Abort,
    /// Log the line and keep scanning.
    Skip,
}

/// Append-only log of [`LatencySample`] records.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    path: PathBuf,
    on_corrupt: CorruptRecordPolicy,
}

impl TimeSeriesStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            on_corrupt: CorruptRecordPolicy::default(),
        }
    }

    /// Set the policy for undecodable lines.
    pub fn with_corrupt_policy(mut self, policy: CorruptRecordPolicy) -> Self {
        self.on_corrupt = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single sample.
    pub fn append(&self, sample: &LatencySample) -> Result<(), StorageError> {
        self.append_all(std::slice::from_ref(sample)).map(|_| ())
    }

    /// Append samples in order and return how many were written.
    ///
    /// Samples without a successful reply are refused. The file is flushed
    /// and closed before returning, on success and on error alike.
    pub fn append_all(&self, samples: &[LatencySample]) -> Result<usize, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        let mut written = 0;

        for sample in samples {
            if sample.probe_count == 0 {
                tracing::warn!(host = %sample.host, "Refusing to store sample without replies");
                continue;
            }
            serde_json::to_writer(&mut out, sample)?;
            out.write_all(b"\n")?;
            tracing::debug!("{}", sample);
            written += 1;
        }

        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_data()?;
        Ok(written)
    }

    /// Decode every record in append order.
    ///
    /// A store that does not exist yet reads as empty.
    pub fn read_all(&self) -> Result<Vec<LatencySample>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut samples = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LatencySample>(&line) {
                Ok(sample) => samples.push(sample),
                Err(source) => match self.on_corrupt {
                    CorruptRecordPolicy::Abort => {
                        return Err(StorageError::Corrupt {
                            line: idx + 1,
                            source,
                        });
                    }
                    CorruptRecordPolicy::Skip => {
                        tracing::warn!(
                            path = %self.path.display(),
                            line = idx + 1,
                            error = %source,
                            "Skipping corrupt record"
                        );
                    }
                },
            }
        }
        Ok(samples)
    }
}
