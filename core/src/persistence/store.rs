//! Durable storage of the run record at a well-known path

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::RunRecord;
use super::PersistError;

/// Summary of a run that died while still marked as running
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashReport {
    /// When the crashed run started
    pub started_at: DateTime<Utc>,
    /// Last snapshot the crashed run managed to persist
    pub last_update: DateTime<Utc>,
    /// Time between start and last snapshot
    pub runtime: Duration,
    /// Bursts completed before the crash
    pub bursts: u64,
    /// Mutations completed before the crash
    pub operations: u64,
    /// Last status text
    pub status: String,
}

impl From<RunRecord> for CrashReport {
    fn from(record: RunRecord) -> Self {
        Self {
            started_at: DateTime::from_timestamp(record.start_time, 0).unwrap_or_default(),
            last_update: DateTime::from_timestamp(record.last_update, 0).unwrap_or_default(),
            runtime: record.runtime(),
            bursts: record.bursts,
            operations: record.operations,
            status: record.status,
        }
    }
}

/// Reads, writes and removes the record file
///
/// The record is rewritten in place rather than swapped atomically, so
/// writers are serialized by a lock.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Record location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole record and force it to stable storage
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, written or synced.
    pub fn write(&self, record: &RunRecord) -> Result<(), PersistError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }

        let mut file = options
            .open(&self.path)
            .map_err(|source| self.io_error("open", source))?;
        file.write_all(&record.encode())
            .map_err(|source| self.io_error("write", source))?;
        file.sync_all()
            .map_err(|source| self.io_error("sync", source))
    }

    /// Read the record, `None` if there is none
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn read(&self) -> Result<Option<RunRecord>, PersistError> {
        match fs::read(&self.path) {
            Ok(bytes) => RunRecord::decode(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error("read", source)),
        }
    }

    /// Delete the record; `false` if there was none
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<bool, PersistError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error("remove", source)),
        }
    }

    /// Report (and delete) a record left behind by a run that never stopped
    ///
    /// Meant to be called once at process start, before any writer exists.
    /// A record whose running flag is clear is left alone and reported as
    /// nothing. Read failures are logged and reported as nothing.
    pub fn detect_prior_crash(&self) -> Option<CrashReport> {
        let record = match self.read() {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read run record");
                return None;
            }
        };

        if !record.running {
            tracing::debug!(
                path = %self.path.display(),
                status = %record.status,
                "Previous run stopped cleanly"
            );
            return None;
        }

        if let Err(e) = self.remove() {
            tracing::warn!(path = %self.path.display(), error = %e, "Could not remove crash record");
        }

        let report = CrashReport::from(record);
        tracing::warn!(
            runtime_secs = report.runtime.as_secs(),
            bursts = report.bursts,
            operations = report.operations,
            status = %report.status,
            "Previous run crashed"
        );
        Some(report)
    }

    fn io_error(&self, op: &'static str, source: io::Error) -> PersistError {
        PersistError::Io {
            op,
            path: self.path.clone(),
            source,
        }
    }
}
