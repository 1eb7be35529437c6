//! Fixed-layout binary run record
//!
//! ```text
//! offset  width  field
//!      0      8  start time      i64 LE, unix seconds
//!      8      8  last update     i64 LE, unix seconds
//!     16      8  bursts          u64 LE
//!     24      8  operations      u64 LE
//!     32      4  running         i32 LE, non-zero = true
//!     36     64  status          UTF-8, NUL padded, <= 63 bytes
//!    100      4  padding         zero
//! ```

use std::time::Duration;

use super::PersistError;
use crate::stats::StatsSnapshot;

/// Encoded record size in bytes
pub const RECORD_LEN: usize = 104;

/// Width of the status field, terminator included
pub const STATUS_WIDTH: usize = 64;

/// Longest status text stored; longer text is truncated
pub const STATUS_MAX_LEN: usize = STATUS_WIDTH - 1;

const OFF_START: usize = 0;
const OFF_UPDATE: usize = 8;
const OFF_BURSTS: usize = 16;
const OFF_OPERATIONS: usize = 24;
const OFF_RUNNING: usize = 32;
const OFF_STATUS: usize = 36;

/// Persisted run state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// Run start, unix seconds
    pub start_time: i64,
    /// Time of this snapshot, unix seconds
    pub last_update: i64,
    /// Bursts completed
    pub bursts: u64,
    /// Mutations completed
    pub operations: u64,
    /// Whether the run was still live when this was written
    pub running: bool,
    /// Short status text, at most [`STATUS_MAX_LEN`] bytes
    pub status: String,
}

impl RunRecord {
    /// Build a record from counters, truncating `status` to fit
    pub fn new(
        start_time: i64,
        last_update: i64,
        stats: StatsSnapshot,
        running: bool,
        status: &str,
    ) -> Self {
        Self {
            start_time,
            last_update,
            bursts: stats.bursts,
            operations: stats.operations,
            running,
            status: truncate_status(status).to_owned(),
        }
    }

    /// Wall-clock time between start and last update
    pub fn runtime(&self) -> Duration {
        Duration::from_secs(self.last_update.saturating_sub(self.start_time).max(0) as u64)
    }

    /// Encode into the fixed layout
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[OFF_START..OFF_START + 8].copy_from_slice(&self.start_time.to_le_bytes());
        buf[OFF_UPDATE..OFF_UPDATE + 8].copy_from_slice(&self.last_update.to_le_bytes());
        buf[OFF_BURSTS..OFF_BURSTS + 8].copy_from_slice(&self.bursts.to_le_bytes());
        buf[OFF_OPERATIONS..OFF_OPERATIONS + 8].copy_from_slice(&self.operations.to_le_bytes());
        buf[OFF_RUNNING..OFF_RUNNING + 4].copy_from_slice(&i32::from(self.running).to_le_bytes());

        let status = truncate_status(&self.status).as_bytes();
        buf[OFF_STATUS..OFF_STATUS + status.len()].copy_from_slice(status);
        buf
    }

    /// Decode from the fixed layout
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Truncated`] when fewer than [`RECORD_LEN`]
    /// bytes are supplied.
    pub fn decode(bytes: &[u8]) -> Result<Self, PersistError> {
        if bytes.len() < RECORD_LEN {
            return Err(PersistError::Truncated {
                len: bytes.len(),
                expected: RECORD_LEN,
            });
        }

        let status_field = &bytes[OFF_STATUS..OFF_STATUS + STATUS_WIDTH];
        let status_len = status_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(STATUS_WIDTH);

        Ok(Self {
            start_time: i64::from_le_bytes(field(bytes, OFF_START)),
            last_update: i64::from_le_bytes(field(bytes, OFF_UPDATE)),
            bursts: u64::from_le_bytes(field(bytes, OFF_BURSTS)),
            operations: u64::from_le_bytes(field(bytes, OFF_OPERATIONS)),
            running: i32::from_le_bytes(field(bytes, OFF_RUNNING)) != 0,
            status: String::from_utf8_lossy(&status_field[..status_len]).into_owned(),
        })
    }
}

fn field<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// Longest prefix of `status` that fits the field
///
/// Cuts at the last char boundary at or below [`STATUS_MAX_LEN`] bytes, and
/// at an embedded NUL since the field is NUL terminated.
pub fn truncate_status(status: &str) -> &str {
    let status = status.split('\0').next().unwrap_or_default();
    if status.len() <= STATUS_MAX_LEN {
        return status;
    }
    let mut end = STATUS_MAX_LEN;
    while !status.is_char_boundary(end) {
        end -= 1;
    }
    &status[..end]
}
