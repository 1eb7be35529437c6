//! ext4 inline-data files as race bait
//!
//! Each item is a small file created just under the inline-data threshold
//! (about 156 bytes on a default ext4) and kept open. The trigger starts
//! asynchronous writeback on it; the mutation rewrites it past the threshold,
//! which forces the inline-to-extent conversion to race that writeback.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::mem::ManuallyDrop;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::path::{Path, PathBuf};

use burst_race_core::{BaitError, ItemHandle, RaceBait, RawToken};

/// Payload written at creation: fits in the inode
pub const INLINE_PAYLOAD_LEN: usize = 140;

/// Payload written by the mutation: forces conversion to extents
pub const EXTENT_PAYLOAD_LEN: usize = 200;

const INLINE_FILL: u8 = b'A';
const EXTENT_FILL: u8 = b'B';
const FILE_MODE: u32 = 0o644;

/// Race bait backed by files `dir/f{index}`
#[derive(Debug)]
pub struct FileBait {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    inline_payload: [u8; INLINE_PAYLOAD_LEN],
    extent_payload: [u8; EXTENT_PAYLOAD_LEN],
}

impl FileBait {
    /// Bait for `capacity` files under `dir`
    pub fn new(dir: impl Into<PathBuf>, capacity: usize) -> Self {
        let dir = dir.into();
        let paths = (0..capacity).map(|i| dir.join(format!("f{}", i))).collect();
        Self {
            dir,
            paths,
            inline_payload: [INLINE_FILL; INLINE_PAYLOAD_LEN],
            extent_payload: [EXTENT_FILL; EXTENT_PAYLOAD_LEN],
        }
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `item`
    ///
    /// # Errors
    ///
    /// Returns [`BaitError::UnknownItem`] when the item is beyond the
    /// capacity the bait was built for.
    pub fn path(&self, item: ItemHandle) -> Result<&Path, BaitError> {
        self.paths
            .get(item.index())
            .map(PathBuf::as_path)
            .ok_or(BaitError::UnknownItem(item))
    }
}

/// Borrow an open descriptor as a `File` without taking ownership
///
/// # Safety
///
/// `token` must be a descriptor returned by [`FileBait::create`] that has
/// not yet been passed to [`FileBait::release`].
unsafe fn borrow_file(token: RawToken) -> ManuallyDrop<File> {
    // SAFETY: the caller guarantees `token` is open; ManuallyDrop keeps the
    // borrowed File from closing it.
    ManuallyDrop::new(unsafe { File::from_raw_fd(token) })
}

impl RaceBait for FileBait {
    fn name(&self) -> &str {
        "ext4-inline"
    }

    fn prepare(&self, capacity: usize) -> Result<(), BaitError> {
        fs::create_dir_all(&self.dir).map_err(BaitError::Prepare)?;
        if capacity > self.paths.len() {
            return Err(BaitError::Prepare(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} items requested but only {} paths prepared",
                    capacity,
                    self.paths.len()
                ),
            )));
        }
        tracing::debug!(dir = %self.dir.display(), capacity, "File bait ready");
        Ok(())
    }

    fn create(&self, item: ItemHandle) -> Result<RawToken, BaitError> {
        let path = self.path(item)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(FILE_MODE)
            .open(path)
            .map_err(|e| BaitError::io("create", item, e))?;
        file.write_all(&self.inline_payload)
            .map_err(|e| BaitError::io("create", item, e))?;
        Ok(file.into_raw_fd())
    }

    #[cfg(target_os = "linux")]
    fn trigger(&self, item: ItemHandle, token: RawToken) -> Result<(), BaitError> {
        // SAFETY: plain syscall on a descriptor the harness keeps open until
        // release; it starts writeback and returns without waiting.
        let rc = unsafe { libc::sync_file_range(token, 0, 0, libc::SYNC_FILE_RANGE_WRITE) };
        if rc == 0 {
            Ok(())
        } else {
            Err(BaitError::io("trigger", item, io::Error::last_os_error()))
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn trigger(&self, _item: ItemHandle, _token: RawToken) -> Result<(), BaitError> {
        Ok(())
    }

    fn mutate(&self, item: ItemHandle, token: RawToken) -> Result<(), BaitError> {
        // SAFETY: the harness only mutates live tokens.
        let mut file = unsafe { borrow_file(token) };
        file.set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| file.write_all(&self.extent_payload))
            .map_err(|e| BaitError::io("mutate", item, e))
    }

    fn release(&self, item: ItemHandle, token: Option<RawToken>) -> Result<(), BaitError> {
        if let Some(token) = token {
            // SAFETY: each token is released exactly once; taking ownership
            // closes it on drop.
            drop(unsafe { File::from_raw_fd(token) });
        }
        match fs::remove_file(self.path(item)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BaitError::io("release", item, e)),
        }
    }
}
