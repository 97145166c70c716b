//! The sparse log: offsets of chunks whose plaintext was all-zero.
//!
//! Encrypt appends entries in strictly ascending order; decrypt walks the
//! same file with a forward byte cursor. Because chunks are processed in
//! ascending offset order on both sides, the cursor advances monotonically
//! and each lookup is O(1) amortized; the log never needs an index.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use crate::config::Mode;
use crate::error::{DevcryptError, Result};
use crate::workdir::Workdir;

const ENTRY_LEN: u64 = 8;

fn open_log(workdir: &Workdir, mode: Mode, write: bool) -> Result<(File, PathBuf, u64)> {
    let path = workdir.sparse_path(mode);
    if !path.exists() {
        workdir.create_durable(&path, &[])?;
    }
    let file = OpenOptions::new().read(true).append(write).open(&path)?;
    let len = file.metadata()?.len();
    if len % ENTRY_LEN != 0 {
        return Err(DevcryptError::CorruptSparseLog(format!(
            "{:?} is {} bytes, not a multiple of {}",
            path, len, ENTRY_LEN
        )));
    }
    Ok((file, path, len))
}

/// Append side, used during encrypt.
pub struct SparseWriter {
    file: File,
    path: PathBuf,
    last: Option<u64>,
}

impl SparseWriter {
    /// Opens (creating if needed) the log for appending. The last existing
    /// entry is remembered so resumed runs keep the strict ascent.
    pub fn open(workdir: &Workdir, mode: Mode) -> Result<Self> {
        let (file, path, len) = open_log(workdir, mode, true)?;
        let last = if len >= ENTRY_LEN {
            let mut buf = [0u8; 8];
            file.read_exact_at(&mut buf, len - ENTRY_LEN)?;
            Some(u64::from_be_bytes(buf))
        } else {
            None
        };
        Ok(Self { file, path, last })
    }

    /// Appends one offset and fsyncs before returning.
    ///
    /// Re-appending the last recorded offset is a no-op: a crash between
    /// the sparse fsync and the offset fsync means the same chunk is
    /// reprocessed on resume, found all-zero again, and recorded again.
    /// The entry is already durable, so there is nothing to do. Only a
    /// strictly lesser offset is corruption.
    pub fn append(&mut self, offset: u64) -> Result<()> {
        if let Some(last) = self.last {
            if offset == last {
                return Ok(());
            }
            if offset < last {
                return Err(DevcryptError::CorruptSparseLog(format!(
                    "{:?}: append of {} after {} breaks ascending order",
                    self.path, offset, last
                )));
            }
        }
        self.file
            .write_all(&offset.to_be_bytes())
            .map_err(|e| DevcryptError::at_offset(offset, e))?;
        self.file
            .sync_data()
            .map_err(|e| DevcryptError::at_offset(offset, e))?;
        self.last = Some(offset);
        Ok(())
    }
}

/// Read side, used during decrypt.
pub struct SparseCursor {
    file: File,
    path: PathBuf,
    len: u64,
    pos: u64,
    prev: Option<u64>,
}

impl SparseCursor {
    pub fn open(workdir: &Workdir, mode: Mode) -> Result<Self> {
        let (file, path, len) = open_log(workdir, mode, false)?;
        Ok(Self {
            file,
            path,
            len,
            pos: 0,
            prev: None,
        })
    }

    /// Whether the chunk at `target` was recorded sparse.
    ///
    /// Advances past entries below `target`; entries above it are left for
    /// later queries. Entries that descend or point past the device are
    /// corruption.
    pub fn is_sparse(&mut self, target: u64, device_size: u64) -> Result<bool> {
        while self.pos < self.len {
            let entry = self.peek()?;
            if entry > device_size {
                return Err(DevcryptError::CorruptSparseLog(format!(
                    "{:?}: entry {} is beyond device size {}",
                    self.path, entry, device_size
                )));
            }
            if let Some(prev) = self.prev {
                if entry <= prev {
                    return Err(DevcryptError::CorruptSparseLog(format!(
                        "{:?}: entry {} after {} breaks ascending order",
                        self.path, entry, prev
                    )));
                }
            }
            if entry > target {
                return Ok(false);
            }
            // Consume entries at or below the target.
            self.pos += ENTRY_LEN;
            self.prev = Some(entry);
            if entry == target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn peek(&self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.file.read_exact_at(&mut buf, self.pos)?;
        Ok(u64::from_be_bytes(buf))
    }
}
