//! Durable single-value progress counter.
//!
//! One 8-byte big-endian file per mode, holding the count of device bytes
//! that are fully processed and durable. It is overwritten in place and
//! fsynced after every chunk; the store happens strictly after the chunk's
//! output (or sparse record) is durable, never before.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;

use crate::config::Mode;
use crate::error::{DevcryptError, Result};
use crate::workdir::Workdir;

pub struct OffsetLog {
    file: File,
}

impl OffsetLog {
    /// Opens this mode's offset file, creating it at zero if missing.
    /// Returns the log and the persisted offset.
    pub fn load_or_init(workdir: &Workdir, mode: Mode) -> Result<(Self, u64)> {
        let path = workdir.offset_path(mode);
        if !path.exists() {
            workdir.create_durable(&path, &0u64.to_be_bytes())?;
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        if len != 8 {
            return Err(DevcryptError::CorruptOffset(format!(
                "{:?} is {} bytes, expected 8",
                path, len
            )));
        }

        let mut buf = [0u8; 8];
        file.read_exact_at(&mut buf, 0)?;
        let offset = u64::from_be_bytes(buf);
        Ok((Self { file }, offset))
    }

    /// Overwrites the counter in place and fsyncs before returning.
    pub fn store(&mut self, offset: u64) -> Result<()> {
        self.file
            .write_all_at(&offset.to_be_bytes(), 0)
            .map_err(|e| DevcryptError::at_offset(offset, e))?;
        self.file
            .sync_data()
            .map_err(|e| DevcryptError::at_offset(offset, e))
    }
}
