//! Per-chunk crash-safety staging.
//!
//! A chunk's transformed output is made durable in a named sidecar file
//! before the device is touched. If the process dies between the stage
//! write and the offset advance, the next run finds the sidecar at its
//! resume offset and replays it instead of transforming again.

use std::path::PathBuf;

use crate::config::Mode;
use crate::error::{DevcryptError, Result};
use crate::workdir::Workdir;

pub struct ChunkStager {
    workdir: Workdir,
    mode: Mode,
    chunk_size: u64,
}

impl ChunkStager {
    pub fn new(workdir: Workdir, mode: Mode, chunk_size: u64) -> Self {
        Self {
            workdir,
            mode,
            chunk_size,
        }
    }

    /// Writes `data` durably to this chunk's stage file.
    pub fn stage(&self, offset: u64, data: &[u8]) -> Result<()> {
        let path = self.path(offset);
        self.workdir.create_durable(&path, data)
    }

    /// Loads the staged output for `offset`, if a stage file exists.
    ///
    /// A stage file of any size other than one chunk is fatal: it is the
    /// authoritative output for that chunk and cannot be partial.
    pub fn staged(&self, offset: u64) -> Result<Option<Vec<u8>>> {
        let path = self.path(offset);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&path).map_err(|e| DevcryptError::at_offset(offset, e))?;
        if data.len() as u64 != self.chunk_size {
            return Err(DevcryptError::CorruptStage {
                path,
                actual: data.len() as u64,
                expected: self.chunk_size,
            });
        }
        Ok(Some(data))
    }

    /// Removes the stage file once the offset advance is durable.
    ///
    /// Failure is reported and ignored: a stray stage file is replayed
    /// idempotently by a later run, so correctness is unaffected.
    pub fn discard(&self, offset: u64) {
        let path = self.path(offset);
        if let Err(e) = std::fs::remove_file(&path) {
            eprintln!("warning: could not remove stage file {:?}: {}", path, e);
        }
    }

    fn path(&self, offset: u64) -> PathBuf {
        self.workdir.stage_path(self.mode, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stager(chunk_size: u64) -> (tempfile::TempDir, ChunkStager) {
        let dir = tempfile::tempdir().unwrap();
        let stager = ChunkStager::new(Workdir::new(dir.path()), Mode::Encrypt, chunk_size);
        (dir, stager)
    }

    #[test]
    fn test_stage_then_load() {
        let (_dir, stager) = stager(64);
        let data = vec![0xC3u8; 64];
        stager.stage(128, &data).unwrap();
        assert_eq!(stager.staged(128).unwrap(), Some(data));
    }

    #[test]
    fn test_absent_stage_is_none() {
        let (_dir, stager) = stager(64);
        assert_eq!(stager.staged(0).unwrap(), None);
    }

    #[test]
    fn test_wrong_size_is_corrupt() {
        let (dir, stager) = stager(64);
        std::fs::write(dir.path().join("enc_chunk-0"), [0u8; 32]).unwrap();
        assert!(matches!(
            stager.staged(0),
            Err(DevcryptError::CorruptStage { .. })
        ));
    }

    #[test]
    fn test_discard_removes_file() {
        let (dir, stager) = stager(64);
        stager.stage(0, &[0u8; 64]).unwrap();
        stager.discard(0);
        assert!(!dir.path().join("enc_chunk-0").exists());
    }

    #[test]
    fn test_discard_of_missing_file_is_not_fatal() {
        let (_dir, stager) = stager(64);
        stager.discard(4096);
    }
}
