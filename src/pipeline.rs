//! The chunk processing state machine.
//!
//! One chunk at a time, in strictly ascending offset order, each chunk
//! resolved to exactly one of three fates:
//!
//! - **Resume-from-stage**: a stage file from an interrupted run holds the
//!   chunk's authoritative output; apply it instead of transforming.
//! - **Sparse**: the plaintext is all-zero (encrypt decides by inspection,
//!   decrypt by consulting the sparse log); the device is left untouched
//!   and the cipher is bypassed.
//! - **Transform**: feed the chunk through the cipher, stage the output
//!   durably, apply it to the device, then advance.
//!
//! Durability ordering is the correctness backbone and must not be
//! reordered: stage fsync → device write fsync → offset fsync → stage
//! unlink, and for sparse chunks sparse-append fsync → offset fsync.

use crate::config::TransformConfig;
use crate::crypto::CipherStream;
use crate::device::Device;
use crate::error::{DevcryptError, Result};
use crate::progress::ProgressMeter;
use crate::workdir::offset::OffsetLog;
use crate::workdir::sparse::{SparseCursor, SparseWriter};
use crate::workdir::stage::ChunkStager;
use crate::workdir::Workdir;

/// Per-mode role against the sparse log.
pub enum SparseLog {
    /// Encrypt: records all-zero chunks.
    Writer(SparseWriter),
    /// Decrypt: replays what encrypt recorded.
    Cursor(SparseCursor),
}

pub struct ChunkPipeline<C: CipherStream> {
    config: TransformConfig,
    workdir: Workdir,
    device: Device,
    cipher: C,
    offset_log: OffsetLog,
    offset: u64,
    sparse: SparseLog,
    stager: ChunkStager,
    progress: ProgressMeter,
    chunk_buf: Vec<u8>,
}

impl<C: CipherStream> ChunkPipeline<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TransformConfig,
        workdir: Workdir,
        device: Device,
        cipher: C,
        offset_log: OffsetLog,
        offset: u64,
        sparse: SparseLog,
    ) -> Self {
        let stager = ChunkStager::new(workdir.clone(), config.mode, config.chunk_size);
        let progress = ProgressMeter::new(device.size() - offset);
        let chunk_buf = vec![0u8; config.chunk_size as usize];
        Self {
            config,
            workdir,
            device,
            cipher,
            offset_log,
            offset,
            sparse,
            stager,
            progress,
            chunk_buf,
        }
    }

    /// Processes every remaining chunk, then finalizes the cipher.
    pub fn run(&mut self) -> Result<()> {
        while self.offset < self.device.size() {
            self.step()?;
        }
        self.finish()
    }

    fn step(&mut self) -> Result<()> {
        let offset = self.offset;

        // Resume-from-stage: output was computed by an interrupted run and
        // is authoritative; the cipher is not consulted.
        if let Some(staged) = self.stager.staged(offset)? {
            if !self.config.dry_run {
                self.device.write_chunk(offset, &staged)?;
                self.device.sync(offset)?;
            }
            self.advance(offset)?;
            if !self.config.dry_run {
                self.stager.discard(offset);
            }
            return Ok(());
        }

        self.device.read_chunk(offset, &mut self.chunk_buf)?;

        let is_sparse = match &mut self.sparse {
            SparseLog::Writer(_) => self.chunk_buf.iter().all(|&b| b == 0),
            SparseLog::Cursor(cursor) => cursor.is_sparse(offset, self.device.size())?,
        };

        if is_sparse {
            // Sparse: no device write, no cipher. The record must be
            // durable before the offset moves past it, or a resumed
            // decrypt would run this chunk through the cipher.
            if let SparseLog::Writer(writer) = &mut self.sparse {
                writer.append(offset)?;
            }
            self.advance(offset)?;
            return Ok(());
        }

        // Transform.
        let output = self.cipher.transform(offset, &self.chunk_buf)?;
        self.stager.stage(offset, &output)?;
        if !self.config.dry_run {
            self.device.write_chunk(offset, &output)?;
            self.device.sync(offset)?;
        }
        self.advance(offset)?;
        if !self.config.dry_run {
            self.stager.discard(offset);
        }
        Ok(())
    }

    /// Advances the durable offset past the chunk at `offset`.
    fn advance(&mut self, offset: u64) -> Result<()> {
        let next = offset + self.config.chunk_size;
        self.offset_log.store(next)?;
        self.offset = next;
        self.progress.record(self.config.chunk_size);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let trailing = self.cipher.finalize()?;
        if !trailing.is_empty() {
            // Should be impossible with padding disabled; keep the bytes
            // for forensics, then fail.
            let path = self.workdir.final_path(self.config.mode, self.offset);
            self.workdir.create_durable(&path, &trailing)?;
            return Err(DevcryptError::Cipher(format!(
                "cipher finalization produced {} trailing bytes, saved to {:?}",
                trailing.len(),
                path
            )));
        }
        Ok(())
    }
}
