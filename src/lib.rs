//! devcrypt - resumable in-place device encryption
//!
//! This library transforms a block device (or regular file) in place with
//! AES-256-CBC, one chunk at a time, with crash-safe progress persisted to
//! a working directory and all-zero regions preserved as-is.
//!
//! # Features
//!
//! - **In-place**: no second device needed to stage output
//! - **Resumable**: interrupt at any point (SIGKILL, power loss) and re-run
//! - **Crash-safe**: a strict fsync ordering over stage files, the device,
//!   and the progress counter makes resume byte-exact
//! - **Sparse-aware**: all-zero chunks bypass the cipher and stay all-zero
//!   on the device, recorded in a log the decrypt side replays
//!
//! # Example
//!
//! ```no_run
//! use devcrypt::{transform_device, Mode, TransformConfig};
//! use std::path::Path;
//!
//! let config = TransformConfig::new(Mode::Encrypt, 4096, false).unwrap();
//! transform_device(Path::new("/dev/sdx"), Path::new("/var/lib/devcrypt"), config).unwrap();
//! ```

pub mod config;
pub mod crypto;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod workdir;

pub use config::{Mode, TransformConfig, BLOCK_SIZE, DEFAULT_CHUNK_SIZE, IV_LEN, KEY_LEN};
pub use crypto::{AesCbcStream, CipherStream};
pub use error::{DevcryptError, Result};

use std::path::Path;

use crate::device::Device;
use crate::pipeline::{ChunkPipeline, SparseLog};
use crate::workdir::offset::OffsetLog;
use crate::workdir::sparse::{SparseCursor, SparseWriter};
use crate::workdir::{keymaterial, Workdir};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every chunk was processed this run.
    Completed,
    /// The persisted offset already covered the whole device; nothing was
    /// touched.
    AlreadyDone,
}

/// Runs one transform to completion.
///
/// This is the high-level entry point. It:
/// 1. Loads (or, on encrypt, creates) the key material
/// 2. Opens the device and validates the chunk geometry
/// 3. Loads the persisted offset and checks its invariants
/// 4. Hands everything to the chunk pipeline and drives it to the end
///
/// # Errors
///
/// Returns an error if the geometry is inconsistent, key material is
/// missing or malformed, any persisted state fails validation, or any I/O
/// or cipher operation fails. All errors are fatal; the persisted state is
/// sufficient to resume on the next invocation.
pub fn transform_device(
    device_path: &Path,
    workdir_path: &Path,
    config: TransformConfig,
) -> Result<Outcome> {
    let workdir = Workdir::new(workdir_path);

    // Key material is checked before the device is opened, so a decrypt
    // with missing material fails without touching the target.
    let material = keymaterial::ensure(&workdir, config.mode)?;

    let cipher = AesCbcStream::new(config.mode, &*material.key, &material.iv)?;
    if cipher.block_size() != BLOCK_SIZE {
        return Err(DevcryptError::ConfigMismatch(format!(
            "cipher block size ({}) is not the expected {}",
            cipher.block_size(),
            BLOCK_SIZE
        )));
    }

    let device = Device::open(device_path, config.chunk_size)?;
    config.check_device_size(device.size())?;

    let (offset_log, offset) = OffsetLog::load_or_init(&workdir, config.mode)?;
    if offset > device.size() || offset % config.chunk_size != 0 {
        return Err(DevcryptError::CorruptOffset(format!(
            "persisted offset {} is not a chunk boundary within the {}-byte device",
            offset,
            device.size()
        )));
    }

    if offset >= device.size() {
        return Ok(Outcome::AlreadyDone);
    }

    let sparse = match config.mode {
        Mode::Encrypt => SparseLog::Writer(SparseWriter::open(&workdir, config.mode)?),
        Mode::Decrypt => SparseLog::Cursor(SparseCursor::open(&workdir, config.mode)?),
    };

    let mut pipeline = ChunkPipeline::new(
        config, workdir, device, cipher, offset_log, offset, sparse,
    );
    pipeline.run()?;
    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("dev.img");
        let state = dir.path().join("state");
        std::fs::write(&device, contents).unwrap();
        std::fs::create_dir(&state).unwrap();
        (dir, device, state)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let original: Vec<u8> = (0..8192).map(|i| (i * 31 + 7) as u8).collect();
        let (_dir, device, state) = setup(&original);

        let enc = TransformConfig::new(Mode::Encrypt, 4096, false).unwrap();
        assert_eq!(
            transform_device(&device, &state, enc).unwrap(),
            Outcome::Completed
        );
        assert_ne!(std::fs::read(&device).unwrap(), original);

        let dec = TransformConfig::new(Mode::Decrypt, 4096, false).unwrap();
        assert_eq!(
            transform_device(&device, &state, dec).unwrap(),
            Outcome::Completed
        );
        assert_eq!(std::fs::read(&device).unwrap(), original);
    }

    #[test]
    fn test_empty_device_completes() {
        let (_dir, device, state) = setup(&[]);
        let config = TransformConfig::new(Mode::Encrypt, 4096, false).unwrap();
        // Zero chunks to process: the persisted zero offset already covers
        // the whole device.
        assert_eq!(
            transform_device(&device, &state, config).unwrap(),
            Outcome::AlreadyDone
        );
    }

    #[test]
    fn test_second_run_is_already_done() {
        let (_dir, device, state) = setup(&[0x55; 4096]);
        let config = TransformConfig::new(Mode::Encrypt, 4096, false).unwrap();
        transform_device(&device, &state, config).unwrap();

        let after_first = std::fs::read(&device).unwrap();
        assert_eq!(
            transform_device(&device, &state, config).unwrap(),
            Outcome::AlreadyDone
        );
        assert_eq!(std::fs::read(&device).unwrap(), after_first);
    }

    #[test]
    fn test_misaligned_device_rejected() {
        let (_dir, device, state) = setup(&[0u8; 4000]);
        let config = TransformConfig::new(Mode::Encrypt, 4096, false).unwrap();
        let err = transform_device(&device, &state, config).unwrap_err();
        assert!(matches!(err, DevcryptError::ConfigMismatch(_)));
    }

    #[test]
    fn test_stale_offset_from_other_chunk_size_rejected() {
        let (_dir, device, state) = setup(&[0x55; 8192]);
        let enc = TransformConfig::new(Mode::Encrypt, 4096, false).unwrap();
        transform_device(&device, &state, enc).unwrap();

        // Re-running encrypt with an incompatible chunk size must refuse
        // the stale counter rather than resume misaligned.
        std::fs::write(state.join("enc_offset"), 4096u64.to_be_bytes()).unwrap();
        let enc_large = TransformConfig::new(Mode::Encrypt, 8192, false).unwrap();
        let err = transform_device(&device, &state, enc_large).unwrap_err();
        assert!(matches!(err, DevcryptError::CorruptOffset(_)));
    }
}
