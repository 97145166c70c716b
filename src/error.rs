//! Error types for the devcrypt library.
//!
//! Every error here is fatal: continuing past a failed write or fsync
//! could leave the device and the progress state disagreeing with each
//! other. The persisted state is always sufficient to resume on the next
//! invocation instead.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for all device transform operations.
#[derive(Error, Debug)]
pub enum DevcryptError {
    /// I/O error with no offset context (opening files, workdir state).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O failure on the device or a state file, with the device offset at
    /// which the transform was positioned when it occurred.
    #[error("I/O failure at offset {offset}: {source}")]
    IoAt {
        offset: u64,
        source: std::io::Error,
    },

    /// Chunk size, device size, or cipher block size disagree.
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// Key and/or IV absent in the workdir on a decrypt run.
    #[error("key and/or iv absent; encrypt must run first to create them")]
    MissingKeyMaterial,

    /// Key or IV file exists but has the wrong size.
    #[error("corrupt key material: {path:?} is {actual} bytes, expected {expected}")]
    CorruptKeyMaterial {
        path: PathBuf,
        actual: u64,
        expected: u64,
    },

    /// Offset file has the wrong size or an impossible value.
    #[error("corrupt offset file: {0}")]
    CorruptOffset(String),

    /// Stage file exists but does not hold exactly one chunk.
    #[error("corrupt stage file: {path:?} is {actual} bytes, expected {expected}")]
    CorruptStage {
        path: PathBuf,
        actual: u64,
        expected: u64,
    },

    /// Sparse log is truncated, out of order, or points past the device.
    #[error("corrupt sparse log: {0}")]
    CorruptSparseLog(String),

    /// Failure reported by the cipher primitive or the CSPRNG.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// The cipher produced a different number of bytes than it was fed.
    #[error("cipher output length {actual} != input length {expected} at offset {offset}")]
    CipherLengthMismatch {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// Failed to persist a freshly created state file.
    #[error("failed to persist temporary file: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
}

impl DevcryptError {
    /// Wraps an I/O error with the device offset it occurred at.
    pub fn at_offset(offset: u64, source: std::io::Error) -> Self {
        DevcryptError::IoAt { offset, source }
    }
}

/// Type alias for Results using DevcryptError.
pub type Result<T> = std::result::Result<T, DevcryptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DevcryptError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_io_at_carries_offset() {
        let err = DevcryptError::at_offset(
            8192,
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short write"),
        );
        assert!(err.to_string().contains("8192"));
    }

    #[test]
    fn test_missing_key_material_display() {
        let err = DevcryptError::MissingKeyMaterial;
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_length_mismatch_display() {
        let err = DevcryptError::CipherLengthMismatch {
            offset: 0,
            expected: 4096,
            actual: 4080,
        };
        let msg = err.to_string();
        assert!(msg.contains("4096") && msg.contains("4080"));
    }
}
