//! Configuration for the device transform.
//!
//! This module defines the fixed cryptographic geometry (key, IV, and block
//! sizes), the transform mode, and the run configuration with its
//! validation rules.

use crate::error::{DevcryptError, Result};

/// AES-256 key size in bytes.
pub const KEY_LEN: usize = 32;

/// CBC initialization vector size in bytes (one cipher block).
pub const IV_LEN: usize = 16;

/// Cipher block size in bytes. Chunk sizes must be whole multiples of this.
pub const BLOCK_SIZE: usize = 16;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u64 = 4096;

/// Direction of the transform.
///
/// The mode also names the on-disk state files: each mode keeps its own
/// offset file and stage files, so a decrypt never disturbs a prior
/// encrypt's progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    /// The short name used as the filename prefix for this mode's state.
    pub fn prefix(&self) -> &'static str {
        match self {
            Mode::Encrypt => "enc",
            Mode::Decrypt => "dec",
        }
    }

    /// The opposite mode.
    ///
    /// Used to locate the sparse log: it is written under the encrypt
    /// prefix and a decrypt run finds it under its inverse mode's name.
    pub fn inverse(&self) -> Mode {
        match self {
            Mode::Encrypt => Mode::Decrypt,
            Mode::Decrypt => Mode::Encrypt,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Validated configuration for one transform run.
#[derive(Debug, Clone, Copy)]
pub struct TransformConfig {
    /// Transform direction.
    pub mode: Mode,
    /// Chunk size in bytes; a positive multiple of [`BLOCK_SIZE`].
    pub chunk_size: u64,
    /// Stage chunks but never write to the device.
    pub dry_run: bool,
}

impl TransformConfig {
    /// Creates a run configuration, rejecting chunk sizes that are zero or
    /// not whole multiples of the cipher block size.
    pub fn new(mode: Mode, chunk_size: u64, dry_run: bool) -> Result<Self> {
        if chunk_size == 0 || chunk_size % BLOCK_SIZE as u64 != 0 {
            return Err(DevcryptError::ConfigMismatch(format!(
                "chunk size ({}) must be a positive multiple of {}",
                chunk_size, BLOCK_SIZE
            )));
        }
        Ok(Self {
            mode,
            chunk_size,
            dry_run,
        })
    }

    /// Checks that the device size is a whole number of chunks.
    pub fn check_device_size(&self, device_size: u64) -> Result<()> {
        if device_size % self.chunk_size != 0 {
            return Err(DevcryptError::ConfigMismatch(format!(
                "device size ({}) must be a multiple of chunk size ({})",
                device_size, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_prefixes() {
        assert_eq!(Mode::Encrypt.prefix(), "enc");
        assert_eq!(Mode::Decrypt.prefix(), "dec");
        assert_eq!(Mode::Encrypt.inverse(), Mode::Decrypt);
        assert_eq!(Mode::Decrypt.inverse(), Mode::Encrypt);
    }

    #[test]
    fn test_default_chunk_size_is_block_aligned() {
        assert_eq!(DEFAULT_CHUNK_SIZE % BLOCK_SIZE as u64, 0);
    }

    #[test]
    fn test_config_accepts_block_multiples() {
        for size in [16, 64, 4096, 65536] {
            assert!(TransformConfig::new(Mode::Encrypt, size, false).is_ok());
        }
    }

    #[test]
    fn test_config_rejects_misaligned_chunk() {
        for size in [0, 1, 15, 17, 4097] {
            let result = TransformConfig::new(Mode::Encrypt, size, false);
            assert!(matches!(result, Err(DevcryptError::ConfigMismatch(_))));
        }
    }

    #[test]
    fn test_device_size_must_be_chunk_aligned() {
        let config = TransformConfig::new(Mode::Encrypt, 4096, false).unwrap();
        assert!(config.check_device_size(0).is_ok());
        assert!(config.check_device_size(8192).is_ok());
        assert!(config.check_device_size(4000).is_err());
    }
}
