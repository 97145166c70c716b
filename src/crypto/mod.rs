//! Cryptographic operations for the chunk transform.
//!
//! This module provides a trait-based abstraction over the block cipher,
//! allowing the pipeline to be driven against pluggable implementations.

pub mod cbc;

pub use cbc::AesCbcStream;

use crate::error::Result;

/// Contract over a block cipher applied chunk-by-chunk with padding
/// disabled.
///
/// Implementations must guarantee that `transform` produces exactly as many
/// bytes as it consumes for block-aligned input, and that `finalize`
/// produces nothing when every chunk was block-aligned. Chunks that are
/// skipped (sparse regions) are simply never passed to `transform`; the
/// cipher state for each chunk depends only on the key material and the
/// chunk's offset, never on which other chunks were transformed.
pub trait CipherStream {
    /// The cipher's block size in bytes.
    fn block_size(&self) -> usize;

    /// Transforms one chunk located at `offset` on the device.
    fn transform(&mut self, offset: u64, input: &[u8]) -> Result<Vec<u8>>;

    /// Completes the stream, returning any trailing bytes.
    ///
    /// With padding disabled and block-aligned chunks this is always empty;
    /// anything else is an anomaly the caller must treat as fatal.
    fn finalize(&mut self) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_stream_object_safe() {
        let _: Option<Box<dyn CipherStream>> = None;
    }
}
