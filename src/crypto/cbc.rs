//! AES-256-CBC chunk transform with padding disabled.
//!
//! Each chunk is processed by a cipher instance initialized for that chunk
//! alone: the IV is derived from the base IV and the chunk's device offset
//! using a fixed-half / counter-half construction, so a chunk's ciphertext
//! depends only on (key, base IV, offset, plaintext). That property makes
//! crash resume byte-exact (a chunk staged by a dead process and a chunk
//! re-encrypted by a fresh one are identical), and it keeps sparse chunks,
//! which bypass the cipher entirely, from influencing any other chunk's
//! output.

use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::config::{Mode, BLOCK_SIZE, IV_LEN, KEY_LEN};
use crate::crypto::CipherStream;
use crate::error::{DevcryptError, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256-CBC implementation of [`CipherStream`].
pub struct AesCbcStream {
    mode: Mode,
    key: Zeroizing<[u8; KEY_LEN]>,
    iv: [u8; IV_LEN],
}

impl AesCbcStream {
    /// Prepares the cipher for one run.
    pub fn new(mode: Mode, key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| DevcryptError::Cipher(format!("key must be {} bytes", KEY_LEN)))?;
        let iv: [u8; IV_LEN] = iv
            .try_into()
            .map_err(|_| DevcryptError::Cipher(format!("iv must be {} bytes", IV_LEN)))?;
        Ok(Self {
            mode,
            key: Zeroizing::new(key),
            iv,
        })
    }

    /// Derives the IV for the chunk at `offset`: the base IV's first half
    /// stays fixed, the second half carries the offset big-endian.
    fn chunk_iv(&self, offset: u64) -> [u8; IV_LEN] {
        let mut iv = self.iv;
        iv[8..].copy_from_slice(&offset.to_be_bytes());
        iv
    }
}

impl CipherStream for AesCbcStream {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn transform(&mut self, offset: u64, input: &[u8]) -> Result<Vec<u8>> {
        if input.is_empty() || input.len() % BLOCK_SIZE != 0 {
            return Err(DevcryptError::Cipher(format!(
                "chunk length {} at offset {} is not a positive multiple of {}",
                input.len(),
                offset,
                BLOCK_SIZE
            )));
        }

        let iv = self.chunk_iv(offset);
        let mut buf = input.to_vec();
        let out_len = match self.mode {
            Mode::Encrypt => Aes256CbcEnc::new((&*self.key).into(), (&iv).into())
                .encrypt_padded_mut::<NoPadding>(&mut buf, input.len())
                .map_err(|e| DevcryptError::Cipher(format!("encrypt at offset {}: {}", offset, e)))?
                .len(),
            Mode::Decrypt => Aes256CbcDec::new((&*self.key).into(), (&iv).into())
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|e| DevcryptError::Cipher(format!("decrypt at offset {}: {}", offset, e)))?
                .len(),
        };

        if out_len != input.len() {
            return Err(DevcryptError::CipherLengthMismatch {
                offset,
                expected: input.len(),
                actual: out_len,
            });
        }
        Ok(buf)
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        // No padding, block-aligned chunks: nothing can be buffered.
        Ok(Vec::new())
    }
}
