//! Create-once, load-always persistence of the key and IV.
//!
//! Key material is born on the first encrypt run and immutable thereafter.
//! Decrypt never invents a key: if either file is absent it fails instead.
//! If either file is absent on encrypt, both are regenerated: partial
//! creation is treated the same as no creation.

use rand::rngs::OsRng;
use rand_core::TryRngCore;
use zeroize::Zeroizing;

use crate::config::{Mode, IV_LEN, KEY_LEN};
use crate::error::{DevcryptError, Result};
use crate::workdir::Workdir;

/// The loaded AES-256 key and CBC base IV.
pub struct KeyMaterial {
    pub key: Zeroizing<[u8; KEY_LEN]>,
    pub iv: [u8; IV_LEN],
}

/// Loads the key material, creating it first when permitted.
///
/// # Errors
///
/// - [`DevcryptError::MissingKeyMaterial`] when either file is absent and
///   `mode` is decrypt.
/// - [`DevcryptError::CorruptKeyMaterial`] when a file exists with the
///   wrong size.
pub fn ensure(workdir: &Workdir, mode: Mode) -> Result<KeyMaterial> {
    let key_path = workdir.key_path();
    let iv_path = workdir.iv_path();

    if !key_path.exists() || !iv_path.exists() {
        if mode == Mode::Decrypt {
            return Err(DevcryptError::MissingKeyMaterial);
        }
        create_random(workdir, &key_path, KEY_LEN)?;
        create_random(workdir, &iv_path, IV_LEN)?;
    }

    let key = load_exact::<KEY_LEN>(&key_path)?;
    let iv = load_exact::<IV_LEN>(&iv_path)?;
    Ok(KeyMaterial {
        key: Zeroizing::new(key),
        iv,
    })
}

fn create_random(workdir: &Workdir, path: &std::path::Path, len: usize) -> Result<()> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| DevcryptError::Cipher(format!("RNG error: {}", e)))?;
    workdir.create_durable(path, &bytes)
}

fn load_exact<const N: usize>(path: &std::path::Path) -> Result<[u8; N]> {
    let bytes = std::fs::read(path)?;
    let actual = bytes.len() as u64;
    Zeroizing::new(bytes)
        .as_slice()
        .try_into()
        .map_err(|_| DevcryptError::CorruptKeyMaterial {
            path: path.to_path_buf(),
            actual,
            expected: N as u64,
        })
}
