//! The working directory: all persisted transform state.
//!
//! Every state file the protocol relies on lives here: key material,
//! per-mode progress offsets, the sparse log, and transient per-chunk stage
//! files. This module owns the naming scheme and the durable-create
//! primitive the stores build on.

pub mod keymaterial;
pub mod offset;
pub mod sparse;
pub mod stage;

use std::path::{Path, PathBuf};

use crate::config::Mode;
use crate::error::Result;

/// Handle to the working directory.
#[derive(Debug, Clone)]
pub struct Workdir {
    root: PathBuf,
}

impl Workdir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.key`: 32 raw key bytes.
    pub fn key_path(&self) -> PathBuf {
        self.root.join(".key")
    }

    /// `.iv`: 16 raw IV bytes.
    pub fn iv_path(&self) -> PathBuf {
        self.root.join(".iv")
    }

    /// `<mode>_offset`: this mode's 8-byte progress counter.
    pub fn offset_path(&self, mode: Mode) -> PathBuf {
        self.root.join(format!("{}_offset", mode.prefix()))
    }

    /// The sparse log. Written under the encrypt prefix; a decrypt run
    /// locates the same file through its inverse mode's name.
    pub fn sparse_path(&self, mode: Mode) -> PathBuf {
        let prefix = match mode {
            Mode::Encrypt => mode.prefix(),
            Mode::Decrypt => mode.inverse().prefix(),
        };
        self.root.join(format!("{}_sparse", prefix))
    }

    /// `<mode>_chunk-<offset>`: transient stage file for one chunk.
    pub fn stage_path(&self, mode: Mode, offset: u64) -> PathBuf {
        self.root.join(format!("{}_chunk-{}", mode.prefix(), offset))
    }

    /// `<mode>_chunk-<offset>.final`: diagnostic sidecar for trailing
    /// cipher output.
    pub fn final_path(&self, mode: Mode, offset: u64) -> PathBuf {
        self.root
            .join(format!("{}_chunk-{}.final", mode.prefix(), offset))
    }

    /// Creates `path` with `contents`, durably.
    ///
    /// Writes to a temporary file in the workdir, fsyncs it, then renames
    /// it into place, so the file is never observable half-written.
    pub(crate) fn create_durable(&self, path: &Path, contents: &[u8]) -> Result<()> {
        use std::io::Write;

        let mut temp = tempfile::Builder::new()
            .prefix(".devcrypt")
            .suffix(".tmp")
            .tempfile_in(&self.root)?;
        temp.as_file_mut().write_all(contents)?;
        temp.as_file().sync_all()?;
        temp.persist(path)?;
        Ok(())
    }
}
