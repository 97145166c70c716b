//! Positional I/O on the transform target.
//!
//! The target is opened read-write and, when the chunk geometry allows it,
//! in direct (unbuffered) mode so that a completed fsync means the bytes
//! are on the medium rather than in the page cache. Filesystems that do not
//! support direct mode (tmpfs, some network filesystems) fall back to a
//! buffered open; durability then rests on fsync alone.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::{DevcryptError, Result};

/// Alignment required for direct I/O buffers, offsets, and lengths.
const DIRECT_IO_ALIGN: usize = 4096;

/// A buffer whose usable region is aligned for direct I/O.
///
/// Over-allocates and carves out an aligned window; the backing allocation
/// never grows, so the window stays valid for the buffer's lifetime.
struct AlignedBuf {
    raw: Vec<u8>,
    start: usize,
    len: usize,
}

impl AlignedBuf {
    fn new(len: usize, align: usize) -> Self {
        let raw = vec![0u8; len + align];
        let start = raw.as_ptr().align_offset(align);
        Self { raw, start, len }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.raw[self.start..self.start + self.len]
    }
}

/// The device (or regular file) being transformed in place.
pub struct Device {
    file: File,
    size: u64,
    /// Bounce buffer for direct I/O; `None` when the open fell back to
    /// buffered mode or the chunk size is not direct-I/O aligned.
    bounce: Option<AlignedBuf>,
}

impl Device {
    /// Opens the target read-write.
    ///
    /// Direct mode is attempted only when `chunk_size` is a multiple of the
    /// direct I/O alignment; smaller chunk sizes would make every transfer
    /// violate the kernel's alignment rules.
    pub fn open(path: &Path, chunk_size: u64) -> Result<Self> {
        let direct_capable = chunk_size % DIRECT_IO_ALIGN as u64 == 0;
        let (mut file, direct) = Self::open_file(path, direct_capable)?;

        // Block devices report zero metadata length; seek-to-end works for
        // both devices and regular files.
        let size = file.seek(SeekFrom::End(0))?;

        let bounce = if direct {
            Some(AlignedBuf::new(chunk_size as usize, DIRECT_IO_ALIGN))
        } else {
            None
        };

        Ok(Self { file, size, bounce })
    }

    #[cfg(target_os = "linux")]
    fn open_file(path: &Path, direct: bool) -> Result<(File, bool)> {
        use std::os::unix::fs::OpenOptionsExt;

        if direct {
            let attempt = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_DIRECT)
                .open(path);
            if let Ok(file) = attempt {
                return Ok((file, true));
            }
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok((file, false))
    }

    #[cfg(not(target_os = "linux"))]
    fn open_file(path: &Path, _direct: bool) -> Result<(File, bool)> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok((file, false))
    }

    /// Total size in bytes, fixed for the duration of the run.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads exactly one chunk at `offset` into `buf`.
    pub fn read_chunk(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if let Some(bounce) = &mut self.bounce {
            let window = bounce.as_mut_slice();
            self.file
                .read_exact_at(window, offset)
                .map_err(|e| DevcryptError::at_offset(offset, e))?;
            buf.copy_from_slice(window);
        } else {
            self.file
                .read_exact_at(buf, offset)
                .map_err(|e| DevcryptError::at_offset(offset, e))?;
        }
        Ok(())
    }

    /// Writes exactly one chunk of `data` at `offset`.
    pub fn write_chunk(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if let Some(bounce) = &mut self.bounce {
            let window = bounce.as_mut_slice();
            window.copy_from_slice(data);
            self.file
                .write_all_at(window, offset)
                .map_err(|e| DevcryptError::at_offset(offset, e))?;
        } else {
            self.file
                .write_all_at(data, offset)
                .map_err(|e| DevcryptError::at_offset(offset, e))?;
        }
        Ok(())
    }

    /// Flushes outstanding writes to durable media.
    pub fn sync(&mut self, offset: u64) -> Result<()> {
        self.file
            .sync_data()
            .map_err(|e| DevcryptError::at_offset(offset, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_device(contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.img");
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_open_reports_size() {
        let (_dir, path) = temp_device(&[0u8; 8192]);
        let dev = Device::open(&path, 4096).unwrap();
        assert_eq!(dev.size(), 8192);
    }

    #[test]
    fn test_read_chunk_at_offset() {
        let mut contents = vec![0u8; 128];
        contents[64..].fill(0xAB);
        let (_dir, path) = temp_device(&contents);

        let mut dev = Device::open(&path, 64).unwrap();
        let mut buf = vec![0u8; 64];
        dev.read_chunk(64, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_write_then_read_back() {
        let (_dir, path) = temp_device(&[0u8; 256]);

        let mut dev = Device::open(&path, 64).unwrap();
        let data = vec![0x5Au8; 64];
        dev.write_chunk(128, &data).unwrap();
        dev.sync(128).unwrap();

        let mut buf = vec![0u8; 64];
        dev.read_chunk(128, &mut buf).unwrap();
        assert_eq!(buf, data);

        // Neighboring chunks untouched.
        dev.read_chunk(64, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_past_end_fails_with_offset() {
        let (_dir, path) = temp_device(&[0u8; 64]);
        let mut dev = Device::open(&path, 64).unwrap();
        let mut buf = vec![0u8; 64];
        let err = dev.read_chunk(64, &mut buf).unwrap_err();
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_aligned_buf_window_is_aligned() {
        let mut buf = AlignedBuf::new(4096, 4096);
        let ptr = buf.as_mut_slice().as_ptr();
        assert_eq!(ptr as usize % 4096, 0);
        assert_eq!(buf.as_mut_slice().len(), 4096);
    }
}
