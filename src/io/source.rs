//! Whole-file input for the codecs.

use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use crate::util::{Error, Result};

/// File content, memory-mapped or read into memory.
pub struct ByteSource {
    inner: SourceInner,
}

enum SourceInner {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Buffered read (fallback, and for empty files)
    Vec(Vec<u8>),
}

impl ByteSource {
    /// Open a file with memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let size = file.metadata()?.len();

        let inner = if use_mmap && size > 0 {
            // Safety: the file is opened read-only and the map is dropped
            // before the reader returns
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            SourceInner::Mmap(mmap)
        } else {
            let mut buf = Vec::with_capacity(size as usize);
            file.read_to_end(&mut buf)?;
            SourceInner::Vec(buf)
        };
        Ok(Self { inner })
    }

    /// Wrap bytes already in memory.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: SourceInner::Vec(data),
        }
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        matches!(self.inner, SourceInner::Mmap(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.inner {
            SourceInner::Mmap(m) => &m[..],
            SourceInner::Vec(v) => v.as_slice(),
        }
    }
}

impl Deref for ByteSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}
