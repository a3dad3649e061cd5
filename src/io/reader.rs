//! File reader producing an [`Acquisition`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::codec::{SharedAcquisition, SharedCodec};
use super::registry::CodecRegistry;
use super::source::ByteSource;
use crate::core::Acquisition;
use crate::util::{Error, Result};

/// Reads one acquisition file.
///
/// `update` decodes the file once; calling it again with the same filename
/// does nothing. The output handle stays the same across updates, so
/// writers holding it see the new content.
///
/// # Example
/// ```ignore
/// use c3d::io::AcquisitionReader;
///
/// let mut reader = AcquisitionReader::new();
/// reader.set_filename("trial.c3d");
/// reader.update()?;
/// println!("{} points", reader.output().read().point_number());
/// ```
pub struct AcquisitionReader {
    filename: Option<PathBuf>,
    codec: Option<SharedCodec>,
    registry: CodecRegistry,
    output: SharedAcquisition,
    use_mmap: bool,
    /// File the output was decoded from.
    decoded: Option<PathBuf>,
}

impl Default for AcquisitionReader {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionReader {
    pub fn new() -> Self {
        Self {
            filename: None,
            codec: None,
            registry: CodecRegistry::new(),
            output: Arc::new(RwLock::new(Acquisition::new())),
            use_mmap: true,
            decoded: None,
        }
    }

    /// Use a custom codec registry for format detection.
    pub fn with_registry(registry: CodecRegistry) -> Self {
        Self {
            registry,
            ..Self::new()
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn set_filename(&mut self, path: impl AsRef<Path>) {
        self.filename = Some(path.as_ref().to_path_buf());
    }

    /// Codec used by the last read, or the one set by the caller.
    pub fn codec(&self) -> Option<SharedCodec> {
        self.codec.clone()
    }

    /// Force a codec. It is still replaced by detection if it cannot read
    /// the file.
    pub fn set_codec(&mut self, codec: SharedCodec) {
        self.codec = Some(codec);
        self.decoded = None;
    }

    /// Memory-map input files (default) or read them into memory.
    pub fn set_use_mmap(&mut self, use_mmap: bool) {
        self.use_mmap = use_mmap;
    }

    /// Shared handle to the decoded acquisition.
    pub fn output(&self) -> SharedAcquisition {
        Arc::clone(&self.output)
    }

    fn select_codec(&self, path: &Path, data: &[u8]) -> Result<SharedCodec> {
        if let Some(codec) = &self.codec {
            if codec.read().can_read(data) {
                return Ok(Arc::clone(codec));
            }
        }
        self.registry
            .detect(data)
            .or_else(|| self.registry.for_path(path))
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))
    }

    /// Decode the file if it changed since the last successful update.
    ///
    /// A failure leaves the previous output untouched.
    #[tracing::instrument(skip_all, fields(file = ?self.filename))]
    pub fn update(&mut self) -> Result<()> {
        let path = self.filename.clone().ok_or(Error::FilenameNotSpecified)?;
        if self.decoded.as_deref() == Some(path.as_path()) {
            debug!("already up to date");
            return Ok(());
        }
        let source = ByteSource::open_opts(&path, self.use_mmap)?;
        let codec = self.select_codec(&path, source.as_bytes())?;
        let acq = codec.write().read(source.as_bytes())?;
        info!(
            points = acq.point_number(),
            analogs = acq.analog_number(),
            frames = acq.point_frame_number(),
            "read {}",
            path.display()
        );
        *self.output.write() = acq;
        self.codec = Some(codec);
        self.decoded = Some(path);
        Ok(())
    }
}
