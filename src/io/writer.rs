//! File writer for an [`Acquisition`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::codec::{SharedAcquisition, SharedCodec};
use super::registry::CodecRegistry;
use crate::util::{Error, Result};

/// Writes one acquisition to a file.
///
/// The codec is chosen from the file extension unless one is set, typically
/// the codec of the reader the acquisition came from.
pub struct AcquisitionWriter {
    filename: Option<PathBuf>,
    input: Option<SharedAcquisition>,
    codec: Option<SharedCodec>,
    registry: CodecRegistry,
}

impl Default for AcquisitionWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionWriter {
    pub fn new() -> Self {
        Self {
            filename: None,
            input: None,
            codec: None,
            registry: CodecRegistry::new(),
        }
    }

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

    pub fn input(&self) -> Option<SharedAcquisition> {
        self.input.clone()
    }

    pub fn set_input(&mut self, acq: SharedAcquisition) {
        self.input = Some(acq);
    }

    pub fn codec(&self) -> Option<SharedCodec> {
        self.codec.clone()
    }

    pub fn set_codec(&mut self, codec: SharedCodec) {
        self.codec = Some(codec);
    }

    /// Encode the input and write it.
    ///
    /// The file is created only once encoding succeeded.
    #[tracing::instrument(skip_all, fields(file = ?self.filename))]
    pub fn update(&mut self) -> Result<()> {
        let path = self.filename.clone().ok_or(Error::FilenameNotSpecified)?;
        let input = self.input.clone().ok_or(Error::NoInput)?;
        let codec = match &self.codec {
            Some(c) => Arc::clone(c),
            None => self
                .registry
                .for_path(&path)
                .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?,
        };

        let mut bytes = Vec::new();
        {
            let acq = input.read();
            codec.write().write(&mut bytes, &acq)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&bytes)?;
        out.flush()?;
        info!(bytes = bytes.len(), "wrote {}", path.display());
        self.codec = Some(codec);
        Ok(())
    }
}
