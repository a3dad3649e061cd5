//! Format-agnostic codec interface.
//!
//! These traits define the interface between the file-level reader/writer
//! and the format-specific encoders.

use std::any::Any;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::c3d::{ByteOrder, StorageFormat};
use crate::core::Acquisition;
use crate::util::Result;

/// A file format able to decode and encode an [`Acquisition`].
///
/// A codec keeps the configuration discovered by its last read (byte order,
/// storage format, scales), so handing the reader's codec to a writer
/// reproduces the source layout.
pub trait FormatCodec: Any + Send + Sync + fmt::Debug {
    /// Short format name ("C3D").
    fn name(&self) -> &'static str;

    /// Lowercase file extensions, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Check whether the content looks like this format.
    fn can_read(&self, data: &[u8]) -> bool;

    /// Decode a whole file.
    fn read(&mut self, data: &[u8]) -> Result<Acquisition>;

    /// Encode `acq`. Nothing is written to `out` unless encoding succeeds.
    fn write(&mut self, out: &mut dyn Write, acq: &Acquisition) -> Result<()>;

    /// Byte order used by the last read or the next write.
    fn byte_order(&self) -> ByteOrder {
        ByteOrder::NotApplicable
    }

    /// Sample storage used by the last read or the next write.
    fn storage_format(&self) -> StorageFormat {
        StorageFormat::NotApplicable
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn FormatCodec {
    /// Concrete codec, if it is a `T`.
    pub fn downcast_ref<T: FormatCodec>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: FormatCodec>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Codec shared between a reader and a writer.
pub type SharedCodec = Arc<RwLock<dyn FormatCodec>>;

/// Acquisition shared between a reader (producer) and writers or callers.
pub type SharedAcquisition = Arc<RwLock<Acquisition>>;

/// Wrap a codec for sharing.
pub fn shared<C: FormatCodec>(codec: C) -> SharedCodec {
    Arc::new(RwLock::new(codec))
}
