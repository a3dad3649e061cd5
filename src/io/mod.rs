//! File-level reading and writing.
//!
//! - [`FormatCodec`] - Format-specific decoder/encoder interface
//! - [`CodecRegistry`] - Codec selection by content or extension
//! - [`AcquisitionReader`] / [`AcquisitionWriter`] - Single-shot `update()` pipeline

mod codec;
mod reader;
mod registry;
mod source;
mod writer;

use std::sync::Arc;

use parking_lot::RwLock;

pub use codec::{FormatCodec, SharedAcquisition, SharedCodec, shared};
pub use reader::AcquisitionReader;
pub use registry::{CodecRegistry, is_c3d};
pub use source::ByteSource;
pub use writer::AcquisitionWriter;

use crate::core::Acquisition;

/// Wrap an acquisition for a writer.
pub fn share(acq: Acquisition) -> SharedAcquisition {
    Arc::new(RwLock::new(acq))
}
