//! # C3D
//!
//! Rust implementation of the C3D motion capture file format.
//!
//! A C3D file holds 3D point trajectories, analog channels sampled at a
//! multiple of the point rate, and a self-describing tree of typed
//! parameters. This crate reads and writes all three historical byte orders
//! (DEC/VAX, Intel, MIPS) with integer or float sample storage.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (errors, dimensions, math)
//! - [`core`] - In-memory acquisition, records and the metadata tree
//! - [`c3d`] - Binary codec (header, parameters, data section)
//! - [`io`] - Codec registry, `AcquisitionReader` / `AcquisitionWriter`
//!
//! ## Example
//!
//! ```ignore
//! use c3d::prelude::*;
//!
//! let mut reader = AcquisitionReader::new();
//! reader.set_filename("gait.c3d");
//! reader.update()?;
//!
//! let acq = reader.output();
//! acq.write().clear_analogs();
//!
//! let mut writer = AcquisitionWriter::new();
//! writer.set_input(acq);
//! writer.set_codec(reader.codec().unwrap());
//! writer.set_filename("gait_points_only.c3d");
//! writer.update()?;
//! ```

pub mod util;
pub mod core;
pub mod c3d;
pub mod io;

// Re-export commonly used types
pub use util::{Error, ErrorKind, Result};
pub use c3d::C3dCodec;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{DVec3, Dimensions, Error, ErrorKind, Result};
    pub use crate::core::{
        Acquisition, Analog, Event, Format, Gain, MetaData, Point, PointType, TypedValue, Value,
    };
    pub use crate::c3d::{AnalogIntegerFormat, ByteOrder, C3dCodec, StorageFormat, WriteFlags};
    pub use crate::io::{AcquisitionReader, AcquisitionWriter, FormatCodec, SharedCodec, share, shared};
}
