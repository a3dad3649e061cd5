//! C3D binary format.
//!
//! A C3D file is made of 512-byte blocks:
//!
//! ```text
//! block 1        header (frame range, scale, rate, header events)
//! block 2..      parameter section (groups and parameters)
//! DATA_START..   data section (point frames interleaved with analog samples)
//! ```
//!
//! Three byte orders exist (DEC/VAX, Intel, MIPS), announced by the processor
//! byte of the parameter section. The sign of the point scale selects
//! between scaled 16-bit integer and float samples.

mod codec;
mod data;
mod format;
mod header;
mod parameters;
mod regenerate;
mod stream;

pub use codec::C3dCodec;
pub use data::{AnalogScaling, DataLayout, read_data, write_data};
pub use format::{
    AnalogIntegerFormat, BLOCK_SIZE, ByteOrder, DEFAULT_POINT_SCALE, HEADER_EVENTS, MAX_LIST_LEN,
    MAX_SCALED_VALUE, StorageFormat, WriteFlags, block_offset, blocks_for,
};
pub use header::{Header, HeaderEvent, probe};
pub use parameters::{read_parameters, write_parameters};
pub use regenerate::{EncodeSettings, Prepared, prepare};
pub use stream::{ByteReader, ByteWriter, f32_to_vax, vax_to_f32};
