//! C3D format constants and configuration enums.

use bitflags::bitflags;
use std::fmt;

/// Size of a C3D block in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Key stored in the second byte of the header and parameter section.
pub const PARAMETER_KEY: u8 = 0x50;

/// Key marking the label/range section and 4-character event labels.
pub const LABEL_KEY: i16 = 12345;

/// Block where the parameter section starts when written.
pub const PARAMETER_BLOCK: u8 = 2;

/// Number of events the header can hold.
pub const HEADER_EVENTS: usize = 18;

/// Largest magnitude written as a scaled integer coordinate.
pub const MAX_SCALED_VALUE: f64 = 32000.0;

/// Point scale of a codec that has not read or written anything yet.
pub const DEFAULT_POINT_SCALE: f64 = 0.1;

/// Maximum number of entries per `LABELS`-like parameter before continuing
/// in `LABELS2`, `LABELS3`, ...
pub const MAX_LIST_LEN: usize = 255;

// Header byte offsets
pub const HDR_PARAMETER_BLOCK: usize = 0;
pub const HDR_KEY: usize = 1;
pub const HDR_POINT_COUNT: usize = 2;
pub const HDR_ANALOG_TOTAL: usize = 4;
pub const HDR_FIRST_FRAME: usize = 6;
pub const HDR_LAST_FRAME: usize = 8;
pub const HDR_MAX_GAP: usize = 10;
pub const HDR_SCALE: usize = 12;
pub const HDR_DATA_START: usize = 16;
pub const HDR_ANALOG_RATIO: usize = 18;
pub const HDR_FRAME_RATE: usize = 20;
pub const HDR_EVENT_KEY: usize = 298;
pub const HDR_EVENT_COUNT: usize = 300;
pub const HDR_EVENT_TIMES: usize = 304;
pub const HDR_EVENT_FLAGS: usize = 376;
pub const HDR_EVENT_LABELS: usize = 396;

/// Processor type byte of the parameter section.
pub const PROCESSOR_INTEL: u8 = 84;
pub const PROCESSOR_DEC: u8 = 85;
pub const PROCESSOR_MIPS: u8 = 86;

/// Byte offset of a 1-based block number.
#[inline]
pub const fn block_offset(block: usize) -> usize {
    block.saturating_sub(1) * BLOCK_SIZE
}

/// Number of blocks needed to hold `bytes`.
#[inline]
pub const fn blocks_for(bytes: usize) -> usize {
    bytes.div_ceil(BLOCK_SIZE)
}

/// Byte order and float representation of a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Not configured.
    NotApplicable,
    /// DEC: little-endian integers, VAX floats.
    VaxLittleEndian,
    /// Intel: IEEE-754 little-endian.
    #[default]
    IeeeLittleEndian,
    /// MIPS / SGI: IEEE-754 big-endian.
    IeeeBigEndian,
}

impl ByteOrder {
    /// Byte order of the running machine.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::IeeeBigEndian
        } else {
            Self::IeeeLittleEndian
        }
    }

    /// Parameter-section processor byte.
    pub const fn processor(self) -> Option<u8> {
        match self {
            Self::NotApplicable => None,
            Self::IeeeLittleEndian => Some(PROCESSOR_INTEL),
            Self::VaxLittleEndian => Some(PROCESSOR_DEC),
            Self::IeeeBigEndian => Some(PROCESSOR_MIPS),
        }
    }

    pub const fn from_processor(processor: u8) -> Option<Self> {
        match processor {
            PROCESSOR_INTEL => Some(Self::IeeeLittleEndian),
            PROCESSOR_DEC => Some(Self::VaxLittleEndian),
            PROCESSOR_MIPS => Some(Self::IeeeBigEndian),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::NotApplicable => "n/a",
            Self::VaxLittleEndian => "VAX little-endian",
            Self::IeeeLittleEndian => "IEEE little-endian",
            Self::IeeeBigEndian => "IEEE big-endian",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How point and analog samples are stored in the data section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    NotApplicable,
    /// 32-bit floats; the scale field is negative.
    Float,
    /// Scaled 16-bit integers; the scale field is the positive multiplier.
    #[default]
    Integer,
}

impl StorageFormat {
    /// Storage implied by the sign of the scale field.
    pub fn from_scale(scale: f32) -> Self {
        if scale < 0.0 {
            Self::Float
        } else {
            Self::Integer
        }
    }

    /// Size of one stored sample word.
    pub const fn word_size(self) -> usize {
        match self {
            Self::Float => 4,
            Self::Integer | Self::NotApplicable => 2,
        }
    }

    /// Scale field value for a scale magnitude.
    pub fn signed_scale(self, magnitude: f64) -> f32 {
        match self {
            Self::Float => -(magnitude.abs() as f32),
            _ => magnitude.abs() as f32,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::NotApplicable => "n/a",
            Self::Float => "float",
            Self::Integer => "integer",
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signedness of integer analog samples (`ANALOG:FORMAT`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnalogIntegerFormat {
    #[default]
    Signed,
    Unsigned,
}

impl AnalogIntegerFormat {
    /// Value of the `ANALOG:FORMAT` parameter.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Signed => "SIGNED",
            Self::Unsigned => "UNSIGNED",
        }
    }

    pub fn from_keyword(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("UNSIGNED") {
            Self::Unsigned
        } else {
            Self::Signed
        }
    }
}

bitflags! {
    /// What the writer recomputes from the acquisition instead of reusing
    /// the values loaded from the source file.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct WriteFlags: u8 {
        /// Recompute point and analog scales from the sample range.
        const SCALES_FROM_DATA = 0b01;
        /// Rebuild labels, descriptions, units and counts.
        const METADATA_FROM_DATA = 0b10;
    }
}

impl WriteFlags {
    pub const NONE: Self = Self::empty();
}

impl Default for WriteFlags {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_math() {
        assert_eq!(block_offset(1), 0);
        assert_eq!(block_offset(2), 512);
        assert_eq!(blocks_for(0), 0);
        assert_eq!(blocks_for(1), 1);
        assert_eq!(blocks_for(512), 1);
        assert_eq!(blocks_for(513), 2);
    }

    #[test]
    fn test_processor_roundtrip() {
        for order in [ByteOrder::VaxLittleEndian, ByteOrder::IeeeLittleEndian, ByteOrder::IeeeBigEndian] {
            assert_eq!(ByteOrder::from_processor(order.processor().unwrap()), Some(order));
        }
        assert_eq!(ByteOrder::NotApplicable.processor(), None);
        assert_eq!(ByteOrder::from_processor(0), None);
    }

    #[test]
    fn test_scale_sign() {
        assert_eq!(StorageFormat::from_scale(-0.1), StorageFormat::Float);
        assert_eq!(StorageFormat::from_scale(0.1), StorageFormat::Integer);
        assert_eq!(StorageFormat::Float.signed_scale(0.5), -0.5);
        assert_eq!(StorageFormat::Integer.signed_scale(-0.5), 0.5);
    }

    #[test]
    fn test_analog_format_keyword() {
        assert_eq!(AnalogIntegerFormat::from_keyword("unsigned "), AnalogIntegerFormat::Unsigned);
        assert_eq!(AnalogIntegerFormat::from_keyword("SIGNED"), AnalogIntegerFormat::Signed);
        assert_eq!(AnalogIntegerFormat::from_keyword(""), AnalogIntegerFormat::Signed);
        assert_eq!(AnalogIntegerFormat::Unsigned.keyword(), "UNSIGNED");
    }

    #[test]
    fn test_write_flags() {
        let flags = WriteFlags::default();
        assert!(flags.contains(WriteFlags::SCALES_FROM_DATA));
        assert!(flags.contains(WriteFlags::METADATA_FROM_DATA));
        assert!(WriteFlags::NONE.is_empty());
    }
}
