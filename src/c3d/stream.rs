//! Byte-order aware streams for the C3D header, parameter and data sections.
//!
//! Integers are little-endian for Intel and DEC files and big-endian for
//! MIPS files. DEC files store floats in the VAX F-floating layout.

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, ReadBytesExt};
use tracing::warn;

use super::format::{BLOCK_SIZE, ByteOrder};
use crate::util::{Error, Result};

/// Largest magnitude a VAX F-floating value can hold.
pub const VAX_MAX: f32 = f32::MAX / 4.0;

/// Convert VAX F-floating bytes (as stored) to an IEEE value.
///
/// Reserved operands (sign set, zero exponent) decode as 0.
#[inline]
pub fn vax_to_f32(b: [u8; 4]) -> f32 {
    // Sign bit and exponent sit in the first stored word
    if b[1] == 0x80 && b[0] & 0x80 == 0 {
        warn!(bytes = ?b, "VAX reserved operand read as 0");
        return 0.0;
    }
    // Swap the 16-bit halves, then remove the exponent bias difference
    f32::from_le_bytes([b[2], b[3], b[0], b[1]]) / 4.0
}

/// Convert an IEEE value to VAX F-floating bytes.
///
/// Fails for non-finite values and magnitudes above [`VAX_MAX`].
#[inline]
pub fn f32_to_vax(v: f32) -> Result<[u8; 4]> {
    if !v.is_finite() || v.abs() > VAX_MAX {
        return Err(Error::encode(format!("{} is out of the VAX float range", v)));
    }
    let v = v * 4.0;
    // No signed zero or denormals in VAX; a negative one is a reserved operand
    if v == 0.0 || v.is_subnormal() {
        return Ok([0; 4]);
    }
    let c = v.to_le_bytes();
    Ok([c[2], c[3], c[0], c[1]])
}

/// Reader over an in-memory byte buffer.
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            cursor: Cursor::new(data),
            order,
        }
    }

    #[inline]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.cursor.position() as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos())
    }

    /// Move to an absolute position.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.len() {
            return Err(Error::UnexpectedEof(pos as u64));
        }
        self.cursor.set_position(pos as u64);
        Ok(())
    }

    fn eof(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof(self.cursor.position())
        } else {
            Error::Io(e)
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|e| self.eof(e))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.cursor.read_i8().map_err(|e| self.eof(e))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let r = match self.order {
            ByteOrder::IeeeBigEndian => self.cursor.read_i16::<BigEndian>(),
            _ => self.cursor.read_i16::<LittleEndian>(),
        };
        r.map_err(|e| self.eof(e))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let r = match self.order {
            ByteOrder::IeeeBigEndian => self.cursor.read_u16::<BigEndian>(),
            _ => self.cursor.read_u16::<LittleEndian>(),
        };
        r.map_err(|e| self.eof(e))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        match self.order {
            ByteOrder::IeeeBigEndian => self.cursor.read_f32::<BigEndian>().map_err(|e| self.eof(e)),
            ByteOrder::VaxLittleEndian => {
                let mut b = [0u8; 4];
                std::io::Read::read_exact(&mut self.cursor, &mut b).map_err(|e| self.eof(e))?;
                Ok(vax_to_f32(b))
            }
            _ => self.cursor.read_f32::<LittleEndian>().map_err(|e| self.eof(e)),
        }
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.pos();
        let end = start + len;
        let data: &'a [u8] = *self.cursor.get_ref();
        if end > data.len() {
            return Err(Error::UnexpectedEof(end as u64));
        }
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }

    /// Read `len` bytes as Latin-1 text.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        Ok(latin1(self.read_bytes(len)?))
    }
}

/// Decode Latin-1 bytes. Every byte maps to one char.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode text as Latin-1, replacing wider chars by `?`.
pub fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
        .collect()
}

/// Writer into an in-memory buffer.
pub struct ByteWriter {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl ByteWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    pub fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            order,
        }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_i16(&mut self, v: i16) {
        let mut b = [0u8; 2];
        match self.order {
            ByteOrder::IeeeBigEndian => BigEndian::write_i16(&mut b, v),
            _ => LittleEndian::write_i16(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        match self.order {
            ByteOrder::IeeeBigEndian => BigEndian::write_u16(&mut b, v),
            _ => LittleEndian::write_u16(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    /// Write a float; DEC files fail on values outside the VAX range.
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        let mut b = [0u8; 4];
        match self.order {
            ByteOrder::IeeeBigEndian => BigEndian::write_f32(&mut b, v),
            ByteOrder::VaxLittleEndian => b = f32_to_vax(v)?,
            _ => LittleEndian::write_f32(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write text as exactly `len` bytes, space padded.
    pub fn write_string(&mut self, text: &str, len: usize) {
        let mut bytes = to_latin1(text);
        bytes.resize(len, b' ');
        self.buf.extend_from_slice(&bytes);
    }

    /// Overwrite one byte at an earlier position.
    pub fn patch_u8(&mut self, pos: usize, v: u8) {
        if let Some(b) = self.buf.get_mut(pos) {
            *b = v;
        }
    }

    /// Overwrite a 16-bit word at an earlier position.
    pub fn patch_u16(&mut self, pos: usize, v: u16) {
        let bytes = match self.order {
            ByteOrder::IeeeBigEndian => v.to_be_bytes(),
            _ => v.to_le_bytes(),
        };
        if pos + 2 <= self.buf.len() {
            self.buf[pos..pos + 2].copy_from_slice(&bytes);
        }
    }

    /// Zero-fill up to the next block boundary.
    pub fn pad_to_block(&mut self) {
        let rem = self.buf.len() % BLOCK_SIZE;
        if rem != 0 {
            self.buf.resize(self.buf.len() + BLOCK_SIZE - rem, 0);
        }
    }

    /// Zero-fill up to an absolute position.
    pub fn pad_to(&mut self, pos: usize) {
        if self.buf.len() < pos {
            self.buf.resize(pos, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ErrorKind;

    #[test]
    fn test_vax_float() {
        for v in [0.0f32, 1.0, -1.0, 0.08333, 1234.5678, -0.001] {
            let back = vax_to_f32(f32_to_vax(v).unwrap());
            assert_eq!(back, v);
        }
        // 1.0 in VAX F-floating is 0x4080 0x0000
        assert_eq!(f32_to_vax(1.0).unwrap(), [0x80, 0x40, 0x00, 0x00]);
    }

    #[test]
    fn test_vax_range() {
        assert!(f32_to_vax(VAX_MAX).is_ok());
        for v in [f32::MAX, -f32::MAX / 2.0, f32::INFINITY, f32::NAN] {
            let err = f32_to_vax(v).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Encode);
        }

        // the IEEE orders have no such limit
        let mut w = ByteWriter::new(ByteOrder::VaxLittleEndian);
        assert!(w.write_f32(f32::MAX).is_err());
        assert_eq!(w.pos(), 0);
        let mut w = ByteWriter::new(ByteOrder::IeeeLittleEndian);
        assert!(w.write_f32(f32::MAX).is_ok());

        // sign bit with a zero exponent is a reserved operand
        assert_eq!(vax_to_f32([0x00, 0x80, 0x12, 0x34]), 0.0);
        assert_eq!(vax_to_f32([0x00, 0x00, 0x00, 0x00]), 0.0);
        assert_eq!(f32_to_vax(-1.0e-39).unwrap(), [0; 4]);
        assert_eq!(f32_to_vax(-0.0).unwrap(), [0; 4]);
    }

    #[test]
    fn test_integer_orders() -> Result<()> {
        let mut w = ByteWriter::new(ByteOrder::IeeeBigEndian);
        w.write_i16(-2);
        w.write_u16(0x1234);
        w.write_f32(1.0)?;
        assert_eq!(w.as_bytes(), &[0xFF, 0xFE, 0x12, 0x34, 0x3F, 0x80, 0x00, 0x00]);
        w.patch_u16(2, 0xABCD);
        assert_eq!(&w.as_bytes()[2..4], &[0xAB, 0xCD]);

        let mut r = ByteReader::new(w.as_bytes(), ByteOrder::IeeeBigEndian);
        assert_eq!(r.read_i16()?, -2);
        assert_eq!(r.read_u16()?, 0xABCD);
        assert_eq!(r.read_f32()?, 1.0);
        assert!(matches!(r.read_u8(), Err(Error::UnexpectedEof(_))));

        let mut w = ByteWriter::new(ByteOrder::VaxLittleEndian);
        w.write_i16(-2);
        assert_eq!(w.as_bytes(), &[0xFE, 0xFF]);
        Ok(())
    }

    #[test]
    fn test_floats_per_order() -> Result<()> {
        for order in [ByteOrder::VaxLittleEndian, ByteOrder::IeeeLittleEndian, ByteOrder::IeeeBigEndian] {
            let mut w = ByteWriter::new(order);
            w.write_f32(-0.08333)?;
            let mut r = ByteReader::new(w.as_bytes(), order);
            assert_eq!(r.read_f32()?, -0.08333);
        }
        Ok(())
    }

    #[test]
    fn test_strings_and_padding() -> Result<()> {
        let mut w = ByteWriter::new(ByteOrder::IeeeLittleEndian);
        w.write_string("RFT1", 6);
        w.write_u16(0);
        w.patch_u16(6, 7);
        w.pad_to_block();
        assert_eq!(w.pos(), BLOCK_SIZE);

        let mut r = ByteReader::new(w.as_bytes(), ByteOrder::IeeeLittleEndian);
        assert_eq!(r.read_string(6)?, "RFT1  ");
        assert_eq!(r.read_u16()?, 7);
        r.seek(BLOCK_SIZE)?;
        assert_eq!(r.remaining(), 0);
        assert!(r.seek(BLOCK_SIZE + 1).is_err());
        Ok(())
    }

    #[test]
    fn test_latin1() {
        assert_eq!(latin1(&[b'A', 0xE9]), "Aé");
        assert_eq!(to_latin1("Aé€"), vec![b'A', 0xE9, b'?']);
    }
}
