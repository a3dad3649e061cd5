//! The fixed 512-byte header block.

use super::format::*;
use super::stream::{ByteReader, ByteWriter};
use crate::util::{Error, Result};

/// Event stored directly in the header (at most 18, 4-character labels).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeaderEvent {
    pub label: String,
    pub time: f32,
    pub displayed: bool,
}

/// Decoded header fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub parameter_block: u8,
    pub point_count: u16,
    /// Analog channels times samples per frame.
    pub analog_total: u16,
    pub first_frame: u16,
    pub last_frame: u16,
    pub max_gap: u16,
    /// Signed point scale (negative for float storage).
    pub scale: f32,
    pub data_start: u16,
    pub analog_ratio: u16,
    pub frame_rate: f32,
    pub events: Vec<HeaderEvent>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parameter_block: PARAMETER_BLOCK,
            point_count: 0,
            analog_total: 0,
            first_frame: 1,
            last_frame: 0,
            max_gap: 0,
            scale: 0.1,
            data_start: 0,
            analog_ratio: 0,
            frame_rate: 0.0,
            events: Vec::new(),
        }
    }
}

/// Parameter block number and the processor byte, read before the byte
/// order is known.
pub fn probe(data: &[u8]) -> Result<(u8, ByteOrder)> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    if data[HDR_KEY] != PARAMETER_KEY {
        return Err(Error::decode(format!(
            "invalid header key 0x{:02x}, expected 0x{:02x}",
            data[HDR_KEY], PARAMETER_KEY
        )));
    }
    let block = data[HDR_PARAMETER_BLOCK];
    if block == 0 {
        return Err(Error::decode("parameter section block is 0"));
    }
    let start = block_offset(block as usize);
    let processor = *data
        .get(start + 3)
        .ok_or(Error::UnexpectedEof(start as u64 + 3))?;
    let order = ByteOrder::from_processor(processor)
        .ok_or_else(|| Error::decode(format!("unknown processor type {}", processor)))?;
    Ok((block, order))
}

impl Header {
    /// Parse the header with the byte order of the parameter section.
    pub fn read(data: &[u8], order: ByteOrder) -> Result<Self> {
        let mut r = ByteReader::new(data, order);
        let mut h = Header {
            parameter_block: r.read_u8()?,
            ..Default::default()
        };
        let mut word = |offset: usize| -> Result<u16> {
            r.seek(offset)?;
            r.read_u16()
        };
        h.point_count = word(HDR_POINT_COUNT)?;
        h.analog_total = word(HDR_ANALOG_TOTAL)?;
        h.first_frame = word(HDR_FIRST_FRAME)?;
        h.last_frame = word(HDR_LAST_FRAME)?;
        h.max_gap = word(HDR_MAX_GAP)?;
        h.data_start = word(HDR_DATA_START)?;
        h.analog_ratio = word(HDR_ANALOG_RATIO)?;
        r.seek(HDR_SCALE)?;
        h.scale = r.read_f32()?;
        r.seek(HDR_FRAME_RATE)?;
        h.frame_rate = r.read_f32()?;

        r.seek(HDR_EVENT_KEY)?;
        let key = r.read_i16()?;
        r.seek(HDR_EVENT_COUNT)?;
        let count = r.read_i16()?;
        if key == LABEL_KEY && count > 0 {
            let count = (count as usize).min(HEADER_EVENTS);
            r.seek(HDR_EVENT_TIMES)?;
            let mut times = Vec::with_capacity(count);
            for _ in 0..HEADER_EVENTS {
                times.push(r.read_f32()?);
            }
            r.seek(HDR_EVENT_FLAGS)?;
            let flags = r.read_bytes(HEADER_EVENTS)?.to_vec();
            r.seek(HDR_EVENT_LABELS)?;
            for i in 0..count {
                let label = r.read_string(4)?;
                h.events.push(HeaderEvent {
                    label: label.trim_end_matches([' ', '\0']).to_string(),
                    time: times[i],
                    displayed: flags[i] == 0,
                });
            }
        }
        Ok(h)
    }

    /// Write the 512-byte header.
    pub fn write(&self, w: &mut ByteWriter) -> Result<()> {
        let base = w.pos();
        w.write_u8(self.parameter_block);
        w.write_u8(PARAMETER_KEY);
        w.write_u16(self.point_count);
        w.write_u16(self.analog_total);
        w.write_u16(self.first_frame);
        w.write_u16(self.last_frame);
        w.write_u16(self.max_gap);
        w.write_f32(self.scale)?;
        w.write_u16(self.data_start);
        w.write_u16(self.analog_ratio);
        w.write_f32(self.frame_rate)?;

        w.pad_to(base + HDR_EVENT_KEY);
        w.write_i16(LABEL_KEY);
        let events = &self.events[..self.events.len().min(HEADER_EVENTS)];
        w.write_i16(events.len() as i16);
        w.pad_to(base + HDR_EVENT_TIMES);
        for i in 0..HEADER_EVENTS {
            w.write_f32(events.get(i).map(|e| e.time).unwrap_or(0.0))?;
        }
        for i in 0..HEADER_EVENTS {
            // 0 means displayed
            w.write_u8(events.get(i).map(|e| u8::from(!e.displayed)).unwrap_or(0));
        }
        w.pad_to(base + HDR_EVENT_LABELS);
        for i in 0..HEADER_EVENTS {
            w.write_string(events.get(i).map(|e| e.label.as_str()).unwrap_or(""), 4);
        }
        w.pad_to(base + BLOCK_SIZE);
        Ok(())
    }
}
