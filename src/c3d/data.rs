//! Data section: frames of point samples followed by analog sub-frames.
//!
//! Each point sample is four words (x, y, z, residual/mask). Integer storage
//! multiplies coordinates by the point scale; float storage keeps them as-is.
//! The fourth word packs the residual (low byte, in units of the point scale)
//! and the camera mask (bits 8-14); a negative word marks an invalid sample.
//! A section shorter than the announced frames is a decode error.

use super::format::StorageFormat;
use super::stream::{ByteReader, ByteWriter};
use crate::core::{Analog, Point};
use crate::util::{DVec3, Error, Result};

/// Per-channel analog conversion: `value = (raw - offset) * gen_scale * scale`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalogScaling {
    pub gen_scale: f64,
    pub scales: Vec<f64>,
    pub offsets: Vec<i32>,
    /// Raw integers are unsigned (`ANALOG:FORMAT` = `UNSIGNED`).
    pub unsigned: bool,
}

impl AnalogScaling {
    fn factor(&self, channel: usize) -> f64 {
        self.gen_scale * self.scales.get(channel).copied().unwrap_or(1.0)
    }

    fn offset(&self, channel: usize) -> f64 {
        self.offsets.get(channel).copied().unwrap_or(0) as f64
    }
}

/// Shape and scaling of the data section.
#[derive(Clone, Debug, PartialEq)]
pub struct DataLayout {
    pub frames: usize,
    pub analog_ratio: usize,
    pub storage: StorageFormat,
    /// Point scale magnitude.
    pub point_scale: f64,
    pub analog: AnalogScaling,
}

impl DataLayout {
    /// Bytes of one frame for the given channel counts.
    pub fn frame_size(&self, points: usize, analogs: usize) -> usize {
        let word = self.storage.word_size();
        (points * 4 + analogs * self.analog_ratio) * word
    }

    /// Bytes of the whole section, `None` if it does not fit a `usize`.
    pub fn section_size(&self, points: usize, analogs: usize) -> Option<usize> {
        self.frames.checked_mul(self.frame_size(points, analogs))
    }
}

fn decode_residual(word: i32, scale: f64) -> (f64, u8) {
    if word < 0 {
        (-1.0, 0)
    } else {
        ((word & 0xFF) as f64 * scale, ((word >> 8) & 0x7F) as u8)
    }
}

fn encode_residual(residual: f64, mask: u8, scale: f64) -> i16 {
    if residual < 0.0 {
        return -1;
    }
    let byte = if scale > 0.0 {
        (residual / scale).round().clamp(0.0, 255.0) as i16
    } else {
        0
    };
    (((mask & 0x7F) as i16) << 8) | byte
}

fn read_word(r: &mut ByteReader<'_>, storage: StorageFormat) -> Result<f64> {
    match storage {
        StorageFormat::Float => Ok(r.read_f32()? as f64),
        _ => Ok(r.read_i16()? as f64),
    }
}

/// Decode `layout.frames` frames into pre-sized points and analog channels.
///
/// Fails with [`Error::UnexpectedEof`] before touching the records when the
/// reader holds fewer bytes than the frames need.
pub fn read_data(
    r: &mut ByteReader<'_>,
    layout: &DataLayout,
    points: &mut [Point],
    analogs: &mut [Analog],
) -> Result<()> {
    let needed = layout
        .section_size(points.len(), analogs.len())
        .ok_or_else(|| Error::decode(format!("{} frames overflow the data section", layout.frames)))?;
    if r.remaining() < needed {
        return Err(Error::UnexpectedEof((r.pos() + r.remaining()) as u64));
    }
    for frame in 0..layout.frames {
        read_frame(r, layout, frame, points, analogs)?;
    }
    Ok(())
}

fn read_frame(
    r: &mut ByteReader<'_>,
    layout: &DataLayout,
    frame: usize,
    points: &mut [Point],
    analogs: &mut [Analog],
) -> Result<()> {
    let scale = layout.point_scale;
    for p in points.iter_mut() {
        let x = read_word(r, layout.storage)?;
        let y = read_word(r, layout.storage)?;
        let z = read_word(r, layout.storage)?;
        let w = read_word(r, layout.storage)?;
        let coords = match layout.storage {
            StorageFormat::Float => DVec3::new(x, y, z),
            _ => DVec3::new(x, y, z) * scale,
        };
        let (residual, mask) = decode_residual(w as i32, scale);
        p.set_frame(frame, coords, residual, mask);
    }
    let ratio = layout.analog_ratio;
    for sub in 0..ratio {
        let index = frame * ratio + sub;
        for (c, a) in analogs.iter_mut().enumerate() {
            let raw = match layout.storage {
                StorageFormat::Float => r.read_f32()? as f64,
                _ if layout.analog.unsigned => r.read_u16()? as f64,
                _ => r.read_i16()? as f64,
            };
            let value = (raw - layout.analog.offset(c)) * layout.analog.factor(c);
            if let Some(v) = a.values_mut().get_mut(index) {
                *v = value;
            }
        }
    }
    Ok(())
}

/// Encode every frame of the given points and analog channels.
pub fn write_data(
    w: &mut ByteWriter,
    layout: &DataLayout,
    points: &[Point],
    analogs: &[Analog],
) -> Result<()> {
    let scale = layout.point_scale;
    let integer = layout.storage != StorageFormat::Float;
    if integer && scale <= 0.0 && !points.is_empty() {
        return Err(Error::encode(format!("invalid point scale {}", scale)));
    }
    for frame in 0..layout.frames {
        for p in points {
            let v = p.values().get(frame).copied().unwrap_or(DVec3::ZERO);
            let residual = p.residuals().get(frame).copied().unwrap_or(-1.0);
            let mask = p.masks().get(frame).copied().unwrap_or(0);
            let word = encode_residual(residual, mask, scale);
            if integer {
                for c in v.to_array() {
                    w.write_i16(scaled_i16(c / scale, p.label(), frame)?);
                }
                w.write_i16(word);
            } else {
                for c in v.to_array() {
                    w.write_f32(c as f32)?;
                }
                w.write_f32(word as f32)?;
            }
        }
        let ratio = layout.analog_ratio;
        for sub in 0..ratio {
            let index = frame * ratio + sub;
            for (c, a) in analogs.iter().enumerate() {
                let value = a.values().get(index).copied().unwrap_or(0.0);
                let factor = layout.analog.factor(c);
                if factor == 0.0 {
                    return Err(Error::encode(format!("analog channel '{}' has a zero scale", a.label())));
                }
                let raw = value / factor + layout.analog.offset(c);
                if !integer {
                    w.write_f32(raw as f32)?;
                } else if layout.analog.unsigned {
                    let raw = raw.round();
                    if !(0.0..=u16::MAX as f64).contains(&raw) {
                        return Err(out_of_range(a.label(), index, value));
                    }
                    w.write_u16(raw as u16);
                } else {
                    w.write_i16(scaled_i16(raw, a.label(), index)?);
                }
            }
        }
    }
    Ok(())
}

fn scaled_i16(raw: f64, label: &str, frame: usize) -> Result<i16> {
    let raw = raw.round();
    if !(i16::MIN as f64..=i16::MAX as f64).contains(&raw) {
        return Err(out_of_range(label, frame, raw));
    }
    Ok(raw as i16)
}

fn out_of_range(label: &str, frame: usize, value: f64) -> Error {
    Error::encode(format!(
        "'{}' sample {} ({}) does not fit a 16-bit integer with the current scale",
        label, frame, value
    ))
}
