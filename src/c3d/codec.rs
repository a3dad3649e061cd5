//! The C3D codec: one complete read or write pass per call.

use std::any::Any;
use std::io::Write;

use tracing::{debug, warn};

use super::data::{AnalogScaling, DataLayout, read_data, write_data};
use super::format::*;
use super::header::{Header, probe};
use super::parameters::{read_parameters, write_parameters};
use super::regenerate::{EncodeSettings, list_f64, list_i32, list_strings, list_u16, prepare};
use super::stream::{ByteReader, ByteWriter};
use crate::core::{Acquisition, Analog, Event, Gain, MetaData, Point, PointType, TypedValue};
use crate::io::FormatCodec;
use crate::util::{Error, Result};

/// Reads and writes C3D files.
///
/// Reading stores the detected byte order, storage format, point scale and
/// analog integer format in the codec; writing uses the configured ones.
#[derive(Clone, Debug, PartialEq)]
pub struct C3dCodec {
    byte_order: ByteOrder,
    storage: StorageFormat,
    flags: WriteFlags,
    point_scale: f64,
    analog_format: AnalogIntegerFormat,
}

impl Default for C3dCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame range and sizes decoded from the header and the parameters.
struct Shape {
    first_frame: u32,
    frames: usize,
    points: usize,
    analogs: usize,
    ratio: u32,
    frequency: f64,
    scale: f32,
    data_start: usize,
}

/// `[low, high]` half-words of `TRIAL:ACTUAL_*_FIELD`.
fn joined_frame(md: &MetaData, parameter: &str) -> Option<u32> {
    let halves = md.value("TRIAL", parameter)?.to_u16();
    match halves.as_slice() {
        [lo, hi, ..] => Some(((*hi as u32) << 16) | *lo as u32),
        _ => None,
    }
}

fn scalar_u16(md: &MetaData, group: &str, parameter: &str) -> Option<u16> {
    md.value(group, parameter).and_then(|v| v.u16_at(0))
}

fn scalar_f64(md: &MetaData, group: &str, parameter: &str) -> Option<f64> {
    md.value(group, parameter).and_then(|v| v.f64_at(0))
}

fn scalar_string(md: &MetaData, group: &str, parameter: &str) -> Option<String> {
    md.value(group, parameter)
        .and_then(|v| v.string_at(0))
        .map(|s| s.trim().to_string())
}

fn shape(header: &Header, md: &MetaData) -> Shape {
    let mut first = header.first_frame as u32;
    let mut last = header.last_frame as u32;
    if let (Some(start), Some(end)) = (
        joined_frame(md, "ACTUAL_START_FIELD"),
        joined_frame(md, "ACTUAL_END_FIELD"),
    ) {
        if start > 0 && end >= start {
            first = start;
            last = end;
        }
    }
    let frames = if last >= first {
        (last - first) as usize + 1
    } else {
        0
    };

    let points = scalar_u16(md, "POINT", "USED").unwrap_or(header.point_count) as usize;
    let mut ratio = header.analog_ratio as u32;
    let analogs = match scalar_u16(md, "ANALOG", "USED") {
        Some(n) => n as usize,
        None if ratio > 0 => (header.analog_total as u32 / ratio) as usize,
        None => 0,
    };
    if ratio == 0 && analogs > 0 {
        ratio = (header.analog_total as usize / analogs) as u32;
    }

    let mut frequency = header.frame_rate as f64;
    if frequency == 0.0 {
        frequency = scalar_f64(md, "POINT", "RATE").unwrap_or(0.0);
    }
    let mut scale = header.scale;
    if scale == 0.0 {
        scale = scalar_f64(md, "POINT", "SCALE").unwrap_or(0.0) as f32;
    }
    let block = match header.data_start {
        0 => scalar_u16(md, "POINT", "DATA_START").unwrap_or(0),
        b => b,
    };

    Shape {
        first_frame: first.max(1),
        frames,
        points,
        analogs,
        ratio,
        frequency,
        scale,
        data_start: block_offset(block as usize),
    }
}

/// Pad or cut a decoded list to `n` items.
fn fitted<T: Clone>(mut items: Vec<T>, n: usize, fill: T) -> Vec<T> {
    items.resize(n, fill);
    items
}

fn decode_points(md: &MetaData, n: usize, frames: usize) -> Vec<Point> {
    let labels = list_strings(md, "POINT", "LABELS");
    let descriptions = list_strings(md, "POINT", "DESCRIPTIONS");
    if labels.len() < n {
        warn!(labels = labels.len(), points = n, "missing point labels");
    }
    let mut points: Vec<Point> = (0..n)
        .map(|i| {
            let label = match labels.get(i) {
                Some(l) if !l.is_empty() => l.clone(),
                _ => format!("uname*{}", i + 1),
            };
            let mut p = Point::new(label, frames);
            if let Some(d) = descriptions.get(i) {
                p.set_description(d.as_str());
            }
            p
        })
        .collect();
    for kind in PointType::ALL {
        let Some(param) = kind.labels_parameter() else { continue };
        for label in list_strings(md, "POINT", param) {
            if let Some(p) = points.iter_mut().find(|p| p.label() == label) {
                p.set_kind(kind);
            }
        }
    }
    points
}

fn decode_analogs(md: &MetaData, n: usize, samples: usize, scaling: &AnalogScaling) -> Vec<Analog> {
    let labels = list_strings(md, "ANALOG", "LABELS");
    let descriptions = list_strings(md, "ANALOG", "DESCRIPTIONS");
    let units = list_strings(md, "ANALOG", "UNITS");
    let gains = list_i32(md, "ANALOG", "GAIN");
    (0..n)
        .map(|i| {
            let label = match labels.get(i) {
                Some(l) if !l.is_empty() => l.clone(),
                _ => format!("uname*{}", i + 1),
            };
            let mut a = Analog::new(label, samples);
            if let Some(d) = descriptions.get(i) {
                a.set_description(d.as_str());
            }
            if let Some(u) = units.get(i) {
                a.set_unit(u.as_str());
            }
            if let Some(&g) = gains.get(i) {
                a.set_gain(Gain::from_code(g as i16));
            }
            a.set_scale(scaling.scales[i]);
            a.set_offset(scaling.offsets[i]);
            a
        })
        .collect()
}

fn decode_events(md: &MetaData, header: &Header, frequency: f64) -> Vec<Event> {
    let frame_of = |time: f64| (time * frequency).round() as i32 + 1;
    let used = scalar_u16(md, "EVENT", "USED").unwrap_or(0) as usize;
    if used == 0 {
        return header
            .events
            .iter()
            .map(|h| {
                let mut e = Event::new(h.label.as_str(), h.time as f64);
                e.set_frame(frame_of(h.time as f64));
                e
            })
            .collect();
    }
    let labels = fitted(list_strings(md, "EVENT", "LABELS"), used, String::new());
    let descriptions = list_strings(md, "EVENT", "DESCRIPTIONS");
    let contexts = list_strings(md, "EVENT", "CONTEXTS");
    let subjects = list_strings(md, "EVENT", "SUBJECTS");
    let times = list_f64(md, "EVENT", "TIMES");
    let icons = list_i32(md, "EVENT", "ICON_IDS");
    let generic = list_i32(md, "EVENT", "GENERIC_FLAGS");
    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let minutes = times.get(2 * i).copied().unwrap_or(0.0);
            let seconds = times.get(2 * i + 1).copied().unwrap_or(0.0);
            let time = minutes * 60.0 + seconds;
            let mut e = Event::new(label, time);
            e.set_frame(frame_of(time));
            if let Some(d) = descriptions.get(i) {
                e.set_description(d.as_str());
            }
            if let Some(c) = contexts.get(i) {
                e.set_context(c.as_str());
            }
            if let Some(s) = subjects.get(i) {
                e.set_subject(s.as_str());
            }
            e.set_icon_id(icons.get(i).copied().unwrap_or(0) as i16);
            e.set_generic(generic.get(i).copied().unwrap_or(0) != 0);
            e
        })
        .collect()
}

impl C3dCodec {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrder::IeeeLittleEndian,
            storage: StorageFormat::Integer,
            flags: WriteFlags::default(),
            point_scale: DEFAULT_POINT_SCALE,
            analog_format: AnalogIntegerFormat::Signed,
        }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = order;
    }

    #[inline]
    pub fn storage_format(&self) -> StorageFormat {
        self.storage
    }

    pub fn set_storage_format(&mut self, storage: StorageFormat) {
        self.storage = storage;
    }

    #[inline]
    pub fn write_flags(&self) -> WriteFlags {
        self.flags
    }

    pub fn set_write_flags(&mut self, flags: WriteFlags) {
        self.flags = flags;
    }

    pub fn has_write_flag(&self, flag: WriteFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Point scale magnitude.
    #[inline]
    pub fn point_scale(&self) -> f64 {
        self.point_scale
    }

    pub fn set_point_scale(&mut self, scale: f64) {
        self.point_scale = scale.abs();
    }

    #[inline]
    pub fn analog_integer_format(&self) -> AnalogIntegerFormat {
        self.analog_format
    }

    pub fn set_analog_integer_format(&mut self, format: AnalogIntegerFormat) {
        self.analog_format = format;
    }

    /// Decode a complete file.
    ///
    /// The codec configuration is updated only if decoding succeeds.
    #[tracing::instrument(skip_all, fields(len = data.len()))]
    pub fn read(&mut self, data: &[u8]) -> Result<Acquisition> {
        let (block, order) = probe(data)?;
        let header = Header::read(data, order)?;
        let md = read_parameters(data, block_offset(block as usize), order)?;
        let shape = shape(&header, &md);
        let storage = StorageFormat::from_scale(shape.scale);
        let analog_format = scalar_string(&md, "ANALOG", "FORMAT")
            .map(|s| AnalogIntegerFormat::from_keyword(&s))
            .unwrap_or_default();
        debug!(
            %order,
            %storage,
            points = shape.points,
            analogs = shape.analogs,
            frames = shape.frames,
            ratio = shape.ratio,
            "decoding data section"
        );

        let unsigned = analog_format == AnalogIntegerFormat::Unsigned;
        let offsets = if unsigned {
            list_u16(&md, "ANALOG", "OFFSET").into_iter().map(i32::from).collect()
        } else {
            list_i32(&md, "ANALOG", "OFFSET")
        };
        let scales: Vec<f64> = list_f64(&md, "ANALOG", "SCALE");
        let scaling = AnalogScaling {
            gen_scale: scalar_f64(&md, "ANALOG", "GEN_SCALE")
                .filter(|&g| g != 0.0)
                .unwrap_or(1.0),
            scales: fitted(scales, shape.analogs, 1.0),
            offsets: fitted(offsets, shape.analogs, 0),
            unsigned,
        };
        let layout = DataLayout {
            frames: shape.frames,
            analog_ratio: shape.ratio as usize,
            storage,
            point_scale: shape.scale.abs() as f64,
            analog: scaling,
        };

        // Sizes come from the file; check them against its length before allocating
        let needed = layout
            .section_size(shape.points, shape.analogs)
            .ok_or_else(|| Error::decode(format!("{} frames overflow the data section", shape.frames)))?;
        if needed > 0 && data.len().saturating_sub(shape.data_start) < needed {
            return Err(Error::UnexpectedEof(shape.data_start.saturating_add(needed) as u64));
        }

        let mut points = decode_points(&md, shape.points, shape.frames);
        let mut analogs = decode_analogs(&md, shape.analogs, shape.frames * shape.ratio as usize, &layout.analog);
        if needed > 0 {
            let mut r = ByteReader::new(data, order);
            r.seek(shape.data_start)?;
            read_data(&mut r, &layout, &mut points, &mut analogs)?;
        }

        let mut acq = Acquisition::new();
        acq.init(0, shape.frames, 0, shape.ratio);
        acq.set_first_frame(shape.first_frame);
        acq.set_point_frequency(shape.frequency);
        acq.set_max_interpolation_gap(header.max_gap);
        if let Some(unit) = scalar_string(&md, "POINT", "UNITS") {
            acq.set_point_unit(PointType::Marker, unit);
        }
        for kind in PointType::ALL {
            if kind == PointType::Marker {
                continue;
            }
            if let Some(unit) = kind.units_parameter().and_then(|p| scalar_string(&md, "POINT", p)) {
                acq.set_point_unit(kind, unit);
            }
        }
        points.into_iter().for_each(|p| acq.append_point(p));
        analogs.into_iter().for_each(|a| acq.append_analog(a));
        decode_events(&md, &header, shape.frequency)
            .into_iter()
            .for_each(|e| acq.append_event(e));
        *acq.metadata_mut() = md;

        self.byte_order = order;
        self.storage = storage;
        self.point_scale = shape.scale.abs() as f64;
        self.analog_format = analog_format;
        Ok(acq)
    }

    /// Encode `acq` with the configured byte order, storage and flags.
    ///
    /// The file is assembled in memory first, so an encoding error leaves
    /// `out` untouched.
    #[tracing::instrument(skip_all, fields(order = %self.byte_order, storage = %self.storage))]
    pub fn write(&mut self, out: &mut dyn Write, acq: &Acquisition) -> Result<()> {
        if self.byte_order == ByteOrder::NotApplicable {
            return Err(Error::config("byte order is not set"));
        }
        if self.storage == StorageFormat::NotApplicable {
            return Err(Error::config("storage format is not set"));
        }
        let settings = EncodeSettings {
            storage: self.storage,
            flags: self.flags,
            point_scale: self.point_scale,
            analog_format: self.analog_format,
        };
        let mut prepared = prepare(acq, &settings)?;

        // DATA_START depends on the size of the section it is stored in.
        let params = write_parameters(&prepared.metadata, self.byte_order)?;
        let data_start = PARAMETER_BLOCK as usize + params.len() / BLOCK_SIZE;
        prepared
            .metadata
            .set_value("POINT", "DATA_START", TypedValue::from(data_start as i16))?;
        let params = write_parameters(&prepared.metadata, self.byte_order)?;
        prepared.header.data_start = data_start as u16;

        let layout = &prepared.layout;
        let data_size = layout.frames * layout.frame_size(acq.point_number(), acq.analog_number());
        let mut w = ByteWriter::with_capacity(self.byte_order, BLOCK_SIZE + params.len() + data_size + BLOCK_SIZE);
        prepared.header.write(&mut w)?;
        w.write_bytes(&params);
        write_data(&mut w, layout, acq.points(), acq.analogs())?;
        w.pad_to_block();
        debug!(bytes = w.pos(), data_start, "encoded");

        out.write_all(w.as_bytes())?;
        self.point_scale = layout.point_scale;
        Ok(())
    }
}

impl FormatCodec for C3dCodec {
    fn name(&self) -> &'static str {
        "C3D"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["c3d"]
    }

    fn can_read(&self, data: &[u8]) -> bool {
        probe(data).is_ok()
    }

    fn read(&mut self, data: &[u8]) -> Result<Acquisition> {
        C3dCodec::read(self, data)
    }

    fn write(&mut self, out: &mut dyn Write, acq: &Acquisition) -> Result<()> {
        C3dCodec::write(self, out, acq)
    }

    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn storage_format(&self) -> StorageFormat {
        self.storage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{DVec3, ErrorKind};

    fn sample() -> Acquisition {
        let mut acq = Acquisition::new();
        acq.init(2, 4, 1, 2);
        acq.set_point_frequency(50.0);
        for f in 0..4 {
            let v = DVec3::new(f as f64 * 10.5, -200.2, 1000.0 + f as f64);
            acq.point_mut(0).unwrap().set_frame(f, v, 0.5, 0x11);
        }
        acq.point_mut(1).unwrap().set_label("RKneeAngles");
        acq.point_mut(1).unwrap().set_kind(PointType::Angle);
        let a = acq.analog_mut(0).unwrap();
        a.set_label("FZ1");
        a.set_unit("N");
        a.set_gain(Gain::PlusMinus5);
        a.set_scale(0.5);
        a.values_mut().copy_from_slice(&[0.0, 1.0, -2.5, 3.0, 4.5, -5.0, 6.0, 7.5]);
        acq.append_event(Event::new("RHS", 0.04));
        acq
    }

    fn roundtrip(codec: &mut C3dCodec, acq: &Acquisition) -> Result<Acquisition> {
        let mut bytes = Vec::new();
        codec.write(&mut bytes, acq)?;
        assert_eq!(bytes.len() % BLOCK_SIZE, 0);
        C3dCodec::new().read(&bytes)
    }

    #[test]
    fn test_defaults() {
        let c = C3dCodec::new();
        assert_eq!(c.byte_order(), ByteOrder::IeeeLittleEndian);
        assert_eq!(c.storage_format(), StorageFormat::Integer);
        assert_eq!(c.point_scale(), 0.1);
        assert!(c.has_write_flag(WriteFlags::SCALES_FROM_DATA));
        assert!(c.has_write_flag(WriteFlags::METADATA_FROM_DATA));
    }

    #[test]
    fn test_roundtrip_orders_and_storage() -> Result<()> {
        let acq = sample();
        for order in [ByteOrder::VaxLittleEndian, ByteOrder::IeeeLittleEndian, ByteOrder::IeeeBigEndian] {
            for storage in [StorageFormat::Integer, StorageFormat::Float] {
                let mut codec = C3dCodec::new();
                codec.set_byte_order(order);
                codec.set_storage_format(storage);
                let mut bytes = Vec::new();
                codec.write(&mut bytes, &acq)?;

                let mut reader = C3dCodec::new();
                let back = reader.read(&bytes)?;
                assert_eq!(reader.byte_order(), order);
                assert_eq!(reader.storage_format(), storage);
                assert_eq!(back.point_number(), 2);
                assert_eq!(back.point_frame_number(), 4);
                assert_eq!(back.analog_frame_number(), 8);
                assert_eq!(back.point_frequency(), 50.0);
                assert_eq!(back.analog_frequency(), 100.0);
                assert_eq!(back.point(1).unwrap().kind(), PointType::Angle);

                let tol = if storage == StorageFormat::Integer { 0.051 } else { 1e-4 };
                for (x, y) in back.point(0).unwrap().values().iter().zip(acq.point(0).unwrap().values()) {
                    assert!((*x - *y).abs().max_element() <= tol);
                }
                let a = back.analog(0).unwrap();
                assert_eq!(a.label(), "FZ1");
                assert_eq!(a.unit(), "N");
                assert_eq!(a.gain(), Gain::PlusMinus5);
                for (x, y) in a.values().iter().zip(acq.analog(0).unwrap().values()) {
                    assert!((x - y).abs() <= 0.5);
                }
                assert_eq!(back.event_number(), 1);
                assert_eq!(back.event(0).unwrap().label(), "RHS");
                assert_eq!(back.event(0).unwrap().frame(), 3);
            }
        }
        Ok(())
    }

    #[test]
    fn test_not_applicable_is_configuration_error() {
        let mut codec = C3dCodec::new();
        codec.set_byte_order(ByteOrder::NotApplicable);
        let mut out = Vec::new();
        let err = codec.write(&mut out, &sample()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(out.is_empty());

        let mut codec = C3dCodec::new();
        codec.set_storage_format(StorageFormat::NotApplicable);
        assert!(matches!(codec.write(&mut out, &sample()), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_out_of_range_without_scale_regeneration() {
        let mut acq = sample();
        acq.point_mut(0)
            .unwrap()
            .set_frame(0, DVec3::new(9000.0, 0.0, 0.0), 0.0, 0);
        let mut codec = C3dCodec::new();
        codec.set_write_flags(WriteFlags::NONE);
        let mut out = Vec::new();
        assert!(matches!(codec.write(&mut out, &acq), Err(Error::Encode(_))));
        assert!(out.is_empty());

        codec.set_write_flags(WriteFlags::default());
        assert!(codec.write(&mut out, &acq).is_ok());
        assert!(codec.point_scale() > 0.1);
    }

    #[test]
    fn test_data_start_matches_parameter_size() -> Result<()> {
        let mut acq = sample();
        for i in 0..300 {
            acq.append_point(Point::new(format!("MARKER_{:03}", i), 0));
        }
        let mut bytes = Vec::new();
        C3dCodec::new().write(&mut bytes, &acq)?;
        let header = Header::read(&bytes, ByteOrder::IeeeLittleEndian)?;
        let md = read_parameters(&bytes, BLOCK_SIZE, ByteOrder::IeeeLittleEndian)?;
        let blocks = bytes[BLOCK_SIZE + 2] as u16;
        assert_eq!(header.data_start, 2 + blocks);
        assert_eq!(md.value("POINT", "DATA_START").unwrap().u16_at(0), Some(header.data_start));
        assert!(md.value("POINT", "LABELS2").is_some());

        let back = roundtrip(&mut C3dCodec::new(), &acq)?;
        assert_eq!(back.point_number(), 302);
        assert_eq!(back.point(301).unwrap().label(), "MARKER_299");
        Ok(())
    }

    #[test]
    fn test_truncated_data_section() -> Result<()> {
        let mut acq = sample();
        acq.init(2, 100, 1, 2);
        let mut bytes = Vec::new();
        C3dCodec::new().write(&mut bytes, &acq)?;
        let header = Header::read(&bytes, ByteOrder::IeeeLittleEndian)?;
        let cut = block_offset(header.data_start as usize) + 40;

        let mut codec = C3dCodec::new();
        codec.set_byte_order(ByteOrder::VaxLittleEndian);
        let err = codec.read(&bytes[..cut]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(codec.byte_order(), ByteOrder::VaxLittleEndian);
        assert!(codec.read(&bytes).is_ok());
        Ok(())
    }

    #[test]
    fn test_announced_size_beyond_file() -> Result<()> {
        let order = ByteOrder::IeeeLittleEndian;
        let mut md = MetaData::new();
        // 65535 points over about 2^31 frames, with no data behind them
        md.set_value("POINT", "USED", TypedValue::from(-1i16))?;
        md.set_value("TRIAL", "ACTUAL_START_FIELD", TypedValue::from_vec(vec![1i16, 0]))?;
        md.set_value("TRIAL", "ACTUAL_END_FIELD", TypedValue::from_vec(vec![-1i16, 0x7fff]))?;
        let params = write_parameters(&md, order)?;
        let header = Header {
            point_count: u16::MAX,
            last_frame: u16::MAX,
            scale: -1.0,
            data_start: (PARAMETER_BLOCK as usize + params.len() / BLOCK_SIZE) as u16,
            frame_rate: 100.0,
            ..Default::default()
        };
        let mut w = ByteWriter::new(order);
        header.write(&mut w)?;
        w.write_bytes(&params);

        let err = C3dCodec::new().read(w.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(_)));
        Ok(())
    }

    #[test]
    fn test_vax_float_overflow() {
        let mut acq = sample();
        acq.point_mut(0)
            .unwrap()
            .set_frame(2, DVec3::new(1.0e38, 0.0, 0.0), 0.0, 0);
        let mut codec = C3dCodec::new();
        codec.set_storage_format(StorageFormat::Float);
        let mut out = Vec::new();
        assert!(codec.write(&mut out, &acq).is_ok());

        codec.set_byte_order(ByteOrder::VaxLittleEndian);
        let mut out = Vec::new();
        let err = codec.write(&mut out, &acq).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        assert!(out.is_empty());
    }

    #[test]
    fn test_read_rejects_garbage() {
        let mut codec = C3dCodec::new();
        codec.set_byte_order(ByteOrder::IeeeBigEndian);
        assert!(codec.read(&[0u8; 1024]).is_err());
        // configuration untouched by the failed read
        assert_eq!(codec.byte_order(), ByteOrder::IeeeBigEndian);
        assert!(!FormatCodec::can_read(&codec, b"not a c3d file"));
    }
}
