//! Output metadata, header and data layout for an acquisition about to be
//! written.
//!
//! The acquisition's own metadata is the starting point. Entries the data
//! section depends on (counts, frames, scales, data start) are always
//! refreshed; labels, units, rates and events are rebuilt only with
//! [`WriteFlags::METADATA_FROM_DATA`] or when their count no longer matches.

use tracing::{debug, warn};

use super::data::{AnalogScaling, DataLayout};
use super::format::*;
use super::header::{Header, HeaderEvent};
use crate::core::{Acquisition, Analog, Format, MetaData, PointType, TypedValue, Values};
use crate::util::{Error, Result, max_abs_component};

/// Everything the encoder needs besides the byte order.
#[derive(Debug)]
pub struct Prepared {
    pub metadata: MetaData,
    pub header: Header,
    pub layout: DataLayout,
}

/// Codec settings consumed by [`prepare`].
#[derive(Clone, Copy, Debug)]
pub struct EncodeSettings {
    pub storage: StorageFormat,
    pub flags: WriteFlags,
    /// Current point scale magnitude of the codec.
    pub point_scale: f64,
    pub analog_format: AnalogIntegerFormat,
}

// === Parameter lists ===

/// Name of the `index`-th parameter of a list: `LABELS`, `LABELS2`, ...
fn list_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, index + 1)
    }
}

/// Every parameter of a list split over `BASE`, `BASE2`, `BASE3`, ...
pub(crate) fn list_parts<'a>(md: &'a MetaData, group: &str, base: &str) -> Vec<&'a TypedValue> {
    let mut parts = Vec::new();
    while let Some(v) = md.value(group, &list_name(base, parts.len())) {
        parts.push(v);
    }
    parts
}

pub(crate) fn list_strings(md: &MetaData, group: &str, base: &str) -> Vec<String> {
    list_parts(md, group, base)
        .into_iter()
        .flat_map(TypedValue::to_trimmed_strings)
        .collect()
}

pub(crate) fn list_f64(md: &MetaData, group: &str, base: &str) -> Vec<f64> {
    list_parts(md, group, base)
        .into_iter()
        .flat_map(TypedValue::to_f64)
        .collect()
}

pub(crate) fn list_i32(md: &MetaData, group: &str, base: &str) -> Vec<i32> {
    list_parts(md, group, base)
        .into_iter()
        .flat_map(TypedValue::to_i32)
        .collect()
}

pub(crate) fn list_u16(md: &MetaData, group: &str, base: &str) -> Vec<u16> {
    list_parts(md, group, base)
        .into_iter()
        .flat_map(TypedValue::to_u16)
        .collect()
}

/// Store a list, continuing in `BASE2`, ... every [`MAX_LIST_LEN`] items and
/// removing continuations left over from a longer list.
pub(crate) fn set_list<T: Clone>(md: &mut MetaData, group: &str, base: &str, items: &[T]) -> Result<()>
where
    Vec<T>: Into<Values>,
{
    let chunks: Vec<&[T]> = if items.is_empty() {
        vec![&items[..0]]
    } else {
        items.chunks(MAX_LIST_LEN).collect()
    };
    for (i, chunk) in chunks.iter().enumerate() {
        md.set_value(group, &list_name(base, i), TypedValue::from_vec(chunk.to_vec()))?;
    }
    let mut i = chunks.len();
    while md.remove(group, &list_name(base, i)) {
        i += 1;
    }
    Ok(())
}

fn remove_list(md: &mut MetaData, group: &str, base: &str) {
    let mut i = 0;
    while md.remove(group, &list_name(base, i)) {
        i += 1;
    }
}

fn set_scalar(md: &mut MetaData, group: &str, name: &str, value: impl Into<TypedValue>) -> Result<()> {
    md.set_value(group, name, value.into()).map(|_| ())
}

/// 16-bit counter stored in a signed Integer parameter.
fn count_i16(n: usize) -> i16 {
    n.min(u16::MAX as usize) as u16 as i16
}

// === Scales ===

/// Point scale magnitude used to write the acquisition.
fn point_scale(acq: &Acquisition, settings: &EncodeSettings) -> f64 {
    let mut scale = settings.point_scale.abs();
    if scale.is_nan() || scale <= 0.0 {
        scale = DEFAULT_POINT_SCALE;
    }
    if settings.flags.contains(WriteFlags::SCALES_FROM_DATA) && settings.storage == StorageFormat::Integer {
        let max = acq
            .points()
            .iter()
            .map(|p| max_abs_component(p.values()))
            .fold(0.0, f64::max);
        if max / scale > MAX_SCALED_VALUE {
            scale = max / MAX_SCALED_VALUE;
        }
    }
    scale
}

/// Raw integer range left around the zero offset of a channel.
fn analog_headroom(offset: f64, format: AnalogIntegerFormat) -> f64 {
    let room = match format {
        AnalogIntegerFormat::Unsigned if offset > 0.0 => offset.min(u16::MAX as f64 - offset),
        AnalogIntegerFormat::Unsigned => u16::MAX as f64,
        AnalogIntegerFormat::Signed => MAX_SCALED_VALUE - offset.abs(),
    };
    room.max(1.0)
}

fn analog_scale(a: &Analog, gen_scale: f64, settings: &EncodeSettings) -> f64 {
    let mut scale = if a.scale() == 0.0 { 1.0 } else { a.scale() };
    if settings.flags.contains(WriteFlags::SCALES_FROM_DATA) && settings.storage == StorageFormat::Integer {
        let max = a.values().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let headroom = analog_headroom(a.offset() as f64, settings.analog_format);
        if max / (gen_scale * scale).abs() > headroom {
            scale = scale.signum() * max / (gen_scale.abs() * headroom);
        }
    }
    scale
}

// === Groups ===

fn point_group(md: &mut MetaData, acq: &Acquisition, scale: f32, rebuild: bool) -> Result<()> {
    let points = acq.points();
    let frames = acq.point_frame_number();
    set_scalar(md, "POINT", "USED", count_i16(points.len()))?;
    set_scalar(md, "POINT", "SCALE", scale)?;
    set_scalar(md, "POINT", "FRAMES", count_i16(frames))?;
    // Patched once the parameter section size is known.
    set_scalar(md, "POINT", "DATA_START", 0i16)?;

    let labels_changed = list_strings(md, "POINT", "LABELS").len() != points.len();
    if rebuild || labels_changed {
        let labels: Vec<&str> = points.iter().map(|p| p.label()).collect();
        let descriptions: Vec<&str> = points.iter().map(|p| p.description()).collect();
        set_list(md, "POINT", "LABELS", &labels)?;
        set_list(md, "POINT", "DESCRIPTIONS", &descriptions)?;
    }
    if !rebuild {
        return Ok(());
    }
    set_scalar(md, "POINT", "RATE", acq.point_frequency() as f32)?;
    set_scalar(md, "POINT", "UNITS", acq.point_unit(PointType::Marker))?;
    for kind in PointType::ALL {
        let Some(param) = kind.labels_parameter() else { continue };
        let labels: Vec<&str> = points
            .iter()
            .filter(|p| p.kind() == kind)
            .map(|p| p.label())
            .collect();
        if labels.is_empty() {
            remove_list(md, "POINT", param);
            continue;
        }
        set_list(md, "POINT", param, &labels)?;
        if let Some(units) = kind.units_parameter() {
            set_scalar(md, "POINT", units, acq.point_unit(kind))?;
        }
    }
    Ok(())
}

fn analog_group(
    md: &mut MetaData,
    acq: &Acquisition,
    scaling: &AnalogScaling,
    settings: &EncodeSettings,
    rebuild: bool,
) -> Result<()> {
    let analogs = acq.analogs();
    let unsigned = settings.analog_format == AnalogIntegerFormat::Unsigned;
    set_scalar(md, "ANALOG", "USED", count_i16(analogs.len()))?;
    set_scalar(md, "ANALOG", "GEN_SCALE", scaling.gen_scale as f32)?;
    let scales: Vec<f32> = scaling.scales.iter().map(|&s| s as f32).collect();
    set_list(md, "ANALOG", "SCALE", &scales)?;
    let offsets: Vec<i16> = scaling
        .offsets
        .iter()
        .map(|&o| {
            if unsigned {
                o.clamp(0, u16::MAX as i32) as u16 as i16
            } else {
                o.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            }
        })
        .collect();
    set_list(md, "ANALOG", "OFFSET", &offsets)?;
    set_scalar(md, "ANALOG", "FORMAT", settings.analog_format.keyword())?;

    let labels_changed = list_strings(md, "ANALOG", "LABELS").len() != analogs.len();
    if rebuild || labels_changed {
        let labels: Vec<&str> = analogs.iter().map(|a| a.label()).collect();
        let descriptions: Vec<&str> = analogs.iter().map(|a| a.description()).collect();
        set_list(md, "ANALOG", "LABELS", &labels)?;
        set_list(md, "ANALOG", "DESCRIPTIONS", &descriptions)?;
    }
    if !rebuild {
        return Ok(());
    }
    let units: Vec<&str> = analogs.iter().map(|a| a.unit()).collect();
    set_list(md, "ANALOG", "UNITS", &units)?;
    set_scalar(md, "ANALOG", "RATE", acq.analog_frequency() as f32)?;
    if md.value("ANALOG", "BITS").is_none() {
        set_scalar(md, "ANALOG", "BITS", 16i16)?;
    }
    let gains: Vec<i16> = analogs.iter().map(|a| a.gain().code()).collect();
    set_list(md, "ANALOG", "GAIN", &gains)?;
    Ok(())
}

fn event_group(md: &mut MetaData, acq: &Acquisition) -> Result<()> {
    let mut events = acq.events();
    if events.len() > MAX_LIST_LEN {
        warn!(events = events.len(), kept = MAX_LIST_LEN, "too many events, extra ones dropped");
        events = &events[..MAX_LIST_LEN];
    }
    let n = events.len();
    set_scalar(md, "EVENT", "USED", count_i16(n))?;
    let labels: Vec<&str> = events.iter().map(|e| e.label()).collect();
    let descriptions: Vec<&str> = events.iter().map(|e| e.description()).collect();
    let contexts: Vec<&str> = events.iter().map(|e| e.context()).collect();
    let subjects: Vec<&str> = events.iter().map(|e| e.subject()).collect();
    set_list(md, "EVENT", "LABELS", &labels)?;
    set_list(md, "EVENT", "DESCRIPTIONS", &descriptions)?;
    set_list(md, "EVENT", "CONTEXTS", &contexts)?;
    set_list(md, "EVENT", "SUBJECTS", &subjects)?;

    // [minutes, seconds] per event
    let times: Vec<f32> = events
        .iter()
        .flat_map(|e| {
            let minutes = (e.time() / 60.0).floor();
            [minutes as f32, (e.time() - minutes * 60.0) as f32]
        })
        .collect();
    md.set_value("EVENT", "TIMES", TypedValue::with_values(vec![2, n as u8], times))?;
    let icons: Vec<i16> = events.iter().map(|e| e.icon_id()).collect();
    let generic: Vec<i16> = events.iter().map(|e| i16::from(e.is_generic())).collect();
    set_list(md, "EVENT", "ICON_IDS", &icons)?;
    set_list(md, "EVENT", "GENERIC_FLAGS", &generic)?;
    Ok(())
}

/// Minimal force platform description expected by readers of empty files.
fn force_platform_skeleton(md: &mut MetaData) -> Result<()> {
    if md.find("FORCE_PLATFORM").is_some() {
        return Ok(());
    }
    set_scalar(md, "FORCE_PLATFORM", "USED", 0i16)?;
    md.set_value("FORCE_PLATFORM", "TYPE", TypedValue::new(Format::Integer, vec![0u8]))?;
    md.set_value("FORCE_PLATFORM", "ZERO", TypedValue::with_values(vec![2u8], vec![1i16, 0]))?;
    md.set_value("FORCE_PLATFORM", "CORNERS", TypedValue::new(Format::Real, vec![3u8, 4, 0]))?;
    md.set_value("FORCE_PLATFORM", "ORIGIN", TypedValue::new(Format::Real, vec![3u8, 0]))?;
    md.set_value("FORCE_PLATFORM", "CHANNEL", TypedValue::new(Format::Integer, vec![6u8, 0]))?;
    Ok(())
}

/// `[low, high]` half-words of a 32-bit frame index.
fn split_frame(frame: u32) -> TypedValue {
    let halves = vec![(frame & 0xFFFF) as u16 as i16, (frame >> 16) as u16 as i16];
    TypedValue::with_values(vec![2u8], halves)
}

fn trial_group(md: &mut MetaData, acq: &Acquisition) -> Result<()> {
    let overflow = acq.last_frame() > u16::MAX as u32;
    if overflow || md.value("TRIAL", "ACTUAL_START_FIELD").is_some() {
        md.set_value("TRIAL", "ACTUAL_START_FIELD", split_frame(acq.first_frame()))?;
        md.set_value("TRIAL", "ACTUAL_END_FIELD", split_frame(acq.last_frame()))?;
    }
    Ok(())
}

/// Clamp a count into a 16-bit header word; the parameters keep the full value.
fn header_word(field: &str, value: u64) -> u16 {
    if value > u16::MAX as u64 {
        warn!(field, value, "header word clamped to 65535, readers must use the parameters");
        return u16::MAX;
    }
    value as u16
}

fn header_events(acq: &Acquisition) -> Vec<HeaderEvent> {
    acq.events()
        .iter()
        .take(HEADER_EVENTS)
        .map(|e| HeaderEvent {
            label: e.label().chars().take(4).collect(),
            time: e.time() as f32,
            displayed: true,
        })
        .collect()
}

/// Build the metadata, header and data layout used to write `acq`.
pub fn prepare(acq: &Acquisition, settings: &EncodeSettings) -> Result<Prepared> {
    let rebuild = settings.flags.contains(WriteFlags::METADATA_FROM_DATA);
    // USED parameters are 16-bit as well
    for (kind, n) in [("points", acq.point_number()), ("analog channels", acq.analog_number())] {
        if n > u16::MAX as usize {
            return Err(Error::encode(format!("{} {} do not fit a C3D file (max 65535)", n, kind)));
        }
    }
    let mut md = acq.metadata().clone();

    let scale = point_scale(acq, settings);
    let signed_scale = settings.storage.signed_scale(scale);

    let gen_scale = md
        .value("ANALOG", "GEN_SCALE")
        .and_then(|v| v.f64_at(0))
        .filter(|&g| g != 0.0)
        .unwrap_or(1.0);
    let scaling = AnalogScaling {
        gen_scale,
        scales: acq
            .analogs()
            .iter()
            .map(|a| analog_scale(a, gen_scale, settings))
            .collect(),
        offsets: acq.analogs().iter().map(Analog::offset).collect(),
        unsigned: settings.analog_format == AnalogIntegerFormat::Unsigned,
    };

    point_group(&mut md, acq, signed_scale, rebuild)?;
    analog_group(&mut md, acq, &scaling, settings, rebuild)?;
    let events_changed = md
        .value("EVENT", "USED")
        .and_then(|v| v.u16_at(0))
        .map(|n| n as usize != acq.event_number())
        .unwrap_or(true);
    if rebuild || events_changed {
        event_group(&mut md, acq)?;
    }
    force_platform_skeleton(&mut md)?;
    trial_group(&mut md, acq)?;

    let ratio = acq.analog_samples_per_frame() as usize;
    let header = Header {
        parameter_block: PARAMETER_BLOCK,
        point_count: acq.point_number() as u16,
        analog_total: header_word("analog_total", (acq.analog_number() * ratio) as u64),
        first_frame: header_word("first_frame", acq.first_frame() as u64),
        last_frame: header_word("last_frame", acq.last_frame() as u64),
        max_gap: acq.max_interpolation_gap(),
        scale: signed_scale,
        data_start: 0,
        analog_ratio: header_word("analog_ratio", ratio as u64),
        frame_rate: acq.point_frequency() as f32,
        events: header_events(acq),
    };
    let layout = DataLayout {
        frames: acq.point_frame_number(),
        analog_ratio: ratio,
        storage: settings.storage,
        point_scale: scale,
        analog: scaling,
    };
    debug!(
        points = acq.point_number(),
        analogs = acq.analog_number(),
        frames = layout.frames,
        scale = signed_scale,
        rebuild,
        "prepared output metadata"
    );
    Ok(Prepared {
        metadata: md,
        header,
        layout,
    })
}
