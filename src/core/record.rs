//! Point, analog and event records held by an [`Acquisition`](super::Acquisition).

use crate::util::DVec3;
use std::fmt;

/// Kind of quantity a point trajectory carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointType {
    #[default]
    Marker,
    Angle,
    Force,
    Moment,
    Power,
    Scalar,
    Reaction,
}

impl PointType {
    pub const ALL: [PointType; 7] = [
        Self::Marker,
        Self::Angle,
        Self::Force,
        Self::Moment,
        Self::Power,
        Self::Scalar,
        Self::Reaction,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// `POINT` parameter listing the labels of this type (none for markers).
    pub const fn labels_parameter(self) -> Option<&'static str> {
        match self {
            Self::Marker => None,
            Self::Angle => Some("ANGLES"),
            Self::Force => Some("FORCES"),
            Self::Moment => Some("MOMENTS"),
            Self::Power => Some("POWERS"),
            Self::Scalar => Some("SCALARS"),
            Self::Reaction => Some("REACTIONS"),
        }
    }

    /// `POINT` parameter holding the unit of this type.
    pub const fn units_parameter(self) -> Option<&'static str> {
        match self {
            Self::Marker => Some("UNITS"),
            Self::Angle => Some("ANGLE_UNITS"),
            Self::Force => Some("FORCE_UNITS"),
            Self::Moment => Some("MOMENT_UNITS"),
            Self::Power => Some("POWER_UNITS"),
            Self::Scalar => Some("SCALAR_UNITS"),
            Self::Reaction => None,
        }
    }

    /// Unit used when the file does not declare one.
    pub const fn default_unit(self) -> &'static str {
        match self {
            Self::Marker => "mm",
            Self::Angle => "deg",
            Self::Force | Self::Reaction => "N",
            Self::Moment => "Nmm",
            Self::Power => "W",
            Self::Scalar => "",
        }
    }
}

/// A labelled 3D trajectory with per-frame residual and camera mask.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    label: String,
    description: String,
    kind: PointType,
    values: Vec<DVec3>,
    /// Reconstruction residual, -1 for an invalid sample.
    residuals: Vec<f64>,
    /// Cameras that contributed to the sample (7 bits).
    masks: Vec<u8>,
    pub(crate) owner: Option<u64>,
}

impl Point {
    /// Create a marker with `frames` zeroed samples.
    pub fn new(label: impl Into<String>, frames: usize) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            kind: PointType::Marker,
            values: vec![DVec3::ZERO; frames],
            residuals: vec![0.0; frames],
            masks: vec![0; frames],
            owner: None,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    #[inline]
    pub fn kind(&self) -> PointType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: PointType) {
        self.kind = kind;
    }

    #[inline]
    pub fn frame_number(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &[DVec3] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [DVec3] {
        &mut self.values
    }

    #[inline]
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn residuals_mut(&mut self) -> &mut [f64] {
        &mut self.residuals
    }

    #[inline]
    pub fn masks(&self) -> &[u8] {
        &self.masks
    }

    pub fn masks_mut(&mut self) -> &mut [u8] {
        &mut self.masks
    }

    /// Set one frame at once.
    pub fn set_frame(&mut self, frame: usize, value: DVec3, residual: f64, mask: u8) {
        if frame < self.values.len() {
            self.values[frame] = value;
            self.residuals[frame] = residual;
            self.masks[frame] = mask;
        }
    }

    /// Returns true if the sample was reconstructed.
    pub fn is_valid(&self, frame: usize) -> bool {
        self.residuals.get(frame).map(|&r| r >= 0.0).unwrap_or(false)
    }

    /// Truncate or zero-extend to `frames` samples.
    pub fn resize(&mut self, frames: usize) {
        self.values.resize(frames, DVec3::ZERO);
        self.residuals.resize(frames, 0.0);
        self.masks.resize(frames, 0);
    }

    /// Returns true while the point is attached to an acquisition.
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.owner.is_some()
    }
}

/// Input range of an analog channel (`ANALOG:GAIN`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Gain {
    #[default]
    Unknown,
    PlusMinus10,
    PlusMinus5,
    PlusMinus2Dot5,
    PlusMinus1Dot25,
    PlusMinus1,
}

impl Gain {
    /// C3D code of the gain.
    pub const fn code(self) -> i16 {
        match self {
            Self::Unknown => 0,
            Self::PlusMinus10 => 1,
            Self::PlusMinus5 => 2,
            Self::PlusMinus2Dot5 => 3,
            Self::PlusMinus1Dot25 => 4,
            Self::PlusMinus1 => 5,
        }
    }

    pub const fn from_code(code: i16) -> Self {
        match code {
            1 => Self::PlusMinus10,
            2 => Self::PlusMinus5,
            3 => Self::PlusMinus2Dot5,
            4 => Self::PlusMinus1Dot25,
            5 => Self::PlusMinus1,
            _ => Self::Unknown,
        }
    }
}

/// A labelled analog channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Analog {
    label: String,
    description: String,
    unit: String,
    gain: Gain,
    scale: f64,
    offset: i32,
    values: Vec<f64>,
    pub(crate) owner: Option<u64>,
}

impl Analog {
    /// Create a channel with `samples` zeroed values.
    pub fn new(label: impl Into<String>, samples: usize) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            unit: "V".to_string(),
            gain: Gain::Unknown,
            scale: 1.0,
            offset: 0,
            values: vec![0.0; samples],
            owner: None,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    #[inline]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
    }

    #[inline]
    pub fn gain(&self) -> Gain {
        self.gain
    }

    pub fn set_gain(&mut self, gain: Gain) {
        self.gain = gain;
    }

    /// Channel scale (`ANALOG:SCALE`), excluding the general scale.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    /// Zero offset (`ANALOG:OFFSET`) in raw integer units.
    #[inline]
    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    #[inline]
    pub fn frame_number(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn resize(&mut self, samples: usize) {
        self.values.resize(samples, 0.0);
    }

    #[inline]
    pub fn has_parent(&self) -> bool {
        self.owner.is_some()
    }
}

/// A labelled instant of the trial (heel strike, toe off, ...).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    label: String,
    description: String,
    context: String,
    subject: String,
    time: f64,
    frame: i32,
    icon_id: i16,
    generic: bool,
    pub(crate) owner: Option<u64>,
}

impl Event {
    pub fn new(label: impl Into<String>, time: f64) -> Self {
        Self {
            label: label.into(),
            time,
            ..Default::default()
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Side or context ("Left", "Right", "General").
    #[inline]
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    #[inline]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    /// Time in seconds.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    #[inline]
    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    #[inline]
    pub fn icon_id(&self) -> i16 {
        self.icon_id
    }

    pub fn set_icon_id(&mut self, id: i16) {
        self.icon_id = id;
    }

    /// Generic events are not attached to a subject.
    #[inline]
    pub fn is_generic(&self) -> bool {
        self.generic
    }

    pub fn set_generic(&mut self, generic: bool) {
        self.generic = generic;
    }

    #[inline]
    pub fn has_parent(&self) -> bool {
        self.owner.is_some()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {:.3}s (frame {})", self.context, self.label, self.time, self.frame)
    }
}
