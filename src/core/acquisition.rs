//! In-memory acquisition: points, analog channels, events and metadata.

use super::metadata::MetaData;
use super::record::{Analog, Event, Point, PointType};
use crate::util::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Next value of the process-wide modification clock.
fn tick() -> u64 {
    CLOCK.fetch_add(1, Ordering::Relaxed) + 1
}

/// A motion capture trial.
///
/// Analog channels are sampled `analog_samples_per_frame` times per point
/// frame, so `analog_frame_number == point_frame_number * ratio`. Every
/// mutation through this API advances [`timestamp`](Self::timestamp).
#[derive(Debug)]
pub struct Acquisition {
    id: u64,
    timestamp: u64,
    first_frame: u32,
    frame_number: usize,
    point_frequency: f64,
    analog_ratio: u32,
    max_interpolation_gap: u16,
    point_units: [String; 7],
    points: Vec<Point>,
    analogs: Vec<Analog>,
    events: Vec<Event>,
    metadata: MetaData,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Acquisition {
    /// The copy is a distinct acquisition owning its own records.
    fn clone(&self) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let mut out = Self {
            id,
            timestamp: self.timestamp,
            first_frame: self.first_frame,
            frame_number: self.frame_number,
            point_frequency: self.point_frequency,
            analog_ratio: self.analog_ratio,
            max_interpolation_gap: self.max_interpolation_gap,
            point_units: self.point_units.clone(),
            points: self.points.clone(),
            analogs: self.analogs.clone(),
            events: self.events.clone(),
            metadata: self.metadata.clone(),
        };
        out.adopt_all();
        out
    }
}

impl Acquisition {
    /// Empty acquisition: first frame 1, no frames, no channels.
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            timestamp: tick(),
            first_frame: 1,
            frame_number: 0,
            point_frequency: 0.0,
            analog_ratio: 1,
            max_interpolation_gap: 10,
            point_units: PointType::ALL.map(|t| t.default_unit().to_string()),
            points: Vec::new(),
            analogs: Vec::new(),
            events: Vec::new(),
            metadata: MetaData::new(),
        }
    }

    fn modified(&mut self) {
        self.timestamp = tick();
    }

    fn adopt_all(&mut self) {
        let id = self.id;
        self.points.iter_mut().for_each(|p| p.owner = Some(id));
        self.analogs.iter_mut().for_each(|a| a.owner = Some(id));
        self.events.iter_mut().for_each(|e| e.owner = Some(id));
    }

    /// Allocate `point_count` points and `analog_count` channels.
    ///
    /// Existing records are replaced; labels default to `uname*N`.
    pub fn init(&mut self, point_count: usize, frame_number: usize, analog_count: usize, analog_ratio: u32) {
        let ratio = analog_ratio.max(1);
        self.frame_number = frame_number;
        self.analog_ratio = ratio;
        self.points = (1..=point_count)
            .map(|i| Point::new(format!("uname*{}", i), frame_number))
            .collect();
        self.analogs = (1..=analog_count)
            .map(|i| Analog::new(format!("uname*{}", i), frame_number * ratio as usize))
            .collect();
        self.adopt_all();
        self.modified();
    }

    /// Unique id of this acquisition within the process.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Modification stamp. Reads and writes never change it.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    // === Frames and frequencies ===

    #[inline]
    pub fn first_frame(&self) -> u32 {
        self.first_frame
    }

    pub fn set_first_frame(&mut self, frame: u32) {
        self.first_frame = frame.max(1);
        self.modified();
    }

    /// Last frame index. An empty acquisition spans `[1, 0]`.
    pub fn last_frame(&self) -> u32 {
        (self.first_frame as u64 + self.frame_number as u64).saturating_sub(1) as u32
    }

    #[inline]
    pub fn point_frame_number(&self) -> usize {
        self.frame_number
    }

    pub fn analog_frame_number(&self) -> usize {
        self.frame_number * self.analog_ratio as usize
    }

    /// Resize every point and analog channel to `frames` point frames.
    pub fn resize_frame_number(&mut self, frames: usize) {
        self.frame_number = frames;
        let samples = self.analog_frame_number();
        self.points.iter_mut().for_each(|p| p.resize(frames));
        self.analogs.iter_mut().for_each(|a| a.resize(samples));
        self.modified();
    }

    #[inline]
    pub fn point_frequency(&self) -> f64 {
        self.point_frequency
    }

    pub fn set_point_frequency(&mut self, frequency: f64) {
        self.point_frequency = frequency;
        self.modified();
    }

    pub fn analog_frequency(&self) -> f64 {
        self.point_frequency * self.analog_ratio as f64
    }

    /// Analog samples per point frame.
    #[inline]
    pub fn analog_samples_per_frame(&self) -> u32 {
        self.analog_ratio
    }

    /// Change the analog ratio, resizing every channel.
    pub fn set_analog_samples_per_frame(&mut self, ratio: u32) {
        self.analog_ratio = ratio;
        let samples = self.analog_frame_number();
        self.analogs.iter_mut().for_each(|a| a.resize(samples));
        self.modified();
    }

    #[inline]
    pub fn max_interpolation_gap(&self) -> u16 {
        self.max_interpolation_gap
    }

    pub fn set_max_interpolation_gap(&mut self, gap: u16) {
        self.max_interpolation_gap = gap;
        self.modified();
    }

    /// Unit of the points of a type ("mm" for markers by default).
    pub fn point_unit(&self, kind: PointType) -> &str {
        &self.point_units[kind.index()]
    }

    pub fn set_point_unit(&mut self, kind: PointType, unit: impl Into<String>) {
        self.point_units[kind.index()] = unit.into();
        self.modified();
    }

    // === Points ===

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn point_number(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn point_mut(&mut self, index: usize) -> Option<&mut Point> {
        self.modified();
        self.points.get_mut(index)
    }

    pub fn find_point(&self, label: &str) -> Option<usize> {
        self.points.iter().position(|p| p.label() == label)
    }

    /// Append a point, resizing it to the current frame count.
    pub fn append_point(&mut self, mut point: Point) {
        point.resize(self.frame_number);
        point.owner = Some(self.id);
        self.points.push(point);
        self.modified();
    }

    /// Remove the point at `index`, shifting the following ones down.
    pub fn remove_point(&mut self, index: usize) -> Result<Point> {
        let count = self.points.len();
        if index >= count {
            return Err(Error::IndexOutOfBounds { index, count });
        }
        let mut point = self.points.remove(index);
        point.owner = None;
        self.modified();
        Ok(point)
    }

    /// Remove every point.
    ///
    /// The point frequency is kept while analog channels still refer to it.
    pub fn clear_points(&mut self) {
        self.points.clear();
        if self.analogs.is_empty() {
            self.clear_frequencies();
        }
        self.modified();
    }

    // === Analogs ===

    #[inline]
    pub fn analogs(&self) -> &[Analog] {
        &self.analogs
    }

    #[inline]
    pub fn analog_number(&self) -> usize {
        self.analogs.len()
    }

    pub fn analog(&self, index: usize) -> Option<&Analog> {
        self.analogs.get(index)
    }

    pub fn analog_mut(&mut self, index: usize) -> Option<&mut Analog> {
        self.modified();
        self.analogs.get_mut(index)
    }

    pub fn find_analog(&self, label: &str) -> Option<usize> {
        self.analogs.iter().position(|a| a.label() == label)
    }

    pub fn append_analog(&mut self, mut analog: Analog) {
        analog.resize(self.analog_frame_number());
        analog.owner = Some(self.id);
        self.analogs.push(analog);
        self.modified();
    }

    pub fn remove_analog(&mut self, index: usize) -> Result<Analog> {
        let count = self.analogs.len();
        if index >= count {
            return Err(Error::IndexOutOfBounds { index, count });
        }
        let mut analog = self.analogs.remove(index);
        analog.owner = None;
        self.modified();
        Ok(analog)
    }

    /// Remove every analog channel.
    ///
    /// The ratio is kept while points remain.
    pub fn clear_analogs(&mut self) {
        self.analogs.clear();
        if self.points.is_empty() {
            self.clear_frequencies();
        }
        self.modified();
    }

    fn clear_frequencies(&mut self) {
        self.point_frequency = 0.0;
        self.analog_ratio = 0;
        self.frame_number = 0;
    }

    // === Events ===

    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[inline]
    pub fn event_number(&self) -> usize {
        self.events.len()
    }

    pub fn event(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn event_mut(&mut self, index: usize) -> Option<&mut Event> {
        self.modified();
        self.events.get_mut(index)
    }

    pub fn append_event(&mut self, mut event: Event) {
        event.owner = Some(self.id);
        self.events.push(event);
        self.modified();
    }

    pub fn remove_event(&mut self, index: usize) -> Result<Event> {
        let count = self.events.len();
        if index >= count {
            return Err(Error::IndexOutOfBounds { index, count });
        }
        let mut event = self.events.remove(index);
        event.owner = None;
        self.modified();
        Ok(event)
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
        self.modified();
    }

    // === Metadata ===

    #[inline]
    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetaData {
        self.modified();
        &mut self.metadata
    }

    /// Returns true if the record was attached to this acquisition.
    pub fn owns_point(&self, point: &Point) -> bool {
        point.owner == Some(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_defaults() {
        let acq = Acquisition::new();
        assert_eq!(acq.first_frame(), 1);
        assert_eq!(acq.last_frame(), 0);
        assert_eq!(acq.point_frame_number(), 0);
        assert_eq!(acq.point_frequency(), 0.0);
        assert_eq!(acq.point_unit(PointType::Marker), "mm");
    }

    #[test]
    fn test_init() {
        let mut acq = Acquisition::new();
        acq.init(3, 100000, 1, 2);
        assert_eq!(acq.point_number(), 3);
        assert_eq!(acq.analog_number(), 1);
        assert_eq!(acq.point_frame_number(), 100000);
        assert_eq!(acq.analog_frame_number(), 200000);
        assert_eq!(acq.analog(0).unwrap().frame_number(), 200000);
        assert_eq!(acq.last_frame(), 100000);
        assert!(acq.points().iter().all(|p| p.has_parent() && acq.owns_point(p)));
    }

    #[test]
    fn test_remove_point_shifts() -> Result<()> {
        let mut acq = Acquisition::new();
        acq.init(4, 10, 0, 1);
        acq.set_point_frequency(50.0);
        let removed = acq.remove_point(1)?;
        assert_eq!(removed.label(), "uname*2");
        assert!(!removed.has_parent());
        assert_eq!(acq.point(1).unwrap().label(), "uname*3");
        assert_eq!(acq.point_frequency(), 50.0);
        assert!(matches!(acq.remove_point(3), Err(Error::IndexOutOfBounds { index: 3, count: 3 })));
        Ok(())
    }

    #[test]
    fn test_clear_frequencies() {
        let mut acq = Acquisition::new();
        acq.init(2, 10, 2, 4);
        acq.set_point_frequency(50.0);

        acq.clear_analogs();
        assert_eq!(acq.point_frequency(), 50.0);
        assert_eq!(acq.analog_frequency(), 200.0);
        assert_eq!(acq.point_frame_number(), 10);

        acq.clear_points();
        assert_eq!(acq.point_frequency(), 0.0);
        assert_eq!(acq.analog_frequency(), 0.0);
    }

    #[test]
    fn test_clear_points_keeps_analog_rate() {
        let mut acq = Acquisition::new();
        acq.init(2, 10, 2, 4);
        acq.set_point_frequency(50.0);
        acq.clear_points();
        assert_eq!(acq.point_frequency(), 50.0);
        assert_eq!(acq.analog_frequency(), 200.0);
        assert_eq!(acq.analog_frame_number(), 40);
    }

    #[test]
    fn test_timestamp_advances_on_mutation() {
        let mut acq = Acquisition::new();
        let t0 = acq.timestamp();
        let _ = acq.points();
        assert_eq!(acq.timestamp(), t0);
        acq.append_event(Event::new("RHS", 1.2));
        assert!(acq.timestamp() > t0);
        assert!(acq.event(0).unwrap().has_parent());
    }

    #[test]
    fn test_clone_reowns_records() {
        let mut acq = Acquisition::new();
        acq.init(1, 5, 0, 1);
        let copy = acq.clone();
        assert_ne!(copy.id(), acq.id());
        assert!(copy.owns_point(copy.point(0).unwrap()));
        assert!(!acq.owns_point(copy.point(0).unwrap()));
    }
}
