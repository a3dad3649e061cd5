//! Core layer - the in-memory acquisition model.
//!
//! This module provides:
//! - [`TypedValue`] - Typed, dimensioned parameter values
//! - [`MetaData`] - Arena tree of groups and parameters
//! - [`Acquisition`] - Points, analog channels, events and frame range
//! - [`Point`] / [`Analog`] / [`Event`] - The records of an acquisition

mod acquisition;
mod metadata;
mod record;
mod value;

pub use acquisition::Acquisition;
pub use metadata::{EntryId, MetaData, MetaDataEntry};
pub use record::{Analog, Event, Gain, Point, PointType};
pub use value::{Format, TypedValue, Value, Values};
