//! Utility types shared by the whole crate.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Dimensions`] - Shape of a parameter value
//! - Math type re-exports from glam

mod dimensions;
mod error;
mod math;

pub use dimensions::{Dimensions, MAX_RANK};
pub(crate) use dimensions::reshape;
pub use error::*;
pub use math::*;
