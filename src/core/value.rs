//! Typed, multi-dimensional values stored in metadata entries.
//!
//! A [`TypedValue`] holds one of the four C3D parameter formats together with
//! its [`Dimensions`]. Numeric formats store `product(dims)` elements. Char
//! stores `product(dims[1..])` strings, all exactly `dims[0]` characters wide
//! (a rank-0 Char value is a single one-character string).
//!
//! Conversions between formats never fail: text that does not parse as a
//! number converts to zero.

use crate::util::{Dimensions, Error, Result, reshape};
use std::fmt;

/// Storage format of a parameter value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// 8-bit signed integer
    Byte,
    /// 16-bit signed integer
    Integer,
    /// 32-bit float
    Real,
    /// Fixed-width string
    Char,
}

impl Format {
    /// Type tag used by the C3D parameter section.
    #[inline]
    pub const fn tag(self) -> i8 {
        match self {
            Self::Char => -1,
            Self::Byte => 1,
            Self::Integer => 2,
            Self::Real => 4,
        }
    }

    /// Parse a C3D type tag.
    pub const fn from_tag(tag: i8) -> Option<Self> {
        match tag {
            -1 => Some(Self::Char),
            1 => Some(Self::Byte),
            2 => Some(Self::Integer),
            4 => Some(Self::Real),
            _ => None,
        }
    }

    /// Size in bytes of one stored element (one character for Char).
    #[inline]
    pub const fn element_size(self) -> usize {
        match self {
            Self::Char | Self::Byte => 1,
            Self::Integer => 2,
            Self::Real => 4,
        }
    }

    /// Returns true for Byte, Integer and Real.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Char)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::Integer => "Integer",
            Self::Real => "Real",
            Self::Char => "Char",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flat element buffer of a [`TypedValue`].
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    Byte(Vec<i8>),
    Integer(Vec<i16>),
    Real(Vec<f32>),
    Char(Vec<String>),
}

impl Values {
    pub fn format(&self) -> Format {
        match self {
            Self::Byte(_) => Format::Byte,
            Self::Integer(_) => Format::Integer,
            Self::Real(_) => Format::Real,
            Self::Char(_) => Format::Char,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Integer(v) => v.len(),
            Self::Real(v) => v.len(),
            Self::Char(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn empty(format: Format) -> Self {
        match format {
            Format::Byte => Self::Byte(Vec::new()),
            Format::Integer => Self::Integer(Vec::new()),
            Format::Real => Self::Real(Vec::new()),
            Format::Char => Self::Char(Vec::new()),
        }
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        match self {
            Self::Byte(v) => v.get(index).map(|&x| Cell::Int(x as i64)),
            Self::Integer(v) => v.get(index).map(|&x| Cell::Int(x as i64)),
            Self::Real(v) => v.get(index).map(|&x| Cell::Real(x as f64)),
            Self::Char(v) => v.get(index).map(|s| Cell::Text(s.as_str())),
        }
    }
}

impl From<Vec<i8>> for Values {
    fn from(v: Vec<i8>) -> Self {
        Self::Byte(v)
    }
}

impl From<Vec<i16>> for Values {
    fn from(v: Vec<i16>) -> Self {
        Self::Integer(v)
    }
}

impl From<Vec<f32>> for Values {
    fn from(v: Vec<f32>) -> Self {
        Self::Real(v)
    }
}

impl From<Vec<String>> for Values {
    fn from(v: Vec<String>) -> Self {
        Self::Char(v)
    }
}

impl From<Vec<&str>> for Values {
    fn from(v: Vec<&str>) -> Self {
        Self::Char(v.into_iter().map(String::from).collect())
    }
}

/// A single element, used to assign values regardless of the stored format.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
}

macro_rules! impl_value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(v as i64)
            }
        })*
    };
}

impl_value_from_int!(i8, u8, i16, u16, i32, u32, i64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Real(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Borrowed view of one stored element.
#[derive(Clone, Copy)]
enum Cell<'a> {
    Int(i64),
    Real(f64),
    Text(&'a str),
}

impl<'a> Cell<'a> {
    fn from_value(v: &'a Value) -> Self {
        match v {
            Value::Int(i) => Cell::Int(*i),
            Value::Real(r) => Cell::Real(*r),
            Value::Text(s) => Cell::Text(s.as_str()),
        }
    }

    /// Resolve text to a number. Unparsable text yields 0.
    fn numeric(self) -> Cell<'static> {
        match self {
            Cell::Int(i) => Cell::Int(i),
            Cell::Real(r) => Cell::Real(r),
            Cell::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Cell::Int(i)
                } else if let Ok(r) = s.parse::<f64>() {
                    Cell::Real(r)
                } else {
                    Cell::Int(0)
                }
            }
        }
    }
}

// Integer sources wrap (379 -> 123 as u8), float sources saturate.
macro_rules! cell_as {
    ($cell:expr, $t:ty) => {
        match $cell.numeric() {
            Cell::Int(i) => i as $t,
            Cell::Real(r) => r as $t,
            Cell::Text(_) => 0 as $t,
        }
    };
}

fn cell_string(cell: Cell<'_>, stored: Format) -> String {
    match cell {
        Cell::Int(i) => i.to_string(),
        // Keep the f32 shortest form for stored reals ("0.83333", not "0.833329975605011")
        Cell::Real(r) if stored == Format::Real => (r as f32).to_string(),
        Cell::Real(r) => r.to_string(),
        Cell::Text(s) => s.to_string(),
    }
}

/// Fit a string to exactly `width` characters.
fn fit(s: &str, width: usize) -> String {
    let mut out: String = s.chars().take(width).collect();
    let n = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - n));
    out
}

fn blank(width: usize) -> String {
    " ".repeat(width)
}

/// Typed, dimensioned value owned by a metadata entry.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedValue {
    dims: Dimensions,
    values: Values,
}

impl TypedValue {
    /// Default-filled value of the given format and dimensions.
    pub fn new(format: Format, dims: impl Into<Dimensions>) -> Self {
        Self::with_values(dims, Values::empty(format))
    }

    /// Build from dimensions and values, truncating or padding the values to
    /// the element count the dimensions declare.
    pub fn with_values(dims: impl Into<Dimensions>, values: impl Into<Values>) -> Self {
        let mut v = Self {
            dims: dims.into(),
            values: values.into(),
        };
        v.normalize();
        v
    }

    /// Rank-1 value from a numeric slice or a string list.
    ///
    /// Strings get dims `[max_len, n]`, every string padded to `max_len`.
    pub fn from_vec(values: impl Into<Values>) -> Self {
        let values = values.into();
        let dims = match &values {
            Values::Char(v) => {
                let width = v.iter().map(|s| s.chars().count()).max().unwrap_or(0);
                Dimensions::d2(clamp_u8(width), clamp_u8(v.len()))
            }
            other => Dimensions::d1(clamp_u8(other.len())),
        };
        Self::with_values(dims, values)
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.values.format()
    }

    #[inline]
    pub fn dimensions(&self) -> &Dimensions {
        &self.dims
    }

    /// Size of one axis, 0 if the axis does not exist.
    pub fn dimension(&self, axis: usize) -> u8 {
        self.dims.size(axis).unwrap_or(0)
    }

    #[inline]
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Number of stored elements (strings for Char).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Width of every string of a Char value.
    fn char_width(&self) -> usize {
        self.dims.size(0).map(|d| d as usize).unwrap_or(1)
    }

    fn element_count(&self) -> usize {
        match self.values {
            Values::Char(_) => self.dims.trailing_product(),
            _ => self.dims.product(),
        }
    }

    /// Enforce the element-count and string-width invariants.
    fn normalize(&mut self) {
        let count = self.element_count();
        let width = self.char_width();
        match &mut self.values {
            Values::Byte(v) => v.resize(count, 0),
            Values::Integer(v) => v.resize(count, 0),
            Values::Real(v) => v.resize(count, 0.0),
            Values::Char(v) => {
                v.truncate(count);
                for s in v.iter_mut() {
                    if s.chars().count() != width {
                        *s = fit(s, width);
                    }
                }
                v.resize(count, blank(width));
            }
        }
    }

    /// Replace format, dimensions and values at once.
    pub fn set(&mut self, dims: impl Into<Dimensions>, values: impl Into<Values>) {
        *self = Self::with_values(dims, values);
    }

    /// Convert every element to another format.
    pub fn set_format(&mut self, format: Format) {
        if format == self.format() {
            return;
        }
        let old = std::mem::replace(&mut self.values, Values::empty(format));
        let n = old.len();
        self.values = match format {
            Format::Byte => Values::Byte((0..n).filter_map(|i| old.cell(i)).map(|c| cell_as!(c, i8)).collect()),
            Format::Integer => {
                Values::Integer((0..n).filter_map(|i| old.cell(i)).map(|c| cell_as!(c, i16)).collect())
            }
            Format::Real => Values::Real((0..n).filter_map(|i| old.cell(i)).map(|c| cell_as!(c, f32)).collect()),
            // Numbers do not map onto a fixed-width character grid: start blank.
            Format::Char => Values::Char(Vec::new()),
        };
        self.normalize();
    }

    /// Resize one axis, keeping every element at its multi-index position.
    ///
    /// For Char, axis 0 is the string width.
    pub fn set_dimension(&mut self, axis: usize, size: u8) {
        if axis >= self.dims.rank() {
            // Extending the rank with 1s leaves the flat layout untouched
            self.dims.set_size(axis, 1);
        }
        let old = self.dims.clone();
        let mut new = old.clone();
        new.set_size(axis, size);
        let width = self.char_width();
        match &mut self.values {
            Values::Byte(v) => *v = reshape(v, old.sizes(), new.sizes(), 0),
            Values::Integer(v) => *v = reshape(v, old.sizes(), new.sizes(), 0),
            Values::Real(v) => *v = reshape(v, old.sizes(), new.sizes(), 0.0),
            Values::Char(v) if axis == 0 => {
                for s in v.iter_mut() {
                    *s = fit(s, size as usize);
                }
            }
            Values::Char(v) => {
                *v = reshape(v, old.tail().sizes(), new.tail().sizes(), blank(width));
            }
        }
        self.dims = new;
        self.normalize();
    }

    /// Change the rank. Axes are dropped from the end or added with size 1;
    /// elements are then truncated or padded in flat order.
    pub fn resize_dimensions(&mut self, rank: usize) {
        self.dims.set_rank(rank);
        self.normalize();
    }

    /// Assign one element, converting it to the current format.
    ///
    /// A string wider than the current Char width widens every string.
    pub fn set_value(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let count = self.len();
        if index >= count {
            return Err(Error::IndexOutOfBounds { index, count });
        }
        let value = value.into();
        let cell = Cell::from_value(&value);
        if let Values::Char(_) = self.values {
            let text = cell_string(cell, Format::Char);
            let len = text.chars().count().min(u8::MAX as usize);
            if len > self.char_width() {
                self.set_dimension(0, len as u8);
            }
            let width = self.char_width();
            if let Values::Char(v) = &mut self.values {
                v[index] = fit(&text, width);
            }
            return Ok(());
        }
        match &mut self.values {
            Values::Byte(v) => v[index] = cell_as!(cell, i8),
            Values::Integer(v) => v[index] = cell_as!(cell, i16),
            Values::Real(v) => v[index] = cell_as!(cell, f32),
            Values::Char(_) => {}
        }
        Ok(())
    }

    /// Element at `index` as a [`Value`].
    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.cell(index).map(|c| match c {
            Cell::Int(i) => Value::Int(i),
            Cell::Real(r) => Value::Real(r),
            Cell::Text(s) => Value::Text(s.to_string()),
        })
    }

    pub fn i8_at(&self, index: usize) -> Option<i8> {
        self.values.cell(index).map(|c| cell_as!(c, i8))
    }

    pub fn u8_at(&self, index: usize) -> Option<u8> {
        self.values.cell(index).map(|c| cell_as!(c, u8))
    }

    pub fn i16_at(&self, index: usize) -> Option<i16> {
        self.values.cell(index).map(|c| cell_as!(c, i16))
    }

    /// Integers reinterpret as unsigned (`-1` reads back as `65535`).
    pub fn u16_at(&self, index: usize) -> Option<u16> {
        self.values.cell(index).map(|c| cell_as!(c, u16))
    }

    pub fn i32_at(&self, index: usize) -> Option<i32> {
        self.values.cell(index).map(|c| cell_as!(c, i32))
    }

    pub fn f32_at(&self, index: usize) -> Option<f32> {
        self.values.cell(index).map(|c| cell_as!(c, f32))
    }

    pub fn f64_at(&self, index: usize) -> Option<f64> {
        self.values.cell(index).map(|c| cell_as!(c, f64))
    }

    pub fn string_at(&self, index: usize) -> Option<String> {
        let format = self.format();
        self.values.cell(index).map(|c| cell_string(c, format))
    }

    pub fn to_i8(&self) -> Vec<i8> {
        (0..self.len()).filter_map(|i| self.i8_at(i)).collect()
    }

    pub fn to_u8(&self) -> Vec<u8> {
        (0..self.len()).filter_map(|i| self.u8_at(i)).collect()
    }

    pub fn to_i16(&self) -> Vec<i16> {
        (0..self.len()).filter_map(|i| self.i16_at(i)).collect()
    }

    pub fn to_u16(&self) -> Vec<u16> {
        (0..self.len()).filter_map(|i| self.u16_at(i)).collect()
    }

    pub fn to_i32(&self) -> Vec<i32> {
        (0..self.len()).filter_map(|i| self.i32_at(i)).collect()
    }

    pub fn to_f32(&self) -> Vec<f32> {
        (0..self.len()).filter_map(|i| self.f32_at(i)).collect()
    }

    pub fn to_f64(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.f64_at(i)).collect()
    }

    pub fn to_strings(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.string_at(i)).collect()
    }

    /// Strings with trailing padding removed.
    pub fn to_trimmed_strings(&self) -> Vec<String> {
        self.to_strings()
            .into_iter()
            .map(|s| s.trim_end().to_string())
            .collect()
    }
}

fn clamp_u8(n: usize) -> u8 {
    n.min(u8::MAX as usize) as u8
}

impl From<i8> for TypedValue {
    fn from(v: i8) -> Self {
        Self::with_values(Dimensions::scalar(), vec![v])
    }
}

impl From<i16> for TypedValue {
    fn from(v: i16) -> Self {
        Self::with_values(Dimensions::scalar(), vec![v])
    }
}

impl From<f32> for TypedValue {
    fn from(v: f32) -> Self {
        Self::with_values(Dimensions::scalar(), vec![v])
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::with_values(Dimensions::d1(clamp_u8(v.chars().count())), vec![v])
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::from(v.as_str())
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.format(), self.dims)?;
        match &self.values {
            Values::Char(v) => write!(f, "{:?}", v.iter().map(|s| s.trim_end()).collect::<Vec<_>>()),
            _ => write!(f, "{:?}", self.to_strings()),
        }
    }
}
