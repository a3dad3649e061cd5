//! Multi-dimensional shape of a parameter value.
//!
//! C3D stores each dimension as a single byte, so every axis is limited
//! to 255 and a value can have at most 7 axes.

use smallvec::SmallVec;

/// Maximum number of axes a C3D parameter can declare.
pub const MAX_RANK: usize = 7;

/// Dimensions of a multi-dimensional array.
///
/// Axis 0 varies fastest in the flat element order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    /// Size of each dimension. Empty means scalar (rank 0).
    dims: SmallVec<[u8; MAX_RANK]>,
}

impl Dimensions {
    /// Create scalar dimensions (rank 0).
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    /// Create 1D dimensions.
    pub fn d1(size: u8) -> Self {
        Self { dims: smallvec::smallvec![size] }
    }

    /// Create 2D dimensions.
    pub fn d2(first: u8, second: u8) -> Self {
        Self { dims: smallvec::smallvec![first, second] }
    }

    /// Create from a slice of sizes.
    pub fn from_slice(sizes: &[u8]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    /// Get the rank (number of dimensions).
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Get the size of a specific dimension.
    pub fn size(&self, axis: usize) -> Option<u8> {
        self.dims.get(axis).copied()
    }

    /// Get all dimension sizes as a slice.
    pub fn sizes(&self) -> &[u8] {
        &self.dims
    }

    /// Product of every axis (1 for a scalar).
    pub fn product(&self) -> usize {
        self.dims.iter().map(|&d| d as usize).product()
    }

    /// Product of the axes after the first (1 for rank <= 1).
    ///
    /// This is the number of strings held by a Char value.
    pub fn trailing_product(&self) -> usize {
        self.dims.iter().skip(1).map(|&d| d as usize).product()
    }

    /// Check if this represents a scalar (rank 0).
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Set the size of an axis, extending the rank with 1s if necessary.
    pub fn set_size(&mut self, axis: usize, size: u8) {
        while self.dims.len() <= axis {
            self.dims.push(1);
        }
        self.dims[axis] = size;
    }

    /// Add a new dimension at the end.
    pub fn push(&mut self, size: u8) {
        self.dims.push(size);
    }

    /// Set the rank, trimming or extending with 1s as needed.
    pub fn set_rank(&mut self, rank: usize) {
        self.dims.resize(rank, 1);
    }

    /// Dimensions without the first axis.
    pub fn tail(&self) -> Dimensions {
        Self::from_slice(self.dims.get(1..).unwrap_or(&[]))
    }
}

/// Resize a flat n-d array from `old` to `new` shape.
///
/// Elements keep their multi-index position; cells outside the old shape
/// are filled with `fill`. Both shapes must have the same rank.
pub(crate) fn reshape<T: Clone>(values: &[T], old: &[u8], new: &[u8], fill: T) -> Vec<T> {
    debug_assert_eq!(old.len(), new.len());
    let new_len: usize = new.iter().map(|&d| d as usize).product();
    let mut out = Vec::with_capacity(new_len);
    let mut index = vec![0usize; new.len()];
    for _ in 0..new_len {
        let mut inside = true;
        let mut flat = 0usize;
        let mut stride = 1usize;
        for (axis, &i) in index.iter().enumerate() {
            if i >= old[axis] as usize {
                inside = false;
                break;
            }
            flat += i * stride;
            stride *= old[axis] as usize;
        }
        match values.get(flat) {
            Some(v) if inside => out.push(v.clone()),
            _ => out.push(fill.clone()),
        }
        // Advance the multi-index, axis 0 fastest.
        for (axis, i) in index.iter_mut().enumerate() {
            *i += 1;
            if *i < new[axis] as usize {
                break;
            }
            *i = 0;
        }
    }
    out
}

impl From<Vec<u8>> for Dimensions {
    fn from(v: Vec<u8>) -> Self {
        Self { dims: SmallVec::from_vec(v) }
    }
}

impl From<&[u8]> for Dimensions {
    fn from(v: &[u8]) -> Self {
        Self::from_slice(v)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar() {
        let d = Dimensions::scalar();
        assert_eq!(d.rank(), 0);
        assert!(d.is_scalar());
        assert_eq!(d.product(), 1);
        assert_eq!(d.trailing_product(), 1);
        assert_eq!(format!("{}", d), "[]");
    }

    #[test]
    fn test_2d() {
        let d = Dimensions::d2(32, 10);
        assert_eq!(d.rank(), 2);
        assert_eq!(d.size(0), Some(32));
        assert_eq!(d.product(), 320);
        assert_eq!(d.trailing_product(), 10);
        assert_eq!(d.tail().sizes(), &[10]);
        assert_eq!(format!("{}", d), "[32 x 10]");
    }

    #[test]
    fn test_mutate() {
        let mut d = Dimensions::scalar();
        d.push(10);
        d.push(20);
        assert_eq!(d.sizes(), &[10, 20]);

        d.set_size(3, 5);
        assert_eq!(d.sizes(), &[10, 20, 1, 5]);

        d.set_rank(1);
        assert_eq!(d.sizes(), &[10]);
    }

    #[test]
    fn test_reshape_keeps_positions() {
        // 2x2 -> 3x2: a new column is inserted after each row of axis 0
        let v = vec![1, 2, 3, 4];
        let out = reshape(&v, &[2, 2], &[3, 2], 0);
        assert_eq!(out, vec![1, 2, 0, 3, 4, 0]);

        let out = reshape(&v, &[2, 2], &[1, 3], 0);
        assert_eq!(out, vec![1, 3, 0]);
    }
}
