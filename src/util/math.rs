//! Math type re-exports and small numeric helpers.

pub use glam::{DVec3, Vec3};

/// Largest absolute coordinate component over a set of samples.
///
/// Returns 0 for an empty input.
pub fn max_abs_component<'a>(samples: impl IntoIterator<Item = &'a DVec3>) -> f64 {
    samples
        .into_iter()
        .map(|v| v.abs().max_element())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_abs_component() {
        let v = [DVec3::new(1.0, -40.5, 3.0), DVec3::new(0.0, 2.0, 12.0)];
        assert_eq!(max_abs_component(&v), 40.5);
        assert_eq!(max_abs_component(&[]), 0.0);
    }
}
