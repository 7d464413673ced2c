//! Parameter grid generation.

use crate::error::{LensError, Result};

/// Generate `steps` linearly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(LensError::config(format!(
            "Invalid grid range: min={min}, max={max} (must be finite and max>min)."
        )));
    }
    if steps < 2 {
        return Err(LensError::config("Grid steps must be >= 2."));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out: Vec<f64> = (0..steps).map(|i| min + step * i as f64).collect();
    // Pin the endpoint so accumulated rounding never pushes it past `max`.
    out[steps - 1] = max;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lin_space_includes_endpoints() {
        let v = lin_space(0.5, 2.5, 5).unwrap();
        assert_eq!(v.len(), 5);
        assert!((v[0] - 0.5).abs() < 1e-12);
        assert!((v[2] - 1.5).abs() < 1e-12);
        assert_eq!(v[4], 2.5);
    }

    #[test]
    fn lin_space_rejects_degenerate_input() {
        assert!(lin_space(1.0, 1.0, 5).is_err());
        assert!(lin_space(0.0, 1.0, 1).is_err());
        assert!(lin_space(f64::NAN, 1.0, 3).is_err());
    }
}
