//! Radial (r, ΔΣ) data handed to the fitter.

use serde::{Deserialize, Serialize};

use crate::domain::{Binning, RadialCut};
use crate::error::{LensError, Result};
use crate::math::{bin_edges, binned_mean};

/// Paired halo-centric radii (comoving Mpc/h) and observed ΔΣ values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadialProfile {
    pub r: Vec<f64>,
    pub delta_sigma: Vec<f64>,
}

impl RadialProfile {
    pub fn new(r: Vec<f64>, delta_sigma: Vec<f64>) -> Result<Self> {
        if r.len() != delta_sigma.len() {
            return Err(LensError::config(format!(
                "radius / ΔΣ length mismatch: {} vs {}",
                r.len(),
                delta_sigma.len()
            )));
        }
        Ok(Self { r, delta_sigma })
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    /// Keep points with `rmin <= r < rmax`.
    ///
    /// A missing `rmax`, or one beyond the farthest point, keeps everything out
    /// to and including the farthest point.
    pub fn cut(&self, cut: &RadialCut) -> Result<Self> {
        cut.validate()?;
        let r_far = self.r.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let rmax = cut.rmax.filter(|&rmax| rmax <= r_far);

        let (r, delta_sigma): (Vec<f64>, Vec<f64>) = self
            .r
            .iter()
            .zip(self.delta_sigma.iter())
            .filter(|&(&ri, _)| ri >= cut.rmin && rmax.is_none_or(|rmax| ri < rmax))
            .map(|(&ri, &di)| (ri, di))
            .unzip();

        if r.is_empty() {
            return Err(LensError::config(format!(
                "radial cut [{}, {:?}) removed every source",
                cut.rmin, cut.rmax
            )));
        }
        Ok(Self { r, delta_sigma })
    }

    /// Per-bin mean radius and mean ΔΣ. Bins without points are dropped.
    pub fn binned(&self, binning: &Binning) -> Result<Self> {
        let edges = bin_edges(&self.r, binning)?;
        let r_mean = binned_mean(&self.r, &self.r, &edges)?;
        let ds_mean = binned_mean(&self.r, &self.delta_sigma, &edges)?;

        let (r, delta_sigma): (Vec<f64>, Vec<f64>) = r_mean
            .into_iter()
            .zip(ds_mean)
            .filter(|(ri, di)| !ri.is_nan() && !di.is_nan())
            .unzip();

        if r.is_empty() {
            return Err(LensError::config("every radial bin is empty"));
        }
        Ok(Self { r, delta_sigma })
    }

    /// Gather the points at `indices` (repeats allowed).
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            r: indices.iter().map(|&i| self.r[i]).collect(),
            delta_sigma: indices.iter().map(|&i| self.delta_sigma[i]).collect(),
        }
    }

    /// Bin if requested, otherwise hand back a copy.
    pub fn prepare(&self, binning: Option<&Binning>) -> Result<Self> {
        match binning {
            Some(binning) => self.binned(binning),
            None => Ok(self.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RadialProfile {
        let r = vec![0.1, 0.5, 1.0, 1.5, 2.0];
        RadialProfile::new(r, vec![50.0, 30.0, 20.0, 15.0, 10.0]).unwrap()
    }

    #[test]
    fn default_cut_keeps_farthest_point() {
        let p = sample().cut(&RadialCut::default()).unwrap();
        assert_eq!(p.len(), 5);
        // rmax beyond the field of view is clamped the same way.
        let p = sample().cut(&RadialCut::new(0.0, Some(10.0))).unwrap();
        assert_eq!(p.len(), 5);
    }

    #[test]
    fn cut_is_half_open() {
        let p = sample().cut(&RadialCut::new(0.5, Some(1.5))).unwrap();
        assert_eq!(p.r, vec![0.5, 1.0]);
        assert_eq!(p.delta_sigma, vec![30.0, 20.0]);
    }

    #[test]
    fn cut_removing_everything_is_an_error() {
        assert!(sample().cut(&RadialCut::new(5.0, None)).is_err());
    }

    #[test]
    fn binning_averages_both_axes() {
        let p = sample().binned(&Binning::Edges(vec![0.0, 1.0, 2.0])).unwrap();
        assert_eq!(p.len(), 2);
        assert!((p.r[0] - 0.3).abs() < 1e-12);
        assert!((p.delta_sigma[0] - 40.0).abs() < 1e-12);
        assert!((p.r[1] - 1.5).abs() < 1e-12);
        assert!((p.delta_sigma[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn binning_without_edges_fails() {
        let err = sample().binned(&Binning::Edges(vec![])).unwrap_err();
        assert!(matches!(err, LensError::Configuration(_)));
    }
}
