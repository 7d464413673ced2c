//! Shared option and result types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - built in code with sensible defaults
//! - loaded from a config file by a calling application
//! - logged or exported alongside fit results

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::math::{SolverOptions, SolverReport};

/// A closed `[lower, upper]` interval used as a tophat prior on one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Default concentration prior, `[0, 10]`.
    pub const fn concentration() -> Self {
        Self::new(0.0, 10.0)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !(self.lower.is_finite() && self.upper.is_finite()) {
            return Err(LensError::config(format!(
                "{name} bounds must be finite, got [{}, {}]",
                self.lower, self.upper
            )));
        }
        if self.lower >= self.upper {
            return Err(LensError::config(format!(
                "{name} bounds must satisfy lower < upper, got [{}, {}]",
                self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// Radial selection `[rmin, rmax)` in comoving Mpc/h.
///
/// `rmax = None` keeps every source out to the farthest one. An `rmax` beyond
/// the field of view is clamped to the farthest source as well, so the
/// outermost source is never lost to the half-open upper edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialCut {
    pub rmin: f64,
    pub rmax: Option<f64>,
}

impl Default for RadialCut {
    fn default() -> Self {
        Self {
            rmin: 0.0,
            rmax: None,
        }
    }
}

impl RadialCut {
    pub fn new(rmin: f64, rmax: Option<f64>) -> Self {
        Self { rmin, rmax }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rmin.is_finite() || self.rmin < 0.0 {
            return Err(LensError::config(format!(
                "rmin must be finite and >= 0, got {}",
                self.rmin
            )));
        }
        if let Some(rmax) = self.rmax {
            if rmax.is_nan() || rmax <= self.rmin {
                return Err(LensError::config(format!(
                    "rmax must exceed rmin, got [{}, {rmax})",
                    self.rmin
                )));
            }
        }
        Ok(())
    }
}

/// Radial binning of the per-source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binning {
    /// Equal-width bins spanning the observed radius range.
    Count(usize),
    /// Explicit, strictly increasing bin edges.
    Edges(Vec<f64>),
}

impl Binning {
    pub fn validate(&self) -> Result<()> {
        match self {
            Binning::Count(0) => Err(LensError::config(
                "binning requested with zero bins",
            )),
            Binning::Count(_) => Ok(()),
            Binning::Edges(edges) if edges.len() < 2 => Err(LensError::config(
                "binning requested without bin edges (need at least two)",
            )),
            Binning::Edges(edges) => {
                if edges.iter().any(|e| !e.is_finite()) {
                    return Err(LensError::config("bin edges must be finite"));
                }
                if edges.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(LensError::config("bin edges must be strictly increasing"));
                }
                Ok(())
            }
        }
    }
}

/// Bootstrap error-estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapOptions {
    /// Number of resampled refits.
    pub count: usize,
    /// Fraction of the catalog drawn per resample.
    pub fraction: f64,
    /// Draw with replacement.
    pub replace: bool,
    /// Multiplier on the bootstrap standard deviation (1 = 1σ, ~68%).
    pub n_sigma: f64,
    /// Base RNG seed; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            count: 1000,
            fraction: 1.0,
            replace: true,
            n_sigma: 1.0,
            seed: None,
        }
    }
}

impl BootstrapOptions {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(LensError::config("bootstrap count must be > 0"));
        }
        if !(self.fraction.is_finite() && self.fraction > 0.0) {
            return Err(LensError::config(format!(
                "bootstrap fraction must be finite and > 0, got {}",
                self.fraction
            )));
        }
        if !self.replace && self.fraction > 1.0 {
            return Err(LensError::config(format!(
                "bootstrap fraction {} > 1 requires resampling with replacement",
                self.fraction
            )));
        }
        if !(self.n_sigma.is_finite() && self.n_sigma > 0.0) {
            return Err(LensError::config(format!(
                "confidence multiplier must be finite and > 0, got {}",
                self.n_sigma
            )));
        }
        Ok(())
    }
}

/// Configuration for a least-squares profile fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Tophat prior on r200c (comoving Mpc/h).
    pub r200c_bounds: Bounds,
    /// Tophat prior on the concentration; ignored when a c-M relation drives c.
    #[serde(default = "Bounds::concentration")]
    pub c_bounds: Bounds,
    #[serde(default)]
    pub radial_cut: RadialCut,
    /// Fit per-bin means instead of per-source values.
    #[serde(default)]
    pub binning: Option<Binning>,
    /// Bootstrap error estimation; disabled when `None`.
    #[serde(default)]
    pub bootstrap: Option<BootstrapOptions>,
    #[serde(default)]
    pub solver: SolverOptions,
}

impl FitConfig {
    pub fn new(r200c_bounds: Bounds) -> Self {
        Self {
            r200c_bounds,
            c_bounds: Bounds::concentration(),
            radial_cut: RadialCut::default(),
            binning: None,
            bootstrap: None,
            solver: SolverOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.r200c_bounds.validate("r200c")?;
        self.c_bounds.validate("concentration")?;
        self.radial_cut.validate()?;
        if let Some(binning) = &self.binning {
            binning.validate()?;
        }
        if let Some(bootstrap) = &self.bootstrap {
            bootstrap.validate()?;
        }
        self.solver.validate()
    }
}

/// Configuration for a brute-force chi-squared grid scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridScanConfig {
    pub r200c_bounds: Bounds,
    #[serde(default = "Bounds::concentration")]
    pub c_bounds: Bounds,
    #[serde(default)]
    pub radial_cut: RadialCut,
    #[serde(default)]
    pub binning: Option<Binning>,
    /// Samples per axis.
    #[serde(default = "GridScanConfig::default_resolution")]
    pub resolution: usize,
}

impl GridScanConfig {
    pub fn new(r200c_bounds: Bounds, c_bounds: Bounds) -> Self {
        Self {
            r200c_bounds,
            c_bounds,
            radial_cut: RadialCut::default(),
            binning: None,
            resolution: Self::default_resolution(),
        }
    }

    fn default_resolution() -> usize {
        100
    }

    pub fn validate(&self) -> Result<()> {
        self.r200c_bounds.validate("r200c")?;
        self.c_bounds.validate("concentration")?;
        self.radial_cut.validate()?;
        if let Some(binning) = &self.binning {
            binning.validate()?;
        }
        if self.resolution < 2 {
            return Err(LensError::config("grid resolution must be >= 2"));
        }
        Ok(())
    }
}

/// One-sigma-scaled parameter uncertainties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamErrors {
    pub r200c: f64,
    pub c: f64,
}

/// Result of a least-squares fit.
///
/// The best-fit values are also written into the caller's profile; they are
/// repeated here so the outcome can be logged or exported on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOutcome {
    pub r200c: f64,
    pub c: f64,
    pub errors: ParamErrors,
    /// Number of (r, ΔΣ) points the full-data fit saw.
    pub n_points: usize,
    pub solver: SolverReport,
}

/// Sampled parameter plane and chi-squared surface of a grid scan.
///
/// All three matrices share one index convention: row `i` advances the
/// concentration, column `j` advances r200c.
#[derive(Debug, Clone, PartialEq)]
pub struct GridScan {
    pub r200c: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub cost: DMatrix<f64>,
}

/// Grid cell location and value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub r200c: f64,
    pub c: f64,
    pub cost: f64,
}

impl GridScan {
    /// The cell with the smallest finite cost (ties go to the lowest flat index).
    pub fn best(&self) -> Option<GridCell> {
        let mut best: Option<GridCell> = None;
        for row in 0..self.cost.nrows() {
            for col in 0..self.cost.ncols() {
                let cost = self.cost[(row, col)];
                if !cost.is_finite() {
                    continue;
                }
                if best.is_none_or(|b| cost < b.cost) {
                    best = Some(GridCell {
                        row,
                        col,
                        r200c: self.r200c[(row, col)],
                        c: self.c[(row, col)],
                        cost,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_reject_inverted_and_non_finite() {
        assert!(Bounds::new(1.0, 0.5).validate("r200c").is_err());
        assert!(Bounds::new(0.0, f64::INFINITY).validate("r200c").is_err());
        assert!(Bounds::new(0.1, 3.0).validate("r200c").is_ok());
    }

    #[test]
    fn empty_bin_edges_are_a_configuration_error() {
        let err = Binning::Edges(vec![]).validate().unwrap_err();
        assert!(matches!(err, LensError::Configuration(_)));
        assert!(Binning::Edges(vec![0.0, 1.0, 1.0]).validate().is_err());
        assert!(Binning::Count(0).validate().is_err());
        assert!(Binning::Count(8).validate().is_ok());
    }

    #[test]
    fn bootstrap_without_replacement_caps_fraction() {
        let opts = BootstrapOptions {
            replace: false,
            fraction: 1.5,
            ..BootstrapOptions::default()
        };
        assert!(opts.validate().is_err());
        assert!(BootstrapOptions::default().validate().is_ok());
    }

    #[test]
    fn fit_config_defaults_match_documented_values() {
        let cfg = FitConfig::new(Bounds::new(0.1, 3.0));
        assert_eq!(cfg.c_bounds, Bounds::new(0.0, 10.0));
        assert_eq!(cfg.radial_cut, RadialCut::default());
        assert!(cfg.binning.is_none());
        assert!(cfg.bootstrap.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn grid_best_picks_minimum_cost() {
        let r200c = DMatrix::from_fn(2, 3, |_, j| 1.0 + j as f64);
        let c = DMatrix::from_fn(2, 3, |i, _| 4.0 + i as f64);
        let cost = DMatrix::from_row_slice(2, 3, &[5.0, 3.0, 9.0, 7.0, 0.5, f64::NAN]);
        let scan = GridScan { r200c, c, cost };
        let best = scan.best().unwrap();
        assert_eq!((best.row, best.col), (1, 1));
        assert_eq!(best.r200c, 2.0);
        assert_eq!(best.c, 5.0);
    }
}
