//! Brute-force chi-squared surface over (r200c, c).
//!
//! Useful as a diagnostic next to the least-squares fit: it shows degeneracies
//! and secondary minima the local solver cannot. The caller's profile is only
//! read; each row of the grid is evaluated on its own copy, in parallel.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{GridScan, GridScanConfig};
use crate::error::Result;
use crate::fit::residual::{FitMode, residual, sum_squares};
use crate::lens::LensSystem;
use crate::math::lin_space;
use crate::profile::AnalyticProfile;

/// Evaluate the sum of squared residuals on an `n × n` linear grid.
///
/// Row `i` of every returned matrix corresponds to the `i`-th concentration
/// sample and column `j` to the `j`-th r200c sample. Cells where the profile
/// is undefined (e.g. `c = 0`) hold a non-finite cost.
pub fn fit_grid_scan<P: AnalyticProfile>(
    lens: &LensSystem,
    profile: &P,
    config: &GridScanConfig,
) -> Result<GridScan> {
    config.validate()?;
    let data = lens
        .radial_profile(&config.radial_cut)?
        .prepare(config.binning.as_ref())?;

    let n = config.resolution;
    let r_samples = lin_space(config.r200c_bounds.lower, config.r200c_bounds.upper, n)?;
    let c_samples = lin_space(config.c_bounds.lower, config.c_bounds.upper, n)?;
    log::debug!("grid scan: {n}x{n} cells over {} points", data.len());

    let rows: Vec<Vec<f64>> = c_samples
        .par_iter()
        .map(|&c| {
            let mut trial = profile.clone();
            r_samples
                .iter()
                .map(|&r200c| {
                    let res = residual(FitMode::FreeConcentration, &[r200c, c], &mut trial, &data);
                    sum_squares(&res)
                })
                .collect()
        })
        .collect();

    Ok(GridScan {
        r200c: DMatrix::from_fn(n, n, |_, j| r_samples[j]),
        c: DMatrix::from_fn(n, n, |i, _| c_samples[i]),
        cost: DMatrix::from_fn(n, n, |i, j| rows[i][j]),
    })
}
