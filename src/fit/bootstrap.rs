//! Bootstrap parameter uncertainties.
//!
//! Each resample draws a fraction of the radially-cut (unbinned) sample, bins
//! it if requested, reseeds a private copy of the profile with the caller's
//! original starting point, and refits. The resulting spread of (r200c, c),
//! scaled by `n_sigma`, is the error estimate; in relation mode the mean
//! intrinsic c-M scatter is added on top of the concentration spread.
//!
//! Resamples run in parallel. Each one owns its profile copy and an RNG
//! derived from the base seed and its index, so seeded runs are reproducible
//! regardless of scheduling.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::domain::{BootstrapOptions, FitConfig, ParamErrors};
use crate::error::{LensError, Result};
use crate::fit::fitter::fit_once;
use crate::fit::residual::FitMode;
use crate::lens::RadialProfile;
use crate::math::{mean, std_dev};
use crate::profile::AnalyticProfile;

#[derive(Debug, Clone, Copy)]
struct Draw {
    r200c: f64,
    c: f64,
    scatter: f64,
}

/// Draw `size` indices from `0..n`.
fn resample_indices(rng: &mut StdRng, n: usize, size: usize, replace: bool) -> Vec<usize> {
    if replace {
        (0..size).map(|_| rng.gen_range(0..n)).collect()
    } else {
        index::sample(rng, n, size).into_vec()
    }
}

pub(crate) fn bootstrap_errors<P: AnalyticProfile>(
    mode: FitMode<'_>,
    template: &P,
    sample: &RadialProfile,
    seed: (f64, f64),
    config: &FitConfig,
    opts: &BootstrapOptions,
    full_points: usize,
) -> Result<ParamErrors> {
    opts.validate()?;
    let n = sample.len();
    let size = (n as f64 * opts.fraction).floor() as usize;
    if size == 0 {
        return Err(LensError::config(format!(
            "bootstrap fraction {} of {n} sources selects no sources",
            opts.fraction
        )));
    }
    let base_seed = opts.seed.unwrap_or_else(rand::random);
    log::debug!(
        "bootstrap: {} resamples of {size}/{n} points (replace={}, seed={base_seed})",
        opts.count,
        opts.replace
    );

    let draws: Vec<Draw> = (0..opts.count)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
            let indices = resample_indices(&mut rng, n, size, opts.replace);
            let data = sample.select(&indices).prepare(config.binning.as_ref())?;
            if config.binning.is_some() && data.len() < full_points {
                log::warn!(
                    "bootstrap resample {i}: {} of {full_points} radial bins populated",
                    data.len()
                );
            }

            let mut trial = template.clone();
            let (_, estimate) = fit_once(
                mode,
                &mut trial,
                &data,
                seed,
                &config.r200c_bounds,
                &config.c_bounds,
                &config.solver,
            )?;
            Ok(Draw {
                r200c: trial.r200c(),
                c: trial.c(),
                scatter: estimate.map_or(0.0, |e| e.scatter),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let r200c: Vec<f64> = draws.iter().map(|d| d.r200c).collect();
    let c: Vec<f64> = draws.iter().map(|d| d.c).collect();
    let scatter: Vec<f64> = draws.iter().map(|d| d.scatter).collect();

    // `count > 0` is validated above, so the statistics exist.
    let r_spread = std_dev(&r200c).unwrap_or(0.0);
    let c_spread = std_dev(&c).unwrap_or(0.0);
    let c_scatter = mean(&scatter).unwrap_or(0.0);

    Ok(ParamErrors {
        r200c: opts.n_sigma * r_spread,
        c: opts.n_sigma * c_spread + c_scatter,
    })
}
