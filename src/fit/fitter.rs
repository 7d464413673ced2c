//! Least-squares NFW fit to an observed ΔΣ profile.
//!
//! Given:
//! - a lens system with a background catalog
//! - a profile whose current `(r200c, c)` seeds the solver
//! - an optional concentration-mass relation
//!
//! we:
//! - extract (r, ΔΣ) inside the radial cut, binning if requested
//! - minimize the residual over the free parameters within their bounds
//! - write the best fit (and its errors) back into the caller's profile
//!
//! Errors are zero unless bootstrap is enabled, except that in relation mode
//! the concentration error is the relation's intrinsic scatter.

use crate::concentration::{ConcentrationEstimate, ConcentrationMass};
use crate::domain::{Bounds, FitConfig, FitOutcome, ParamErrors};
use crate::error::{LensError, Result};
use crate::fit::bootstrap::bootstrap_errors;
use crate::fit::residual::{FitMode, apply_params, residual};
use crate::lens::{LensSystem, RadialProfile};
use crate::math::{SolverOptions, SolverReport, least_squares};
use crate::profile::AnalyticProfile;

/// Fit `profile` to the lens system's ΔΣ profile.
///
/// On success `profile` holds the full-data best fit and the error fields;
/// bootstrap resamples run on private copies and never touch it otherwise.
/// On failure `profile` is restored to its state before the call.
///
/// # Errors
/// - `Configuration` for invalid bounds, cuts, bins or bootstrap settings, or a
///   seed outside the bounds
/// - `State` without a background catalog
/// - `Domain` for non-finite ΔΣ or residuals
/// - `Convergence` when the solver exhausts its budget (full fit or any
///   bootstrap resample)
pub fn fit_least_squares<P: AnalyticProfile>(
    lens: &LensSystem,
    profile: &mut P,
    config: &FitConfig,
    relation: Option<&dyn ConcentrationMass>,
) -> Result<FitOutcome> {
    config.validate()?;
    let mode = FitMode::from_relation(relation);
    let seed = (profile.r200c(), profile.c());
    check_seed(mode, seed, config)?;

    let snapshot = profile.clone();
    let outcome = fit_in_place(lens, profile, config, mode, seed);
    if outcome.is_err() {
        *profile = snapshot;
    }
    outcome
}

fn check_seed(mode: FitMode<'_>, seed: (f64, f64), config: &FitConfig) -> Result<()> {
    if !config.r200c_bounds.contains(seed.0) {
        return Err(LensError::config(format!(
            "initial r200c {} is outside bounds [{}, {}]",
            seed.0, config.r200c_bounds.lower, config.r200c_bounds.upper
        )));
    }
    if matches!(mode, FitMode::FreeConcentration) && !config.c_bounds.contains(seed.1) {
        return Err(LensError::config(format!(
            "initial concentration {} is outside bounds [{}, {}]",
            seed.1, config.c_bounds.lower, config.c_bounds.upper
        )));
    }
    Ok(())
}

fn fit_in_place<P: AnalyticProfile>(
    lens: &LensSystem,
    profile: &mut P,
    config: &FitConfig,
    mode: FitMode<'_>,
    seed: (f64, f64),
) -> Result<FitOutcome> {
    let sample = lens.radial_profile(&config.radial_cut)?;
    let data = sample.prepare(config.binning.as_ref())?;

    let (solver, estimate) = fit_once(
        mode,
        profile,
        &data,
        seed,
        &config.r200c_bounds,
        &config.c_bounds,
        &config.solver,
    )?;

    let errors = match &config.bootstrap {
        Some(opts) => bootstrap_errors(mode, profile, &sample, seed, config, opts, data.len())?,
        None => ParamErrors {
            r200c: 0.0,
            c: estimate.map_or(0.0, |e| e.scatter),
        },
    };
    profile.set_r200c_err(errors.r200c);
    profile.set_c_err(errors.c);

    log::debug!(
        "fit {:?}: r200c = {:.4} ± {:.4}, c = {:.3} ± {:.3} from {} points (cost {:.4e})",
        mode,
        profile.r200c(),
        errors.r200c,
        profile.c(),
        errors.c,
        data.len(),
        solver.cost
    );

    Ok(FitOutcome {
        r200c: profile.r200c(),
        c: profile.c(),
        errors,
        n_points: data.len(),
        solver,
    })
}

/// Seed `profile`, minimize, and leave the converged parameters in `profile`.
///
/// The solver's last residual evaluation may have been a rejected trial point,
/// so the converged vector is re-applied explicitly.
pub(crate) fn fit_once<P: AnalyticProfile>(
    mode: FitMode<'_>,
    profile: &mut P,
    data: &RadialProfile,
    seed: (f64, f64),
    r200c_bounds: &Bounds,
    c_bounds: &Bounds,
    solver: &SolverOptions,
) -> Result<(SolverReport, Option<ConcentrationEstimate>)> {
    profile.set_r200c(seed.0);
    profile.set_c(seed.1);

    let x0 = mode.seed(seed.0, seed.1);
    let (lower, upper) = mode.bounds(r200c_bounds, c_bounds);
    let report = least_squares(
        |params| residual(mode, params, profile, data),
        &x0,
        &lower,
        &upper,
        solver,
    )?;

    let estimate = apply_params(mode, &report.x, profile);
    Ok((report, estimate))
}
