//! Analytic halo profiles.
//!
//! The fitter only talks to a profile through `AnalyticProfile`: it mutates
//! `r200c` / `c` in place on every residual evaluation, evaluates ΔΣ(r), and
//! converts the current radius to a mass for concentration-mass relations.
//! Profiles must be `Clone` so bootstrap resamples and grid cells can each work
//! on a private copy.

pub mod nfw;

use crate::cosmology::Cosmology;

pub use nfw::*;

pub trait AnalyticProfile: Clone + Send + Sync {
    /// Halo radius enclosing 200× the critical density, comoving Mpc/h.
    fn r200c(&self) -> f64;
    fn set_r200c(&mut self, r200c: f64);

    fn c(&self) -> f64;
    fn set_c(&mut self, c: f64);

    fn r200c_err(&self) -> f64;
    fn set_r200c_err(&mut self, err: f64);

    fn c_err(&self) -> f64;
    fn set_c_err(&mut self, err: f64);

    /// Halo redshift.
    fn redshift(&self) -> f64;

    fn cosmology(&self) -> &dyn Cosmology;

    /// Excess surface density at comoving radii `r` (Mpc/h), in comoving
    /// `(M_sun/h) / (pc/h)^2`.
    fn delta_sigma(&self, r: &[f64]) -> Vec<f64>;

    /// M200c implied by the current `r200c`, in M_sun/h.
    fn radius_to_mass(&self) -> f64;
}
