//! Concentration-mass relations.
//!
//! A relation maps a halo mass (and optionally redshift and cosmology) to a
//! concentration estimate plus its intrinsic scatter. The fitter uses one to
//! collapse the (r200c, c) parameter space to r200c alone.

pub mod child2018;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cosmology::Cosmology;

pub use child2018::*;

/// Concentration estimate with intrinsic scatter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationEstimate {
    pub c: f64,
    pub scatter: f64,
}

pub trait ConcentrationMass: fmt::Debug + Send + Sync {
    /// Concentration for `m200c` (M_sun/h) at redshift `z`.
    fn estimate(&self, m200c: f64, z: f64, cosmo: &dyn Cosmology) -> ConcentrationEstimate;
}
