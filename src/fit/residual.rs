//! Residual evaluation for profile fits.
//!
//! Two parameterizations share one residual:
//!
//! - `FreeConcentration`: the free vector is `[r200c, c]`
//! - `RelationDerived`: the free vector is `[r200c]` and `c` follows from a
//!   concentration-mass relation evaluated at the mass implied by `r200c`
//!
//! The mode is chosen once per fit call. Every evaluation writes the trial
//! parameters into the profile it is handed, so concurrent evaluations must
//! each own a separate profile.

use std::fmt;

use crate::concentration::{ConcentrationEstimate, ConcentrationMass};
use crate::domain::Bounds;
use crate::lens::RadialProfile;
use crate::profile::AnalyticProfile;

#[derive(Clone, Copy)]
pub enum FitMode<'a> {
    FreeConcentration,
    RelationDerived(&'a dyn ConcentrationMass),
}

impl fmt::Debug for FitMode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMode::FreeConcentration => f.write_str("FreeConcentration"),
            FitMode::RelationDerived(rel) => f.debug_tuple("RelationDerived").field(rel).finish(),
        }
    }
}

impl<'a> FitMode<'a> {
    pub fn from_relation(relation: Option<&'a dyn ConcentrationMass>) -> Self {
        match relation {
            Some(rel) => FitMode::RelationDerived(rel),
            None => FitMode::FreeConcentration,
        }
    }

    /// Number of free parameters.
    pub fn n_params(&self) -> usize {
        match self {
            FitMode::FreeConcentration => 2,
            FitMode::RelationDerived(_) => 1,
        }
    }

    /// Initial guess from the profile's current state.
    pub fn seed(&self, r200c: f64, c: f64) -> Vec<f64> {
        match self {
            FitMode::FreeConcentration => vec![r200c, c],
            FitMode::RelationDerived(_) => vec![r200c],
        }
    }

    /// Lower and upper solver bounds.
    pub fn bounds(&self, r200c: &Bounds, c: &Bounds) -> (Vec<f64>, Vec<f64>) {
        match self {
            FitMode::FreeConcentration => (vec![r200c.lower, c.lower], vec![r200c.upper, c.upper]),
            FitMode::RelationDerived(_) => (vec![r200c.lower], vec![r200c.upper]),
        }
    }
}

/// Write `params` into `profile`.
///
/// In relation mode the concentration is re-derived from the new radius and
/// the relation's estimate (with its scatter) is returned.
pub fn apply_params<P: AnalyticProfile>(
    mode: FitMode<'_>,
    params: &[f64],
    profile: &mut P,
) -> Option<ConcentrationEstimate> {
    debug_assert_eq!(params.len(), mode.n_params());
    match mode {
        FitMode::FreeConcentration => {
            profile.set_r200c(params[0]);
            profile.set_c(params[1]);
            None
        }
        FitMode::RelationDerived(relation) => {
            profile.set_r200c(params[0]);
            let m200c = profile.radius_to_mass();
            let estimate = relation.estimate(m200c, profile.redshift(), profile.cosmology());
            profile.set_c(estimate.c);
            Some(estimate)
        }
    }
}

/// `ΔΣ_model(r) - ΔΣ_obs` after updating `profile` with `params`.
pub fn residual<P: AnalyticProfile>(
    mode: FitMode<'_>,
    params: &[f64],
    profile: &mut P,
    data: &RadialProfile,
) -> Vec<f64> {
    apply_params(mode, params, profile);
    profile
        .delta_sigma(&data.r)
        .into_iter()
        .zip(data.delta_sigma.iter())
        .map(|(model, observed)| model - observed)
        .collect()
}

/// Sum of squared residuals.
pub fn sum_squares(residuals: &[f64]) -> f64 {
    residuals.iter().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concentration::Child2018;
    use crate::cosmology::{Cosmology, FlatLambdaCdm};
    use crate::profile::NfwProfile;
    use std::sync::Arc;

    fn nfw() -> NfwProfile {
        let cosmo: Arc<dyn Cosmology> = Arc::new(FlatLambdaCdm::wmap7());
        NfwProfile::new(1.0, 4.0, 0.3, cosmo).unwrap()
    }

    #[test]
    fn free_mode_assigns_both_parameters() {
        let mut profile = nfw();
        let truth = {
            let mut p = nfw();
            p.set_r200c(1.3);
            p.set_c(5.5);
            p
        };
        let r = vec![0.2, 0.5, 1.0, 2.0];
        let data = RadialProfile::new(r.clone(), truth.delta_sigma(&r)).unwrap();

        let res = residual(FitMode::FreeConcentration, &[1.3, 5.5], &mut profile, &data);
        assert_eq!(profile.r200c(), 1.3);
        assert_eq!(profile.c(), 5.5);
        assert!(sum_squares(&res) < 1e-20);
    }

    #[test]
    fn relation_mode_derives_concentration_from_mass() {
        let relation = Child2018::default();
        let mode = FitMode::from_relation(Some(&relation));
        let mut profile = nfw();
        let data = RadialProfile::new(vec![0.5], vec![0.0]).unwrap();

        residual(mode, &[1.4], &mut profile, &data);
        let expected = relation.estimate(profile.radius_to_mass(), 0.3, profile.cosmology());
        assert_eq!(profile.r200c(), 1.4);
        assert!((profile.c() - expected.c).abs() < 1e-12);
    }

    #[test]
    fn mode_shapes_seed_and_bounds() {
        let relation = Child2018::default();
        let rb = Bounds::new(0.1, 3.0);
        let cb = Bounds::concentration();
        assert_eq!(FitMode::FreeConcentration.seed(1.0, 4.0), vec![1.0, 4.0]);
        let (lo, hi) = FitMode::RelationDerived(&relation).bounds(&rb, &cb);
        assert_eq!((lo, hi), (vec![0.1], vec![3.0]));
    }
}
