//! Child et al. (2018) power-law c-M relation for c200c.
//!
//! `c = A (1+z)^d M^m` with `M` in M_sun/h, fitted to individual halos in
//! N-body simulations. The relative intrinsic scatter is roughly one third.

use serde::{Deserialize, Serialize};

use crate::concentration::{ConcentrationEstimate, ConcentrationMass};
use crate::cosmology::Cosmology;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Child2018 {
    pub amplitude: f64,
    pub z_slope: f64,
    pub mass_slope: f64,
    /// Intrinsic scatter as a fraction of `c`.
    pub relative_scatter: f64,
}

impl Default for Child2018 {
    fn default() -> Self {
        Self {
            amplitude: 57.6,
            z_slope: -0.376,
            mass_slope: -0.078,
            relative_scatter: 1.0 / 3.0,
        }
    }
}

impl ConcentrationMass for Child2018 {
    fn estimate(&self, m200c: f64, z: f64, _cosmo: &dyn Cosmology) -> ConcentrationEstimate {
        let c = self.amplitude * (1.0 + z).powf(self.z_slope) * m200c.powf(self.mass_slope);
        ConcentrationEstimate {
            c,
            scatter: c * self.relative_scatter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmology::FlatLambdaCdm;

    #[test]
    fn concentration_falls_with_mass_and_redshift() {
        let rel = Child2018::default();
        let cosmo = FlatLambdaCdm::wmap7();
        let lo = rel.estimate(1e13, 0.3, &cosmo);
        let hi = rel.estimate(1e15, 0.3, &cosmo);
        let far = rel.estimate(1e13, 1.0, &cosmo);
        assert!(hi.c < lo.c);
        assert!(far.c < lo.c);
        // Cluster-scale halos sit around c ~ 3-5.
        assert!(hi.c > 2.0 && lo.c < 6.0, "c(1e15)={}, c(1e13)={}", hi.c, lo.c);
        assert!((lo.scatter - lo.c / 3.0).abs() < 1e-12);
    }
}
