//! Navarro-Frenk-White profile with the Wright & Brainerd (2000) lensing
//! closed forms.
//!
//! With `x = r / r_s`, `r_s = r200c / c` and
//! `δ_c = (200/3) c³ / (ln(1+c) - c/(1+c))`, the excess surface density is
//!
//! ```text
//! ΔΣ(r) = r_s δ_c ρ_crit g(x)
//! ```
//!
//! where `g` has separate branches for `x < 1`, `x = 1`, `x > 1`. All lengths
//! are comoving (Mpc/h) and `ρ_crit` is expressed per comoving volume, so the
//! result is in comoving `(M_sun/h) / (pc/h)^2`, the same units as the
//! critical surface density of the lens system.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::cosmology::{Cosmology, MPC2_TO_PC2};
use crate::error::{LensError, Result};
use crate::profile::AnalyticProfile;

/// Half-width around `x = 1` where the analytic limit replaces the branches,
/// whose terms cancel catastrophically there.
const X_ONE_EPS: f64 = 1e-6;

#[derive(Clone)]
pub struct NfwProfile {
    r200c: f64,
    c: f64,
    r200c_err: f64,
    c_err: f64,
    zl: f64,
    cosmo: Arc<dyn Cosmology>,
}

impl fmt::Debug for NfwProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NfwProfile")
            .field("r200c", &self.r200c)
            .field("c", &self.c)
            .field("r200c_err", &self.r200c_err)
            .field("c_err", &self.c_err)
            .field("zl", &self.zl)
            .finish()
    }
}

impl NfwProfile {
    pub fn new(r200c: f64, c: f64, zl: f64, cosmo: Arc<dyn Cosmology>) -> Result<Self> {
        if !(r200c.is_finite() && r200c > 0.0) {
            return Err(LensError::config(format!("r200c must be finite and > 0, got {r200c}")));
        }
        if !(c.is_finite() && c > 0.0) {
            return Err(LensError::config(format!("concentration must be finite and > 0, got {c}")));
        }
        if !(zl.is_finite() && zl >= 0.0) {
            return Err(LensError::config(format!("halo redshift must be >= 0, got {zl}")));
        }
        Ok(Self {
            r200c,
            c,
            r200c_err: 0.0,
            c_err: 0.0,
            zl,
            cosmo,
        })
    }

    /// Build from a halo mass (M_sun/h) instead of a radius.
    pub fn from_mass(m200c: f64, c: f64, zl: f64, cosmo: Arc<dyn Cosmology>) -> Result<Self> {
        if !(m200c.is_finite() && m200c > 0.0) {
            return Err(LensError::config(format!("m200c must be finite and > 0, got {m200c}")));
        }
        let r200c = mass_to_radius(m200c, zl, cosmo.as_ref());
        Self::new(r200c, c, zl, cosmo)
    }

    /// Scale radius `r200c / c`, comoving Mpc/h.
    pub fn scale_radius(&self) -> f64 {
        self.r200c / self.c
    }

    /// Characteristic overdensity `δ_c`.
    pub fn delta_c(&self) -> f64 {
        let c = self.c;
        (200.0 / 3.0) * c * c * c / ((1.0 + c).ln() - c / (1.0 + c))
    }

    /// Critical density at the halo redshift per comoving volume,
    /// `(M_sun/h) / (Mpc/h)^3`.
    fn comoving_critical_density(&self) -> f64 {
        comoving_critical_density(self.zl, self.cosmo.as_ref())
    }
}

fn comoving_critical_density(z: f64, cosmo: &dyn Cosmology) -> f64 {
    let a = 1.0 / (1.0 + z);
    cosmo.critical_density(z) * a * a * a
}

/// r200c (comoving Mpc/h) enclosing `m200c` (M_sun/h) at redshift `z`.
pub fn mass_to_radius(m200c: f64, z: f64, cosmo: &dyn Cosmology) -> f64 {
    let rho = comoving_critical_density(z, cosmo);
    (3.0 * m200c / (4.0 * PI * 200.0 * rho)).cbrt()
}

/// Dimensionless Wright & Brainerd shape function for ΔΣ.
pub fn delta_sigma_shape(x: f64) -> f64 {
    if (x - 1.0).abs() < X_ONE_EPS {
        return 10.0 / 3.0 + 4.0 * 0.5_f64.ln();
    }
    let x2 = x * x;
    let log_term = 4.0 / x2 * (x / 2.0).ln() - 2.0 / (x2 - 1.0);
    if x < 1.0 {
        let s = (1.0 - x2).sqrt();
        let at = ((1.0 - x) / (1.0 + x)).sqrt().atanh();
        8.0 * at / (x2 * s) + log_term + 4.0 * at / ((x2 - 1.0) * s)
    } else {
        let s = (x2 - 1.0).sqrt();
        let at = ((x - 1.0) / (1.0 + x)).sqrt().atan();
        8.0 * at / (x2 * s) + log_term + 4.0 * at / (s * s * s)
    }
}

impl AnalyticProfile for NfwProfile {
    fn r200c(&self) -> f64 {
        self.r200c
    }

    fn set_r200c(&mut self, r200c: f64) {
        self.r200c = r200c;
    }

    fn c(&self) -> f64 {
        self.c
    }

    fn set_c(&mut self, c: f64) {
        self.c = c;
    }

    fn r200c_err(&self) -> f64 {
        self.r200c_err
    }

    fn set_r200c_err(&mut self, err: f64) {
        self.r200c_err = err;
    }

    fn c_err(&self) -> f64 {
        self.c_err
    }

    fn set_c_err(&mut self, err: f64) {
        self.c_err = err;
    }

    fn redshift(&self) -> f64 {
        self.zl
    }

    fn cosmology(&self) -> &dyn Cosmology {
        self.cosmo.as_ref()
    }

    fn delta_sigma(&self, r: &[f64]) -> Vec<f64> {
        let rs = self.scale_radius();
        let amplitude = rs * self.delta_c() * self.comoving_critical_density() / MPC2_TO_PC2;
        r.iter().map(|&ri| amplitude * delta_sigma_shape(ri / rs)).collect()
    }

    fn radius_to_mass(&self) -> f64 {
        let rho = self.comoving_critical_density();
        4.0 / 3.0 * PI * self.r200c.powi(3) * 200.0 * rho
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmology::FlatLambdaCdm;
    use approx::assert_relative_eq;

    fn cosmo() -> Arc<dyn Cosmology> {
        Arc::new(FlatLambdaCdm::wmap7())
    }

    #[test]
    fn delta_sigma_is_positive_and_decreasing() {
        let nfw = NfwProfile::new(1.2, 4.0, 0.3, cosmo()).unwrap();
        let r: Vec<f64> = (1..200).map(|i| 0.02 * i as f64).collect();
        let ds = nfw.delta_sigma(&r);
        assert!(ds.iter().all(|v| v.is_finite() && *v > 0.0));
        for w in ds.windows(2) {
            assert!(w[1] <= w[0], "ΔΣ must not increase with radius: {} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn shape_is_continuous_across_scale_radius() {
        let at_one = delta_sigma_shape(1.0);
        assert_relative_eq!(delta_sigma_shape(1.0 - 1e-4), at_one, max_relative = 1e-3);
        assert_relative_eq!(delta_sigma_shape(1.0 + 1e-4), at_one, max_relative = 1e-3);
    }

    #[test]
    fn mass_radius_round_trip() {
        let c = cosmo();
        let nfw = NfwProfile::from_mass(3e14, 5.0, 0.4, c).unwrap();
        assert_relative_eq!(nfw.radius_to_mass(), 3e14, max_relative = 1e-10);
        // A 3e14 M_sun/h cluster has r200c of order 1 comoving Mpc/h.
        assert!(nfw.r200c() > 0.5 && nfw.r200c() < 2.0, "r200c = {}", nfw.r200c());
    }

    #[test]
    fn rejects_non_physical_parameters() {
        assert!(NfwProfile::new(0.0, 4.0, 0.3, cosmo()).is_err());
        assert!(NfwProfile::new(1.0, f64::NAN, 0.3, cosmo()).is_err());
    }
}
