//! Flat ΛCDM with matter, radiation and a cosmological constant.

use serde::{Deserialize, Serialize};

use crate::cosmology::{C_KM_PER_S, Cosmology};
use crate::error::{LensError, Result};

/// Photon density `Ω_γ h²` per `T_cmb⁴` (K⁻⁴).
const OMEGA_GAMMA_H2_PER_T4: f64 = 4.481_31e-7;

/// Massless-neutrino energy density per effective species, relative to photons.
const NEUTRINO_PER_SPECIES: f64 = 0.227_107_317_66;

/// Simpson panels per unit redshift for the distance integral.
const PANELS_PER_UNIT_Z: f64 = 512.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatLambdaCdm {
    /// Hubble constant, km/s/Mpc.
    pub h0: f64,
    /// Matter density today.
    pub om0: f64,
    /// Radiation (photons + massless neutrinos) density today.
    pub or0: f64,
}

impl FlatLambdaCdm {
    /// Matter + Λ only (no radiation).
    pub fn new(h0: f64, om0: f64) -> Result<Self> {
        Self::with_radiation(h0, om0, 0.0)
    }

    pub fn with_radiation(h0: f64, om0: f64, or0: f64) -> Result<Self> {
        if !(h0.is_finite() && h0 > 0.0) {
            return Err(LensError::config(format!("H0 must be finite and > 0, got {h0}")));
        }
        if !(om0.is_finite() && or0.is_finite() && om0 >= 0.0 && or0 >= 0.0 && om0 + or0 <= 1.0) {
            return Err(LensError::config(format!(
                "density parameters must be non-negative and sum to <= 1, got Om0={om0}, Or0={or0}"
            )));
        }
        Ok(Self { h0, om0, or0 })
    }

    /// Radiation density derived from the CMB temperature and `N_eff`.
    pub fn with_cmb(h0: f64, om0: f64, tcmb0: f64, neff: f64) -> Result<Self> {
        if !(tcmb0.is_finite() && tcmb0 >= 0.0 && neff.is_finite() && neff >= 0.0) {
            return Err(LensError::config(format!(
                "CMB temperature and N_eff must be finite and >= 0, got Tcmb0={tcmb0}, Neff={neff}"
            )));
        }
        Self::with_radiation(h0, om0, cmb_radiation(h0, tcmb0, neff))
    }

    /// WMAP 7-year parameters (Komatsu et al. 2011).
    pub fn wmap7() -> Self {
        Self {
            h0: 70.4,
            om0: 0.272,
            or0: cmb_radiation(70.4, 2.725, 3.04),
        }
    }

    pub fn ode0(&self) -> f64 {
        1.0 - self.om0 - self.or0
    }

    /// Hubble distance `c / H0`, Mpc.
    pub fn hubble_distance(&self) -> f64 {
        C_KM_PER_S / self.h0
    }

    fn inv_efunc(&self, z: f64) -> f64 {
        1.0 / self.efunc(z)
    }
}

impl Default for FlatLambdaCdm {
    fn default() -> Self {
        Self::wmap7()
    }
}

impl Cosmology for FlatLambdaCdm {
    fn h(&self) -> f64 {
        self.h0 / 100.0
    }

    fn efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        let zp1_3 = zp1 * zp1 * zp1;
        (self.om0 * zp1_3 + self.or0 * zp1_3 * zp1 + self.ode0()).sqrt()
    }

    fn comoving_distance(&self, z: f64) -> f64 {
        if z == 0.0 {
            return 0.0;
        }
        // Composite Simpson's rule on an even panel count.
        let mut panels = (z.abs() * PANELS_PER_UNIT_Z).ceil() as usize;
        panels = panels.max(64);
        if panels % 2 == 1 {
            panels += 1;
        }
        let step = z / panels as f64;
        let mut acc = self.inv_efunc(0.0) + self.inv_efunc(z);
        for i in 1..panels {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            acc += weight * self.inv_efunc(step * i as f64);
        }
        self.hubble_distance() * acc * step / 3.0
    }
}

/// Photon plus massless-neutrino density today.
fn cmb_radiation(h0: f64, tcmb0: f64, neff: f64) -> f64 {
    let h = h0 / 100.0;
    let og0 = OMEGA_GAMMA_H2_PER_T4 * tcmb0.powi(4) / (h * h);
    og0 * (1.0 + NEUTRINO_PER_SPECIES * neff)
}
