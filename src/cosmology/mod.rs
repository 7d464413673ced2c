//! Background cosmology.
//!
//! The lensing geometry only needs a handful of queries at a redshift:
//!
//! - line-of-sight comoving distance
//! - angular-diameter distance
//! - the dimensionless Hubble parameter `h`
//! - `E(z) = H(z)/H0` (for the critical density used by the profile)
//!
//! Every formula downstream assumes a spatially flat universe. Implementations
//! report their curvature through `omega_k` so callers can refuse non-flat
//! models instead of silently mis-computing `D_ls`.

pub mod flat;
pub mod units;

use std::fmt;

pub use flat::*;
pub use units::*;

pub trait Cosmology: fmt::Debug + Send + Sync {
    /// `H0 / (100 km/s/Mpc)`.
    fn h(&self) -> f64;

    /// `H(z) / H0`.
    fn efunc(&self, z: f64) -> f64;

    /// Line-of-sight comoving distance to `z`, in Mpc.
    fn comoving_distance(&self, z: f64) -> f64;

    /// Angular-diameter distance to `z`, in Mpc.
    fn angular_diameter_distance(&self, z: f64) -> f64 {
        self.comoving_distance(z) / (1.0 + z)
    }

    /// Curvature density parameter today.
    fn omega_k(&self) -> f64 {
        0.0
    }

    /// Critical density at `z`, in `(M_sun/h) / (Mpc/h)^3`.
    fn critical_density(&self, z: f64) -> f64 {
        let e = self.efunc(z);
        RHO_CRIT_H2_MSUN_MPC3 * e * e
    }
}
