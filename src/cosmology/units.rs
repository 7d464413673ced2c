//! Physical constants in the unit system used by the lensing formulas.
//!
//! Lengths are Mpc, masses M_sun, times Gyr (Julian).

/// Newton's constant, Mpc^3 M_sun^-1 Gyr^-2.
pub const G_MPC3_PER_MSUN_GYR2: f64 = 4.498502151469553e-15;

/// Speed of light, Mpc / Gyr.
pub const C_MPC_PER_GYR: f64 = 306.601_393_785_550_56;

/// Speed of light, km / s.
pub const C_KM_PER_S: f64 = 299_792.458;

/// Critical density today for `H0 = 100 km/s/Mpc`, in M_sun / Mpc^3.
///
/// Multiplying by `h^2` gives the physical density; read directly it is the
/// density in `(M_sun/h) / (Mpc/h)^3`.
pub const RHO_CRIT_H2_MSUN_MPC3: f64 = 2.775_366_272_458_308e11;

/// Mpc^2 to pc^2.
pub const MPC2_TO_PC2: f64 = 1e12;
