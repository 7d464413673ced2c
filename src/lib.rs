//! `shear-fit` library crate.
//!
//! Weak-lensing mass estimation for galaxy clusters:
//!
//! - `lens`: background catalog geometry, Σc and the observed ΔΣ profile
//! - `profile` / `concentration`: NFW model and concentration-mass relations
//! - `fit`: bounded least squares (with bootstrap errors) and grid scans
//! - `data`: synthetic catalogs for testing and forecasting

pub mod concentration;
pub mod cosmology;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod lens;
pub mod math;
pub mod profile;
