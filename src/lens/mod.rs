//! Lensing geometry: background catalogs, projected radii, critical surface
//! density and the observed ΔΣ profile.

pub mod catalog;
pub mod radial;
pub mod system;

pub use catalog::{Background, ShearMode, SourceCatalog, SourceUpdate};
pub use radial::*;
pub use system::*;
