//! Synthetic background catalogs.

pub mod sample;

pub use sample::*;
