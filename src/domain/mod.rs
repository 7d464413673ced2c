//! Domain types used throughout the fitting pipeline.
//!
//! This module defines:
//!
//! - parameter priors and data selection (`Bounds`, `RadialCut`, `Binning`)
//! - run configuration (`FitConfig`, `GridScanConfig`, `BootstrapOptions`)
//! - fit outputs (`FitOutcome`, `ParamErrors`, `GridScan`)

pub mod types;

pub use types::*;
