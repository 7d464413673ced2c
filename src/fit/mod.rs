//! Profile fitting.
//!
//! Responsibilities:
//!
//! - residual evaluation in free-concentration or relation-derived mode
//! - bounded least squares with optional bootstrap errors (parallel)
//! - brute-force cost surface over (r200c, c) (parallel)

pub mod bootstrap;
pub mod fitter;
pub mod grid_scan;
pub mod residual;

pub use fitter::*;
pub use grid_scan::*;
pub use residual::*;
