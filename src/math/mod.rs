//! Numerical utilities: bounded least squares, parameter grids, statistics.

pub mod grid;
pub mod least_squares;
pub mod stats;

pub use grid::*;
pub use least_squares::*;
pub use stats::*;
