#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// photometric adjustments (brightness, channel shift).
pub mod enhance;

/// image flipping module.
pub mod flip;

/// utilities for interpolation.
pub mod interpolation;

/// module containing parallization utilities.
pub mod parallel;

/// image geometric transformations module.
pub mod warp;
