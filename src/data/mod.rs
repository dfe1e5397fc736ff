//! Dataset preparation: unit normalization and synthetic sweeps.

pub mod normalize;
pub mod sample;

pub use normalize::*;
pub use sample::*;
