//! Tunneling model implementations.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic.

pub mod bdr;
pub mod constants;
pub mod guess;
pub mod jacobian;
pub mod model;
pub mod simmons;

pub use constants::*;
pub use guess::*;
pub use jacobian::*;
pub use model::*;
