//! Fitting engine.
//!
//! Responsibilities:
//!
//! - damped Gauss–Newton iteration with box projection (`fitter`)
//! - robust weights and loss for IRLS (`robust`)
//! - parameter covariance and derived standard errors (`covariance`)
//! - parallel fitting of independent datasets (`batch`)

pub mod batch;
pub mod covariance;
pub mod fitter;
pub mod robust;

pub use batch::*;
pub use covariance::*;
pub use fitter::*;
pub use robust::{mad_scale, total_cost};
