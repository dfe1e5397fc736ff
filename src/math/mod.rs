//! Mathematical utilities: least squares, damped normal equations, root finding.

pub mod linalg;
pub mod ols;
pub mod roots;

pub use linalg::*;
pub use ols::*;
pub use roots::*;
