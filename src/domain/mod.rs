//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - unit, model and loss tags (`CurrentUnit`, `AreaUnit`, `ModelKind`, `LossKind`)
//! - model parameters and fit configuration (`ModelSpec`, `ParamBounds`, `FitConfig`)
//! - measured and normalized datasets (`JvDataset`, `NormalizedDataset`)
//! - fit outputs (`FitResult`, `CovarianceMatrix`, `FitQuality`, etc.)

pub mod dataset;
pub mod result;
pub mod types;

pub use dataset::*;
pub use result::*;
pub use types::*;
