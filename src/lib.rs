//! `jvfit` library crate.
//!
//! Tunneling-barrier parameters (barrier height, thickness, asymmetry) from
//! metal-insulator-metal J-V sweeps, using the Simmons and BDR models.
//!
//! The binary (`jvfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitting core (`data`, `models`, `fit`) never depends on the outer
//!   surfaces (`cli`, `app`, `io`, `report`, `plot`)

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
