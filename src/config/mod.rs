//! Fit settings from TOML.
//!
//! A settings file overlays [`FitConfig::default`]; CLI flags overlay the file.
//! Every key is optional:
//!
//! ```toml
//! loss = "huber"
//! robust_k = 1.5
//! max_iterations = 300
//! max_time_ms = 2000
//! effective_mass = 0.4
//!
//! [bounds.simmons]
//! lower = [0.1, 0.5]
//! upper = [5.0, 5.0]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{FitConfig, LossKind, ModelKind, ParamBounds};
use crate::error::{AppError, FitError};
use crate::models::PhysicalConstants;

/// Per-model bound overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsSettings {
    pub simmons: Option<ParamBounds>,
    pub bdr: Option<ParamBounds>,
}

/// Optional overrides for [`FitConfig`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitSettings {
    pub loss: Option<LossKind>,
    pub robust_k: Option<f64>,
    pub robust_scale: Option<f64>,
    pub max_iterations: Option<usize>,
    pub x_tol: Option<f64>,
    pub f_tol: Option<f64>,
    pub max_time_ms: Option<u64>,
    pub initial_lambda: Option<f64>,
    pub lambda_up: Option<f64>,
    pub lambda_down: Option<f64>,
    pub max_lambda_escalations: Option<usize>,
    /// m*/mₑ used to derive `c2`.
    pub effective_mass: Option<f64>,
    /// Direct override of the Simmons prefactor (A·nm²/(m²·eV)).
    pub c1: Option<f64>,
    /// Direct override of the exponent constant (nm⁻¹·eV^(-1/2)).
    pub c2: Option<f64>,
    pub bounds: BoundsSettings,
}

impl FitSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, FitError> {
        toml::from_str(content)
            .map_err(|e| FitError::InvalidConfig(format!("Config parse error: {e}")))
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(2, format!("Failed to read config '{}': {e}", path.display()))
        })?;
        let settings = Self::from_toml_str(&content).map_err(|e| {
            AppError::new(2, format!("{} ({})", e, path.display()))
        })?;
        tracing::debug!(path = %path.display(), ?settings, "loaded fit settings");
        Ok(settings)
    }

    /// Overlay these settings on `base` for a fit of `kind`, then validate.
    pub fn apply(&self, kind: ModelKind, base: FitConfig) -> Result<FitConfig, FitError> {
        let mut cfg = base;
        if let Some(loss) = self.loss {
            cfg.loss = loss;
        }
        if self.robust_k.is_some() {
            cfg.robust_k = self.robust_k;
        }
        if self.robust_scale.is_some() {
            cfg.robust_scale = self.robust_scale;
        }
        if let Some(v) = self.max_iterations {
            cfg.max_iterations = v;
        }
        if let Some(v) = self.x_tol {
            cfg.x_tol = v;
        }
        if let Some(v) = self.f_tol {
            cfg.f_tol = v;
        }
        if let Some(ms) = self.max_time_ms {
            cfg.max_wall_time = Some(Duration::from_millis(ms));
        }
        if let Some(v) = self.initial_lambda {
            cfg.initial_lambda = v;
        }
        if let Some(v) = self.lambda_up {
            cfg.lambda_up = v;
        }
        if let Some(v) = self.lambda_down {
            cfg.lambda_down = v;
        }
        if let Some(v) = self.max_lambda_escalations {
            cfg.max_lambda_escalations = v;
        }
        if let Some(ratio) = self.effective_mass {
            cfg.constants = PhysicalConstants::with_effective_mass(ratio)?;
        }
        if let Some(c1) = self.c1 {
            cfg.constants.c1 = c1;
        }
        if let Some(c2) = self.c2 {
            cfg.constants.c2 = c2;
        }
        let bounds = match kind {
            ModelKind::Simmons => &self.bounds.simmons,
            ModelKind::Bdr => &self.bounds.bdr,
        };
        if let Some(b) = bounds {
            b.validate(kind)?;
            cfg.bounds = Some(b.clone());
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
