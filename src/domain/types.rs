//! Shared domain types.
//!
//! These types are intentionally small and serializable so they can be:
//!
//! - passed between the normalizer, model library and fitting engine
//! - parsed from CLI flags / config files (`FromStr`, `Deserialize`)
//! - exported to JSON alongside a fit

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::models::PhysicalConstants;

/// Unit of the raw current column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentUnit {
    #[serde(rename = "A")]
    Ampere,
    #[serde(rename = "mA")]
    Milliampere,
    #[serde(rename = "uA")]
    Microampere,
}

impl CurrentUnit {
    /// Multiplicative factor to amperes.
    pub fn to_amperes(self) -> f64 {
        match self {
            CurrentUnit::Ampere => 1.0,
            CurrentUnit::Milliampere => 1e-3,
            CurrentUnit::Microampere => 1e-6,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            CurrentUnit::Ampere => "A",
            CurrentUnit::Milliampere => "mA",
            CurrentUnit::Microampere => "uA",
        }
    }
}

impl FromStr for CurrentUnit {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Unit tags are case-sensitive: `mA` and `MA` are different things.
        match s.trim() {
            "A" => Ok(CurrentUnit::Ampere),
            "mA" => Ok(CurrentUnit::Milliampere),
            "uA" | "µA" | "μA" => Ok(CurrentUnit::Microampere),
            other => Err(FitError::UnknownUnit {
                quantity: "current",
                tag: other.to_string(),
                expected: "A, mA, uA",
            }),
        }
    }
}

impl fmt::Display for CurrentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Unit of the junction area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaUnit {
    #[serde(rename = "cm2")]
    SquareCentimeter,
    #[serde(rename = "m2")]
    SquareMeter,
    #[serde(rename = "nm2")]
    SquareNanometer,
}

impl AreaUnit {
    /// Multiplicative factor to m².
    pub fn to_square_meters(self) -> f64 {
        match self {
            AreaUnit::SquareCentimeter => 1e-4,
            AreaUnit::SquareMeter => 1.0,
            AreaUnit::SquareNanometer => 1e-18,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            AreaUnit::SquareCentimeter => "cm2",
            AreaUnit::SquareMeter => "m2",
            AreaUnit::SquareNanometer => "nm2",
        }
    }
}

impl FromStr for AreaUnit {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cm2" | "cm^2" | "cm²" => Ok(AreaUnit::SquareCentimeter),
            "m2" | "m^2" | "m²" => Ok(AreaUnit::SquareMeter),
            "nm2" | "nm^2" | "nm²" => Ok(AreaUnit::SquareNanometer),
            other => Err(FitError::UnknownUnit {
                quantity: "area",
                tag: other.to_string(),
                expected: "cm2, m2, nm2",
            }),
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which physical model to fit. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Simmons,
    Bdr,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Simmons, ModelKind::Bdr];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Simmons => "Simmons",
            ModelKind::Bdr => "BDR",
        }
    }

    /// Number of fitted parameters.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Simmons => 2,
            ModelKind::Bdr => 3,
        }
    }

    /// Parameter names, in vector order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Simmons => &["phi_mean", "d"],
            ModelKind::Bdr => &["phi1", "phi2", "d"],
        }
    }

    /// Parameter units, in vector order.
    pub fn param_units(self) -> &'static [&'static str] {
        match self {
            ModelKind::Simmons => &["eV", "nm"],
            ModelKind::Bdr => &["eV", "eV", "nm"],
        }
    }

    /// Default box: heights in (0, 10] eV, thickness in a generous nm range.
    pub fn default_bounds(self) -> ParamBounds {
        match self {
            ModelKind::Simmons => ParamBounds {
                lower: vec![MIN_BARRIER_EV, MIN_THICKNESS_NM],
                upper: vec![MAX_BARRIER_EV, MAX_THICKNESS_NM],
            },
            ModelKind::Bdr => ParamBounds {
                lower: vec![MIN_BARRIER_EV, MIN_BARRIER_EV, MIN_THICKNESS_NM],
                upper: vec![MAX_BARRIER_EV, MAX_BARRIER_EV, MAX_THICKNESS_NM],
            },
        }
    }
}

impl FromStr for ModelKind {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simmons" => Ok(ModelKind::Simmons),
            "bdr" => Ok(ModelKind::Bdr),
            _ => Err(FitError::UnknownModel(s.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub const MIN_BARRIER_EV: f64 = 1e-3;
pub const MAX_BARRIER_EV: f64 = 10.0;
pub const MIN_THICKNESS_NM: f64 = 0.05;
pub const MAX_THICKNESS_NM: f64 = 20.0;

/// Simmons parameters: symmetric rectangular barrier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimmonsParams {
    /// Mean barrier height φ̄ (eV).
    pub barrier_height: f64,
    /// Barrier thickness d (nm).
    pub thickness: f64,
}

/// BDR parameters: trapezoidal barrier with interface heights φ1 and φ2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BdrParams {
    /// Barrier height at the first interface (eV).
    pub phi1: f64,
    /// Barrier height at the second interface (eV).
    pub phi2: f64,
    /// Barrier thickness d (nm).
    pub thickness: f64,
}

impl BdrParams {
    /// φ̄ = (φ1 + φ2) / 2.
    pub fn mean_height(&self) -> f64 {
        0.5 * (self.phi1 + self.phi2)
    }

    /// Δφ = φ2 − φ1.
    pub fn asymmetry(&self) -> f64 {
        self.phi2 - self.phi1
    }
}

/// A model together with a parameter vector.
///
/// Used both as the starting point handed to the fitter and as the fitted outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum ModelSpec {
    Simmons(SimmonsParams),
    Bdr(BdrParams),
}

impl ModelSpec {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Simmons(_) => ModelKind::Simmons,
            ModelSpec::Bdr(_) => ModelKind::Bdr,
        }
    }

    /// Parameters in the fitter's vector order (see [`ModelKind::param_names`]).
    pub fn values(&self) -> Vec<f64> {
        match self {
            ModelSpec::Simmons(p) => vec![p.barrier_height, p.thickness],
            ModelSpec::Bdr(p) => vec![p.phi1, p.phi2, p.thickness],
        }
    }

    /// Build from a parameter vector, checking length, finiteness and positivity.
    pub fn from_values(kind: ModelKind, values: &[f64]) -> Result<Self, FitError> {
        if values.len() != kind.param_count() {
            return Err(FitError::InvalidConfig(format!(
                "{} expects {} parameters, got {}",
                kind.display_name(),
                kind.param_count(),
                values.len()
            )));
        }
        if let Some((name, v)) = kind
            .param_names()
            .iter()
            .zip(values)
            .find(|(_, v)| !(v.is_finite() && **v > 0.0))
        {
            return Err(FitError::InvalidConfig(format!(
                "{} parameter {name} must be finite and > 0, got {v}",
                kind.display_name()
            )));
        }
        Ok(Self::from_values_unchecked(kind, values))
    }

    /// Build from a vector already known to be valid (length checked by the caller).
    pub(crate) fn from_values_unchecked(kind: ModelKind, values: &[f64]) -> Self {
        match kind {
            ModelKind::Simmons => ModelSpec::Simmons(SimmonsParams {
                barrier_height: values[0],
                thickness: values[1],
            }),
            ModelKind::Bdr => ModelSpec::Bdr(BdrParams {
                phi1: values[0],
                phi2: values[1],
                thickness: values[2],
            }),
        }
    }

    /// Predicted current density (A/m²) at `voltage` (V).
    pub fn predict(&self, voltage: f64, constants: &PhysicalConstants) -> f64 {
        (self.kind().ops().predict)(voltage, &self.values(), constants)
    }
}

/// Box constraints on the parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ParamBounds {
    /// Check shape and the strict-positivity invariant for `kind`.
    pub fn validate(&self, kind: ModelKind) -> Result<(), FitError> {
        let p = kind.param_count();
        if self.lower.len() != p || self.upper.len() != p {
            return Err(FitError::InvalidConfig(format!(
                "{} bounds need {p} lower and {p} upper values, got {} and {}",
                kind.display_name(),
                self.lower.len(),
                self.upper.len()
            )));
        }
        for (i, name) in kind.param_names().iter().enumerate() {
            let (lo, hi) = (self.lower[i], self.upper[i]);
            if !(lo.is_finite() && hi.is_finite()) {
                return Err(FitError::InvalidConfig(format!(
                    "Bounds for {name} must be finite, got [{lo}, {hi}]"
                )));
            }
            if lo <= 0.0 {
                return Err(FitError::InvalidConfig(format!(
                    "Lower bound for {name} must be > 0, got {lo}"
                )));
            }
            if lo > hi {
                return Err(FitError::InvalidConfig(format!(
                    "Lower bound for {name} exceeds upper bound: [{lo}, {hi}]"
                )));
            }
        }
        Ok(())
    }

    /// Clip each component into its interval.
    pub fn project(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
            .collect()
    }

    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.lower.len()
            && values
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }
}

/// Loss policy for the fitting engine.
///
/// Serialized lowercase; deserialized through [`FromStr`], so any tag case is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LossKind {
    /// Ordinary least squares.
    #[default]
    L2,
    /// Huber M-estimator via IRLS.
    Huber,
    /// Tukey biweight via IRLS (full rejection beyond the threshold).
    Tukey,
}

impl LossKind {
    pub fn display_name(self) -> &'static str {
        match self {
            LossKind::L2 => "L2",
            LossKind::Huber => "Huber",
            LossKind::Tukey => "Tukey",
        }
    }

    /// Conventional 95%-efficiency tuning constant.
    pub fn default_threshold(self) -> f64 {
        match self {
            LossKind::L2 => f64::INFINITY,
            LossKind::Huber => 1.345,
            LossKind::Tukey => 4.685,
        }
    }

    pub fn is_robust(self) -> bool {
        !matches!(self, LossKind::L2)
    }
}

impl FromStr for LossKind {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" | "ols" => Ok(LossKind::L2),
            "huber" => Ok(LossKind::Huber),
            "tukey" | "bisquare" => Ok(LossKind::Tukey),
            _ => Err(FitError::UnknownLoss(s.to_string())),
        }
    }
}

impl TryFrom<String> for LossKind {
    type Error = FitError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where the fitter's starting point comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InitialGuess {
    /// Use the parameter values carried by the `ModelSpec` passed to `fit`.
    #[default]
    FromModel,
    /// Ignore the passed values and ask the model library for a guess.
    Auto,
    /// Use these values (vector order of the model kind).
    Explicit(Vec<f64>),
}

/// Configuration for one fit call.
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub loss: LossKind,
    /// Robust threshold `k` on standardized residuals. `None` uses the loss default.
    pub robust_k: Option<f64>,
    /// Fixed robust scale in A/m². `None` re-estimates it each iteration (MAD).
    pub robust_scale: Option<f64>,
    /// Parameter box. `None` uses [`ModelKind::default_bounds`].
    pub bounds: Option<ParamBounds>,
    pub initial_guess: InitialGuess,
    pub max_iterations: usize,
    /// Tolerance on the relative parameter-step norm.
    pub x_tol: f64,
    /// Tolerance on the relative cost decrease.
    pub f_tol: f64,
    /// Optional wall-time budget, checked at the top of each iteration.
    pub max_wall_time: Option<Duration>,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// Consecutive rejected (cost-increasing) steps before reporting divergence.
    pub max_lambda_escalations: usize,
    pub constants: PhysicalConstants,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            loss: LossKind::L2,
            robust_k: None,
            robust_scale: None,
            bounds: None,
            initial_guess: InitialGuess::FromModel,
            max_iterations: 200,
            x_tol: 1e-8,
            f_tol: 1e-10,
            max_wall_time: None,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda_escalations: 10,
            constants: PhysicalConstants::default(),
        }
    }
}

impl FitConfig {
    /// Default configuration with the given loss.
    pub fn with_loss(loss: LossKind) -> Self {
        Self {
            loss,
            ..Default::default()
        }
    }

    /// Robust threshold actually used.
    pub fn robust_threshold(&self) -> f64 {
        self.robust_k.unwrap_or_else(|| self.loss.default_threshold())
    }

    /// Configured bounds, or the model default, validated.
    pub fn bounds_for(&self, kind: ModelKind) -> Result<ParamBounds, FitError> {
        let bounds = self
            .bounds
            .clone()
            .unwrap_or_else(|| kind.default_bounds());
        bounds.validate(kind)?;
        Ok(bounds)
    }

    /// Check scalar settings. Bounds are validated per model in [`FitConfig::bounds_for`].
    pub fn validate(&self) -> Result<(), FitError> {
        if self.max_iterations == 0 {
            return Err(FitError::InvalidConfig("max_iterations must be >= 1".into()));
        }
        if !(self.x_tol.is_finite() && self.x_tol > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "x_tol must be finite and > 0, got {}",
                self.x_tol
            )));
        }
        if !(self.f_tol.is_finite() && self.f_tol > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "f_tol must be finite and > 0, got {}",
                self.f_tol
            )));
        }
        if !(self.initial_lambda.is_finite() && self.initial_lambda > 0.0) {
            return Err(FitError::InvalidConfig("initial_lambda must be > 0".into()));
        }
        if !(self.lambda_up > 1.0 && self.lambda_down > 0.0 && self.lambda_down < 1.0) {
            return Err(FitError::InvalidConfig(format!(
                "Damping factors need lambda_up > 1 and 0 < lambda_down < 1, got {} and {}",
                self.lambda_up, self.lambda_down
            )));
        }
        if self.max_lambda_escalations == 0 {
            return Err(FitError::InvalidConfig(
                "max_lambda_escalations must be >= 1".into(),
            ));
        }
        if self.loss.is_robust() {
            let k = self.robust_threshold();
            if !(k.is_finite() && k > 0.0) {
                return Err(FitError::InvalidConfig(format!(
                    "Robust threshold must be finite and > 0, got {k}"
                )));
            }
            if let Some(s) = self.robust_scale {
                if !(s.is_finite() && s > 0.0) {
                    return Err(FitError::InvalidConfig(format!(
                        "Robust scale must be finite and > 0, got {s}"
                    )));
                }
            }
        }
        self.constants.validate()
    }
}

/// How the iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Converged,
    MaxIterations,
    Diverged,
}

impl ConvergenceStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            ConvergenceStatus::Converged => "converged",
            ConvergenceStatus::MaxIterations => "max iterations",
            ConvergenceStatus::Diverged => "diverged",
        }
    }
}

/// Non-fatal findings attached to a fit result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitWarning {
    /// Repeated voltages with differing currents (measurement noise).
    DuplicateVoltages { count: usize },
    /// Simmons points with φ̄ + V ≤ 0 whose second term was clamped to zero.
    BarrierClamped { points: usize },
    /// Bias range exceeds the BDR series validity (|eV| ≪ φ̄).
    BiasBeyondSeriesValidity { max_bias: f64, mean_height: f64 },
    /// `JᵗJ` could not be inverted at the final point.
    SingularJacobian,
    /// Degrees of freedom ≤ 0; covariance omitted.
    InsufficientDegreesOfFreedom { n_points: usize, n_params: usize },
    /// Too few points kept a positive robust weight; unit weights were used.
    RobustWeightsCollapsed { iterations: usize },
    /// The wall-time budget ran out before convergence.
    WallTimeExceeded { elapsed_ms: u64 },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::DuplicateVoltages { count } => {
                write!(f, "{count} duplicate voltage(s) with differing currents (treated as noise)")
            }
            FitWarning::BarrierClamped { points } => {
                write!(f, "{points} point(s) with phi + V <= 0; barrier term clamped to zero")
            }
            FitWarning::BiasBeyondSeriesValidity { max_bias, mean_height } => write!(
                f,
                "max |V| = {max_bias:.3} V exceeds phi_mean/2 = {:.3} V; BDR series may be inaccurate",
                mean_height / 2.0
            ),
            FitWarning::SingularJacobian => {
                write!(f, "Jacobian singular at fitted point; parameters uncertain")
            }
            FitWarning::InsufficientDegreesOfFreedom { n_points, n_params } => write!(
                f,
                "{n_points} point(s) for {n_params} parameter(s); covariance not estimated"
            ),
            FitWarning::RobustWeightsCollapsed { iterations } => write!(
                f,
                "robust weights collapsed in {iterations} iteration(s); unit weights used there"
            ),
            FitWarning::WallTimeExceeded { elapsed_ms } => {
                write!(f, "wall-time budget exhausted after {elapsed_ms} ms")
            }
        }
    }
}
