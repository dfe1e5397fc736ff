//! Model dispatch.
//!
//! The fitter relies on a handful of primitive operations per model:
//! - predict `J(V)` for a parameter vector
//! - fill a Jacobian row `∂J/∂p` at one bias point
//! - produce an initial guess from data
//! - post-fit diagnostics (clamped points, validity range)
//!
//! They are gathered into a static [`ModelOps`] table so the fitting engine can
//! stay generic over the model kind.

use crate::domain::{FitWarning, ModelKind, NormalizedDataset};
use crate::models::{PhysicalConstants, bdr, initial_guess_with, simmons};

pub type PredictFn = fn(f64, &[f64], &PhysicalConstants) -> f64;
pub type JacobianRowFn = fn(f64, &[f64], &PhysicalConstants, &mut [f64]);
pub type DiagnosticsFn = fn(&NormalizedDataset, &[f64]) -> Vec<FitWarning>;

/// Per-model operations, selected by [`ModelKind::ops`].
pub struct ModelOps {
    pub kind: ModelKind,
    pub predict: PredictFn,
    /// # Panics
    /// Panics if `out` or `params` is shorter than `kind.param_count()`.
    pub jacobian_row: JacobianRowFn,
    pub diagnostics: DiagnosticsFn,
}

static SIMMONS_OPS: ModelOps = ModelOps {
    kind: ModelKind::Simmons,
    predict: simmons::predict,
    jacobian_row: simmons::jacobian_row,
    diagnostics: simmons::diagnostics,
};

static BDR_OPS: ModelOps = ModelOps {
    kind: ModelKind::Bdr,
    predict: bdr::predict,
    jacobian_row: bdr::jacobian_row,
    diagnostics: bdr::diagnostics,
};

impl ModelKind {
    pub fn ops(self) -> &'static ModelOps {
        match self {
            ModelKind::Simmons => &SIMMONS_OPS,
            ModelKind::Bdr => &BDR_OPS,
        }
    }
}

impl ModelOps {
    pub fn initial_guess(&self, data: &NormalizedDataset, c: &PhysicalConstants) -> Vec<f64> {
        initial_guess_with(self.kind, data, c).values()
    }
}

/// Predict `J(V)` for the given model kind.
pub fn predict(model: ModelKind, v: f64, params: &[f64], c: &PhysicalConstants) -> f64 {
    (model.ops().predict)(v, params, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_smoke() {
        let c = PhysicalConstants::default();
        let j = predict(ModelKind::Simmons, 0.2, &[1.0, 1.5], &c);
        assert!(j.is_finite() && j > 0.0);
        let j = predict(ModelKind::Bdr, 0.2, &[1.0, 1.2, 2.0], &c);
        assert!(j.is_finite() && j > 0.0);
    }

    #[test]
    fn ops_table_matches_kind() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.ops().kind, kind);
        }
    }
}
