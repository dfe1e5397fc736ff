//! Error types.
//!
//! - [`FitError`]: structured errors raised by the fitting core.
//! - [`AppError`]: what the binary prints, paired with a process exit code.

use thiserror::Error;

/// Errors raised by normalization, model evaluation and fitting.
///
/// Only structural problems are errors. Numerical-quality issues found while
/// fitting (divergence, singular covariance, clamped barrier terms) are reported
/// on the [`FitResult`](crate::domain::FitResult) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// A unit tag was not recognized.
    #[error("Unknown {quantity} unit '{tag}' (expected one of: {expected})")]
    UnknownUnit {
        /// Which quantity the tag was meant for (`current` or `area`).
        quantity: &'static str,
        /// The tag as supplied.
        tag: String,
        /// Recognized tags, for the message.
        expected: &'static str,
    },

    /// A model tag was not recognized.
    #[error("Unknown model '{0}' (expected one of: Simmons, BDR)")]
    UnknownModel(String),

    /// A loss tag was not recognized.
    #[error("Unknown loss '{0}' (expected one of: L2, Huber, Tukey)")]
    UnknownLoss(String),

    /// Malformed dataset: length mismatch, non-finite values, too few points.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Malformed configuration: bounds, tolerances, initial guess.
    #[error("Invalid fit configuration: {0}")]
    InvalidConfig(String),

    /// `JᵗJ` cannot be inverted at the fitted point.
    #[error("Jacobian is singular at the fitted point; covariance is unavailable")]
    SingularJacobian,

    /// Degrees of freedom are not positive.
    #[error("Insufficient data for covariance: {n_points} points for {n_params} parameters")]
    InsufficientData {
        /// Number of data points.
        n_points: usize,
        /// Number of fitted parameters.
        n_params: usize,
    },
}

impl FitError {
    /// Process exit code the binary uses for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::UnknownUnit { .. }
            | FitError::UnknownModel(_)
            | FitError::UnknownLoss(_)
            | FitError::InvalidConfig(_) => 2,
            FitError::InvalidData(_) | FitError::InsufficientData { .. } => 3,
            FitError::SingularJacobian => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_error_maps_to_exit_codes() {
        let unit = FitError::UnknownUnit {
            quantity: "current",
            tag: "kA".to_string(),
            expected: "A, mA, uA",
        };
        assert_eq!(AppError::from(unit).exit_code(), 2);
        assert_eq!(AppError::from(FitError::InvalidData("x".into())).exit_code(), 3);
        assert_eq!(AppError::from(FitError::SingularJacobian).exit_code(), 4);
    }

    #[test]
    fn unknown_unit_message_names_the_tag() {
        let err = FitError::UnknownUnit {
            quantity: "area",
            tag: "ft2".to_string(),
            expected: "cm2, m2, nm2",
        };
        let msg = err.to_string();
        assert!(msg.contains("ft2"));
        assert!(msg.contains("area"));
    }
}
