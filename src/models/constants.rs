//! Physical constants for the tunneling models.
//!
//! Unit system throughout the model library: φ in eV, d in nm, V in volts,
//! J in A/m². The constants below carry the conversion factors.

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Elementary charge (C), CODATA 2018 exact.
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
/// Planck constant (J·s), CODATA 2018 exact.
pub const PLANCK: f64 = 6.626_070_15e-34;
/// Electron rest mass (kg), CODATA 2018.
pub const ELECTRON_MASS: f64 = 9.109_383_701_5e-31;

const NM2_PER_M2: f64 = 1e18;
const M_PER_NM: f64 = 1e-9;

/// Model prefactors, derived from CODATA values and an effective-mass ratio.
///
/// - `c1 = e² / (2πh) · 1e18` in A·nm²/(m²·eV)
/// - `c2 = 4π √(2 m* e) / h · 1e-9` in nm⁻¹·eV^(-1/2)
///
/// Both can be overridden (e.g. from a config file); the BDR coefficients
/// `A = c2/3` and `B = c2²/96` always follow `c2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub c1: f64,
    pub c2: f64,
    /// m*/mₑ used to derive `c2`. Informational once `c2` is overridden.
    pub effective_mass_ratio: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self::from_effective_mass(1.0)
    }
}

impl PhysicalConstants {
    /// CODATA-derived constants for electron effective mass `m* = ratio · mₑ`.
    pub fn from_effective_mass(ratio: f64) -> Self {
        let c1 = ELEMENTARY_CHARGE * ELEMENTARY_CHARGE / (2.0 * std::f64::consts::PI * PLANCK)
            * NM2_PER_M2;
        let c2 = 4.0 * std::f64::consts::PI * (2.0 * ratio * ELECTRON_MASS * ELEMENTARY_CHARGE).sqrt()
            / PLANCK
            * M_PER_NM;
        Self {
            c1,
            c2,
            effective_mass_ratio: ratio,
        }
    }

    /// Validated variant of [`PhysicalConstants::from_effective_mass`].
    pub fn with_effective_mass(ratio: f64) -> Result<Self, FitError> {
        let out = Self::from_effective_mass(ratio);
        out.validate()?;
        Ok(out)
    }

    /// BDR linear-asymmetry coefficient `A = c2 / 3`.
    pub fn a(&self) -> f64 {
        self.c2 / 3.0
    }

    /// BDR cubic coefficient `B = c2² / 96`.
    pub fn b(&self) -> f64 {
        self.c2 * self.c2 / 96.0
    }

    pub fn validate(&self) -> Result<(), FitError> {
        for (name, v) in [
            ("c1", self.c1),
            ("c2", self.c2),
            ("effective_mass_ratio", self.effective_mass_ratio),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(FitError::InvalidConfig(format!(
                    "Physical constant {name} must be finite and > 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn codata_values() {
        let c = PhysicalConstants::default();
        assert_relative_eq!(c.c1, 6.165_735e12, max_relative = 1e-6);
        assert_relative_eq!(c.c2, 10.246_33, max_relative = 1e-5);
        assert_relative_eq!(c.a(), 3.415_44, max_relative = 1e-5);
        assert_relative_eq!(c.b(), 1.093_62, max_relative = 1e-5);
    }

    #[test]
    fn effective_mass_scales_c2_by_sqrt() {
        let base = PhysicalConstants::default();
        let light = PhysicalConstants::with_effective_mass(0.25).unwrap();
        assert_relative_eq!(light.c2, base.c2 * 0.5, max_relative = 1e-12);
        assert_relative_eq!(light.c1, base.c1, max_relative = 1e-12);
        assert!(PhysicalConstants::with_effective_mass(0.0).is_err());
        assert!(PhysicalConstants::with_effective_mass(-1.0).is_err());
    }
}
