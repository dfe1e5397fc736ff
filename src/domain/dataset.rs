//! Measured and normalized J–V datasets.

use crate::error::FitError;

/// Raw measurement: ordered (voltage, current) pairs for one junction.
///
/// Invariants are checked once in [`JvDataset::new`]; fields are private so a
/// constructed dataset stays valid.
#[derive(Debug, Clone, PartialEq)]
pub struct JvDataset {
    voltages: Vec<f64>,
    currents: Vec<f64>,
    area: f64,
    temperature: Option<f64>,
    duplicate_voltages: usize,
}

impl JvDataset {
    /// Validate and build a dataset.
    ///
    /// - `voltages` (V) and `currents` (in the caller's current unit) must have
    ///   equal, nonzero length and finite values.
    /// - `area` is in the caller's area unit and must be finite and > 0.
    /// - `temperature` (K) is optional and only carried through.
    pub fn new(
        voltages: Vec<f64>,
        currents: Vec<f64>,
        area: f64,
        temperature: Option<f64>,
    ) -> Result<Self, FitError> {
        check_columns(&voltages, &currents, "current")?;
        if !(area.is_finite() && area > 0.0) {
            return Err(FitError::InvalidData(format!(
                "Junction area must be finite and > 0, got {area}"
            )));
        }
        check_temperature(temperature)?;

        let duplicate_voltages = count_duplicate_voltages(&voltages, &currents);
        Ok(Self {
            voltages,
            currents,
            area,
            temperature,
            duplicate_voltages,
        })
    }

    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    pub fn currents(&self) -> &[f64] {
        &self.currents
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Points sharing a voltage with an earlier point but reporting a different current.
    pub fn duplicate_voltages(&self) -> usize {
        self.duplicate_voltages
    }

    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }
}

/// Dataset in fitting units: voltage in V, current density in A/m².
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDataset {
    voltages: Vec<f64>,
    current_density: Vec<f64>,
    temperature: Option<f64>,
    duplicate_voltages: usize,
}

impl NormalizedDataset {
    /// Build directly from current density (A/m²), e.g. a `J` column or a synthetic sweep.
    pub fn from_density(
        voltages: Vec<f64>,
        current_density: Vec<f64>,
        temperature: Option<f64>,
    ) -> Result<Self, FitError> {
        check_columns(&voltages, &current_density, "current density")?;
        check_temperature(temperature)?;
        let duplicate_voltages = count_duplicate_voltages(&voltages, &current_density);
        Ok(Self {
            voltages,
            current_density,
            temperature,
            duplicate_voltages,
        })
    }

    /// Used by the normalizer, which starts from an already validated [`JvDataset`].
    pub(crate) fn from_validated(
        voltages: Vec<f64>,
        current_density: Vec<f64>,
        temperature: Option<f64>,
        duplicate_voltages: usize,
    ) -> Self {
        Self {
            voltages,
            current_density,
            temperature,
            duplicate_voltages,
        }
    }

    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    pub fn current_density(&self) -> &[f64] {
        &self.current_density
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn duplicate_voltages(&self) -> usize {
        self.duplicate_voltages
    }

    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    /// `(V, J)` pairs in input order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.voltages
            .iter()
            .copied()
            .zip(self.current_density.iter().copied())
    }

    pub fn max_abs_voltage(&self) -> f64 {
        self.voltages.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    pub fn max_abs_density(&self) -> f64 {
        self.current_density
            .iter()
            .fold(0.0_f64, |m, j| m.max(j.abs()))
    }

    /// Voltage range `(min, max)`.
    pub fn voltage_range(&self) -> (f64, f64) {
        self.voltages
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

fn check_columns(voltages: &[f64], values: &[f64], what: &str) -> Result<(), FitError> {
    if voltages.is_empty() {
        return Err(FitError::InvalidData("Dataset has no points".into()));
    }
    if voltages.len() != values.len() {
        return Err(FitError::InvalidData(format!(
            "Length mismatch: {} voltages vs {} {what} values",
            voltages.len(),
            values.len()
        )));
    }
    if let Some(i) = voltages.iter().position(|v| !v.is_finite()) {
        return Err(FitError::InvalidData(format!(
            "Non-finite voltage at index {i}: {}",
            voltages[i]
        )));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(FitError::InvalidData(format!(
            "Non-finite {what} at index {i}: {}",
            values[i]
        )));
    }
    Ok(())
}

fn check_temperature(temperature: Option<f64>) -> Result<(), FitError> {
    match temperature {
        Some(t) if !(t.is_finite() && t > 0.0) => Err(FitError::InvalidData(format!(
            "Temperature must be finite and > 0 K, got {t}"
        ))),
        _ => Ok(()),
    }
}

fn count_duplicate_voltages(voltages: &[f64], values: &[f64]) -> usize {
    let mut pairs: Vec<(f64, f64)> = voltages
        .iter()
        .copied()
        .zip(values.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pairs
        .windows(2)
        .filter(|w| w[0].0 == w[1].0 && w[0].1 != w[1].1)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_structural_problems() {
        assert!(JvDataset::new(vec![], vec![], 1.0, None).is_err());
        assert!(JvDataset::new(vec![0.1, 0.2], vec![1.0], 1.0, None).is_err());
        assert!(JvDataset::new(vec![0.1, f64::NAN], vec![1.0, 2.0], 1.0, None).is_err());
        assert!(JvDataset::new(vec![0.1], vec![1.0], 0.0, None).is_err());
        assert!(JvDataset::new(vec![0.1], vec![1.0], 1.0, Some(-4.0)).is_err());
    }

    #[test]
    fn non_monotonic_voltages_are_accepted() {
        let ds = JvDataset::new(vec![0.2, -0.1, 0.0], vec![2.0, -1.0, 0.0], 1.0, Some(300.0))
            .unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.temperature(), Some(300.0));
        assert_eq!(ds.duplicate_voltages(), 0);
    }

    #[test]
    fn counts_duplicates_with_differing_currents() {
        let ds = JvDataset::new(
            vec![0.1, 0.2, 0.1, 0.2, 0.3],
            vec![1.0, 2.0, 1.1, 2.0, 3.0],
            1.0,
            None,
        )
        .unwrap();
        // 0.2 repeats with the same current, only 0.1 counts.
        assert_eq!(ds.duplicate_voltages(), 1);
    }

    #[test]
    fn normalized_helpers() {
        let ds = NormalizedDataset::from_density(vec![-0.5, 0.25], vec![-10.0, 4.0], None).unwrap();
        assert_eq!(ds.max_abs_voltage(), 0.5);
        assert_eq!(ds.max_abs_density(), 10.0);
        assert_eq!(ds.voltage_range(), (-0.5, 0.25));
        assert_eq!(ds.points().count(), 2);
    }
}
