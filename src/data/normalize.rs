//! Unit normalization: raw currents and junction area to current density.

use crate::domain::{AreaUnit, CurrentUnit, JvDataset, NormalizedDataset};
use crate::error::FitError;

/// Convert a raw dataset to voltage (V) and current density (A/m²).
///
/// `J_i = I_i · f_current / (area · f_area)`. Output order and length match the input.
pub fn normalize(
    dataset: &JvDataset,
    current_unit: CurrentUnit,
    area_unit: AreaUnit,
) -> Result<NormalizedDataset, FitError> {
    let area_m2 = dataset.area() * area_unit.to_square_meters();
    let factor = current_unit.to_amperes() / area_m2;
    if !(factor.is_finite() && factor > 0.0) {
        return Err(FitError::InvalidData(format!(
            "Area {} {} gives a non-finite density factor",
            dataset.area(),
            area_unit
        )));
    }

    let density: Vec<f64> = dataset.currents().iter().map(|i| i * factor).collect();
    if let Some(idx) = density.iter().position(|j| !j.is_finite()) {
        return Err(FitError::InvalidData(format!(
            "Current density overflows at index {idx} ({} {current_unit})",
            dataset.currents()[idx]
        )));
    }

    Ok(NormalizedDataset::from_validated(
        dataset.voltages().to_vec(),
        density,
        dataset.temperature(),
        dataset.duplicate_voltages(),
    ))
}

/// [`normalize`] with unit tags parsed first (`A|mA|uA`, `cm2|m2|nm2`).
pub fn normalize_with_tags(
    dataset: &JvDataset,
    current_unit: &str,
    area_unit: &str,
) -> Result<NormalizedDataset, FitError> {
    let current_unit: CurrentUnit = current_unit.parse()?;
    let area_unit: AreaUnit = area_unit.parse()?;
    normalize(dataset, current_unit, area_unit)
}

/// Inverse of [`normalize`] for a single value: density (A/m²) to current in `current_unit`.
pub fn density_to_current(
    density: f64,
    area: f64,
    area_unit: AreaUnit,
    current_unit: CurrentUnit,
) -> f64 {
    density * area * area_unit.to_square_meters() / current_unit.to_amperes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn milliamps_per_square_centimeter() {
        // 1 mA over 1 cm² is 10 A/m².
        let ds = JvDataset::new(vec![0.1, 0.2], vec![1.0, 2.0], 1.0, None).unwrap();
        let n = normalize(&ds, CurrentUnit::Milliampere, AreaUnit::SquareCentimeter).unwrap();
        assert_relative_eq!(n.current_density()[0], 10.0, max_relative = 1e-12);
        assert_relative_eq!(n.current_density()[1], 20.0, max_relative = 1e-12);
        assert_eq!(n.voltages(), ds.voltages());
    }

    #[test]
    fn equivalent_units_agree() {
        let a = JvDataset::new(vec![0.1], vec![1.0], 1.0, Some(4.2)).unwrap();
        let b = JvDataset::new(vec![0.1], vec![1e-3], 1e-4, Some(4.2)).unwrap();
        let na = normalize(&a, CurrentUnit::Milliampere, AreaUnit::SquareCentimeter).unwrap();
        let nb = normalize(&b, CurrentUnit::Ampere, AreaUnit::SquareMeter).unwrap();
        assert_relative_eq!(na.current_density()[0], nb.current_density()[0], max_relative = 1e-12);
        assert_eq!(na.temperature(), Some(4.2));
    }

    #[test]
    fn nanometer_areas() {
        let ds = JvDataset::new(vec![0.1], vec![1.0], 100.0, None).unwrap();
        let n = normalize(&ds, CurrentUnit::Microampere, AreaUnit::SquareNanometer).unwrap();
        assert_relative_eq!(n.current_density()[0], 1e-6 / 1e-16, max_relative = 1e-12);
    }

    #[test]
    fn unknown_tags_fail() {
        let ds = JvDataset::new(vec![0.1], vec![1.0], 1.0, None).unwrap();
        assert!(matches!(
            normalize_with_tags(&ds, "nA", "cm2"),
            Err(FitError::UnknownUnit { .. })
        ));
        assert!(matches!(
            normalize_with_tags(&ds, "mA", "in2"),
            Err(FitError::UnknownUnit { .. })
        ));
        assert!(normalize_with_tags(&ds, "uA", "nm2").is_ok());
    }

    #[test]
    fn density_to_current_inverts() {
        let i = density_to_current(10.0, 1.0, AreaUnit::SquareCentimeter, CurrentUnit::Milliampere);
        assert_relative_eq!(i, 1.0, max_relative = 1e-12);
    }
}
