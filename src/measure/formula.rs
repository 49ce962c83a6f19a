/// Heart-girth live-weight estimation
///
/// The standard husbandry formula: weight in kg equals heart girth (cm)
/// squared, times body length (cm), divided by 30000. The divisor and the
/// exponent are fixed; estimates are deterministic for identical inputs.

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;

/// Plausible physiological range for heart girth, in cm
pub const HEART_GIRTH_RANGE_CM: (f64, f64) = (100.0, 300.0);

/// Plausible physiological range for body length, in cm
pub const BODY_LENGTH_RANGE_CM: (f64, f64) = (80.0, 250.0);

const FORMULA_DIVISOR: f64 = 30_000.0;

/// Tape measurements taken by the operator in the field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualMeasurement {
    /// Chest circumference just behind the front legs, in cm
    pub heart_girth_cm: f64,
    /// Point-of-shoulder to pin-bone length, in cm
    pub body_length_cm: f64,
    /// Optional known-length reference object in the frame, in cm
    pub reference_length_cm: Option<f64>,
}

impl ManualMeasurement {
    /// Range-check the measurements. Out-of-range values are rejected with
    /// a validation error, never silently clamped.
    pub fn validate(&self) -> Result<(), EstimateError> {
        check_range("heart girth", self.heart_girth_cm, HEART_GIRTH_RANGE_CM)?;
        check_range("body length", self.body_length_cm, BODY_LENGTH_RANGE_CM)?;
        Ok(())
    }

    /// Predicted live weight in kg via the heart-girth formula
    pub fn weight_kg(&self) -> Result<f64, EstimateError> {
        self.validate()?;
        Ok(self.heart_girth_cm * self.heart_girth_cm * self.body_length_cm / FORMULA_DIVISOR)
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), EstimateError> {
    if !value.is_finite() || value < min || value > max {
        return Err(EstimateError::MeasurementOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(girth: f64, length: f64) -> ManualMeasurement {
        ManualMeasurement {
            heart_girth_cm: girth,
            body_length_cm: length,
            reference_length_cm: None,
        }
    }

    #[test]
    fn reference_example_is_exact() {
        // girth 180, length 150 → (180² × 150) / 30000 = 162.0 kg
        let weight = measurement(180.0, 150.0).weight_kg().unwrap();
        assert!((weight - 162.0).abs() < 1e-6);
    }

    #[test]
    fn formula_holds_across_the_valid_range() {
        for girth in [100.0, 147.5, 212.0, 300.0] {
            for length in [80.0, 119.5, 201.0, 250.0] {
                let expected = girth * girth * length / 30_000.0;
                let actual = measurement(girth, length).weight_kg().unwrap();
                assert!(
                    (actual - expected).abs() < 1e-6,
                    "girth={girth} length={length}"
                );
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let a = measurement(215.3, 171.8).weight_kg().unwrap();
        let b = measurement(215.3, 171.8).weight_kg().unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn girth_below_range_is_rejected_not_clamped() {
        let err = measurement(99.9, 150.0).weight_kg().unwrap_err();
        assert!(matches!(
            err,
            EstimateError::MeasurementOutOfRange {
                field: "heart girth",
                ..
            }
        ));
    }

    #[test]
    fn length_above_range_is_rejected() {
        let err = measurement(180.0, 250.1).weight_kg().unwrap_err();
        assert!(matches!(
            err,
            EstimateError::MeasurementOutOfRange {
                field: "body length",
                ..
            }
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(measurement(f64::NAN, 150.0).validate().is_err());
        assert!(measurement(180.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn boundary_values_are_accepted() {
        assert!(measurement(100.0, 80.0).validate().is_ok());
        assert!(measurement(300.0, 250.0).validate().is_ok());
    }
}
