//! # Value Calculators
//!
//! Derive one `MeasurementValue` per (measurement, sensor type) from the
//! neighbouring raw readings resolved by the neighbour index.
//!
//! Calculators are selected per sensor type by a closed `CalculatorKind`.
//! Specialized kinds compose the default calculation rather than replacing
//! it.
//!
//! ## Interpolation
//!
//! Times are mapped to epoch milliseconds and values are interpolated
//! linearly:
//!
//! ```text
//! y = (y0 * (x1 - x) + y1 * (x - x0)) / (x1 - x0)
//! ```
//!
//! Neighbours with equal timestamps cannot be interpolated and are a
//! calculator error.

mod default;
mod moisture;

pub use moisture::dry;

use crate::config::{Instrument, SensorsConfiguration};
use crate::dataset::DatasetSensorValues;
use crate::measurement::MeasurementValues;
use crate::measurement_value::MeasurementValue;
use crate::sensor_value::SensorValue;
use crate::store::SensorValueStore;
use crate::{SensorTypeId, SensorValueId, TidemarkError, Timestamp, epoch_millis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// DISPATCH
// =============================================================================

/// The calculation applied to a sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculatorKind {
    /// Exact reading, interpolation or boundary extrapolation.
    #[default]
    Default,
    /// The default value divided by `1 - moisture / 1000` when the
    /// instrument's sensor requires drying.
    MoistureCorrected { moisture: SensorTypeId },
}

impl CalculatorKind {
    /// Sensor types whose neighbours this calculator reads besides its own.
    #[must_use]
    pub fn dependencies(&self) -> Vec<SensorTypeId> {
        match self {
            CalculatorKind::Default => Vec::new(),
            CalculatorKind::MoistureCorrected { moisture } => vec![*moisture],
        }
    }

    /// Calculate the measurement value of `sensor_type`.
    pub fn calculate(
        &self,
        sensor_type: SensorTypeId,
        measurement_values: &MeasurementValues,
        sensor_values: &DatasetSensorValues,
        context: &CalculationContext<'_>,
    ) -> Result<MeasurementValue, TidemarkError> {
        match self {
            CalculatorKind::Default => {
                default::calculate(sensor_type, measurement_values, sensor_values, context)
            }
            CalculatorKind::MoistureCorrected { moisture } => moisture::calculate(
                sensor_type,
                *moisture,
                measurement_values,
                sensor_values,
                context,
            ),
        }
    }

    /// Calculate only the number.
    ///
    /// A sensor type with no neighbouring readings is a calculator error; the
    /// reducer reports it as NaN with a BAD flag.
    pub fn calculate_value(
        &self,
        sensor_type: SensorTypeId,
        measurement_values: &MeasurementValues,
        sensor_values: &DatasetSensorValues,
        context: &CalculationContext<'_>,
    ) -> Result<f64, TidemarkError> {
        self.calculate(sensor_type, measurement_values, sensor_values, context)
            .map(|value| value.calculated_value())
    }
}

/// Calculate `sensor_type` with the calculator configured for it.
pub fn calculate_measurement_value(
    sensor_type: SensorTypeId,
    measurement_values: &MeasurementValues,
    sensor_values: &DatasetSensorValues,
    context: &CalculationContext<'_>,
) -> Result<MeasurementValue, TidemarkError> {
    context
        .config
        .sensor_type(sensor_type)?
        .calculator
        .calculate(sensor_type, measurement_values, sensor_values, context)
}

/// Everything a calculator may consult besides the measurement itself.
#[derive(Clone, Copy)]
pub struct CalculationContext<'a> {
    pub config: &'a SensorsConfiguration,
    pub instrument: &'a Instrument,
    pub store: &'a dyn SensorValueStore,
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Fetch the readings referenced by the neighbours of `sensor_type`, in one
/// store batch.
pub fn get_sensor_values(
    measurement_values: &MeasurementValues,
    sensor_type: SensorTypeId,
    store: &dyn SensorValueStore,
) -> Result<BTreeMap<SensorValueId, SensorValue>, TidemarkError> {
    let ids = measurement_values.neighbour_ids(sensor_type);
    if ids.is_empty() {
        return Ok(BTreeMap::new());
    }

    let dataset = measurement_values.measurement().dataset_id();
    Ok(store
        .get_sensor_values_by_id(dataset, &ids)?
        .into_iter()
        .map(|value| (value.id(), value))
        .collect())
}

/// Linear interpolation at `target` between two timed values.
pub fn interpolate(
    x0: Timestamp,
    y0: f64,
    x1: Timestamp,
    y1: f64,
    target: Timestamp,
) -> Result<f64, TidemarkError> {
    if x0 == x1 {
        return Err(TidemarkError::Calculator(format!(
            "Cannot interpolate between two values at {}",
            x0
        )));
    }

    if target == x0 {
        return Ok(y0);
    }
    if target == x1 {
        return Ok(y1);
    }

    let within = (x0.min(x1)..=x0.max(x1)).contains(&target);
    let x0 = epoch_millis(x0) as f64;
    let x1 = epoch_millis(x1) as f64;
    let x = epoch_millis(target) as f64;
    let y = (y0 * (x1 - x) + y1 * (x - x0)) / (x1 - x0);

    // Rounding must not push an interpolated value outside its neighbours.
    if within {
        Ok(y.clamp(y0.min(y1), y0.max(y1)))
    } else {
        Ok(y)
    }
}

/// Interpolation where either side may be missing.
///
/// A missing side (`None` or NaN) yields the other side unchanged.
pub fn interpolate_optional(
    x0: Timestamp,
    y0: Option<f64>,
    x1: Timestamp,
    y1: Option<f64>,
    target: Timestamp,
) -> Result<f64, TidemarkError> {
    let present = |y: Option<f64>| y.filter(|value| !value.is_nan());
    match (present(y0), present(y1)) {
        (None, None) => Err(TidemarkError::Calculator(
            "No values to interpolate".to_string(),
        )),
        (Some(y0), None) => Ok(y0),
        (None, Some(y1)) => Ok(y1),
        (Some(y0), Some(y1)) => interpolate(x0, y0, x1, y1, target),
    }
}

/// Interpolate between two readings.
pub fn interpolate_values(
    prior: &SensorValue,
    post: &SensorValue,
    target: Timestamp,
) -> Result<f64, TidemarkError> {
    interpolate(
        prior.time(),
        prior.double_value(),
        post.time(),
        post.double_value(),
        target,
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp_from_secs;

    fn t(secs: i64) -> Timestamp {
        timestamp_from_secs(secs).expect("time")
    }

    #[test]
    fn interpolates_linearly() {
        assert_eq!(interpolate(t(0), 10.0, t(10), 20.0, t(5)).expect("interp"), 15.0);
        assert_eq!(interpolate(t(0), 10.0, t(10), 20.0, t(0)).expect("interp"), 10.0);
        assert_eq!(interpolate(t(0), 10.0, t(10), 20.0, t(10)).expect("interp"), 20.0);
    }

    #[test]
    fn equal_times_are_an_error() {
        assert!(matches!(
            interpolate(t(5), 1.0, t(5), 2.0, t(5)),
            Err(TidemarkError::Calculator(_))
        ));
    }

    #[test]
    fn optional_sides() {
        assert_eq!(
            interpolate_optional(t(0), None, t(10), Some(4.0), t(5)).expect("post"),
            4.0
        );
        assert_eq!(
            interpolate_optional(t(0), Some(3.0), t(10), Some(f64::NAN), t(5)).expect("prior"),
            3.0
        );
        let err = interpolate_optional(t(0), None, t(10), Some(f64::NAN), t(5))
            .expect_err("nothing to interpolate");
        assert!(err.to_string().contains("No values to interpolate"));
    }

    #[test]
    fn calculator_dependencies() {
        let kind = CalculatorKind::MoistureCorrected {
            moisture: SensorTypeId(4),
        };
        assert_eq!(kind.dependencies(), vec![SensorTypeId(4)]);
        assert!(CalculatorKind::default().dependencies().is_empty());
    }
}
