//! Moisture-corrected gas concentration.
//!
//! A wet mole fraction is converted to dry by dividing out the water vapour
//! measured alongside it:
//!
//! ```text
//! dry = measured / (1 - moisture / 1000)
//! ```
//!
//! Only one sensor of the corrected type is supported per instrument. A
//! moisture of 1000 mmol/mol or more leaves no dry gas and is a calculator
//! error.

use super::{CalculationContext, default};
use crate::config::Instrument;
use crate::dataset::DatasetSensorValues;
use crate::measurement::MeasurementValues;
use crate::measurement_value::MeasurementValue;
use crate::primitives::MOISTURE_SCALE;
use crate::{SensorTypeId, TidemarkError};

pub(super) fn calculate(
    sensor_type: SensorTypeId,
    moisture: SensorTypeId,
    measurement_values: &MeasurementValues,
    sensor_values: &DatasetSensorValues,
    context: &CalculationContext<'_>,
) -> Result<MeasurementValue, TidemarkError> {
    let mut gas = default::calculate(sensor_type, measurement_values, sensor_values, context)?;

    if gas.member_count() > 0 && drying_required(context.instrument, sensor_type)? {
        let water = default::calculate(moisture, measurement_values, sensor_values, context)?;
        gas.add_supporting_values_from(&water);
        gas.set_calculated_value(dry(gas.calculated_value(), water.calculated_value())?);
    }

    Ok(gas)
}

fn drying_required(instrument: &Instrument, sensor_type: SensorTypeId) -> Result<bool, TidemarkError> {
    match instrument.assignments_for(sensor_type).as_slice() {
        [assignment] => Ok(assignment.requires_drying),
        [] => Err(TidemarkError::Configuration(format!(
            "Instrument '{}' has no sensor of type {}",
            instrument.name, sensor_type.0
        ))),
        _ => Err(TidemarkError::Configuration(format!(
            "Cannot handle multiple sensors of type {} on instrument '{}'",
            sensor_type.0, instrument.name
        ))),
    }
}

/// Convert a wet mole fraction to dry using moisture in mmol/mol.
///
/// A NaN moisture gives NaN.
pub fn dry(measured: f64, moisture: f64) -> Result<f64, TidemarkError> {
    if moisture >= MOISTURE_SCALE {
        return Err(TidemarkError::Calculator(format!(
            "Moisture of {} mmol/mol leaves no dry gas",
            moisture
        )));
    }
    Ok(measured / (1.0 - moisture / MOISTURE_SCALE))
}
