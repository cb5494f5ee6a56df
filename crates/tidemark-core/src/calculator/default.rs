//! The default calculator.
//!
//! Per column of the sensor type:
//! - an exact reading is used as measured
//! - readings on both sides are interpolated
//! - a reading on one side only is used directly and counts as interpolated
//! - a column with no usable reading is skipped
//!
//! The column results are averaged.

use super::{CalculationContext, get_sensor_values, interpolate_values};
use crate::dataset::DatasetSensorValues;
use crate::measurement::{MeasurementValues, Neighbours};
use crate::measurement_value::MeasurementValue;
use crate::sensor_value::SensorValue;
use crate::{SensorTypeId, SensorValueId, TidemarkError};
use std::collections::BTreeMap;
use tracing::trace;

pub(super) fn calculate(
    sensor_type: SensorTypeId,
    measurement_values: &MeasurementValues,
    sensor_values: &DatasetSensorValues,
    context: &CalculationContext<'_>,
) -> Result<MeasurementValue, TidemarkError> {
    let fetched = get_sensor_values(measurement_values, sensor_type, context.store)?;
    let time = measurement_values.measurement().time();

    let mut result = MeasurementValue::new(sensor_type);
    let mut column_values = Vec::new();

    for (column, neighbours) in measurement_values.neighbours(sensor_type) {
        let value = match *neighbours {
            Neighbours::Exact(id) => {
                let reading = fetched_value(&fetched, id)?;
                result.add_value(reading, sensor_values, true)?;
                reading.double_value()
            }
            Neighbours::Between { prior, post } => {
                let prior = fetched_value(&fetched, prior)?;
                let post = fetched_value(&fetched, post)?;
                let interpolated = interpolate_values(prior, post, time)?;
                result.add_interpolated_value(prior, sensor_values, true)?;
                result.add_interpolated_value(post, sensor_values, true)?;
                interpolated
            }
            Neighbours::Before(id) | Neighbours::After(id) => {
                let reading = fetched_value(&fetched, id)?;
                result.add_interpolated_value(reading, sensor_values, true)?;
                reading.double_value()
            }
            Neighbours::Missing => {
                trace!(column = column.0, sensor_type = sensor_type.0, %time, "no usable readings");
                continue;
            }
        };
        column_values.push(value);
    }

    if column_values.is_empty() {
        return Err(TidemarkError::Calculator(format!(
            "No values for sensor type {} at {}",
            sensor_type.0, time
        )));
    }

    let mean = column_values.iter().sum::<f64>() / column_values.len() as f64;
    result.set_calculated_value(mean);
    Ok(result)
}

fn fetched_value(
    fetched: &BTreeMap<SensorValueId, SensorValue>,
    id: SensorValueId,
) -> Result<&SensorValue, TidemarkError> {
    fetched
        .get(&id)
        .ok_or_else(|| TidemarkError::RecordNotFound(format!("Sensor value {}", id)))
}
