use super::MeasurementLocator;
use crate::config::{Instrument, SensorsConfiguration};
use crate::measurement::Measurement;
use crate::primitives::MEASUREMENT_RUN_TYPE;
use crate::store::SensorValueStore;
use crate::{DataSet, TidemarkError, Timestamp, VariableId};
use std::collections::BTreeMap;
use tracing::debug;

/// A measurement wherever a variable's core sensor reported a number.
///
/// Each measurement carries every variable measured at that time. Nothing is
/// flagged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuousLocator;

impl ContinuousLocator {
    fn scan(
        store: &dyn SensorValueStore,
        config: &SensorsConfiguration,
        instrument: &Instrument,
        dataset: &DataSet,
    ) -> Result<Vec<Measurement>, TidemarkError> {
        let values = store.load_dataset(instrument, dataset.id)?;
        let mut by_time: BTreeMap<Timestamp, BTreeMap<VariableId, String>> = BTreeMap::new();

        for variable_id in &instrument.variables {
            let variable = config.variable(*variable_id)?;
            for value in values.get_by_sensor_type(variable.core_sensor_type) {
                if value.is_nan() {
                    continue;
                }
                by_time
                    .entry(value.time())
                    .or_default()
                    .insert(*variable_id, MEASUREMENT_RUN_TYPE.to_string());
            }
        }

        let measurements: Vec<Measurement> = by_time
            .into_iter()
            .map(|(time, run_types)| Measurement::new(dataset.id, time, run_types))
            .collect();
        debug!(
            dataset = dataset.id.0,
            measurements = measurements.len(),
            "continuous scan complete"
        );
        Ok(measurements)
    }
}

impl MeasurementLocator for ContinuousLocator {
    fn locate_measurements(
        &self,
        store: &dyn SensorValueStore,
        config: &SensorsConfiguration,
        instrument: &Instrument,
        dataset: &DataSet,
    ) -> Result<Vec<Measurement>, TidemarkError> {
        Self::scan(store, config, instrument, dataset).map_err(TidemarkError::wrap_locator)
    }
}
