//! # Data Reduction
//!
//! One pass over one dataset:
//!
//! 1. Locate measurements (FLUSHING flags are persisted by the locator)
//! 2. Reload the readings so the new flags are visible
//! 3. Walk measurements in time order, resolving neighbours with forward
//!    cursors scoped to this pass
//! 4. Calculate a value for every sensor type the measured variables need
//!
//! A calculator failure affects only its own value, which is recorded as
//! NaN and BAD. Locator, configuration and storage failures abort the pass.

use crate::calculator::{CalculationContext, calculate_measurement_value};
use crate::config::{Instrument, SensorsConfiguration};
use crate::export::ExportRecord;
use crate::locator::MeasurementLocator;
use crate::measurement::{DatasetMeasurements, Measurement, MeasurementValues, NeighbourIndex};
use crate::measurement_value::MeasurementValue;
use crate::search::SearchCursors;
use crate::store::SensorValueStore;
use crate::{DataSet, DatasetId, SensorTypeId, TidemarkError};
use tracing::{debug, info, warn};

/// Reduces datasets of one instrument.
pub struct DataReducer<'a> {
    config: &'a SensorsConfiguration,
    instrument: &'a Instrument,
    locator: &'a dyn MeasurementLocator,
}

impl<'a> DataReducer<'a> {
    #[must_use]
    pub fn new(
        config: &'a SensorsConfiguration,
        instrument: &'a Instrument,
        locator: &'a dyn MeasurementLocator,
    ) -> Self {
        Self {
            config,
            instrument,
            locator,
        }
    }

    /// Sensor types to resolve for a measurement: every sensor type of its
    /// variables plus whatever their calculators read.
    pub fn sensor_types_for(
        &self,
        measurement: &Measurement,
    ) -> Result<Vec<SensorTypeId>, TidemarkError> {
        let mut result: Vec<SensorTypeId> = Vec::new();
        for variable in measurement.variables() {
            for sensor_type in self.config.variable(variable)?.sensor_types() {
                let dependencies = self.config.sensor_type(sensor_type)?.calculator.dependencies();
                for id in std::iter::once(sensor_type).chain(dependencies) {
                    if !result.contains(&id) {
                        result.push(id);
                    }
                }
            }
        }
        Ok(result)
    }

    /// Run one reduction pass over `dataset`.
    pub fn reduce(
        &self,
        store: &dyn SensorValueStore,
        dataset: &DataSet,
    ) -> Result<DatasetReduction, TidemarkError> {
        let located =
            self.locator
                .locate_measurements(store, self.config, self.instrument, dataset)?;
        debug!(dataset = dataset.id.0, located = located.len(), "measurements located");

        let sensor_values = store.load_dataset(self.instrument, dataset.id)?;
        let measurements = DatasetMeasurements::new(located);
        let context = CalculationContext {
            config: self.config,
            instrument: self.instrument,
            store,
        };

        let prefix = format!("reduce/{}", dataset.id);
        let mut cursors = SearchCursors::new();
        let mut results = Vec::with_capacity(measurements.len());
        let mut failures = 0;

        {
            let mut index = NeighbourIndex::new(&sensor_values, &mut cursors, prefix.as_str());
            for measurement in measurements.all() {
                let sensor_types = self.sensor_types_for(measurement)?;
                let mut values =
                    index.measurement_values(measurement.clone(), &sensor_types, self.instrument);

                for sensor_type in sensor_types {
                    let value = match calculate_measurement_value(
                        sensor_type,
                        &values,
                        &sensor_values,
                        &context,
                    ) {
                        Ok(value) => value,
                        Err(err) if err.is_isolatable() => {
                            warn!(
                                dataset = dataset.id.0,
                                sensor_type = sensor_type.0,
                                time = %measurement.time(),
                                error = %err,
                                "value calculation failed"
                            );
                            failures += 1;
                            MeasurementValue::failed(sensor_type, err.to_string())
                        }
                        Err(err) => return Err(err),
                    };
                    values.insert_value(value);
                }
                results.push(values);
            }
        }

        let destroyed = cursors.destroy_with_prefix(&prefix);
        debug!(dataset = dataset.id.0, cursors = destroyed, "cursors destroyed");
        info!(
            dataset = dataset.id.0,
            name = %dataset.name,
            measurements = results.len(),
            failures,
            "dataset reduced"
        );

        Ok(DatasetReduction {
            dataset: dataset.id,
            values: results,
            failures,
        })
    }
}

/// The outcome of one reduction pass.
#[derive(Debug, Clone)]
pub struct DatasetReduction {
    dataset: DatasetId,
    values: Vec<MeasurementValues>,
    failures: usize,
}

impl DatasetReduction {
    #[must_use]
    pub fn dataset(&self) -> DatasetId {
        self.dataset
    }

    /// Calculated values per measurement, in time order.
    #[must_use]
    pub fn measurement_values(&self) -> &[MeasurementValues] {
        &self.values
    }

    /// Number of values whose calculation failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One export record per (measurement, sensor type).
    #[must_use]
    pub fn export_records(&self) -> Vec<ExportRecord> {
        crate::export::export_records(&self.values)
    }
}
