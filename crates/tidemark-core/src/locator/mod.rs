//! # Measurement Locators
//!
//! Turn a dataset's raw readings into an ordered list of measurements.
//!
//! Each instrument family locates measurements its own way:
//! - `ModeSignalLocator`: run types switch between water and atmosphere
//!   modes, and a change in an auxiliary zero-count signal opens a
//!   flushing window
//! - `ContinuousLocator`: a measurement at every timestamp with a core
//!   reading
//!
//! A locator's only side effect is marking readings FLUSHING and persisting
//! them. Any failure is reported as a single `Locator` error and no
//! measurements are returned.

mod continuous;
mod mode_signal;
mod run_types;

pub use continuous::ContinuousLocator;
pub use mode_signal::{ModeSignalLocator, ModeSignalSettings};
pub use run_types::ColumnRunTypes;

use crate::config::{Instrument, SensorsConfiguration};
use crate::dataset::DatasetSensorValues;
use crate::measurement::Measurement;
use crate::store::SensorValueStore;
use crate::{DataSet, TidemarkError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Locates the measurements of one dataset.
pub trait MeasurementLocator: Send + Sync {
    /// Locate measurements, persisting any FLUSHING flags set on the way.
    ///
    /// The result is not guaranteed to be sorted.
    fn locate_measurements(
        &self,
        store: &dyn SensorValueStore,
        config: &SensorsConfiguration,
        instrument: &Instrument,
        dataset: &DataSet,
    ) -> Result<Vec<Measurement>, TidemarkError>;
}

/// Supplies the run type reported at each timestamp.
///
/// Run types are lower-cased and trimmed.
pub trait RunTypeResolver: Send + Sync {
    fn run_types(
        &self,
        values: &DatasetSensorValues,
        instrument: &Instrument,
    ) -> Result<BTreeMap<Timestamp, String>, TidemarkError>;
}

/// Run types known in advance.
impl RunTypeResolver for BTreeMap<Timestamp, String> {
    fn run_types(
        &self,
        _values: &DatasetSensorValues,
        _instrument: &Instrument,
    ) -> Result<BTreeMap<Timestamp, String>, TidemarkError> {
        Ok(self
            .iter()
            .map(|(time, run_type)| (*time, run_type.trim().to_lowercase()))
            .collect())
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Serializable choice of locator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocatorSettings {
    /// Water/atmosphere modes with flushing after zero-count changes.
    ModeSignal(ModeSignalSettings),
    /// A measurement at every core reading.
    #[default]
    Continuous,
}

impl LocatorSettings {
    /// Build the configured locator.
    ///
    /// Fails when the run-type sensor named by the settings is unknown.
    pub fn build(
        &self,
        config: &SensorsConfiguration,
    ) -> Result<Box<dyn MeasurementLocator>, TidemarkError> {
        match self {
            LocatorSettings::ModeSignal(settings) => {
                let run_type_sensor = config.sensor_type_by_name(&settings.run_type_sensor)?;
                Ok(Box::new(ModeSignalLocator::new(
                    settings.clone(),
                    ColumnRunTypes::new(run_type_sensor.id),
                )))
            }
            LocatorSettings::Continuous => Ok(Box::new(ContinuousLocator)),
        }
    }
}
