//! Locator for instruments that alternate between water and atmosphere
//! modes.
//!
//! The run type at each timestamp selects the mode. Whenever the zero-count
//! signal changes, the gas readings from that moment until
//! `preFlushingTime` seconds later are marked FLUSHING and stay out of every
//! calculation. The first zero count seen also opens a window. With a
//! flushing time of zero nothing is flagged.

use super::{MeasurementLocator, RunTypeResolver};
use crate::config::{Instrument, SensorsConfiguration};
use crate::flag::Flag;
use crate::measurement::Measurement;
use crate::primitives::{
    ATM_MODE, FLUSHING_MESSAGE, MEASUREMENT_RUN_TYPE, NAN_RUN_TYPE, PROP_PRE_FLUSHING_TIME,
    WATER_MODE,
};
use crate::sensor_value::SensorValue;
use crate::store::SensorValueStore;
use crate::{DataSet, SensorValueId, TidemarkError, Timestamp};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Names of the variables and sensor types the locator works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeSignalSettings {
    pub water_variable: String,
    pub atmosphere_variable: String,
    pub zero_count_sensor: String,
    pub gas_sensor: String,
    pub run_type_sensor: String,
}

impl Default for ModeSignalSettings {
    fn default() -> Self {
        Self {
            water_variable: "Pro Oceanus CO₂ Water".to_string(),
            atmosphere_variable: "Pro Oceanus CO₂ Atmosphere".to_string(),
            zero_count_sensor: "ProOceanus Zero Count".to_string(),
            gas_sensor: "xCO₂ (wet, no standards)".to_string(),
            run_type_sensor: "Run Type".to_string(),
        }
    }
}

/// Water/atmosphere locator with flushing windows.
#[derive(Debug, Clone)]
pub struct ModeSignalLocator<R> {
    settings: ModeSignalSettings,
    run_types: R,
}

impl<R: RunTypeResolver> ModeSignalLocator<R> {
    #[must_use]
    pub fn new(settings: ModeSignalSettings, run_types: R) -> Self {
        Self {
            settings,
            run_types,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ModeSignalSettings {
        &self.settings
    }

    fn scan(
        &self,
        store: &dyn SensorValueStore,
        config: &SensorsConfiguration,
        instrument: &Instrument,
        dataset: &DataSet,
    ) -> Result<Vec<Measurement>, TidemarkError> {
        let water = config.variable_by_name(&self.settings.water_variable)?.id;
        let atmosphere = config
            .variable_by_name(&self.settings.atmosphere_variable)?
            .id;
        let zero_count_type = config
            .sensor_type_by_name(&self.settings.zero_count_sensor)?
            .id;
        let gas_type = config.sensor_type_by_name(&self.settings.gas_sensor)?.id;
        let zero_count_column = instrument.first_column(zero_count_type)?;
        let gas_column = instrument.first_column(gas_type)?;

        let pre_flushing_secs = instrument.int_property(PROP_PRE_FLUSHING_TIME)?;
        let pre_flushing = TimeDelta::try_seconds(pre_flushing_secs).ok_or_else(|| {
            TidemarkError::Configuration(format!(
                "{} out of range: {}",
                PROP_PRE_FLUSHING_TIME, pre_flushing_secs
            ))
        })?;

        let mut values = store.load_dataset(instrument, dataset.id)?;
        let run_types = self.run_types.run_types(&values, instrument)?;
        let times: Vec<Timestamp> = values.times().collect();

        let mut measurements = Vec::new();
        let mut flushing: Vec<SensorValueId> = Vec::new();
        let mut last_zero_count: Option<String> = None;
        let mut flushing_end: Option<Timestamp> = None;

        for time in times {
            let Some(run_type) = run_types
                .get(&time)
                .map(|run_type| run_type.trim().to_lowercase())
                .filter(|run_type| !run_type.is_empty() && run_type != NAN_RUN_TYPE)
            else {
                continue;
            };

            let variable = match run_type.as_str() {
                WATER_MODE => water,
                ATM_MODE => atmosphere,
                other => {
                    return Err(TidemarkError::locator(format!(
                        "Unrecognised mode '{}'",
                        other
                    )));
                }
            };

            let zero_count = values
                .column_value_at(zero_count_column, time)
                .and_then(SensorValue::value);
            if let Some(zero_count) = zero_count
                && last_zero_count.as_deref() != Some(zero_count)
            {
                flushing_end = Some(time.checked_add_signed(pre_flushing).ok_or_else(|| {
                    TidemarkError::Configuration(format!(
                        "Flushing window from {} overflows",
                        time
                    ))
                })?);
                last_zero_count = Some(zero_count.to_string());
            }

            let in_flushing = flushing_end.is_some_and(|end| {
                time < end || (time == end && pre_flushing_secs > 0)
            });
            if in_flushing
                && let Some(gas) = values.column_value_at(gas_column, time).map(SensorValue::id)
            {
                values.set_user_qc(gas, Flag::Flushing, FLUSHING_MESSAGE)?;
                flushing.push(gas);
            }

            if instrument.has_variable(variable) {
                measurements.push(Measurement::for_variable(
                    dataset.id,
                    time,
                    variable,
                    MEASUREMENT_RUN_TYPE,
                ));
            }
        }

        let flagged: Vec<SensorValue> = flushing
            .iter()
            .filter_map(|id| values.get_by_id(*id).cloned())
            .collect();
        store.store_sensor_values(&flagged)?;

        debug!(
            dataset = dataset.id.0,
            measurements = measurements.len(),
            flushing = flagged.len(),
            "mode signal scan complete"
        );
        Ok(measurements)
    }
}

impl<R: RunTypeResolver> MeasurementLocator for ModeSignalLocator<R> {
    fn locate_measurements(
        &self,
        store: &dyn SensorValueStore,
        config: &SensorsConfiguration,
        instrument: &Instrument,
        dataset: &DataSet,
    ) -> Result<Vec<Measurement>, TidemarkError> {
        self.scan(store, config, instrument, dataset)
            .map_err(TidemarkError::wrap_locator)
    }
}

// =============================================================================
// TESTS
// =============================================================================
