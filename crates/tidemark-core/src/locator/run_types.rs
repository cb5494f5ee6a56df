use super::RunTypeResolver;
use crate::config::Instrument;
use crate::dataset::DatasetSensorValues;
use crate::{SensorTypeId, TidemarkError, Timestamp};
use std::collections::BTreeMap;

/// Reads run types from the instrument's run-type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRunTypes {
    sensor_type: SensorTypeId,
}

impl ColumnRunTypes {
    /// Use the first column assigned to `sensor_type`.
    #[must_use]
    pub fn new(sensor_type: SensorTypeId) -> Self {
        Self { sensor_type }
    }
}

impl RunTypeResolver for ColumnRunTypes {
    fn run_types(
        &self,
        values: &DatasetSensorValues,
        instrument: &Instrument,
    ) -> Result<BTreeMap<Timestamp, String>, TidemarkError> {
        let column = instrument.first_column(self.sensor_type)?;
        let Some(list) = values.get_by_column(column) else {
            return Ok(BTreeMap::new());
        };

        Ok(list
            .ids()
            .filter_map(|id| values.get_by_id(id))
            .filter_map(|value| {
                value
                    .value()
                    .map(|raw| (value.time(), raw.trim().to_lowercase()))
            })
            .collect())
    }
}
