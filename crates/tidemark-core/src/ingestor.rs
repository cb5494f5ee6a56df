//! # Ingestor Module
//!
//! Validation and ingestion of raw instrument readings.
//!
//! - Validate readings before they reach the store
//! - Reject malformed input and readings for unassigned columns
//! - Reject a second reading for the same column and time
//! - No interpretation of values beyond trimming

use crate::config::Instrument;
use crate::primitives::{MAX_BATCH_LENGTH, MAX_VALUE_LENGTH};
use crate::sensor_value::SensorValue;
use crate::store::SensorValueStore;
use crate::{ColumnId, DataSet, SensorValueId, TidemarkError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// A reading as it arrives from a data file, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReading {
    pub column: ColumnId,
    pub time: Timestamp,
    pub value: Option<String>,
}

impl RawReading {
    #[must_use]
    pub fn new(column: ColumnId, time: Timestamp, value: Option<String>) -> Self {
        Self {
            column,
            time,
            value,
        }
    }

    /// The trimmed value; blank values count as absent.
    #[must_use]
    pub fn normalized_value(&self) -> Option<String> {
        self.value
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(str::to_string)
    }
}

/// The Ingestor validates readings and hands them to a store.
pub struct Ingestor;

impl Ingestor {
    /// Validate a reading against the instrument.
    ///
    /// A reading is valid if:
    /// - Its column is assigned on the instrument
    /// - Its value is within length limits
    pub fn validate(reading: &RawReading, instrument: &Instrument) -> Result<(), TidemarkError> {
        if instrument.sensor_type_for_column(reading.column).is_none() {
            return Err(TidemarkError::InvalidRecord(format!(
                "Column {} is not assigned on instrument '{}'",
                reading.column.0, instrument.name
            )));
        }

        if let Some(value) = &reading.value
            && value.len() > MAX_VALUE_LENGTH
        {
            return Err(TidemarkError::InvalidRecord(format!(
                "Value in column {} at {} exceeds {} bytes",
                reading.column.0, reading.time, MAX_VALUE_LENGTH
            )));
        }

        Ok(())
    }

    /// Ingest a batch of readings into a dataset.
    ///
    /// Ids are assigned in batch order starting at the store's next free id.
    /// The batch is written atomically: if any reading is rejected nothing is
    /// stored.
    ///
    /// # Errors
    /// Returns `TidemarkError::InvalidRecord` if:
    /// - The batch exceeds `MAX_BATCH_LENGTH`
    /// - Any reading is invalid
    /// - Two readings share a column and time, in the batch or in the store
    pub fn ingest(
        store: &dyn SensorValueStore,
        instrument: &Instrument,
        dataset: &DataSet,
        readings: &[RawReading],
    ) -> Result<Vec<SensorValueId>, TidemarkError> {
        if readings.is_empty() {
            return Ok(Vec::new());
        }

        if readings.len() > MAX_BATCH_LENGTH {
            return Err(TidemarkError::InvalidRecord(format!(
                "Batch of {} readings exceeds {}",
                readings.len(),
                MAX_BATCH_LENGTH
            )));
        }

        let existing = store.load_dataset(instrument, dataset.id)?;
        let mut seen: BTreeSet<(ColumnId, Timestamp)> = BTreeSet::new();
        for reading in readings {
            Self::validate(reading, instrument)?;
            if !seen.insert((reading.column, reading.time))
                || existing.column_value_at(reading.column, reading.time).is_some()
            {
                return Err(TidemarkError::InvalidRecord(format!(
                    "Duplicate reading for column {} at {}",
                    reading.column.0, reading.time
                )));
            }
        }

        let first = store.next_sensor_value_id()?.0;
        let values: Vec<SensorValue> = readings
            .iter()
            .zip(first..)
            .map(|(reading, id)| {
                SensorValue::new(
                    SensorValueId(id),
                    dataset.id,
                    reading.column,
                    reading.time,
                    reading.normalized_value(),
                )
            })
            .collect();

        store.insert_sensor_values(&values)?;
        debug!(dataset = dataset.id.0, readings = values.len(), "ingested readings");
        Ok(values.iter().map(SensorValue::id).collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
