//! # Sensor Value Store
//!
//! The persistence seam between the engine and whatever holds the raw
//! readings. All calls are synchronous; implementations must be shareable
//! across threads so different datasets can be reduced concurrently.
//!
//! Two backends exist:
//! - `MemoryStore`: a lock-guarded map, for tests and one-shot runs
//! - `RedbStore` (in `storage`): a redb database on disk

use crate::config::Instrument;
use crate::dataset::DatasetSensorValues;
use crate::sensor_value::SensorValue;
use crate::{DataSet, DatasetId, SensorValueId, TidemarkError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Storage operations used by the locator, the calculators and ingestion.
pub trait SensorValueStore: Send + Sync {
    /// Fetch readings of one dataset by id, in one batch.
    ///
    /// Unknown ids are a `RecordNotFound` error.
    fn get_sensor_values_by_id(
        &self,
        dataset: DatasetId,
        ids: &[SensorValueId],
    ) -> Result<Vec<SensorValue>, TidemarkError>;

    /// Persist the QC state of existing readings, in one batch.
    fn store_sensor_values(&self, values: &[SensorValue]) -> Result<(), TidemarkError>;

    /// Add new readings. Ids already in use are an `InvalidRecord` error and
    /// nothing is written.
    fn insert_sensor_values(&self, values: &[SensorValue]) -> Result<(), TidemarkError>;

    /// Load every reading of a dataset into an indexed collection.
    fn load_dataset(
        &self,
        instrument: &Instrument,
        dataset: DatasetId,
    ) -> Result<DatasetSensorValues, TidemarkError>;

    /// The smallest id not yet used by any reading.
    fn next_sensor_value_id(&self) -> Result<SensorValueId, TidemarkError>;

    /// Register or rename a dataset.
    fn store_dataset(&self, dataset: &DataSet) -> Result<(), TidemarkError>;

    /// Every registered dataset, ordered by id.
    fn datasets(&self) -> Result<Vec<DataSet>, TidemarkError>;

    /// Ids of every registered dataset.
    fn dataset_ids(&self) -> Result<Vec<DatasetId>, TidemarkError> {
        Ok(self.datasets()?.into_iter().map(|dataset| dataset.id).collect())
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    values: BTreeMap<(DatasetId, SensorValueId), SensorValue>,
    owners: BTreeMap<SensorValueId, DatasetId>,
    datasets: BTreeMap<DatasetId, DataSet>,
}

/// A store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, TidemarkError> {
        self.state
            .read()
            .map_err(|_| TidemarkError::IoError("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, TidemarkError> {
        self.state
            .write()
            .map_err(|_| TidemarkError::IoError("memory store lock poisoned".to_string()))
    }
}

impl SensorValueStore for MemoryStore {
    fn get_sensor_values_by_id(
        &self,
        dataset: DatasetId,
        ids: &[SensorValueId],
    ) -> Result<Vec<SensorValue>, TidemarkError> {
        let state = self.read()?;
        ids.iter()
            .map(|id| {
                state.values.get(&(dataset, *id)).cloned().ok_or_else(|| {
                    TidemarkError::RecordNotFound(format!(
                        "Sensor value {} in dataset {}",
                        id, dataset
                    ))
                })
            })
            .collect()
    }

    fn store_sensor_values(&self, values: &[SensorValue]) -> Result<(), TidemarkError> {
        let mut state = self.write()?;
        for value in values {
            let key = (value.dataset_id(), value.id());
            if !state.values.contains_key(&key) {
                return Err(TidemarkError::RecordNotFound(format!(
                    "Sensor value {} in dataset {}",
                    value.id(),
                    value.dataset_id()
                )));
            }
        }
        for value in values {
            state
                .values
                .insert((value.dataset_id(), value.id()), value.clone());
        }
        Ok(())
    }

    fn insert_sensor_values(&self, values: &[SensorValue]) -> Result<(), TidemarkError> {
        let mut state = self.write()?;
        let mut batch = BTreeSet::new();
        for value in values {
            if state.owners.contains_key(&value.id()) || !batch.insert(value.id()) {
                return Err(TidemarkError::InvalidRecord(format!(
                    "Sensor value id {} is already in use",
                    value.id()
                )));
            }
        }
        for value in values {
            state.owners.insert(value.id(), value.dataset_id());
            state
                .values
                .insert((value.dataset_id(), value.id()), value.clone());
        }
        Ok(())
    }

    fn load_dataset(
        &self,
        instrument: &Instrument,
        dataset: DatasetId,
    ) -> Result<DatasetSensorValues, TidemarkError> {
        let state = self.read()?;
        let mut result = DatasetSensorValues::new(dataset, instrument);
        let range = (dataset, SensorValueId(0))..=(dataset, SensorValueId(u64::MAX));
        for value in state.values.range(range).map(|(_, value)| value) {
            result.add(value.clone())?;
        }
        Ok(result)
    }

    fn next_sensor_value_id(&self) -> Result<SensorValueId, TidemarkError> {
        let state = self.read()?;
        let next = state
            .owners
            .keys()
            .next_back()
            .map(|id| id.0 + 1)
            .unwrap_or(1);
        Ok(SensorValueId(next))
    }

    fn store_dataset(&self, dataset: &DataSet) -> Result<(), TidemarkError> {
        self.write()?.datasets.insert(dataset.id, dataset.clone());
        Ok(())
    }

    fn datasets(&self) -> Result<Vec<DataSet>, TidemarkError> {
        Ok(self.read()?.datasets.values().cloned().collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
