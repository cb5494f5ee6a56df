//! # redb-backed Sensor Value Storage
//!
//! A disk-backed `SensorValueStore` using the redb embedded database.
//!
//! Readings are postcard-encoded and keyed by `(dataset, id)` so a dataset
//! loads with a single range scan. A second table maps each id to its
//! dataset, which keeps id allocation global across datasets.
//!
//! redb gives us:
//! - ACID transactions (a batch is written completely or not at all)
//! - MVCC (concurrent readers, single writer), so one store can serve
//!   several dataset reductions at once

use crate::config::Instrument;
use crate::dataset::DatasetSensorValues;
use crate::sensor_value::SensorValue;
use crate::store::SensorValueStore;
use crate::{DataSet, DatasetId, SensorValueId, TidemarkError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for readings: (dataset_id, sensor_value_id) -> serialized SensorValue
const SENSOR_VALUES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("sensor_values");

/// Table for id ownership: sensor_value_id -> dataset_id
const VALUE_OWNERS: TableDefinition<u64, u64> = TableDefinition::new("value_owners");

/// Table for datasets: dataset_id -> serialized DataSet
const DATASETS: TableDefinition<u64, &[u8]> = TableDefinition::new("datasets");

/// A disk-backed sensor value store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TidemarkError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| TidemarkError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(SENSOR_VALUES)
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(VALUE_OWNERS)
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(DATASETS)
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Number of stored readings across all datasets.
    pub fn value_count(&self) -> Result<usize, TidemarkError> {
        use redb::ReadableTableMetadata;

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        let owners = read_txn
            .open_table(VALUE_OWNERS)
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        let count = owners
            .len()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        Ok(count as usize)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, TidemarkError> {
    postcard::to_allocvec(value).map_err(|e| TidemarkError::SerializationError(e.to_string()))
}

fn decode<'a, T: serde::Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, TidemarkError> {
    postcard::from_bytes(bytes).map_err(|e| TidemarkError::DeserializationError(e.to_string()))
}

impl SensorValueStore for RedbStore {
    fn get_sensor_values_by_id(
        &self,
        dataset: DatasetId,
        ids: &[SensorValueId],
    ) -> Result<Vec<SensorValue>, TidemarkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SENSOR_VALUES)
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;

        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let data = table
                .get((dataset.0, id.0))
                .map_err(|e| TidemarkError::IoError(e.to_string()))?
                .ok_or_else(|| {
                    TidemarkError::RecordNotFound(format!(
                        "Sensor value {} in dataset {}",
                        id, dataset
                    ))
                })?;
            values.push(decode(data.value())?);
        }
        Ok(values)
    }

    fn store_sensor_values(&self, values: &[SensorValue]) -> Result<(), TidemarkError> {
        if values.is_empty() {
            return Ok(());
        }

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(SENSOR_VALUES)
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            for value in values {
                let key = (value.dataset_id().0, value.id().0);
                let exists = table
                    .get(key)
                    .map_err(|e| TidemarkError::IoError(e.to_string()))?
                    .is_some();
                if !exists {
                    // Dropping the transaction without commit discards the batch.
                    return Err(TidemarkError::RecordNotFound(format!(
                        "Sensor value {} in dataset {}",
                        value.id(),
                        value.dataset_id()
                    )));
                }
                let bytes = encode(value)?;
                table
                    .insert(key, bytes.as_slice())
                    .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        Ok(())
    }

    fn insert_sensor_values(&self, values: &[SensorValue]) -> Result<(), TidemarkError> {
        if values.is_empty() {
            return Ok(());
        }

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(SENSOR_VALUES)
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            let mut owners = write_txn
                .open_table(VALUE_OWNERS)
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;

            let mut batch = BTreeSet::new();
            for value in values {
                let taken = owners
                    .get(value.id().0)
                    .map_err(|e| TidemarkError::IoError(e.to_string()))?
                    .is_some();
                if taken || !batch.insert(value.id()) {
                    return Err(TidemarkError::InvalidRecord(format!(
                        "Sensor value id {} is already in use",
                        value.id()
                    )));
                }
                let bytes = encode(value)?;
                table
                    .insert((value.dataset_id().0, value.id().0), bytes.as_slice())
                    .map_err(|e| TidemarkError::IoError(e.to_string()))?;
                owners
                    .insert(value.id().0, value.dataset_id().0)
                    .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        Ok(())
    }

    fn load_dataset(
        &self,
        instrument: &Instrument,
        dataset: DatasetId,
    ) -> Result<DatasetSensorValues, TidemarkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SENSOR_VALUES)
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;

        let mut result = DatasetSensorValues::new(dataset, instrument);
        for entry in table
            .range((dataset.0, 0)..=(dataset.0, u64::MAX))
            .map_err(|e| TidemarkError::IoError(e.to_string()))?
        {
            let (_, data) = entry.map_err(|e| TidemarkError::IoError(e.to_string()))?;
            result.add(decode(data.value())?)?;
        }
        Ok(result)
    }

    fn next_sensor_value_id(&self) -> Result<SensorValueId, TidemarkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        let owners = read_txn
            .open_table(VALUE_OWNERS)
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        let last = owners
            .last()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?
            .map(|(id, _)| id.value());
        Ok(SensorValueId(last.map_or(1, |id| id + 1)))
    }

    fn store_dataset(&self, dataset: &DataSet) -> Result<(), TidemarkError> {
        let bytes = encode(dataset)?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(DATASETS)
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
            table
                .insert(dataset.id.0, bytes.as_slice())
                .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        Ok(())
    }

    fn datasets(&self) -> Result<Vec<DataSet>, TidemarkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(DATASETS)
            .map_err(|e| TidemarkError::IoError(e.to_string()))?;

        let mut datasets = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| TidemarkError::IoError(e.to_string()))?
        {
            let (_, data) = entry.map_err(|e| TidemarkError::IoError(e.to_string()))?;
            datasets.push(decode(data.value())?);
        }
        Ok(datasets)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::SensorAssignment;
    use crate::flag::Flag;
    use crate::{ColumnId, InstrumentId, SensorTypeId, timestamp_from_secs};
    use tempfile::tempdir;

    fn reading(dataset: u64, id: u64, secs: i64, raw: &str) -> SensorValue {
        SensorValue::new(
            SensorValueId(id),
            DatasetId(dataset),
            ColumnId(1),
            timestamp_from_secs(secs).expect("time"),
            Some(raw.to_string()),
        )
    }

    fn instrument() -> Instrument {
        Instrument::new(InstrumentId(1), "test")
            .with_assignment(SensorAssignment::new(ColumnId(1), SensorTypeId(1)))
    }

    #[test]
    fn insert_and_load() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store
            .insert_sensor_values(&[
                reading(1, 1, 0, "10"),
                reading(1, 2, 10, "20"),
                reading(2, 3, 0, "30"),
            ])
            .expect("insert");

        let dataset = store.load_dataset(&instrument(), DatasetId(1)).expect("load");
        assert_eq!(dataset.len(), 2);
        assert_eq!(store.value_count().expect("count"), 3);
        assert_eq!(store.next_sensor_value_id().expect("next"), SensorValueId(4));
    }

    #[test]
    fn empty_store_starts_ids_at_one() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        assert_eq!(store.next_sensor_value_id().expect("next"), SensorValueId(1));
        assert!(store.datasets().expect("datasets").is_empty());
    }

    #[test]
    fn duplicate_batch_is_discarded() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store
            .insert_sensor_values(&[reading(1, 1, 0, "10")])
            .expect("insert");

        let result = store.insert_sensor_values(&[reading(1, 2, 5, "11"), reading(2, 1, 0, "12")]);
        assert!(matches!(result, Err(TidemarkError::InvalidRecord(_))));
        assert_eq!(store.value_count().expect("count"), 1);
    }

    #[test]
    fn qc_updates_persist_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("test.redb");

        {
            let store = RedbStore::open(&path).expect("open db");
            store
                .insert_sensor_values(&[reading(1, 1, 0, "10")])
                .expect("insert");
            let mut value = store
                .get_sensor_values_by_id(DatasetId(1), &[SensorValueId(1)])
                .expect("fetch")
                .remove(0);
            value.set_user_qc(Flag::Flushing, "Flushing");
            store.store_sensor_values(&[value]).expect("store");
            store
                .store_dataset(&DataSet::new(DatasetId(1), InstrumentId(1), "leg 1"))
                .expect("dataset");
        }

        {
            let store = RedbStore::open(&path).expect("open db");
            let value = store
                .get_sensor_values_by_id(DatasetId(1), &[SensorValueId(1)])
                .expect("fetch")
                .remove(0);
            assert_eq!(value.user_qc_flag(), Flag::Flushing);
            assert_eq!(value.user_qc_message(), "Flushing");
            assert_eq!(store.dataset_ids().expect("ids"), vec![DatasetId(1)]);
        }
    }

    #[test]
    fn unknown_ids_fail() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        assert!(matches!(
            store.get_sensor_values_by_id(DatasetId(1), &[SensorValueId(9)]),
            Err(TidemarkError::RecordNotFound(_))
        ));
        assert!(store.store_sensor_values(&[reading(1, 9, 0, "1")]).is_err());
    }

    #[test]
    fn store_is_shareable_across_threads() {
        let temp = tempdir().expect("temp dir");
        let store =
            std::sync::Arc::new(RedbStore::open(temp.path().join("test.redb")).expect("open db"));

        let handles: Vec<_> = (0..4u64)
            .map(|dataset| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .insert_sensor_values(&[reading(dataset, dataset + 1, 0, "1")])
                        .expect("insert");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        assert_eq!(store.value_count().expect("count"), 4);
    }
}
