//! # Dataset Sensor Values
//!
//! The in-memory, multi-index collection of one dataset's raw readings.
//!
//! Every value added is reachable through four indexes:
//! - by id (the owning map)
//! - by column (time-sorted, searchable)
//! - by sensor type (ordered by time, then id)
//! - by timestamp, then sensor type (record-style row access)
//!
//! The secondary indexes hold ids only, so QC updates never touch them.
//! Re-adding a value with a known id rebuilds that value's entries.

use crate::config::Instrument;
use crate::flag::Flag;
use crate::search::SearchableSensorValues;
use crate::sensor_value::SensorValue;
use crate::{ColumnId, DatasetId, SensorTypeId, SensorValueId, TidemarkError, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

/// All raw readings of one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSensorValues {
    dataset_id: DatasetId,
    column_types: BTreeMap<ColumnId, SensorTypeId>,
    by_id: BTreeMap<SensorValueId, SensorValue>,
    by_column: BTreeMap<ColumnId, SearchableSensorValues>,
    by_sensor_type: BTreeMap<SensorTypeId, BTreeSet<(Timestamp, SensorValueId)>>,
    by_time: BTreeMap<Timestamp, BTreeMap<SensorTypeId, Vec<SensorValueId>>>,
}

impl DatasetSensorValues {
    /// An empty collection for a dataset of `instrument`.
    #[must_use]
    pub fn new(dataset_id: DatasetId, instrument: &Instrument) -> Self {
        Self {
            dataset_id,
            column_types: instrument.column_sensor_types(),
            by_id: BTreeMap::new(),
            by_column: BTreeMap::new(),
            by_sensor_type: BTreeMap::new(),
            by_time: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    /// The sensor type measured by a column.
    #[must_use]
    pub fn sensor_type_for_column(&self, column: ColumnId) -> Option<SensorTypeId> {
        self.column_types.get(&column).copied()
    }

    /// Add a value to all four indexes.
    pub fn add(&mut self, value: SensorValue) -> Result<(), TidemarkError> {
        let sensor_type = self.sensor_type_for_column(value.column_id()).ok_or_else(|| {
            TidemarkError::RecordNotFound(format!(
                "Column {} of sensor value {} has no sensor type",
                value.column_id().0,
                value.id()
            ))
        })?;

        if let Some(previous) = self.by_id.remove(&value.id()) {
            self.unindex(&previous);
        }

        let id = value.id();
        let time = value.time();
        self.by_column
            .entry(value.column_id())
            .or_default()
            .insert(time, id);
        self.by_sensor_type
            .entry(sensor_type)
            .or_default()
            .insert((time, id));
        self.by_time
            .entry(time)
            .or_default()
            .entry(sensor_type)
            .or_default()
            .push(id);
        self.by_id.insert(id, value);
        Ok(())
    }

    fn unindex(&mut self, value: &SensorValue) {
        let id = value.id();
        let time = value.time();
        if let Some(list) = self.by_column.get_mut(&value.column_id()) {
            list.remove(time, id);
        }
        if let Some(sensor_type) = self.sensor_type_for_column(value.column_id()) {
            if let Some(set) = self.by_sensor_type.get_mut(&sensor_type) {
                set.remove(&(time, id));
            }
            if let Some(row) = self.by_time.get_mut(&time) {
                if let Some(ids) = row.get_mut(&sensor_type) {
                    ids.retain(|existing| *existing != id);
                    if ids.is_empty() {
                        row.remove(&sensor_type);
                    }
                }
                if row.is_empty() {
                    self.by_time.remove(&time);
                }
            }
        }
    }

    #[must_use]
    pub fn get_by_id(&self, id: SensorValueId) -> Option<&SensorValue> {
        self.by_id.get(&id)
    }

    /// The time-searchable list of a column. `None` when the column has no
    /// values.
    #[must_use]
    pub fn get_by_column(&self, column: ColumnId) -> Option<&SearchableSensorValues> {
        self.by_column.get(&column)
    }

    /// Every value of a sensor type across all its columns, ordered by time
    /// then id.
    #[must_use]
    pub fn get_by_sensor_type(&self, sensor_type: SensorTypeId) -> Vec<&SensorValue> {
        self.by_sensor_type
            .get(&sensor_type)
            .map(|set| {
                set.iter()
                    .filter_map(|(_, id)| self.by_id.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All distinct timestamps, ascending.
    pub fn times(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.by_time.keys().copied()
    }

    /// The values recorded at `time`, grouped by sensor type.
    ///
    /// Sensor types with no value at that instant are absent from the map.
    #[must_use]
    pub fn get(&self, time: Timestamp) -> BTreeMap<SensorTypeId, Vec<&SensorValue>> {
        self.by_time
            .get(&time)
            .map(|row| {
                row.iter()
                    .map(|(sensor_type, ids)| {
                        let values = ids.iter().filter_map(|id| self.by_id.get(id)).collect();
                        (*sensor_type, values)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The value of one column at exactly `time`.
    #[must_use]
    pub fn column_value_at(&self, column: ColumnId, time: Timestamp) -> Option<&SensorValue> {
        self.get_by_column(column)
            .and_then(|list| list.exact(time))
            .and_then(|id| self.by_id.get(&id))
    }

    /// Columns that hold at least one value.
    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.by_column.keys().copied()
    }

    /// Every value, ordered by id.
    pub fn values(&self) -> impl Iterator<Item = &SensorValue> + '_ {
        self.by_id.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Record a user QC decision on a stored value and return the updated
    /// value.
    pub fn set_user_qc(
        &mut self,
        id: SensorValueId,
        flag: Flag,
        message: impl Into<String>,
    ) -> Result<&SensorValue, TidemarkError> {
        let value = self.value_mut(id)?;
        value.set_user_qc(flag, message);
        Ok(value)
    }

    /// Record an automatic QC result on a stored value.
    pub fn set_auto_qc(
        &mut self,
        id: SensorValueId,
        flag: Flag,
        message: impl Into<String>,
    ) -> Result<&SensorValue, TidemarkError> {
        let value = self.value_mut(id)?;
        value.set_auto_qc(flag, message);
        Ok(value)
    }

    fn value_mut(&mut self, id: SensorValueId) -> Result<&mut SensorValue, TidemarkError> {
        self.by_id
            .get_mut(&id)
            .ok_or_else(|| TidemarkError::RecordNotFound(format!("Sensor value {}", id)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorAssignment;
    use crate::{InstrumentId, timestamp_from_secs};

    fn t(secs: i64) -> Timestamp {
        timestamp_from_secs(secs).expect("time")
    }

    fn instrument() -> Instrument {
        Instrument::new(InstrumentId(1), "test")
            .with_assignment(SensorAssignment::new(ColumnId(1), SensorTypeId(10)))
            .with_assignment(SensorAssignment::new(ColumnId(2), SensorTypeId(10)))
            .with_assignment(SensorAssignment::new(ColumnId(3), SensorTypeId(20)))
    }

    fn value(id: u64, column: u64, secs: i64, raw: &str) -> SensorValue {
        SensorValue::new(
            SensorValueId(id),
            DatasetId(1),
            ColumnId(column),
            t(secs),
            Some(raw.to_string()),
        )
    }

    fn populated() -> DatasetSensorValues {
        let mut values = DatasetSensorValues::new(DatasetId(1), &instrument());
        for v in [
            value(1, 1, 0, "10"),
            value(2, 2, 0, "11"),
            value(3, 3, 0, "35"),
            value(4, 1, 10, "20"),
            value(5, 3, 20, "34"),
        ] {
            values.add(v).expect("add");
        }
        values
    }

    #[test]
    fn every_index_sees_added_values() {
        let values = populated();
        assert_eq!(values.len(), 5);
        assert_eq!(values.get_by_id(SensorValueId(4)).expect("id").double_value(), 20.0);
        assert_eq!(values.get_by_column(ColumnId(1)).expect("column").len(), 2);

        let by_type: Vec<_> = values
            .get_by_sensor_type(SensorTypeId(10))
            .iter()
            .map(|v| v.id())
            .collect();
        assert_eq!(by_type, vec![SensorValueId(1), SensorValueId(2), SensorValueId(4)]);

        assert_eq!(values.times().collect::<Vec<_>>(), vec![t(0), t(10), t(20)]);

        let row = values.get(t(0));
        assert_eq!(row[&SensorTypeId(10)].len(), 2);
        assert_eq!(row[&SensorTypeId(20)].len(), 1);
        assert!(!values.get(t(10)).contains_key(&SensorTypeId(20)));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let mut values = DatasetSensorValues::new(DatasetId(1), &instrument());
        let result = values.add(value(1, 99, 0, "1"));
        assert!(matches!(result, Err(TidemarkError::RecordNotFound(_))));
        assert!(values.is_empty());
    }

    #[test]
    fn re_adding_rebuilds_entries() {
        let mut values = populated();
        values.add(value(4, 1, 15, "21")).expect("re-add");

        assert_eq!(values.len(), 5);
        assert_eq!(values.times().collect::<Vec<_>>(), vec![t(0), t(15), t(20)]);
        let column = values.get_by_column(ColumnId(1)).expect("column");
        assert_eq!(column.exact(t(15)), Some(SensorValueId(4)));
        assert_eq!(column.exact(t(10)), None);
    }

    #[test]
    fn qc_updates_do_not_move_index_entries() {
        let mut values = populated();
        let updated = values
            .set_user_qc(SensorValueId(4), Flag::Flushing, "Flushing")
            .expect("qc");
        assert!(updated.is_flushing());

        assert_eq!(
            values.column_value_at(ColumnId(1), t(10)).map(SensorValue::id),
            Some(SensorValueId(4))
        );
        assert!(values.set_auto_qc(SensorValueId(99), Flag::Bad, "").is_err());
    }

    #[test]
    fn column_search_skips_unusable_values() {
        let mut values = populated();
        values
            .set_user_qc(SensorValueId(4), Flag::Flushing, "Flushing")
            .expect("qc");
        let list = values.get_by_column(ColumnId(1)).expect("column");
        let usable = |id: SensorValueId| values.get_by_id(id).is_some_and(SensorValue::is_usable);
        assert_eq!(list.prior_matching(t(12), usable), Some(SensorValueId(1)));
        assert_eq!(list.post_matching(t(5), usable), None);
    }
}
