//! # Measurements
//!
//! A measurement is one timestamp at which one or more variables produced a
//! reading worth reducing. This module holds:
//! - `Measurement` and the per-dataset `DatasetMeasurements` list
//! - `Neighbours`, the readings of one column surrounding a measurement
//! - `MeasurementValues`, one measurement's neighbours and calculated values
//! - `NeighbourIndex`, which resolves neighbours for measurements visited in
//!   time order using resumable column cursors

use crate::config::Instrument;
use crate::dataset::DatasetSensorValues;
use crate::measurement_value::MeasurementValue;
use crate::search::SearchCursors;
use crate::sensor_value::SensorValue;
use crate::{ColumnId, DatasetId, SensorTypeId, SensorValueId, Timestamp, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// MEASUREMENT
// =============================================================================

/// One located measurement. Ordered by time first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Measurement {
    time: Timestamp,
    dataset_id: DatasetId,
    run_types: BTreeMap<VariableId, String>,
}

impl Measurement {
    #[must_use]
    pub fn new(
        dataset_id: DatasetId,
        time: Timestamp,
        run_types: BTreeMap<VariableId, String>,
    ) -> Self {
        Self {
            time,
            dataset_id,
            run_types,
        }
    }

    /// A measurement of a single variable.
    #[must_use]
    pub fn for_variable(
        dataset_id: DatasetId,
        time: Timestamp,
        variable: VariableId,
        run_type: impl Into<String>,
    ) -> Self {
        Self::new(dataset_id, time, BTreeMap::from([(variable, run_type.into())]))
    }

    #[must_use]
    pub fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    #[must_use]
    pub fn run_types(&self) -> &BTreeMap<VariableId, String> {
        &self.run_types
    }

    #[must_use]
    pub fn run_type(&self, variable: VariableId) -> Option<&str> {
        self.run_types.get(&variable).map(String::as_str)
    }

    /// Variables measured at this instant.
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.run_types.keys().copied()
    }
}

/// All measurements of a dataset, sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetMeasurements {
    all: Vec<Measurement>,
}

impl DatasetMeasurements {
    /// Sort the located measurements. Locators may return them in any order.
    #[must_use]
    pub fn new(mut measurements: Vec<Measurement>) -> Self {
        measurements.sort();
        Self { all: measurements }
    }

    #[must_use]
    pub fn all(&self) -> &[Measurement] {
        &self.all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

// =============================================================================
// NEIGHBOURS
// =============================================================================

/// The usable readings of one column around a measurement time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Neighbours {
    /// A reading taken exactly at the measurement time.
    Exact(SensorValueId),
    /// The nearest readings on either side.
    Between {
        prior: SensorValueId,
        post: SensorValueId,
    },
    /// Only an earlier reading exists (end of series).
    Before(SensorValueId),
    /// Only a later reading exists (start of series).
    After(SensorValueId),
    /// No usable reading in the column.
    Missing,
}

impl Neighbours {
    /// Every referenced reading id.
    #[must_use]
    pub fn ids(&self) -> Vec<SensorValueId> {
        match *self {
            Neighbours::Exact(id) | Neighbours::Before(id) | Neighbours::After(id) => vec![id],
            Neighbours::Between { prior, post } => vec![prior, post],
            Neighbours::Missing => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Neighbours::Missing)
    }
}

// =============================================================================
// MEASUREMENT VALUES
// =============================================================================

/// One measurement with its neighbours and calculated values, keyed by
/// sensor type.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementValues {
    measurement: Measurement,
    neighbours: BTreeMap<SensorTypeId, Vec<(ColumnId, Neighbours)>>,
    values: BTreeMap<SensorTypeId, MeasurementValue>,
}

impl MeasurementValues {
    #[must_use]
    pub fn new(measurement: Measurement) -> Self {
        Self {
            measurement,
            neighbours: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Record the neighbours of one column. A column seen before is
    /// replaced.
    pub fn set_neighbours(
        &mut self,
        sensor_type: SensorTypeId,
        column: ColumnId,
        neighbours: Neighbours,
    ) {
        let columns = self.neighbours.entry(sensor_type).or_default();
        match columns.iter_mut().find(|(existing, _)| *existing == column) {
            Some(entry) => entry.1 = neighbours,
            None => columns.push((column, neighbours)),
        }
    }

    /// Neighbours per column of a sensor type, in column configuration
    /// order.
    #[must_use]
    pub fn neighbours(&self, sensor_type: SensorTypeId) -> &[(ColumnId, Neighbours)] {
        self.neighbours
            .get(&sensor_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every reading id referenced by the neighbours of a sensor type.
    #[must_use]
    pub fn neighbour_ids(&self, sensor_type: SensorTypeId) -> Vec<SensorValueId> {
        self.neighbours(sensor_type)
            .iter()
            .flat_map(|(_, neighbours)| neighbours.ids())
            .collect()
    }

    /// Sensor types with resolved neighbours.
    pub fn sensor_types(&self) -> impl Iterator<Item = SensorTypeId> + '_ {
        self.neighbours.keys().copied()
    }

    /// Store a calculated value, replacing any earlier one for its type.
    pub fn insert_value(&mut self, value: MeasurementValue) {
        self.values.insert(value.sensor_type(), value);
    }

    #[must_use]
    pub fn value(&self, sensor_type: SensorTypeId) -> Option<&MeasurementValue> {
        self.values.get(&sensor_type)
    }

    pub fn values(&self) -> impl Iterator<Item = &MeasurementValue> + '_ {
        self.values.values()
    }
}

// =============================================================================
// NEIGHBOUR INDEX
// =============================================================================

/// Resolves neighbours for measurements using the caller's cursor set.
///
/// Cursors are opened under `prefix` and are left in the set so the caller
/// can destroy them by prefix when the pass ends. Visiting measurements in
/// time order makes each lookup amortized constant time.
pub struct NeighbourIndex<'a> {
    sensor_values: &'a DatasetSensorValues,
    cursors: &'a mut SearchCursors,
    prefix: String,
}

impl<'a> NeighbourIndex<'a> {
    pub fn new(
        sensor_values: &'a DatasetSensorValues,
        cursors: &'a mut SearchCursors,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            sensor_values,
            cursors,
            prefix: prefix.into(),
        }
    }

    /// The usable neighbours of `column` at `time`.
    ///
    /// Flushing readings and readings without a number are skipped as if
    /// absent.
    pub fn neighbours(&mut self, column: ColumnId, time: Timestamp) -> Neighbours {
        let values = self.sensor_values;
        let Some(list) = values.get_by_column(column) else {
            return Neighbours::Missing;
        };

        let name = format!("{}/{}", self.prefix, column.0);
        let position = self.cursors.open(&name, column).seek(list, time);

        let usable = |id: SensorValueId| values.get_by_id(id).is_some_and(SensorValue::is_usable);
        let prior = list.prior_from(position, usable);
        let post = list.post_from(position, usable);

        match (prior, post) {
            (Some(prior), _) if self.time_of(prior) == Some(time) => Neighbours::Exact(prior),
            (Some(prior), Some(post)) => Neighbours::Between { prior, post },
            (Some(prior), None) => Neighbours::Before(prior),
            (None, Some(post)) => Neighbours::After(post),
            (None, None) => Neighbours::Missing,
        }
    }

    fn time_of(&self, id: SensorValueId) -> Option<Timestamp> {
        self.sensor_values.get_by_id(id).map(SensorValue::time)
    }

    /// Resolve the neighbours of every column of the given sensor types.
    pub fn measurement_values(
        &mut self,
        measurement: Measurement,
        sensor_types: &[SensorTypeId],
        instrument: &Instrument,
    ) -> MeasurementValues {
        let time = measurement.time();
        let mut result = MeasurementValues::new(measurement);
        for sensor_type in sensor_types {
            for column in instrument.column_ids(*sensor_type) {
                let neighbours = self.neighbours(column, time);
                result.set_neighbours(*sensor_type, column, neighbours);
            }
        }
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorAssignment;
    use crate::flag::Flag;
    use crate::{InstrumentId, timestamp_from_secs};

    fn t(secs: i64) -> Timestamp {
        timestamp_from_secs(secs).expect("time")
    }

    fn instrument() -> Instrument {
        Instrument::new(InstrumentId(1), "test")
            .with_assignment(SensorAssignment::new(ColumnId(1), SensorTypeId(1)))
            .with_assignment(SensorAssignment::new(ColumnId(2), SensorTypeId(2)))
    }

    fn series(points: &[(u64, i64, &str)]) -> DatasetSensorValues {
        let mut values = DatasetSensorValues::new(DatasetId(1), &instrument());
        for (id, secs, raw) in points {
            values
                .add(SensorValue::new(
                    SensorValueId(*id),
                    DatasetId(1),
                    ColumnId(1),
                    t(*secs),
                    Some((*raw).to_string()),
                ))
                .expect("add");
        }
        values
    }

    #[test]
    fn measurements_sort_by_time() {
        let late = Measurement::for_variable(DatasetId(1), t(10), VariableId(1), "measurement");
        let early = Measurement::for_variable(DatasetId(1), t(5), VariableId(2), "measurement");
        let list = DatasetMeasurements::new(vec![late.clone(), early.clone()]);
        assert_eq!(list.all(), &[early, late]);
    }

    #[test]
    fn neighbour_kinds() {
        let values = series(&[(1, 0, "10"), (2, 10, "20")]);
        let mut cursors = SearchCursors::new();
        let mut index = NeighbourIndex::new(&values, &mut cursors, "1");

        assert_eq!(index.neighbours(ColumnId(1), t(-5)), Neighbours::After(SensorValueId(1)));
        assert_eq!(index.neighbours(ColumnId(1), t(0)), Neighbours::Exact(SensorValueId(1)));
        assert_eq!(
            index.neighbours(ColumnId(1), t(5)),
            Neighbours::Between {
                prior: SensorValueId(1),
                post: SensorValueId(2)
            }
        );
        assert_eq!(index.neighbours(ColumnId(1), t(15)), Neighbours::Before(SensorValueId(2)));
        assert_eq!(index.neighbours(ColumnId(2), t(5)), Neighbours::Missing);
    }

    #[test]
    fn unusable_readings_are_skipped() {
        let mut values = series(&[(1, 0, "10"), (2, 5, "12"), (3, 10, "NaN"), (4, 20, "30")]);
        values
            .set_user_qc(SensorValueId(2), Flag::Flushing, "Flushing")
            .expect("qc");
        let mut cursors = SearchCursors::new();
        let mut index = NeighbourIndex::new(&values, &mut cursors, "1");

        assert_eq!(
            index.neighbours(ColumnId(1), t(5)),
            Neighbours::Between {
                prior: SensorValueId(1),
                post: SensorValueId(4)
            }
        );
    }

    #[test]
    fn cursors_stay_in_callers_set() {
        let values = series(&[(1, 0, "10")]);
        let mut cursors = SearchCursors::new();
        {
            let mut index = NeighbourIndex::new(&values, &mut cursors, "dataset-7");
            let measurement =
                Measurement::for_variable(DatasetId(1), t(0), VariableId(1), "measurement");
            let resolved =
                index.measurement_values(measurement, &[SensorTypeId(1), SensorTypeId(2)], &instrument());
            assert_eq!(resolved.neighbour_ids(SensorTypeId(1)), vec![SensorValueId(1)]);
            assert!(resolved.neighbours(SensorTypeId(2))[0].1.is_missing());
        }
        assert!(cursors.contains_prefix("dataset-7"));
        assert_eq!(cursors.destroy_with_prefix("dataset-7"), 1);
        assert!(cursors.is_empty());
    }

    #[test]
    fn replacing_column_neighbours() {
        let measurement = Measurement::for_variable(DatasetId(1), t(0), VariableId(1), "measurement");
        let mut values = MeasurementValues::new(measurement);
        values.set_neighbours(SensorTypeId(1), ColumnId(1), Neighbours::Missing);
        values.set_neighbours(SensorTypeId(1), ColumnId(1), Neighbours::Exact(SensorValueId(3)));
        assert_eq!(values.neighbours(SensorTypeId(1)).len(), 1);
        assert_eq!(values.neighbour_ids(SensorTypeId(1)), vec![SensorValueId(3)]);
    }
}
