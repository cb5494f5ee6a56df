//! # Reduction Benchmarks
//!
//! Performance benchmarks for neighbour lookup and full reduction passes.
//!
//! Run with: `cargo bench -p tidemark-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tidemark_core::{
    ColumnId, ContinuousLocator, DataReducer, DataSet, DatasetId, DatasetSensorValues, Instrument,
    InstrumentId, MemoryStore, NeighbourIndex, SearchCursors, SensorAssignment, SensorType,
    SensorTypeId, SensorValue, SensorValueId, SensorValueStore, SensorsConfiguration, Variable,
    VariableId, export_canonical, timestamp_from_secs,
};

/// Temperature every second; salinity every ten seconds.
fn readings(size: usize) -> Vec<SensorValue> {
    let mut values = Vec::with_capacity(size + size / 10);
    let mut id = 1;
    for i in 0..size as i64 {
        let time = timestamp_from_secs(i).expect("time");
        values.push(SensorValue::new(
            SensorValueId(id),
            DatasetId(1),
            ColumnId(1),
            time,
            Some(format!("{:.2}", 10.0 + (i % 50) as f64 / 10.0)),
        ));
        id += 1;
        if i % 10 == 0 {
            values.push(SensorValue::new(
                SensorValueId(id),
                DatasetId(1),
                ColumnId(2),
                time,
                Some("35.0".to_string()),
            ));
            id += 1;
        }
    }
    values
}

fn setup() -> (SensorsConfiguration, Instrument) {
    let config = SensorsConfiguration::new(
        vec![
            SensorType::new(SensorTypeId(1), "SST"),
            SensorType::new(SensorTypeId(2), "Salinity"),
        ],
        vec![Variable::new(VariableId(1), "Temperature", SensorTypeId(1)).requiring(SensorTypeId(2))],
    )
    .expect("config");
    let instrument = Instrument::new(InstrumentId(1), "tsg")
        .with_assignment(SensorAssignment::new(ColumnId(1), SensorTypeId(1)))
        .with_assignment(SensorAssignment::new(ColumnId(2), SensorTypeId(2)))
        .with_variable(VariableId(1));
    (config, instrument)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_neighbour_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbour_walk");
    let (_, instrument) = setup();

    for size in [1000, 10000].iter() {
        let mut values = DatasetSensorValues::new(DatasetId(1), &instrument);
        for value in readings(*size) {
            values.add(value).expect("add");
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut cursors = SearchCursors::new();
                let mut index = NeighbourIndex::new(&values, &mut cursors, "bench");
                for i in 0..size as i64 {
                    let time = timestamp_from_secs(i).expect("time");
                    black_box(index.neighbours(ColumnId(2), time));
                }
            });
        });
    }

    group.finish();
}

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce");
    let (config, instrument) = setup();
    let dataset = DataSet::new(DatasetId(1), InstrumentId(1), "bench");

    for size in [1000, 5000].iter() {
        let store = MemoryStore::new();
        store.insert_sensor_values(&readings(*size)).expect("insert");
        let reducer = DataReducer::new(&config, &instrument, &ContinuousLocator);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(reducer.reduce(&store, &dataset)));
        });
    }

    group.finish();
}

fn bench_export_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_canonical");
    let (config, instrument) = setup();
    let dataset = DataSet::new(DatasetId(1), InstrumentId(1), "bench");

    for size in [1000, 5000].iter() {
        let store = MemoryStore::new();
        store.insert_sensor_values(&readings(*size)).expect("insert");
        let records = DataReducer::new(&config, &instrument, &ContinuousLocator)
            .reduce(&store, &dataset)
            .expect("reduce")
            .export_records();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(export_canonical(&records)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_neighbour_walk, bench_reduce, bench_export_canonical);
criterion_main!(benches);
