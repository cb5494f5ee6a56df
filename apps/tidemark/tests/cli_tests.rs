//! End-to-end tests of the CLI commands against a temporary database.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tidemark::cli::{
    cmd_ingest, cmd_init, dataset_flags, open_store, parse_readings, reduce_datasets,
};
use tidemark::config::AppConfig;
use tidemark::report::ReduceReport;
use tidemark_core::{ColumnId, DatasetId, SensorValueStore, TidemarkError, ValueType};

const CONFIG: &str = r#"
[[sensor_types]]
id = 1
name = "xCO2"

[[variables]]
id = 1
name = "Underway CO2"
core_sensor_type = 1

[instrument]
id = 7
name = "LICOR"
variables = [1]
assignments = [{ column = 1, sensor_type = 1 }]
"#;

const READINGS: &str = "\
# underway log
time,1
2024-01-01T00:00:00,400.0

2024-01-01 00:00:10,401.5
2024-01-01T00:00:20,
";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

struct Workspace {
    _dir: TempDir,
    database: PathBuf,
    config: PathBuf,
    readings: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("tidemark.db");
    let config = dir.path().join("tidemark.toml");
    let readings = dir.path().join("leg1.csv");
    std::fs::write(&config, CONFIG).unwrap();
    std::fs::write(&readings, READINGS).unwrap();
    Workspace {
        _dir: dir,
        database,
        config,
        readings,
    }
}

fn ingested(dataset: u64) -> Workspace {
    let ws = workspace();
    cmd_init(&ws.database, false).unwrap();
    cmd_ingest(&ws.database, &ws.config, true, &ws.readings, dataset, None).unwrap();
    ws
}

fn load(path: &Path) -> Arc<AppConfig> {
    Arc::new(AppConfig::load(path).unwrap())
}

// =============================================================================
// PARSING TESTS
// =============================================================================

#[test]
fn test_parse_readings_wide_rows() {
    let readings = parse_readings(READINGS).unwrap();
    assert_eq!(readings.len(), 3);
    assert!(readings.iter().all(|reading| reading.column == ColumnId(1)));
    assert_eq!(readings[1].value.as_deref(), Some("401.5"));
    assert_eq!(readings[2].normalized_value(), None);
    assert!(readings[0].time < readings[1].time);
}

#[test]
fn test_parse_readings_rejects_bad_header() {
    assert!(matches!(
        parse_readings("when,1\n2024-01-01T00:00:00,1\n"),
        Err(TidemarkError::InvalidRecord(_))
    ));
    assert!(matches!(
        parse_readings("time,sst\n"),
        Err(TidemarkError::InvalidRecord(_))
    ));
    assert!(parse_readings("# only a comment\n").is_err());
}

#[test]
fn test_parse_readings_rejects_ragged_rows() {
    let result = parse_readings("time,1,2\n2024-01-01T00:00:00,1\n");
    assert!(matches!(result, Err(TidemarkError::InvalidRecord(_))));
}

#[test]
fn test_parse_readings_rejects_bad_time() {
    let result = parse_readings("time,1\nyesterday,1\n");
    assert!(matches!(result, Err(TidemarkError::InvalidRecord(_))));
}

// =============================================================================
// COMMAND TESTS
// =============================================================================

#[test]
fn test_init_refuses_existing_database() {
    let ws = workspace();
    cmd_init(&ws.database, false).unwrap();
    assert!(cmd_init(&ws.database, false).is_err());
    cmd_init(&ws.database, true).unwrap();
}

#[test]
fn test_commands_require_database() {
    let ws = workspace();
    assert!(matches!(
        open_store(&ws.database),
        Err(TidemarkError::IoError(_))
    ));
}

#[test]
fn test_ingest_registers_dataset() {
    let ws = ingested(3);
    let store = open_store(&ws.database).unwrap();

    let datasets = store.datasets().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].id, DatasetId(3));
    assert_eq!(datasets[0].name, "leg1");
    assert_eq!(store.value_count().unwrap(), 3);
}

#[test]
fn test_ingest_rejects_repeated_file() {
    let ws = ingested(3);
    let again = cmd_ingest(&ws.database, &ws.config, true, &ws.readings, 3, None);
    assert!(matches!(again, Err(TidemarkError::InvalidRecord(_))));
}

#[tokio::test]
async fn test_reduce_end_to_end() {
    let ws = ingested(3);
    let store: Arc<dyn SensorValueStore> = Arc::new(open_store(&ws.database).unwrap());

    let results = reduce_datasets(store, load(&ws.config), None).await.unwrap();
    assert_eq!(results.len(), 1);

    let (dataset, result) = &results[0];
    let reduction = result.as_ref().unwrap();
    // The blank reading at 00:00:20 is not a measurement.
    assert_eq!(reduction.len(), 2);
    assert_eq!(reduction.failures(), 0);

    let records = reduction.export_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].value, Some(400.0));
    assert_eq!(records[1].value, Some(401.5));
    assert!(records.iter().all(|record| record.type_code == ValueType::Measured.code()));

    let report = ReduceReport::from_reduction(dataset, reduction);
    assert!(!report.is_failed());
    assert_eq!(report.values, 2);
    assert_eq!(report.flags.values().sum::<usize>(), 2);
}

#[tokio::test]
async fn test_reduce_unknown_dataset() {
    let ws = ingested(3);
    let store: Arc<dyn SensorValueStore> = Arc::new(open_store(&ws.database).unwrap());

    let result = reduce_datasets(store, load(&ws.config), Some(DatasetId(99))).await;
    assert!(matches!(result, Err(TidemarkError::RecordNotFound(_))));
}

#[test]
fn test_flags_counts_every_reading() {
    let ws = ingested(3);
    let store = open_store(&ws.database).unwrap();
    let config = AppConfig::load(&ws.config).unwrap();

    let report = dataset_flags(&store, &config, DatasetId(3)).unwrap();
    assert_eq!(report.dataset, 3);
    let xco2 = report.sensor_types.get("xCO2").unwrap();
    assert_eq!(xco2.values().sum::<usize>(), 3);
}
