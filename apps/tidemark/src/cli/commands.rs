//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::AppConfig;
use crate::report::{DatasetEntry, FlagsReport, IngestReport, ReduceReport, StatusReport};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tidemark_core::{
    ColumnId, DataReducer, DataSet, DatasetId, DatasetReduction, Ingestor, RawReading, RedbStore,
    SensorValueStore, TidemarkError, Timestamp, export_canonical,
};
use tracing::{error, info};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for ingestion (100 MB).
const MAX_INGEST_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), TidemarkError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TidemarkError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TidemarkError::InvalidRecord(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path: symlinks and ".." are resolved and the target
/// must be a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, TidemarkError> {
    let canonical = path.canonicalize().map_err(|e| {
        TidemarkError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TidemarkError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, TidemarkError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        TidemarkError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(TidemarkError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| TidemarkError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), TidemarkError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TidemarkError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), TidemarkError> {
    if db_path.exists() {
        if !force {
            return Err(TidemarkError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| TidemarkError::IoError(format!("Remove database: {}", e)))?;
    }

    RedbStore::open(db_path)?;
    println!("Initialized new database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// Parse a CSV file of readings.
///
/// The header row is `time` followed by numeric column ids. Blank lines and
/// lines starting with `#` are ignored. Empty cells become absent values.
pub fn parse_readings(text: &str) -> Result<Vec<RawReading>, TidemarkError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'));

    let (_, header) = lines
        .next()
        .ok_or_else(|| TidemarkError::InvalidRecord("Missing header row".to_string()))?;
    let mut fields = header.split(',').map(str::trim);
    if !fields.next().is_some_and(|first| first.eq_ignore_ascii_case("time")) {
        return Err(TidemarkError::InvalidRecord(
            "Header must start with 'time'".to_string(),
        ));
    }
    let columns = fields
        .map(|field| {
            field.parse::<u64>().map(ColumnId).map_err(|_| {
                TidemarkError::InvalidRecord(format!("Invalid column id '{}'", field))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut readings = Vec::new();
    for (index, line) in lines {
        let mut fields = line.split(',');
        let time_field = fields.next().unwrap_or_default().trim();
        let time = parse_time(time_field).ok_or_else(|| {
            TidemarkError::InvalidRecord(format!(
                "Line {}: invalid time '{}'",
                index + 1,
                time_field
            ))
        })?;

        let values: Vec<&str> = fields.collect();
        if values.len() != columns.len() {
            return Err(TidemarkError::InvalidRecord(format!(
                "Line {}: expected {} values, found {}",
                index + 1,
                columns.len(),
                values.len()
            )));
        }

        for (column, raw) in columns.iter().zip(values) {
            readings.push(RawReading::new(*column, time, Some(raw.to_string())));
        }
    }
    Ok(readings)
}

/// ISO 8601 local time, with `T` or a space between date and time.
fn parse_time(text: &str) -> Option<Timestamp> {
    text.replacen(' ', "T", 1).parse::<Timestamp>().ok()
}

/// Ingest readings from a CSV file.
pub fn cmd_ingest(
    db_path: &Path,
    config_path: &Path,
    json_mode: bool,
    file: &Path,
    dataset: u64,
    name: Option<&str>,
) -> Result<(), TidemarkError> {
    info!("Ingesting from {:?} into dataset {}", file, dataset);

    let config = AppConfig::load(config_path)?;
    let store = open_store(db_path)?;

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_INGEST_FILE_SIZE)?;
    let contents = std::fs::read_to_string(&validated_path)
        .map_err(|e| TidemarkError::IoError(format!("Read file: {}", e)))?;
    let readings = parse_readings(&contents)?;

    let name = name
        .map(str::to_string)
        .or_else(|| file.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| format!("dataset-{}", dataset));
    let dataset = DataSet::new(DatasetId(dataset), config.instrument.id, name);
    if let Some(existing) = store
        .datasets()?
        .into_iter()
        .find(|existing| existing.id == dataset.id)
        && existing.instrument != dataset.instrument
    {
        return Err(TidemarkError::InvalidRecord(format!(
            "Dataset {} belongs to instrument {}",
            dataset.id, existing.instrument.0
        )));
    }

    let ids = Ingestor::ingest(&store, &config.instrument, &dataset, &readings)?;
    store.store_dataset(&dataset)?;

    let report = IngestReport {
        dataset: dataset.id.0,
        readings: ids.len(),
        first_id: ids.first().map(|id| id.0),
        last_id: ids.last().map(|id| id.0),
    };
    if json_mode {
        return print_json(&report);
    }

    println!("Ingested {} readings into dataset {} ({})", report.readings, dataset.id, dataset.name);
    Ok(())
}

// =============================================================================
// REDUCE COMMAND
// =============================================================================

/// Reduce every dataset of the configured instrument, one blocking task per
/// dataset.
///
/// A failing dataset does not stop the others; its error is returned in
/// its slot.
pub async fn reduce_datasets(
    store: Arc<dyn SensorValueStore>,
    config: Arc<AppConfig>,
    only: Option<DatasetId>,
) -> Result<Vec<(DataSet, Result<DatasetReduction, TidemarkError>)>, TidemarkError> {
    let sensors = Arc::new(config.sensors()?);
    let datasets: Vec<DataSet> = store
        .datasets()?
        .into_iter()
        .filter(|dataset| dataset.instrument == config.instrument.id)
        .filter(|dataset| only.is_none_or(|id| dataset.id == id))
        .collect();

    if let Some(id) = only
        && datasets.is_empty()
    {
        return Err(TidemarkError::RecordNotFound(format!("Dataset {}", id)));
    }

    let mut tasks = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        let store = Arc::clone(&store);
        let config = Arc::clone(&config);
        let sensors = Arc::clone(&sensors);
        let task_dataset = dataset.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let locator = config.locator.build(&sensors)?;
            DataReducer::new(&sensors, &config.instrument, locator.as_ref())
                .reduce(&*store, &task_dataset)
        });
        tasks.push((dataset, handle));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for (dataset, handle) in tasks {
        let result = handle
            .await
            .map_err(|e| TidemarkError::IoError(format!("Reduction task failed: {}", e)))?;
        results.push((dataset, result));
    }
    Ok(results)
}

/// Reduce datasets and report per dataset.
///
/// Returns the first dataset error after every dataset has been reported.
pub async fn cmd_reduce(
    db_path: &Path,
    config_path: &Path,
    json_mode: bool,
    dataset: Option<u64>,
    output: Option<&Path>,
) -> Result<(), TidemarkError> {
    let validated_output = output.map(validate_output_path).transpose()?;
    let config = Arc::new(AppConfig::load(config_path)?);
    let store: Arc<dyn SensorValueStore> = Arc::new(open_store(db_path)?);

    let results = reduce_datasets(store, config, dataset.map(DatasetId)).await?;

    let mut reports = Vec::with_capacity(results.len());
    let mut records = Vec::new();
    let mut first_error = None;
    for (dataset, result) in results {
        match result {
            Ok(reduction) => {
                let report = ReduceReport::from_reduction(&dataset, &reduction);
                info!(
                    dataset = report.dataset,
                    measurements = report.measurements,
                    failures = report.failures,
                    "reduction complete"
                );
                records.extend(reduction.export_records());
                reports.push(report);
            }
            Err(err) => {
                error!(dataset = dataset.id.0, error = %err, "reduction failed");
                reports.push(ReduceReport::failed(&dataset, err.to_string()));
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if let Some(path) = validated_output {
        let data = export_canonical(&records)?;
        std::fs::write(&path, &data)
            .map_err(|e| TidemarkError::IoError(format!("Write file: {}", e)))?;
        info!("Exported {} records ({} bytes) to {:?}", records.len(), data.len(), path);
    }

    if json_mode {
        print_json(&reports)?;
    } else {
        println!("Tidemark Reduction");
        println!("==================");
        for report in &reports {
            match &report.error {
                Some(message) => {
                    println!("Dataset {} ({}): FAILED - {}", report.dataset, report.name, message);
                }
                None => {
                    println!(
                        "Dataset {} ({}): {} measurements, {} values, {} failed",
                        report.dataset,
                        report.name,
                        report.measurements,
                        report.values,
                        report.failures
                    );
                    for (flag, count) in &report.flags {
                        println!("  {:<18} {}", flag, count);
                    }
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show stored datasets.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), TidemarkError> {
    let store = open_store(db_path)?;
    let datasets = store.datasets()?;
    let report = StatusReport {
        database: db_path.to_string_lossy().into_owned(),
        sensor_values: store.value_count()?,
        datasets: datasets.iter().map(DatasetEntry::from).collect(),
    };

    if json_mode {
        return print_json(&report);
    }

    println!("Tidemark Status");
    println!("===============");
    println!("Database:      {}", report.database);
    println!("Sensor values: {}", report.sensor_values);
    println!("Datasets:      {}", report.datasets.len());
    for dataset in &report.datasets {
        println!(
            "  {:>6}  {}  (instrument {})",
            dataset.id, dataset.name, dataset.instrument
        );
    }
    Ok(())
}

// =============================================================================
// FLAGS COMMAND
// =============================================================================

/// Count the displayed flags of a dataset's readings per sensor type.
pub fn dataset_flags(
    store: &dyn SensorValueStore,
    config: &AppConfig,
    dataset: DatasetId,
) -> Result<FlagsReport, TidemarkError> {
    let sensors = config.sensors()?;
    let values = store.load_dataset(&config.instrument, dataset)?;

    let mut sensor_types: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for value in values.values() {
        let Some(sensor_type) = config.instrument.sensor_type_for_column(value.column_id()) else {
            continue;
        };
        let name = sensors.sensor_type(sensor_type)?.name.clone();
        let flag = value.display_flag(&values)?;
        *sensor_types
            .entry(name)
            .or_default()
            .entry(flag.text().to_string())
            .or_insert(0) += 1;
    }

    Ok(FlagsReport {
        dataset: dataset.0,
        sensor_types,
    })
}

/// Summarize reading flags.
pub fn cmd_flags(
    db_path: &Path,
    config_path: &Path,
    json_mode: bool,
    dataset: u64,
) -> Result<(), TidemarkError> {
    let config = AppConfig::load(config_path)?;
    let store = open_store(db_path)?;
    let report = dataset_flags(&store, &config, DatasetId(dataset))?;

    if json_mode {
        return print_json(&report);
    }

    println!("Reading flags for dataset {}", report.dataset);
    for (sensor_type, flags) in &report.sensor_types {
        println!("{}", sensor_type);
        for (flag, count) in flags {
            println!("  {:<18} {}", flag, count);
        }
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open an existing database.
pub fn open_store(db_path: &Path) -> Result<RedbStore, TidemarkError> {
    if !db_path.exists() {
        return Err(TidemarkError::IoError(format!(
            "Database {:?} not found. Run `tidemark init` first.",
            db_path
        )));
    }
    RedbStore::open(db_path)
}
