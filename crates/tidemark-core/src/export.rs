//! # Export Module
//!
//! The flat, display-ready form of calculated values.
//!
//! Records are ordered by (time, sensor type). The canonical stream is a
//! header followed by the records as a `postcard` sequence, so two exports
//! of the same reduction are byte-identical.

use crate::flag::Flag;
use crate::measurement::{Measurement, MeasurementValues};
use crate::measurement_value::MeasurementValue;
use crate::{DatasetId, SensorTypeId, SensorValueId, TidemarkError, Timestamp};
use serde::{Deserialize, Serialize};

// =============================================================================
// RECORDS
// =============================================================================

/// One calculated value, ready for a table, plot or file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub dataset: DatasetId,
    pub time: Timestamp,
    pub sensor_type: SensorTypeId,
    /// `None` when the value is NaN.
    pub value: Option<f64>,
    pub flag: Flag,
    /// QC messages joined with `;`, newlines flattened.
    pub message: String,
    /// M, I, R, N or X.
    pub type_code: char,
    pub sensor_value_ids: Vec<SensorValueId>,
    pub supporting_ids: Vec<SensorValueId>,
}

impl ExportRecord {
    #[must_use]
    pub fn new(measurement: &Measurement, value: &MeasurementValue) -> Self {
        Self {
            dataset: measurement.dataset_id(),
            time: measurement.time(),
            sensor_type: value.sensor_type(),
            value: (!value.is_nan()).then(|| value.calculated_value()),
            flag: value.qc_flag(),
            message: value.qc_message(true),
            type_code: value.type_code(),
            sensor_value_ids: value.sensor_value_ids().to_vec(),
            supporting_ids: value.supporting_ids().to_vec(),
        }
    }
}

/// Flatten calculated values into records ordered by (time, sensor type).
#[must_use]
pub fn export_records(values: &[MeasurementValues]) -> Vec<ExportRecord> {
    let mut records: Vec<ExportRecord> = values
        .iter()
        .flat_map(|measurement_values| {
            measurement_values
                .values()
                .map(|value| ExportRecord::new(measurement_values.measurement(), value))
        })
        .collect();
    records.sort_by_key(|record| (record.time, record.sensor_type));
    records
}

// =============================================================================
// CANONICAL STREAM
// =============================================================================

/// Magic bytes for canonical export files.
pub const CANONICAL_MAGIC: [u8; 4] = *b"TDMX";

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

/// Maximum record count accepted on import.
pub const MAX_IMPORT_RECORD_COUNT: u64 = 10_000_000;

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub record_count: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(record_count: u64) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            record_count,
        }
    }

    /// Check the magic bytes, the format version and the record count cap.
    pub fn validate(&self) -> Result<(), TidemarkError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(TidemarkError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(TidemarkError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        if self.record_count > MAX_IMPORT_RECORD_COUNT {
            return Err(TidemarkError::SerializationError(
                "Record count exceeds limit".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CanonicalExport {
    header: CanonicalHeader,
    records: Vec<ExportRecord>,
}

/// Serialize records to the canonical stream. Records are re-sorted first.
pub fn export_canonical(records: &[ExportRecord]) -> Result<Vec<u8>, TidemarkError> {
    let mut records = records.to_vec();
    records.sort_by_key(|record| (record.time, record.sensor_type));
    let export = CanonicalExport {
        header: CanonicalHeader::new(records.len() as u64),
        records,
    };
    postcard::to_allocvec(&export).map_err(|e| TidemarkError::SerializationError(e.to_string()))
}

/// Read records back from the canonical stream.
pub fn import_canonical(bytes: &[u8]) -> Result<Vec<ExportRecord>, TidemarkError> {
    let export: CanonicalExport = postcard::from_bytes(bytes)
        .map_err(|e| TidemarkError::DeserializationError(e.to_string()))?;
    export.header.validate()?;
    if export.records.len() as u64 != export.header.record_count {
        return Err(TidemarkError::DeserializationError(
            "Record count mismatch".to_string(),
        ));
    }
    Ok(export.records)
}

// =============================================================================
// TESTS
// =============================================================================
