//! # Command Reports
//!
//! The JSON structures printed in `--json-mode`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tidemark_core::{DataSet, DatasetReduction, Flag};

// =============================================================================
// STATUS REPORT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: u64,
    pub instrument: u64,
    pub name: String,
}

impl From<&DataSet> for DatasetEntry {
    fn from(dataset: &DataSet) -> Self {
        Self {
            id: dataset.id.0,
            instrument: dataset.instrument.0,
            name: dataset.name.clone(),
        }
    }
}

/// Database status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub database: String,
    pub sensor_values: usize,
    pub datasets: Vec<DatasetEntry>,
}

// =============================================================================
// INGEST REPORT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub dataset: u64,
    pub readings: usize,
    pub first_id: Option<u64>,
    pub last_id: Option<u64>,
}

// =============================================================================
// REDUCE REPORT
// =============================================================================

/// Outcome of reducing one dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReduceReport {
    pub dataset: u64,
    pub name: String,
    pub measurements: usize,
    pub values: usize,
    pub failures: usize,
    /// Values by displayed flag.
    pub flags: BTreeMap<String, usize>,
    /// Set when the whole dataset failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReduceReport {
    #[must_use]
    pub fn from_reduction(dataset: &DataSet, reduction: &DatasetReduction) -> Self {
        let records = reduction.export_records();
        Self {
            dataset: dataset.id.0,
            name: dataset.name.clone(),
            measurements: reduction.len(),
            values: records.len(),
            failures: reduction.failures(),
            flags: flag_counts(records.iter().map(|record| record.flag)),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(dataset: &DataSet, error: impl Into<String>) -> Self {
        Self {
            dataset: dataset.id.0,
            name: dataset.name.clone(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Count flags by display text.
pub fn flag_counts(flags: impl IntoIterator<Item = Flag>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for flag in flags {
        *counts.entry(flag.text().to_string()).or_insert(0) += 1;
    }
    counts
}

// =============================================================================
// FLAGS REPORT
// =============================================================================

/// Raw reading flags of one dataset, by sensor type name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsReport {
    pub dataset: u64,
    pub sensor_types: BTreeMap<String, BTreeMap<String, usize>>,
}
