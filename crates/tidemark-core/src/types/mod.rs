//! # Core Type Definitions
//!
//! This module contains the shared identifiers and the error type for the
//! Tidemark engine:
//! - Record identifiers (`DatasetId`, `SensorValueId`, `ColumnId`, ...)
//! - Timestamp helpers (`Timestamp`, `epoch_millis`)
//! - Dataset descriptor (`DataSet`)
//! - Error types (`TidemarkError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers:
//! - Are plain integer newtypes
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIERS
// =============================================================================

/// Identifier of a dataset: one contiguous block of data from one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub u64);

/// Identifier of a single raw sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorValueId(pub u64);

/// Identifier of an instrument file column assigned to a sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u64);

/// Identifier of a sensor type (a named physical quantity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorTypeId(pub u64);

/// Identifier of an instrument variable (e.g. "underway marine pCO₂").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId(pub u64);

/// Identifier of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(pub u64);

impl fmt::Display for SensorValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Timestamps are instrument-local wall-clock times with no zone attached.
pub type Timestamp = NaiveDateTime;

/// Convert a timestamp to milliseconds since the Unix epoch.
///
/// This is the monotonic numeric axis used for interpolation.
#[must_use]
pub fn epoch_millis(time: Timestamp) -> i64 {
    time.and_utc().timestamp_millis()
}

/// Build a timestamp from whole seconds since the Unix epoch.
///
/// Returns `None` for values outside chrono's representable range.
#[must_use]
pub fn timestamp_from_secs(secs: i64) -> Option<Timestamp> {
    chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

// =============================================================================
// DATASET
// =============================================================================

/// A dataset: the unit of work of one reduction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSet {
    pub id: DatasetId,
    pub instrument: InstrumentId,
    pub name: String,
}

impl DataSet {
    /// Create a new dataset descriptor.
    #[must_use]
    pub fn new(id: DatasetId, instrument: InstrumentId, name: impl Into<String>) -> Self {
        Self {
            id,
            instrument,
            name: name.into(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Tidemark engine.
///
/// - No silent failures
/// - Use `Result<T, TidemarkError>` for fallible operations
/// - Calculator errors are recoverable per value; the others abort a dataset
#[derive(Debug, Error)]
pub enum TidemarkError {
    /// A flag code, letter or name outside the canonical set.
    #[error("Invalid flag: {0}")]
    InvalidFlag(String),

    /// A referenced record (column, sensor value, dataset) does not exist.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// The instrument or sensors configuration cannot support the request.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Measurement location failed; no measurements are produced.
    #[error("Measurement locator error: {message}")]
    Locator {
        message: String,
        #[source]
        source: Option<Box<TidemarkError>>,
    },

    /// A single measurement value could not be calculated.
    #[error("Value calculator error: {0}")]
    Calculator(String),

    /// An input record failed validation.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl TidemarkError {
    /// Build a locator error without an underlying cause.
    #[must_use]
    pub fn locator(message: impl Into<String>) -> Self {
        Self::Locator {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap any error raised during a locator scan.
    ///
    /// Locator errors pass through untouched with their message intact.
    #[must_use]
    pub fn wrap_locator(err: TidemarkError) -> Self {
        match err {
            locator @ Self::Locator { .. } => locator,
            other => Self::Locator {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Whether this error only affects a single calculated value.
    #[must_use]
    pub fn is_isolatable(&self) -> bool {
        matches!(self, Self::Calculator(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn epoch_millis_counts_from_unix_epoch() {
        let t = timestamp_from_secs(10).expect("time");
        assert_eq!(epoch_millis(t), 10_000);
    }

    #[test]
    fn identifiers_order_numerically() {
        let mut ids = vec![SensorValueId(3), SensorValueId(1), SensorValueId(2)];
        ids.sort();
        assert_eq!(ids, vec![SensorValueId(1), SensorValueId(2), SensorValueId(3)]);
    }

    #[test]
    fn wrap_locator_keeps_cause() {
        let err = TidemarkError::wrap_locator(TidemarkError::IoError("disk gone".into()));
        assert!(matches!(err, TidemarkError::Locator { .. }));
        assert!(err.to_string().contains("disk gone"));
        assert!(err.source().is_some());
    }

    #[test]
    fn wrap_locator_passes_locator_errors_through() {
        let err = TidemarkError::wrap_locator(TidemarkError::locator("Unrecognised mode 'x'"));
        assert_eq!(err.to_string(), "Measurement locator error: Unrecognised mode 'x'");
    }

    #[test]
    fn only_calculator_errors_are_isolatable() {
        assert!(TidemarkError::Calculator("no values".into()).is_isolatable());
        assert!(!TidemarkError::Configuration("bad".into()).is_isolatable());
    }
}
