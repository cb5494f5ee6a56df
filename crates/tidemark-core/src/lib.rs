//! # tidemark-core
//!
//! The deterministic reduction engine for Tidemark - THE LOGIC.
//!
//! This crate turns raw, timestamped instrument readings into quality
//! controlled measurement values:
//! - readings carry automatic and user QC flags
//! - a locator decides where measurements are and marks flushing readings
//! - calculators derive one value per (measurement, sensor type) from the
//!   neighbouring readings, propagating the most significant flag
//!
//! ## Architectural Constraints
//!
//! - Configuration is passed explicitly; there is no global registry
//! - Storage is reached only through `SensorValueStore`
//! - Has NO async, NO network dependencies (pure Rust)
//! - Ordered collections only, so every pass is reproducible

// =============================================================================
// MODULES
// =============================================================================

pub mod calculator;
pub mod config;
pub mod dataset;
pub mod export;
pub mod flag;
pub mod ingestor;
pub mod locator;
pub mod measurement;
pub mod measurement_value;
pub mod primitives;
pub mod reducer;
pub mod search;
pub mod sensor_value;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ColumnId, DataSet, DatasetId, InstrumentId, SensorTypeId, SensorValueId, TidemarkError,
    Timestamp, VariableId, epoch_millis, timestamp_from_secs,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use calculator::{CalculationContext, CalculatorKind, calculate_measurement_value};
pub use config::{Instrument, SensorAssignment, SensorType, SensorsConfiguration, Variable};
pub use dataset::DatasetSensorValues;
pub use export::{ExportRecord, export_canonical, export_records, import_canonical};
pub use flag::Flag;
pub use ingestor::{Ingestor, RawReading};
pub use locator::{
    ColumnRunTypes, ContinuousLocator, LocatorSettings, MeasurementLocator, ModeSignalLocator,
    ModeSignalSettings, RunTypeResolver,
};
pub use measurement::{
    DatasetMeasurements, Measurement, MeasurementValues, NeighbourIndex, Neighbours,
};
pub use measurement_value::{MeasurementValue, ValueType};
pub use reducer::{DataReducer, DatasetReduction};
pub use search::{SearchCursor, SearchCursors, SearchableSensorValues};
pub use sensor_value::SensorValue;
pub use storage::RedbStore;
pub use store::{MemoryStore, SensorValueStore};
