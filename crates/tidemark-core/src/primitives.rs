//! # Engine Primitives
//!
//! Fixed constants shared by the locator, the calculators and the QC model.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Anything an operator may tune (flushing durations, column assignments)
//! lives in the instrument configuration instead.

/// Run type attached to every located measurement.
pub const MEASUREMENT_RUN_TYPE: &str = "measurement";

/// Instrument property holding the pre-flushing duration, in whole seconds.
pub const PROP_PRE_FLUSHING_TIME: &str = "preFlushingTime";

/// User QC message set on values inside a flushing window.
pub const FLUSHING_MESSAGE: &str = "Flushing";

/// The only QC message reported for a measurement value without a value.
pub const NAN_MESSAGE: &str = "NaN";

/// Delimiter used when flattening QC message sets for display.
pub const MESSAGE_DELIMITER: &str = ";";

/// Delimiter between sensor value ids in a LOOKUP flag's user message.
pub const LOOKUP_ID_DELIMITER: char = ',';

/// Maximum chain length when resolving LOOKUP flags.
///
/// A LOOKUP value may point at another LOOKUP value; chains longer than this
/// are treated as a cycle.
pub const MAX_LOOKUP_DEPTH: usize = 8;

/// Divisor converting a moisture reading (mmol/mol) to a mole fraction.
pub const MOISTURE_SCALE: f64 = 1000.0;

/// Number of decimal places used for displayed values.
pub const DISPLAY_DECIMALS: usize = 3;

// =============================================================================
// INGESTION LIMITS
// =============================================================================

/// Maximum length of a raw reading, in bytes.
pub const MAX_VALUE_LENGTH: usize = 256;

/// Maximum number of readings accepted in one ingestion batch.
pub const MAX_BATCH_LENGTH: usize = 1_000_000;

// =============================================================================
// MODE-SIGNAL LOCATOR DEFAULTS
// =============================================================================

/// Lower-cased run type reported while measuring water.
pub const WATER_MODE: &str = "w m";

/// Lower-cased run type reported while measuring atmosphere.
pub const ATM_MODE: &str = "a m";

/// Run type text that means "no run type" in heterogeneous datasets.
pub const NAN_RUN_TYPE: &str = "nan";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_lower_case() {
        assert_eq!(WATER_MODE, WATER_MODE.to_lowercase());
        assert_eq!(ATM_MODE, ATM_MODE.to_lowercase());
    }

    #[test]
    fn lookup_depth_is_bounded() {
        assert!(MAX_LOOKUP_DEPTH > 0);
    }
}
