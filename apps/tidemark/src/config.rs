//! # Application Configuration
//!
//! The TOML file describing sensor types, variables, the instrument and its
//! locator:
//!
//! ```toml
//! [[sensor_types]]
//! id = 1
//! name = "xCO₂ (wet, no standards)"
//! calculator = { kind = "moisture_corrected", moisture = 3 }
//!
//! [[variables]]
//! id = 1
//! name = "Pro Oceanus CO₂ Water"
//! core_sensor_type = 1
//!
//! [instrument]
//! id = 1
//! name = "ProOceanus"
//! variables = [1]
//! assignments = [{ column = 10, sensor_type = 1, requires_drying = true }]
//! properties = { preFlushingTime = "30" }
//!
//! [locator]
//! kind = "mode_signal"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tidemark_core::{
    Instrument, LocatorSettings, SensorType, SensorsConfiguration, TidemarkError, Variable,
};

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sensor_types: Vec<SensorType>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub instrument: Instrument,
    #[serde(default)]
    pub locator: LocatorSettings,
}

impl AppConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, TidemarkError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TidemarkError::Configuration(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(TidemarkError::Configuration(format!(
                "Configuration file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            TidemarkError::Configuration(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(text: &str) -> Result<Self, TidemarkError> {
        let config: Self =
            toml::from_str(text).map_err(|e| TidemarkError::Configuration(e.to_string()))?;
        config.sensors()?.validate_instrument(&config.instrument)?;
        Ok(config)
    }

    /// The validated sensors configuration.
    pub fn sensors(&self) -> Result<SensorsConfiguration, TidemarkError> {
        SensorsConfiguration::new(self.sensor_types.clone(), self.variables.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::{CalculatorKind, SensorTypeId, VariableId};

    const EXAMPLE: &str = r#"
        [[sensor_types]]
        id = 1
        name = "xCO2"
        calculator = { kind = "moisture_corrected", moisture = 2 }

        [[sensor_types]]
        id = 2
        name = "xH2O"

        [[variables]]
        id = 1
        name = "Underway CO2"
        core_sensor_type = 1

        [instrument]
        id = 7
        name = "LICOR"
        variables = [1]
        assignments = [
            { column = 1, sensor_type = 1, requires_drying = true },
            { column = 2, sensor_type = 2 },
        ]
    "#;

    #[test]
    fn parses_example() {
        let config = AppConfig::from_toml(EXAMPLE).expect("parse");
        assert_eq!(config.instrument.name, "LICOR");
        assert!(config.instrument.has_variable(VariableId(1)));
        assert_eq!(config.locator, LocatorSettings::Continuous);

        let sensors = config.sensors().expect("sensors");
        assert_eq!(
            sensors.sensor_type(SensorTypeId(1)).expect("xCO2").calculator,
            CalculatorKind::MoistureCorrected {
                moisture: SensorTypeId(2)
            }
        );
    }

    #[test]
    fn rejects_unknown_sensor_type_in_assignment() {
        let broken = EXAMPLE.replace("{ column = 2, sensor_type = 2 }", "{ column = 2, sensor_type = 9 }");
        assert!(matches!(
            AppConfig::from_toml(&broken),
            Err(TidemarkError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(AppConfig::from_toml("[instrument").is_err());
    }
}
