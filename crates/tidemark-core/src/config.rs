//! # Configuration Model
//!
//! The sensors configuration (which sensor types and variables exist) and
//! the instrument definitions (which columns measure which sensor types).
//!
//! Both are plain serde types, built once per process and passed explicitly
//! to every component that needs them. There is no global registry.

use crate::calculator::CalculatorKind;
use crate::{ColumnId, InstrumentId, SensorTypeId, TidemarkError, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SENSOR TYPES & VARIABLES
// =============================================================================

/// A named physical quantity measured by one or more instrument columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorType {
    pub id: SensorTypeId,
    pub name: String,
    /// How measurement values of this type are calculated.
    #[serde(default)]
    pub calculator: CalculatorKind,
}

impl SensorType {
    /// A sensor type using the default calculator.
    #[must_use]
    pub fn new(id: SensorTypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            calculator: CalculatorKind::Default,
        }
    }

    /// Replace the calculator.
    #[must_use]
    pub fn with_calculator(mut self, calculator: CalculatorKind) -> Self {
        self.calculator = calculator;
        self
    }
}

/// A scientific variable an instrument can measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    /// The sensor type whose readings define the variable's measurements.
    pub core_sensor_type: SensorTypeId,
    /// Further sensor types reduced at each measurement.
    #[serde(default)]
    pub required_sensor_types: Vec<SensorTypeId>,
}

impl Variable {
    #[must_use]
    pub fn new(id: VariableId, name: impl Into<String>, core_sensor_type: SensorTypeId) -> Self {
        Self {
            id,
            name: name.into(),
            core_sensor_type,
            required_sensor_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn requiring(mut self, sensor_type: SensorTypeId) -> Self {
        self.required_sensor_types.push(sensor_type);
        self
    }

    /// Every sensor type reduced for this variable, core type first.
    #[must_use]
    pub fn sensor_types(&self) -> Vec<SensorTypeId> {
        let mut seen = BTreeSet::new();
        std::iter::once(self.core_sensor_type)
            .chain(self.required_sensor_types.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// The immutable registry of sensor types and variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorsConfiguration {
    #[serde(default)]
    pub sensor_types: Vec<SensorType>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl SensorsConfiguration {
    /// Build and validate a configuration.
    pub fn new(
        sensor_types: Vec<SensorType>,
        variables: Vec<Variable>,
    ) -> Result<Self, TidemarkError> {
        let config = Self {
            sensor_types,
            variables,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check ids and names are unique and every reference resolves.
    pub fn validate(&self) -> Result<(), TidemarkError> {
        let mut ids = BTreeSet::new();
        let mut names = BTreeSet::new();
        for sensor_type in &self.sensor_types {
            if !ids.insert(sensor_type.id) || !names.insert(sensor_type.name.as_str()) {
                return Err(TidemarkError::Configuration(format!(
                    "Duplicate sensor type '{}'",
                    sensor_type.name
                )));
            }
        }

        for sensor_type in &self.sensor_types {
            if let CalculatorKind::MoistureCorrected { moisture } = sensor_type.calculator {
                self.sensor_type(moisture)?;
            }
        }

        let mut variable_ids = BTreeSet::new();
        for variable in &self.variables {
            if !variable_ids.insert(variable.id) {
                return Err(TidemarkError::Configuration(format!(
                    "Duplicate variable '{}'",
                    variable.name
                )));
            }
            for sensor_type in variable.sensor_types() {
                self.sensor_type(sensor_type)?;
            }
        }
        Ok(())
    }

    /// Look up a sensor type by id.
    pub fn sensor_type(&self, id: SensorTypeId) -> Result<&SensorType, TidemarkError> {
        self.sensor_types
            .iter()
            .find(|sensor_type| sensor_type.id == id)
            .ok_or_else(|| TidemarkError::Configuration(format!("Unknown sensor type {}", id.0)))
    }

    /// Look up a sensor type by name.
    pub fn sensor_type_by_name(&self, name: &str) -> Result<&SensorType, TidemarkError> {
        self.sensor_types
            .iter()
            .find(|sensor_type| sensor_type.name == name)
            .ok_or_else(|| TidemarkError::Configuration(format!("Unknown sensor type '{}'", name)))
    }

    /// Look up a variable by id.
    pub fn variable(&self, id: VariableId) -> Result<&Variable, TidemarkError> {
        self.variables
            .iter()
            .find(|variable| variable.id == id)
            .ok_or_else(|| TidemarkError::Configuration(format!("Unknown variable {}", id.0)))
    }

    /// Look up a variable by name.
    pub fn variable_by_name(&self, name: &str) -> Result<&Variable, TidemarkError> {
        self.variables
            .iter()
            .find(|variable| variable.name == name)
            .ok_or_else(|| TidemarkError::Configuration(format!("Unknown variable '{}'", name)))
    }

    /// Check an instrument only refers to known sensor types and variables,
    /// and assigns each column once.
    pub fn validate_instrument(&self, instrument: &Instrument) -> Result<(), TidemarkError> {
        let mut columns = BTreeSet::new();
        for assignment in &instrument.assignments {
            self.sensor_type(assignment.sensor_type)?;
            if !columns.insert(assignment.column) {
                return Err(TidemarkError::Configuration(format!(
                    "Column {} is assigned more than once on instrument '{}'",
                    assignment.column.0, instrument.name
                )));
            }
        }
        for variable in &instrument.variables {
            self.variable(*variable)?;
        }
        Ok(())
    }
}

// =============================================================================
// INSTRUMENT
// =============================================================================

fn default_primary() -> bool {
    true
}

/// The assignment of one file column to a sensor type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorAssignment {
    pub column: ColumnId,
    pub sensor_type: SensorTypeId,
    #[serde(default = "default_primary")]
    pub primary: bool,
    /// Whether readings need a moisture (drying) correction.
    #[serde(default)]
    pub requires_drying: bool,
}

impl SensorAssignment {
    #[must_use]
    pub fn new(column: ColumnId, sensor_type: SensorTypeId) -> Self {
        Self {
            column,
            sensor_type,
            primary: true,
            requires_drying: false,
        }
    }

    #[must_use]
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    #[must_use]
    pub fn with_drying(mut self, requires_drying: bool) -> Self {
        self.requires_drying = requires_drying;
        self
    }
}

/// An instrument: its enabled variables, column assignments and properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub name: String,
    #[serde(default)]
    pub variables: BTreeSet<VariableId>,
    #[serde(default)]
    pub assignments: Vec<SensorAssignment>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Instrument {
    /// An instrument with no variables, assignments or properties.
    #[must_use]
    pub fn new(id: InstrumentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            variables: BTreeSet::new(),
            assignments: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_assignment(mut self, assignment: SensorAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    #[must_use]
    pub fn with_variable(mut self, variable: VariableId) -> Self {
        self.variables.insert(variable);
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether the variable is enabled on this instrument.
    #[must_use]
    pub fn has_variable(&self, variable: VariableId) -> bool {
        self.variables.contains(&variable)
    }

    /// The sensor type measured by a column.
    #[must_use]
    pub fn sensor_type_for_column(&self, column: ColumnId) -> Option<SensorTypeId> {
        self.assignments
            .iter()
            .find(|assignment| assignment.column == column)
            .map(|assignment| assignment.sensor_type)
    }

    /// All assignments of a sensor type, in configuration order.
    #[must_use]
    pub fn assignments_for(&self, sensor_type: SensorTypeId) -> Vec<&SensorAssignment> {
        self.assignments
            .iter()
            .filter(|assignment| assignment.sensor_type == sensor_type)
            .collect()
    }

    /// All columns assigned to a sensor type, in configuration order.
    #[must_use]
    pub fn column_ids(&self, sensor_type: SensorTypeId) -> Vec<ColumnId> {
        self.assignments_for(sensor_type)
            .into_iter()
            .map(|assignment| assignment.column)
            .collect()
    }

    /// The column a single-valued sensor type is read from: the first
    /// primary assignment, else the first assignment.
    pub fn first_column(&self, sensor_type: SensorTypeId) -> Result<ColumnId, TidemarkError> {
        let assignments = self.assignments_for(sensor_type);
        assignments
            .iter()
            .find(|assignment| assignment.primary)
            .or_else(|| assignments.first())
            .map(|assignment| assignment.column)
            .ok_or_else(|| {
                TidemarkError::Configuration(format!(
                    "Instrument '{}' has no column for sensor type {}",
                    self.name, sensor_type.0
                ))
            })
    }

    /// Column → sensor type map for every assignment.
    #[must_use]
    pub fn column_sensor_types(&self) -> BTreeMap<ColumnId, SensorTypeId> {
        self.assignments
            .iter()
            .map(|assignment| (assignment.column, assignment.sensor_type))
            .collect()
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// An integer property. Missing or non-numeric values are configuration
    /// errors.
    pub fn int_property(&self, key: &str) -> Result<i64, TidemarkError> {
        let raw = self.property(key).ok_or_else(|| {
            TidemarkError::Configuration(format!(
                "Instrument '{}' has no property '{}'",
                self.name, key
            ))
        })?;
        raw.trim().parse::<i64>().map_err(|_| {
            TidemarkError::Configuration(format!(
                "Instrument '{}' property '{}' is not an integer: '{}'",
                self.name, key, raw
            ))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::PROP_PRE_FLUSHING_TIME;

    fn config() -> SensorsConfiguration {
        SensorsConfiguration::new(
            vec![
                SensorType::new(SensorTypeId(1), "xCO₂ (with standards)").with_calculator(
                    CalculatorKind::MoistureCorrected {
                        moisture: SensorTypeId(2),
                    },
                ),
                SensorType::new(SensorTypeId(2), "xH₂O (with standards)"),
            ],
            vec![Variable::new(VariableId(1), "Underway Marine pCO₂", SensorTypeId(1))
                .requiring(SensorTypeId(2))],
        )
        .expect("config")
    }

    #[test]
    fn lookups_by_name_and_id() {
        let config = config();
        assert_eq!(
            config.sensor_type_by_name("xH₂O (with standards)").expect("type").id,
            SensorTypeId(2)
        );
        assert!(matches!(
            config.sensor_type_by_name("Salinity"),
            Err(TidemarkError::Configuration(_))
        ));
        assert_eq!(
            config.variable_by_name("Underway Marine pCO₂").expect("var").id,
            VariableId(1)
        );
    }

    #[test]
    fn duplicate_sensor_types_rejected() {
        let result = SensorsConfiguration::new(
            vec![
                SensorType::new(SensorTypeId(1), "A"),
                SensorType::new(SensorTypeId(1), "B"),
            ],
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn dangling_references_rejected() {
        let result = SensorsConfiguration::new(
            vec![SensorType::new(SensorTypeId(1), "A")],
            vec![Variable::new(VariableId(1), "V", SensorTypeId(9))],
        );
        assert!(result.is_err());

        let result = SensorsConfiguration::new(
            vec![SensorType::new(SensorTypeId(1), "A").with_calculator(
                CalculatorKind::MoistureCorrected {
                    moisture: SensorTypeId(9),
                },
            )],
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn variable_sensor_types_are_distinct() {
        let variable = Variable::new(VariableId(1), "V", SensorTypeId(1))
            .requiring(SensorTypeId(2))
            .requiring(SensorTypeId(1));
        assert_eq!(variable.sensor_types(), vec![SensorTypeId(1), SensorTypeId(2)]);
    }

    #[test]
    fn instrument_column_lookups() {
        let instrument = Instrument::new(InstrumentId(1), "Pro Oceanus")
            .with_assignment(SensorAssignment::new(ColumnId(10), SensorTypeId(1)))
            .with_assignment(SensorAssignment::new(ColumnId(11), SensorTypeId(1)))
            .with_assignment(SensorAssignment::new(ColumnId(12), SensorTypeId(2)));

        assert_eq!(instrument.sensor_type_for_column(ColumnId(12)), Some(SensorTypeId(2)));
        assert_eq!(instrument.sensor_type_for_column(ColumnId(99)), None);
        assert_eq!(
            instrument.column_ids(SensorTypeId(1)),
            vec![ColumnId(10), ColumnId(11)]
        );
        assert_eq!(instrument.first_column(SensorTypeId(2)).expect("col"), ColumnId(12));
        assert!(instrument.first_column(SensorTypeId(3)).is_err());
    }

    #[test]
    fn first_column_prefers_primary_assignment() {
        let instrument = Instrument::new(InstrumentId(1), "Pro Oceanus")
            .with_assignment(SensorAssignment::new(ColumnId(10), SensorTypeId(1)).with_primary(false))
            .with_assignment(SensorAssignment::new(ColumnId(11), SensorTypeId(1)))
            .with_assignment(SensorAssignment::new(ColumnId(12), SensorTypeId(2)).with_primary(false));

        assert_eq!(instrument.first_column(SensorTypeId(1)).expect("col"), ColumnId(11));
        assert_eq!(instrument.first_column(SensorTypeId(2)).expect("col"), ColumnId(12));
    }

    #[test]
    fn int_properties() {
        let instrument = Instrument::new(InstrumentId(1), "i")
            .with_property(PROP_PRE_FLUSHING_TIME, " 30 ")
            .with_property("bad", "thirty");
        assert_eq!(instrument.int_property(PROP_PRE_FLUSHING_TIME).expect("prop"), 30);
        assert!(instrument.int_property("bad").is_err());
        assert!(instrument.int_property("missing").is_err());
    }

    #[test]
    fn instrument_validation() {
        let config = config();
        let good = Instrument::new(InstrumentId(1), "i")
            .with_variable(VariableId(1))
            .with_assignment(SensorAssignment::new(ColumnId(1), SensorTypeId(1)));
        assert!(config.validate_instrument(&good).is_ok());

        let twice = good
            .clone()
            .with_assignment(SensorAssignment::new(ColumnId(1), SensorTypeId(2)));
        assert!(config.validate_instrument(&twice).is_err());

        let unknown_var = good.with_variable(VariableId(5));
        assert!(config.validate_instrument(&unknown_var).is_err());
    }
}
