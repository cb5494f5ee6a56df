//! # Measurement Values
//!
//! The value calculated for one sensor type at one measurement, with its
//! propagated QC flag and its provenance back to the raw readings.
//!
//! ## Flag propagation
//!
//! Each contributing reading is compared against the current flag:
//! - equal significance: its message joins the message set
//! - strictly more significant: its flag replaces the current one and the
//!   message set is reset to its message
//! - less significant: ignored
//!
//! A value with no number always reports BAD with the single message "NaN".

use crate::dataset::DatasetSensorValues;
use crate::flag::Flag;
use crate::primitives::{DISPLAY_DECIMALS, MESSAGE_DELIMITER, NAN_MESSAGE};
use crate::sensor_value::SensorValue;
use crate::{SensorTypeId, SensorValueId, TidemarkError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// VALUE TYPE
// =============================================================================

/// How a measurement value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// A single reading taken at the measurement time.
    Measured,
    /// Combined from several readings, or extrapolated from one.
    Interpolated,
    /// Computed from other measurement values.
    DataReduction,
    /// A fixed or assumed value.
    Nominal,
    /// No value could be obtained.
    Nan,
}

impl ValueType {
    /// The single-character type code used in exports.
    #[must_use]
    pub fn code(self) -> char {
        match self {
            ValueType::Measured => 'M',
            ValueType::Interpolated => 'I',
            ValueType::DataReduction => 'R',
            ValueType::Nominal => 'N',
            ValueType::Nan => 'X',
        }
    }

    pub fn from_code(code: char) -> Result<Self, TidemarkError> {
        match code {
            'M' => Ok(ValueType::Measured),
            'I' => Ok(ValueType::Interpolated),
            'R' => Ok(ValueType::DataReduction),
            'N' => Ok(ValueType::Nominal),
            'X' => Ok(ValueType::Nan),
            other => Err(TidemarkError::Calculator(format!(
                "Unrecognised MeasurementValue type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// =============================================================================
// MEASUREMENT VALUE
// =============================================================================

/// A derived value for one sensor type at one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementValue {
    sensor_type: SensorTypeId,
    sensor_value_ids: Vec<SensorValueId>,
    supporting_ids: Vec<SensorValueId>,
    member_count: u32,
    calculated_value: f64,
    value_type: ValueType,
    flag: Flag,
    qc_messages: BTreeSet<String>,
}

impl MeasurementValue {
    /// An empty value, ASSUMED_GOOD until its first contributing reading
    /// sets the flag.
    #[must_use]
    pub fn new(sensor_type: SensorTypeId) -> Self {
        Self {
            sensor_type,
            sensor_value_ids: Vec::new(),
            supporting_ids: Vec::new(),
            member_count: 0,
            calculated_value: f64::NAN,
            value_type: ValueType::Nan,
            flag: Flag::AssumedGood,
            qc_messages: BTreeSet::new(),
        }
    }

    /// A fixed value with no contributing readings.
    #[must_use]
    pub fn nominal(sensor_type: SensorTypeId, value: f64, flag: Flag) -> Self {
        let mut result = Self::new(sensor_type);
        result.calculated_value = value;
        result.flag = flag;
        result.value_type = ValueType::Nominal;
        result
    }

    /// A value computed from the given readings without counting them as
    /// members.
    pub fn data_reduction<'a, I, S>(
        sensor_type: SensorTypeId,
        sources: I,
        supporting: S,
        value: f64,
        sensor_values: &DatasetSensorValues,
    ) -> Result<Self, TidemarkError>
    where
        I: IntoIterator<Item = &'a SensorValue>,
        S: IntoIterator<Item = &'a SensorValue>,
    {
        let mut result = Self::new(sensor_type);
        for source in sources {
            result.add_value(source, sensor_values, false)?;
        }
        for source in supporting {
            result.add_supporting_value(source);
        }
        result.calculated_value = value;
        result.value_type = ValueType::DataReduction;
        Ok(result)
    }

    /// A value with no number, flagged BAD with the given message.
    #[must_use]
    pub fn failed(sensor_type: SensorTypeId, message: impl Into<String>) -> Self {
        let mut result = Self::new(sensor_type);
        result.override_qc(Flag::Bad, [message.into()]);
        result
    }

    // -------------------------------------------------------------------------
    // Contributions
    // -------------------------------------------------------------------------

    /// Add a contributing reading.
    ///
    /// Readings already present are ignored. The first reading, or one more
    /// significant than the current flag, replaces the flag and messages; a
    /// reading that neither outranks nor is outranked by the current flag
    /// adds its message. Only readings with a user QC message contribute a
    /// message.
    ///
    /// When `count_member` is set the member count rises and the type
    /// becomes MEASURED for the first member and INTERPOLATED afterwards.
    pub fn add_value(
        &mut self,
        value: &SensorValue,
        sensor_values: &DatasetSensorValues,
        count_member: bool,
    ) -> Result<(), TidemarkError> {
        if self.sensor_value_ids.contains(&value.id()) {
            return Ok(());
        }
        let first = self.sensor_value_ids.is_empty();
        self.sensor_value_ids.push(value.id());

        let value_flag = value.display_flag(sensor_values)?;
        if first || value_flag.more_significant_than(self.flag) {
            self.flag = value_flag;
            self.qc_messages.clear();
            self.absorb_message(value, sensor_values)?;
        } else if !self.flag.more_significant_than(value_flag) {
            self.absorb_message(value, sensor_values)?;
        }

        if count_member {
            self.member_count += 1;
            self.value_type = if self.member_count == 1 {
                ValueType::Measured
            } else {
                ValueType::Interpolated
            };
        }
        Ok(())
    }

    fn absorb_message(
        &mut self,
        value: &SensorValue,
        sensor_values: &DatasetSensorValues,
    ) -> Result<(), TidemarkError> {
        if value.user_qc_message().trim().is_empty() {
            return Ok(());
        }
        let message = value.display_message(sensor_values)?;
        if !message.trim().is_empty() {
            self.qc_messages.insert(message);
        }
        Ok(())
    }

    /// Add a reading that took part in an interpolation or extrapolation.
    ///
    /// The type is INTERPOLATED afterwards, even for a single member.
    pub fn add_interpolated_value(
        &mut self,
        value: &SensorValue,
        sensor_values: &DatasetSensorValues,
        count_member: bool,
    ) -> Result<(), TidemarkError> {
        self.add_value(value, sensor_values, count_member)?;
        self.value_type = ValueType::Interpolated;
        Ok(())
    }

    /// Record every contributing reading of `source` as supporting this
    /// value.
    pub fn add_supporting_values_from(&mut self, source: &MeasurementValue) {
        for id in &source.sensor_value_ids {
            self.add_supporting_id(*id);
        }
    }

    /// Record a reading that supports, but does not contribute to, the value.
    pub fn add_supporting_value(&mut self, value: &SensorValue) {
        self.add_supporting_id(value.id());
    }

    fn add_supporting_id(&mut self, id: SensorValueId) {
        if !self.supporting_ids.contains(&id) {
            self.supporting_ids.push(id);
        }
    }

    pub fn set_calculated_value(&mut self, value: f64) {
        self.calculated_value = value;
    }

    // -------------------------------------------------------------------------
    // QC
    // -------------------------------------------------------------------------

    /// Replace the flag and messages outright.
    pub fn override_qc<I, S>(&mut self, flag: Flag, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flag = flag;
        self.qc_messages = messages.into_iter().map(Into::into).collect();
    }

    /// The reported flag: BAD whenever there is no value.
    #[must_use]
    pub fn qc_flag(&self) -> Flag {
        if self.is_nan() { Flag::Bad } else { self.flag }
    }

    /// The reported messages: just "NaN" whenever there is no value.
    #[must_use]
    pub fn qc_messages(&self) -> BTreeSet<String> {
        if self.is_nan() {
            BTreeSet::from([NAN_MESSAGE.to_string()])
        } else {
            self.qc_messages.clone()
        }
    }

    /// The messages as one delimited string.
    #[must_use]
    pub fn qc_message(&self, replace_newlines: bool) -> String {
        let joined = self
            .qc_messages()
            .into_iter()
            .collect::<Vec<_>>()
            .join(MESSAGE_DELIMITER);
        if replace_newlines {
            flatten_newlines(&joined)
        } else {
            joined
        }
    }

    // -------------------------------------------------------------------------
    // Type
    // -------------------------------------------------------------------------

    /// Change the type by hand.
    ///
    /// MEASURED is only allowed before any reading has been added and
    /// INTERPOLATED is always allowed. The remaining types are reserved for
    /// the constructors.
    pub fn set_type(&mut self, value_type: ValueType) -> Result<(), TidemarkError> {
        match value_type {
            ValueType::Measured if self.member_count > 0 || !self.sensor_value_ids.is_empty() => {
                Err(TidemarkError::Calculator(
                    "Cannot set Measured type for multiple members".to_string(),
                ))
            }
            ValueType::Measured | ValueType::Interpolated => {
                self.value_type = value_type;
                Ok(())
            }
            ValueType::DataReduction | ValueType::Nominal | ValueType::Nan => {
                Err(TidemarkError::Calculator(format!(
                    "MeasurementValue type '{}' cannot be set manually",
                    value_type.code()
                )))
            }
        }
    }

    /// [`set_type`](Self::set_type) from a type code.
    pub fn set_type_code(&mut self, code: char) -> Result<(), TidemarkError> {
        self.set_type(ValueType::from_code(code)?)
    }

    /// The reported type: NAN whenever there is no value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        if self.is_nan() {
            ValueType::Nan
        } else {
            self.value_type
        }
    }

    #[must_use]
    pub fn type_code(&self) -> char {
        self.value_type().code()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn sensor_type(&self) -> SensorTypeId {
        self.sensor_type
    }

    #[must_use]
    pub fn sensor_value_ids(&self) -> &[SensorValueId] {
        &self.sensor_value_ids
    }

    #[must_use]
    pub fn supporting_ids(&self) -> &[SensorValueId] {
        &self.supporting_ids
    }

    #[must_use]
    pub fn member_count(&self) -> u32 {
        self.member_count
    }

    #[must_use]
    pub fn calculated_value(&self) -> f64 {
        self.calculated_value
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.calculated_value.is_nan()
    }

    /// Whether any reading contributed.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !self.sensor_value_ids.is_empty()
    }

    /// The value formatted for display, or `None` when there is no value.
    #[must_use]
    pub fn display_value(&self) -> Option<String> {
        if self.is_nan() {
            None
        } else {
            Some(format!("{:.*}", DISPLAY_DECIMALS, self.calculated_value))
        }
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.sensor_type.0, self.calculated_value)
    }
}

/// Replace `\n` and `\r\n` line breaks with the message delimiter.
fn flatten_newlines(text: &str) -> String {
    text.replace("\r\n", MESSAGE_DELIMITER)
        .replace('\n', MESSAGE_DELIMITER)
}

// =============================================================================
// TESTS
// =============================================================================
