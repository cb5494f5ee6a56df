//! # Sensor Values
//!
//! One raw reading from one instrument column at one timestamp, with its QC
//! state.
//!
//! A sensor value carries two QC results:
//! - the automatic QC result, written by QC routines
//! - the user QC result, written by a human (or by the measurement locator
//!   for flushing periods)
//!
//! The *display* flag and message resolve the two by precedence: a user flag
//! of NEEDED defers to the automatic result, any other user flag wins, and a
//! LOOKUP user flag inherits from the values whose ids are listed in the
//! user message.

use crate::dataset::DatasetSensorValues;
use crate::flag::Flag;
use crate::primitives::{LOOKUP_ID_DELIMITER, MAX_LOOKUP_DEPTH, MESSAGE_DELIMITER};
use crate::{ColumnId, DatasetId, SensorValueId, TidemarkError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single raw sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    id: SensorValueId,
    dataset_id: DatasetId,
    column_id: ColumnId,
    time: Timestamp,
    value: Option<String>,
    auto_qc_flag: Flag,
    auto_qc_message: String,
    user_qc_flag: Flag,
    user_qc_message: String,
}

impl SensorValue {
    /// Create an unchecked reading.
    ///
    /// New values start with no automatic QC and an ASSUMED_GOOD user flag.
    #[must_use]
    pub fn new(
        id: SensorValueId,
        dataset_id: DatasetId,
        column_id: ColumnId,
        time: Timestamp,
        value: Option<String>,
    ) -> Self {
        Self {
            id,
            dataset_id,
            column_id,
            time,
            value,
            auto_qc_flag: Flag::NoQc,
            auto_qc_message: String::new(),
            user_qc_flag: Flag::AssumedGood,
            user_qc_message: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SensorValueId {
        self.id
    }

    #[must_use]
    pub fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    #[must_use]
    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// The raw string value, if the instrument reported one.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The value as a number; NaN when absent, blank or not numeric.
    ///
    /// Thousands separators are ignored.
    #[must_use]
    pub fn double_value(&self) -> f64 {
        self.value
            .as_deref()
            .map(|raw| raw.replace(',', ""))
            .filter(|cleaned| !cleaned.trim().is_empty())
            .and_then(|cleaned| cleaned.trim().parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    }

    /// Whether the reading has no numeric value.
    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.double_value().is_nan()
    }

    #[must_use]
    pub fn user_qc_flag(&self) -> Flag {
        self.user_qc_flag
    }

    #[must_use]
    pub fn user_qc_message(&self) -> &str {
        &self.user_qc_message
    }

    #[must_use]
    pub fn auto_qc_flag(&self) -> Flag {
        self.auto_qc_flag
    }

    #[must_use]
    pub fn auto_qc_message(&self) -> &str {
        &self.auto_qc_message
    }

    /// Whether the value lies inside a flushing window.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.user_qc_flag == Flag::Flushing
    }

    /// Whether the value may contribute to a measurement value.
    ///
    /// Flushing values and values without a number are treated as absent.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.is_flushing() && !self.is_nan()
    }

    /// Record a user QC decision.
    pub fn set_user_qc(&mut self, flag: Flag, message: impl Into<String>) {
        self.user_qc_flag = flag;
        self.user_qc_message = message.into();
    }

    /// Record an automatic QC result.
    ///
    /// A non-good result asks for user attention (user flag NEEDED) unless a
    /// user decision has already been made; a good result withdraws that
    /// request.
    pub fn set_auto_qc(&mut self, flag: Flag, message: impl Into<String>) {
        self.auto_qc_flag = flag;
        self.auto_qc_message = message.into();

        let undecided = matches!(self.user_qc_flag, Flag::AssumedGood | Flag::Needed);
        if undecided {
            if flag.is_good() || flag == Flag::NoQc {
                self.user_qc_flag = Flag::AssumedGood;
                self.user_qc_message.clear();
            } else {
                self.user_qc_flag = Flag::Needed;
            }
        }
    }

    /// The ids referenced by a LOOKUP user flag.
    pub fn lookup_ids(&self) -> Result<Vec<SensorValueId>, TidemarkError> {
        self.user_qc_message
            .split(LOOKUP_ID_DELIMITER)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u64>().map(SensorValueId).map_err(|_| {
                    TidemarkError::InvalidRecord(format!(
                        "Sensor value {} has malformed lookup reference '{}'",
                        self.id, part
                    ))
                })
            })
            .collect()
    }

    /// The flag shown for this value.
    pub fn display_flag(&self, values: &DatasetSensorValues) -> Result<Flag, TidemarkError> {
        self.display_flag_at(values, 0)
    }

    /// The QC message shown for this value.
    pub fn display_message(&self, values: &DatasetSensorValues) -> Result<String, TidemarkError> {
        self.display_message_at(values, 0)
    }

    fn display_flag_at(
        &self,
        values: &DatasetSensorValues,
        depth: usize,
    ) -> Result<Flag, TidemarkError> {
        match self.user_qc_flag {
            Flag::Needed => Ok(self.auto_qc_flag),
            Flag::Lookup => {
                let flags = self
                    .lookup_targets(values, depth)?
                    .into_iter()
                    .map(|target| target.display_flag_at(values, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Flag::worst_of(flags))
            }
            flag => Ok(flag),
        }
    }

    fn display_message_at(
        &self,
        values: &DatasetSensorValues,
        depth: usize,
    ) -> Result<String, TidemarkError> {
        match self.user_qc_flag {
            Flag::Needed => Ok(self.auto_qc_message.clone()),
            Flag::Lookup => {
                let mut messages = BTreeSet::new();
                for target in self.lookup_targets(values, depth)? {
                    let message = target.display_message_at(values, depth + 1)?;
                    if !message.trim().is_empty() {
                        messages.insert(message);
                    }
                }
                Ok(messages.into_iter().collect::<Vec<_>>().join(MESSAGE_DELIMITER))
            }
            _ => Ok(self.user_qc_message.clone()),
        }
    }

    fn lookup_targets<'a>(
        &self,
        values: &'a DatasetSensorValues,
        depth: usize,
    ) -> Result<Vec<&'a SensorValue>, TidemarkError> {
        if depth >= MAX_LOOKUP_DEPTH {
            return Err(TidemarkError::InvalidRecord(format!(
                "Lookup chain from sensor value {} is too deep",
                self.id
            )));
        }

        self.lookup_ids()?
            .into_iter()
            .map(|id| {
                values.get_by_id(id).ok_or_else(|| {
                    TidemarkError::RecordNotFound(format!(
                        "Sensor value {} referenced by lookup from {}",
                        id, self.id
                    ))
                })
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
