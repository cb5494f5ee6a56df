//! # QC Flags
//!
//! The closed set of quality flags carried by every sensor value and every
//! derived measurement value.
//!
//! Flags have three external representations, all driven by one table:
//! - an integer code (persistence, WOCE mapping)
//! - a letter code (compact user QC input)
//! - a display string
//!
//! ## Significance
//!
//! Flags combine by *significance*, not by numeric code:
//!
//! ```text
//! LOOKUP > FLUSHING > NEEDED > BAD > QUESTIONABLE > GOOD ≈ ASSUMED_GOOD > NO_QC
//! ```
//!
//! GOOD and ASSUMED_GOOD share WOCE code 2 and are of equal significance.

use crate::TidemarkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A quality-control flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Flag {
    NoQc,
    Good,
    AssumedGood,
    Questionable,
    Bad,
    Needed,
    Flushing,
    Lookup,
}

/// Code, letter, display text and significance rank for each flag.
const FLAG_TABLE: [(Flag, i32, char, &str, u8); 8] = [
    (Flag::NoQc, 0, 'X', "No QC", 0),
    (Flag::Good, 2, 'G', "Good", 1),
    (Flag::AssumedGood, -2, 'A', "Assumed Good", 1),
    (Flag::Questionable, 3, 'Q', "Questionable", 2),
    (Flag::Bad, 4, 'B', "Bad", 3),
    (Flag::Needed, -10, 'N', "Needed", 4),
    (Flag::Flushing, -100, 'F', "In flushing time", 5),
    (Flag::Lookup, -200, 'L', "Lookup", 6),
];

impl Flag {
    /// All flags, in table order.
    pub const ALL: [Flag; 8] = [
        Flag::NoQc,
        Flag::Good,
        Flag::AssumedGood,
        Flag::Questionable,
        Flag::Bad,
        Flag::Needed,
        Flag::Flushing,
        Flag::Lookup,
    ];

    fn entry(self) -> (Flag, i32, char, &'static str, u8) {
        // The table is indexed in declaration order.
        FLAG_TABLE[self as usize]
    }

    /// The stable integer code.
    #[must_use]
    pub fn code(self) -> i32 {
        self.entry().1
    }

    /// The single-letter code.
    #[must_use]
    pub fn letter(self) -> char {
        self.entry().2
    }

    /// The human-readable name.
    #[must_use]
    pub fn text(self) -> &'static str {
        self.entry().3
    }

    fn rank(self) -> u8 {
        self.entry().4
    }

    /// Look up a flag by integer code.
    pub fn from_code(code: i32) -> Result<Self, TidemarkError> {
        FLAG_TABLE
            .iter()
            .find(|entry| entry.1 == code)
            .map(|entry| entry.0)
            .ok_or_else(|| TidemarkError::InvalidFlag(code.to_string()))
    }

    /// Look up a flag by letter (case-insensitive).
    ///
    /// The WOCE digits `2`, `3` and `4` are accepted as letters for GOOD,
    /// QUESTIONABLE and BAD.
    pub fn from_letter(letter: char) -> Result<Self, TidemarkError> {
        match letter.to_ascii_uppercase() {
            '2' => Ok(Flag::Good),
            '3' => Ok(Flag::Questionable),
            '4' => Ok(Flag::Bad),
            upper => FLAG_TABLE
                .iter()
                .find(|entry| entry.2 == upper)
                .map(|entry| entry.0)
                .ok_or_else(|| TidemarkError::InvalidFlag(letter.to_string())),
        }
    }

    /// Whether this flag beats `other` when flags are combined.
    ///
    /// A missing flag is minimally significant, so this always wins against
    /// `None`.
    #[must_use]
    pub fn more_significant_than(self, other: impl Into<Option<Flag>>) -> bool {
        match other.into() {
            None => true,
            Some(other) => self.rank() > other.rank(),
        }
    }

    /// Whether `other` beats this flag and the two are not of equal
    /// significance.
    ///
    /// NEEDED is therefore not less significant than FLUSHING, although
    /// FLUSHING is more significant than NEEDED.
    #[must_use]
    pub fn less_significant_than(self, other: impl Into<Option<Flag>>) -> bool {
        let other = other.into();
        !self.more_significant_than(other) && !self.equal_significance(other)
    }

    /// Whether the two flags map to the same WOCE code.
    ///
    /// GOOD and ASSUMED_GOOD are equal, and so are all flags without a WOCE
    /// equivalent (NO_QC, NEEDED, FLUSHING, LOOKUP).
    #[must_use]
    pub fn equal_significance(self, other: impl Into<Option<Flag>>) -> bool {
        other
            .into()
            .is_some_and(|other| self.woce_code() == other.woce_code())
    }

    /// Whether this is GOOD or ASSUMED_GOOD.
    #[must_use]
    pub fn is_good(self) -> bool {
        matches!(self, Flag::Good | Flag::AssumedGood)
    }

    /// The WOCE code, or `-1` for flags with no WOCE equivalent.
    #[must_use]
    pub fn woce_code(self) -> i32 {
        match self {
            Flag::Good | Flag::AssumedGood => 2,
            Flag::Questionable => 3,
            Flag::Bad => 4,
            _ => -1,
        }
    }

    /// The most significant of the given flags, seeded at GOOD.
    #[must_use]
    pub fn worst_of<I>(flags: I) -> Flag
    where
        I: IntoIterator<Item = Flag>,
    {
        flags.into_iter().fold(Flag::Good, |worst, flag| {
            if flag.more_significant_than(worst) {
                flag
            } else {
                worst
            }
        })
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl TryFrom<i32> for Flag {
    type Error = TidemarkError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Flag::from_code(code)
    }
}

impl From<Flag> for i32 {
    fn from(flag: Flag) -> Self {
        flag.code()
    }
}

impl FromStr for Flag {
    type Err = TidemarkError;

    /// Parse an integer code or a single letter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i32>() {
            return Flag::from_code(code);
        }
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Flag::from_letter(letter),
            _ => Err(TidemarkError::InvalidFlag(s.to_string())),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
