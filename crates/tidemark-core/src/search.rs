//! # Time-Searchable Column Values
//!
//! Each instrument column keeps its readings sorted by `(time, id)` so that
//! every neighbour lookup used by interpolation is a binary search:
//! - exact match at a timestamp
//! - nearest value before / at-or-before a timestamp
//! - nearest value after / at-or-after a timestamp
//!
//! ## Cursors
//!
//! A reduction pass visits measurements in time order, so it keeps a
//! resumable [`SearchCursor`] per column instead of searching from scratch.
//! Cursors are owned by the caller, grouped in a [`SearchCursors`] set, and
//! destroyed by name prefix when the pass ends.

use crate::{ColumnId, SensorValueId, Timestamp};
use std::collections::BTreeMap;

// =============================================================================
// SEARCHABLE LIST
// =============================================================================

/// The readings of one column, sorted by time then id.
#[derive(Debug, Clone, Default)]
pub struct SearchableSensorValues {
    entries: Vec<(Timestamp, SensorValueId)>,
}

impl SearchableSensorValues {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reading, keeping the list sorted. Duplicate entries are ignored.
    pub fn insert(&mut self, time: Timestamp, id: SensorValueId) {
        if let Err(position) = self.entries.binary_search(&(time, id)) {
            self.entries.insert(position, (time, id));
        }
    }

    /// Remove a reading. Returns whether it was present.
    pub fn remove(&mut self, time: Timestamp, id: SensorValueId) -> bool {
        match self.entries.binary_search(&(time, id)) {
            Ok(position) => {
                self.entries.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in time order.
    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, SensorValueId)> + '_ {
        self.entries.iter().copied()
    }

    /// The ids in time order.
    pub fn ids(&self) -> impl Iterator<Item = SensorValueId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    /// Number of entries at or before `time`.
    fn upper_bound(&self, time: Timestamp) -> usize {
        self.entries.partition_point(|(t, _)| *t <= time)
    }

    /// Number of entries strictly before `time`.
    fn lower_bound(&self, time: Timestamp) -> usize {
        self.entries.partition_point(|(t, _)| *t < time)
    }

    /// The first reading taken exactly at `time`.
    #[must_use]
    pub fn exact(&self, time: Timestamp) -> Option<SensorValueId> {
        self.entries
            .get(self.lower_bound(time))
            .filter(|(t, _)| *t == time)
            .map(|(_, id)| *id)
    }

    /// The latest reading at or before `time`.
    #[must_use]
    pub fn at_or_before(&self, time: Timestamp) -> Option<SensorValueId> {
        self.prior_from(self.upper_bound(time), |_| true)
    }

    /// The latest reading strictly before `time`.
    #[must_use]
    pub fn before(&self, time: Timestamp) -> Option<SensorValueId> {
        self.prior_from(self.lower_bound(time), |_| true)
    }

    /// The earliest reading at or after `time`.
    #[must_use]
    pub fn at_or_after(&self, time: Timestamp) -> Option<SensorValueId> {
        self.post_from(self.lower_bound(time), |_| true)
    }

    /// The earliest reading strictly after `time`.
    #[must_use]
    pub fn after(&self, time: Timestamp) -> Option<SensorValueId> {
        self.post_from(self.upper_bound(time), |_| true)
    }

    /// The latest reading at or before `time` accepted by `accept`.
    pub fn prior_matching<F>(&self, time: Timestamp, accept: F) -> Option<SensorValueId>
    where
        F: Fn(SensorValueId) -> bool,
    {
        self.prior_from(self.upper_bound(time), accept)
    }

    /// The earliest reading strictly after `time` accepted by `accept`.
    pub fn post_matching<F>(&self, time: Timestamp, accept: F) -> Option<SensorValueId>
    where
        F: Fn(SensorValueId) -> bool,
    {
        self.post_from(self.upper_bound(time), accept)
    }

    /// Walk backwards from `position` (exclusive).
    pub(crate) fn prior_from<F>(&self, position: usize, accept: F) -> Option<SensorValueId>
    where
        F: Fn(SensorValueId) -> bool,
    {
        let position = position.min(self.entries.len());
        self.entries[..position]
            .iter()
            .rev()
            .map(|(_, id)| *id)
            .find(|id| accept(*id))
    }

    /// Walk forwards from `position` (inclusive).
    pub(crate) fn post_from<F>(&self, position: usize, accept: F) -> Option<SensorValueId>
    where
        F: Fn(SensorValueId) -> bool,
    {
        self.entries
            .iter()
            .skip(position)
            .map(|(_, id)| *id)
            .find(|id| accept(*id))
    }

    /// Timestamp of the entry just before `position`, if any.
    pub(crate) fn time_before(&self, position: usize) -> Option<Timestamp> {
        position
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
            .map(|(t, _)| *t)
    }

    fn time_at(&self, position: usize) -> Option<Timestamp> {
        self.entries.get(position).map(|(t, _)| *t)
    }
}

// =============================================================================
// CURSORS
// =============================================================================

/// A resumable position in one column's list.
///
/// After [`seek`](SearchCursor::seek), every entry at or before the target
/// time lies behind the cursor and every later entry lies ahead of it.
/// Seeking forward over a time-ordered sequence of targets costs amortized
/// O(1) per target; seeking backwards is also supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCursor {
    column: ColumnId,
    position: usize,
}

impl SearchCursor {
    /// A cursor at the start of `column`.
    #[must_use]
    pub fn new(column: ColumnId) -> Self {
        Self {
            column,
            position: 0,
        }
    }

    #[must_use]
    pub fn column(&self) -> ColumnId {
        self.column
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move to the partition point for `time` and return it.
    pub fn seek(&mut self, list: &SearchableSensorValues, time: Timestamp) -> usize {
        self.position = self.position.min(list.len());
        while list.time_at(self.position).is_some_and(|t| t <= time) {
            self.position += 1;
        }
        while list.time_before(self.position).is_some_and(|t| t > time) {
            self.position -= 1;
        }
        self.position
    }
}

/// A caller-owned set of named cursors, scoped to one reduction pass.
#[derive(Debug, Clone, Default)]
pub struct SearchCursors {
    cursors: BTreeMap<String, SearchCursor>,
}

impl SearchCursors {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the named cursor, opening it at the start of `column` if needed.
    pub fn open(&mut self, name: &str, column: ColumnId) -> &mut SearchCursor {
        self.cursors
            .entry(name.to_string())
            .or_insert_with(|| SearchCursor::new(column))
    }

    /// Get an already open cursor.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut SearchCursor> {
        self.cursors.get_mut(name)
    }

    /// Destroy every cursor whose name starts with `prefix`.
    ///
    /// Returns the number of cursors destroyed.
    pub fn destroy_with_prefix(&mut self, prefix: &str) -> usize {
        let before = self.cursors.len();
        self.cursors.retain(|name, _| !name.starts_with(prefix));
        before - self.cursors.len()
    }

    /// Whether any cursor name starts with `prefix`.
    #[must_use]
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.cursors
            .range(prefix.to_string()..)
            .next()
            .is_some_and(|(name, _)| name.starts_with(prefix))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp_from_secs;

    fn t(secs: i64) -> Timestamp {
        timestamp_from_secs(secs).expect("time")
    }

    fn list(times: &[i64]) -> SearchableSensorValues {
        let mut list = SearchableSensorValues::new();
        // Insert out of order to exercise sorting.
        for (index, secs) in times.iter().enumerate().rev() {
            list.insert(t(*secs), SensorValueId(index as u64 + 1));
        }
        list
    }

    #[test]
    fn insert_keeps_time_order() {
        let list = list(&[0, 10, 20]);
        let times: Vec<_> = list.iter().map(|(time, _)| time).collect();
        assert_eq!(times, vec![t(0), t(10), t(20)]);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut list = list(&[0]);
        list.insert(t(0), SensorValueId(1));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn exact_and_neighbour_searches() {
        let list = list(&[0, 10, 20]);
        assert_eq!(list.exact(t(10)), Some(SensorValueId(2)));
        assert_eq!(list.exact(t(5)), None);

        assert_eq!(list.at_or_before(t(10)), Some(SensorValueId(2)));
        assert_eq!(list.before(t(10)), Some(SensorValueId(1)));
        assert_eq!(list.at_or_after(t(10)), Some(SensorValueId(2)));
        assert_eq!(list.after(t(10)), Some(SensorValueId(3)));

        assert_eq!(list.before(t(0)), None);
        assert_eq!(list.after(t(20)), None);
        assert_eq!(list.at_or_before(t(-5)), None);
        assert_eq!(list.at_or_after(t(25)), None);
    }

    #[test]
    fn predicate_searches_skip_rejected_values() {
        let list = list(&[0, 10, 20, 30]);
        let skip_middle = |id: SensorValueId| id != SensorValueId(2) && id != SensorValueId(3);
        assert_eq!(list.prior_matching(t(25), skip_middle), Some(SensorValueId(1)));
        assert_eq!(list.post_matching(t(5), skip_middle), Some(SensorValueId(4)));
    }

    #[test]
    fn remove_entry() {
        let mut list = list(&[0, 10]);
        assert!(list.remove(t(0), SensorValueId(1)));
        assert!(!list.remove(t(0), SensorValueId(1)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn cursor_seeks_forward_and_backward() {
        let list = list(&[0, 10, 20]);
        let mut cursor = SearchCursor::new(ColumnId(1));

        assert_eq!(cursor.seek(&list, t(-1)), 0);
        assert_eq!(cursor.seek(&list, t(10)), 2);
        assert_eq!(cursor.seek(&list, t(15)), 2);
        assert_eq!(cursor.seek(&list, t(99)), 3);
        assert_eq!(cursor.seek(&list, t(5)), 1);
    }

    #[test]
    fn cursor_agrees_with_binary_search() {
        let list = list(&[0, 10, 10, 20]);
        let mut cursor = SearchCursor::new(ColumnId(1));
        for secs in [-3, 0, 4, 10, 12, 20, 21] {
            assert_eq!(cursor.seek(&list, t(secs)), list.upper_bound(t(secs)));
        }
    }

    #[test]
    fn cursor_set_prefix_operations() {
        let mut cursors = SearchCursors::new();
        cursors.open("7/1", ColumnId(1));
        cursors.open("7/2", ColumnId(2));
        cursors.open("8/1", ColumnId(1));

        assert!(cursors.contains_prefix("7/"));
        assert!(!cursors.contains_prefix("9/"));
        assert_eq!(cursors.destroy_with_prefix("7/"), 2);
        assert!(!cursors.contains_prefix("7/"));
        assert!(cursors.get_mut("8/1").is_some());
        assert_eq!(cursors.len(), 1);
    }

    #[test]
    fn reopening_a_cursor_keeps_its_position() {
        let list = list(&[0, 10]);
        let mut cursors = SearchCursors::new();
        cursors.open("a", ColumnId(1)).seek(&list, t(10));
        assert_eq!(cursors.open("a", ColumnId(1)).position(), 2);
    }
}
