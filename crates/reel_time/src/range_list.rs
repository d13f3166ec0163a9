// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sorted, coalesced lists of time ranges.
//!
//! Cache invalidation accumulates into a [`TimeRangeList`] rather than a
//! per-frame dirty bitmap: inserting merges with anything the new range
//! overlaps or touches, and removing trims or splits existing entries.

use crate::range::TimeRange;
use crate::rational::Rational;
use serde::{Deserialize, Serialize};

/// Ordered set of disjoint time ranges
///
/// Entries never overlap or touch and are kept sorted by their in point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRangeList {
    ranges: Vec<TimeRange>,
}

impl TimeRangeList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a range, coalescing it with every entry it overlaps or touches
    ///
    /// Zero-length ranges cover no time and are ignored.
    pub fn insert(&mut self, range: TimeRange) {
        if range.is_empty() {
            return;
        }

        let mut merged = range;
        self.ranges.retain(|existing| {
            if existing.overlaps_with(&merged, true, true) {
                merged = merged.combined(existing);
                false
            } else {
                true
            }
        });

        let index = self
            .ranges
            .partition_point(|r| r.in_point() < merged.in_point());
        self.ranges.insert(index, merged);
    }

    /// Subtract a range, trimming or splitting any entry it overlaps
    pub fn remove(&mut self, remove: TimeRange) {
        if remove.is_empty() {
            return;
        }

        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        for existing in self.ranges.drain(..) {
            if !existing.overlaps_with(&remove, false, false) {
                result.push(existing);
                continue;
            }

            // Keep whatever pokes out on either side
            if existing.in_point() < remove.in_point() {
                result.push(TimeRange::new(existing.in_point(), remove.in_point()));
            }
            if existing.out_point() > remove.out_point() {
                result.push(TimeRange::new(remove.out_point(), existing.out_point()));
            }
        }
        self.ranges = result;
    }

    /// Whether a single entry fully contains `range`
    pub fn contains_range(&self, range: &TimeRange, in_inclusive: bool, out_inclusive: bool) -> bool {
        self.ranges
            .iter()
            .any(|r| r.contains_range(range, in_inclusive, out_inclusive))
    }

    /// Whether any entry contains the instant `time`
    pub fn contains(&self, time: Rational) -> bool {
        self.ranges.iter().any(|r| r.contains(time))
    }

    /// The parts of this list that fall inside `range`
    pub fn intersects(&self, range: &TimeRange) -> TimeRangeList {
        let ranges = self
            .ranges
            .iter()
            .filter(|r| r.overlaps_with(range, false, false))
            .filter_map(|r| r.intersected(range))
            .filter(|r| !r.is_empty())
            .collect();
        TimeRangeList { ranges }
    }

    /// Entries in ascending order
    pub fn iter(&self) -> std::slice::Iter<'_, TimeRange> {
        self.ranges.iter()
    }

    /// Entries as a slice
    pub fn as_slice(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Number of disjoint entries
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

impl FromIterator<TimeRange> for TimeRangeList {
    fn from_iter<I: IntoIterator<Item = TimeRange>>(iter: I) -> Self {
        let mut list = TimeRangeList::new();
        for range in iter {
            list.insert(range);
        }
        list
    }
}

impl Extend<TimeRange> for TimeRangeList {
    fn extend<I: IntoIterator<Item = TimeRange>>(&mut self, iter: I) {
        for range in iter {
            self.insert(range);
        }
    }
}

impl<'a> IntoIterator for &'a TimeRangeList {
    type Item = &'a TimeRange;
    type IntoIter = std::slice::Iter<'a, TimeRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
