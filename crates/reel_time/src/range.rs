// SPDX-License-Identifier: MIT OR Apache-2.0
//! Half-open time intervals.

use crate::rational::Rational;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// An interval between two rational times
///
/// Construction never fails: a reversed pair is swapped so that
/// `in_point() <= out_point()` always holds. Callers that pass endpoints in
/// the wrong order get the normalized range back silently.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "(Rational, Rational)", into = "(Rational, Rational)")]
pub struct TimeRange {
    in_point: Rational,
    out_point: Rational,
}

impl TimeRange {
    /// The unbounded range, used when a change affects every time
    pub const ALL: TimeRange = TimeRange {
        in_point: Rational::MIN,
        out_point: Rational::MAX,
    };

    /// Create a range, swapping the endpoints if they are reversed
    pub fn new(in_point: Rational, out_point: Rational) -> Self {
        if in_point > out_point {
            Self {
                in_point: out_point,
                out_point: in_point,
            }
        } else {
            Self { in_point, out_point }
        }
    }

    /// A zero-length range at a single instant
    pub fn instant(time: Rational) -> Self {
        Self {
            in_point: time,
            out_point: time,
        }
    }

    /// Start of the range
    pub fn in_point(&self) -> Rational {
        self.in_point
    }

    /// End of the range
    pub fn out_point(&self) -> Rational {
        self.out_point
    }

    /// `out - in`
    pub fn length(&self) -> Rational {
        self.out_point - self.in_point
    }

    /// Whether the range has zero length
    pub fn is_empty(&self) -> bool {
        self.in_point == self.out_point
    }

    /// Set the start, re-normalizing
    pub fn set_in(&mut self, in_point: Rational) {
        *self = Self::new(in_point, self.out_point);
    }

    /// Set the end, re-normalizing
    pub fn set_out(&mut self, out_point: Rational) {
        *self = Self::new(self.in_point, out_point);
    }

    /// Set both endpoints, re-normalizing
    pub fn set_range(&mut self, in_point: Rational, out_point: Rational) {
        *self = Self::new(in_point, out_point);
    }

    /// Whether `other` overlaps this range
    ///
    /// With inclusive endpoints, ranges that merely touch are considered
    /// overlapping.
    pub fn overlaps_with(&self, other: &TimeRange, in_inclusive: bool, out_inclusive: bool) -> bool {
        let misses_in = if in_inclusive {
            other.out_point < self.in_point
        } else {
            other.out_point <= self.in_point
        };
        let misses_out = if out_inclusive {
            other.in_point > self.out_point
        } else {
            other.in_point >= self.out_point
        };
        !misses_in && !misses_out
    }

    /// Whether `other` lies entirely inside this range
    pub fn contains_range(&self, other: &TimeRange, in_inclusive: bool, out_inclusive: bool) -> bool {
        let contains_in = if in_inclusive {
            other.in_point >= self.in_point
        } else {
            other.in_point > self.in_point
        };
        let contains_out = if out_inclusive {
            other.out_point <= self.out_point
        } else {
            other.out_point < self.out_point
        };
        contains_in && contains_out
    }

    /// Whether `time` lies in `[in, out)`
    pub fn contains(&self, time: Rational) -> bool {
        self.contains_with(time, true, false)
    }

    /// Whether `time` lies in the range with configurable endpoint inclusion
    pub fn contains_with(&self, time: Rational, in_inclusive: bool, out_inclusive: bool) -> bool {
        let after_in = if in_inclusive {
            time >= self.in_point
        } else {
            time > self.in_point
        };
        let before_out = if out_inclusive {
            time <= self.out_point
        } else {
            time < self.out_point
        };
        after_in && before_out
    }

    /// Smallest range covering both
    ///
    /// Only a true union when the ranges overlap or touch; for disjoint
    /// ranges the gap between them is included. Use [`TimeRange::union`]
    /// when that must be rejected.
    pub fn combined(&self, other: &TimeRange) -> TimeRange {
        Self {
            in_point: self.in_point.min(other.in_point),
            out_point: self.out_point.max(other.out_point),
        }
    }

    /// Union of two ranges that overlap or touch, `None` if they are disjoint
    pub fn union(&self, other: &TimeRange) -> Option<TimeRange> {
        self.overlaps_with(other, true, true)
            .then(|| self.combined(other))
    }

    /// Shared part of two ranges, `None` if they are disjoint
    ///
    /// Ranges that touch at a single point intersect in a zero-length range.
    pub fn intersected(&self, other: &TimeRange) -> Option<TimeRange> {
        let in_point = self.in_point.max(other.in_point);
        let out_point = self.out_point.min(other.out_point);
        (in_point <= out_point).then_some(Self { in_point, out_point })
    }
}

impl From<(Rational, Rational)> for TimeRange {
    fn from((in_point, out_point): (Rational, Rational)) -> Self {
        Self::new(in_point, out_point)
    }
}

impl From<TimeRange> for (Rational, Rational) {
    fn from(range: TimeRange) -> Self {
        (range.in_point, range.out_point)
    }
}

impl Add<Rational> for TimeRange {
    type Output = TimeRange;

    fn add(self, rhs: Rational) -> TimeRange {
        TimeRange::new(self.in_point + rhs, self.out_point + rhs)
    }
}

impl Sub<Rational> for TimeRange {
    type Output = TimeRange;

    fn sub(self, rhs: Rational) -> TimeRange {
        TimeRange::new(self.in_point - rhs, self.out_point - rhs)
    }
}

impl AddAssign<Rational> for TimeRange {
    fn add_assign(&mut self, rhs: Rational) {
        *self = *self + rhs;
    }
}

impl SubAssign<Rational> for TimeRange {
    fn sub_assign(&mut self, rhs: Rational) {
        *self = *self - rhs;
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.in_point, self.out_point)
    }
}

impl fmt::Debug for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeRange({:?}, {:?})", self.in_point, self.out_point)
    }
}
