// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframes on node inputs.

use crate::value::ParamValue;
use reel_time::{Rational, TimeRange};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpolation mode towards the next keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Hold the value until the next keyframe
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Cubic bezier easing using the keyframe handles
    Bezier,
}

/// A value pinned to an exact time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeKeyframe {
    /// Unique keyframe ID
    pub id: KeyframeId,
    /// Time of the keyframe
    pub time: Rational,
    /// Value at this keyframe
    pub value: ParamValue,
    /// Interpolation mode to the next keyframe
    pub interpolation: InterpolationMode,
    /// Easing handles for bezier interpolation, as fractions of the segment
    pub handles: [f64; 2],
}

impl NodeKeyframe {
    /// Create a new keyframe
    pub fn new(time: Rational, value: ParamValue) -> Self {
        Self {
            id: KeyframeId::new(),
            time,
            value,
            interpolation: InterpolationMode::Linear,
            handles: [1.0 / 3.0, 2.0 / 3.0],
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }

    /// Set bezier easing handles
    pub fn with_handles(mut self, out_handle: f64, in_handle: f64) -> Self {
        self.handles = [out_handle, in_handle];
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    /// Cubic bezier interpolation
    pub fn bezier(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        p0 * mt3 + 3.0 * p1 * mt2 * t + 3.0 * p2 * mt * t2 + p3 * t3
    }
}

/// Keyframes of one input, sorted by time with at most one per instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeTrack {
    keys: Vec<NodeKeyframe>,
}

impl KeyframeTrack {
    /// Create an empty track
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a keyframe, returning the one it replaced at the same time
    pub fn insert(&mut self, key: NodeKeyframe) -> Option<NodeKeyframe> {
        match self.keys.binary_search_by(|k| k.time.cmp(&key.time)) {
            Ok(i) => Some(std::mem::replace(&mut self.keys[i], key)),
            Err(i) => {
                self.keys.insert(i, key);
                None
            }
        }
    }

    /// Remove the keyframe at an exact time
    pub fn remove_at(&mut self, time: Rational) -> Option<NodeKeyframe> {
        let i = self.index_at(time)?;
        Some(self.keys.remove(i))
    }

    /// Remove a keyframe by id
    pub fn remove(&mut self, id: KeyframeId) -> Option<NodeKeyframe> {
        let i = self.keys.iter().position(|k| k.id == id)?;
        Some(self.keys.remove(i))
    }

    /// Keyframe at an exact time
    pub fn at(&self, time: Rational) -> Option<&NodeKeyframe> {
        self.index_at(time).map(|i| &self.keys[i])
    }

    fn index_at(&self, time: Rational) -> Option<usize> {
        self.keys.binary_search_by(|k| k.time.cmp(&time)).ok()
    }

    /// Keyframes in time order
    pub fn keys(&self) -> &[NodeKeyframe] {
        &self.keys
    }

    /// Number of keyframes
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the track has no keyframes
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sample the track at a time, `None` if it has no keyframes
    pub fn sample(&self, time: Rational) -> Option<ParamValue> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if time <= first.time {
            return Some(first.value.clone());
        }
        if time >= last.time {
            return Some(last.value.clone());
        }

        // First key strictly after `time`; both neighbours exist here
        let next = self.keys.partition_point(|k| k.time <= time);
        let before = &self.keys[next - 1];
        let after = &self.keys[next];

        let span = (after.time - before.time).to_f64();
        let t = if span > 0.0 {
            (time - before.time).to_f64() / span
        } else {
            0.0
        };

        let t = match before.interpolation {
            InterpolationMode::Constant => return Some(before.value.clone()),
            InterpolationMode::Linear => t,
            InterpolationMode::Bezier => {
                Interpolation::bezier(0.0, before.handles[0], after.handles[1], 1.0, t)
            }
        };
        Some(before.value.lerp(&after.value, t))
    }

    /// Range whose sampled values depend on a keyframe at `time`
    ///
    /// Spans from the previous keyframe (or the beginning of time) to the
    /// next one (or the end of time).
    pub fn affected_range(&self, time: Rational) -> TimeRange {
        let prev = self
            .keys
            .iter()
            .rev()
            .find(|k| k.time < time)
            .map_or(Rational::MIN, |k| k.time);
        let next = self
            .keys
            .iter()
            .find(|k| k.time > time)
            .map_or(Rational::MAX, |k| k.time);
        TimeRange::new(prev, next)
    }
}
