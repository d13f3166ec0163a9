// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline clip: maps sequence time onto a media source.
//!
//! A clip occupies `[in, in + length)` in sequence time and reads its
//! `buffer_in` starting at `media_in`, scaled by `speed`. Negative speeds
//! play the media backwards; a speed of zero holds the frame at
//! `media_in`. Only `buffer_in` is remapped; every other input is
//! time-transparent.

use crate::hash::NodeHasher;
use crate::node::{Node, NodeCategory, NodeKind};
use crate::param::NodeInput;
use crate::table::{NodeValueDatabase, NodeValueTable};
use crate::value::DataType;
use reel_time::{Rational, TimeRange};
use std::any::Any;

/// Type id of [`ClipNode`]
pub const CLIP_ID: &str = "reel.clip";

/// Id of the media input
pub const BUFFER_INPUT: &str = "buffer_in";
/// Id of the sequence in point
pub const IN_INPUT: &str = "in";
/// Id of the sequence length
pub const LENGTH_INPUT: &str = "length";
/// Id of the media in point
pub const MEDIA_IN_INPUT: &str = "media_in";
/// Id of the playback speed
pub const SPEED_INPUT: &str = "speed";

const INACTIVE_MARKER: &[u8] = b"inactive";

/// Clip block on a track
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipNode;

/// Resolved timing parameters of one clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipTiming {
    /// Sequence in point
    pub in_point: Rational,
    /// Sequence length
    pub length: Rational,
    /// Media time shown at the in point (or out point when reversed)
    pub media_in: Rational,
    /// Media seconds per sequence second
    pub speed: Rational,
}

impl ClipTiming {
    /// Read a clip node's timing
    pub fn of(node: &Node) -> Self {
        let read = |id: &str, default: Rational| {
            node.standard_value(id)
                .and_then(|v| v.as_rational().ok())
                .unwrap_or(default)
        };
        Self {
            in_point: read(IN_INPUT, Rational::ZERO),
            length: read(LENGTH_INPUT, Rational::ONE),
            media_in: read(MEDIA_IN_INPUT, Rational::ZERO),
            speed: read(SPEED_INPUT, Rational::ONE),
        }
    }

    /// Sequence out point
    pub fn out_point(&self) -> Rational {
        self.in_point + self.length
    }

    /// Range the clip occupies in sequence time
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.in_point, self.out_point())
    }

    /// Map a sequence time into media time
    pub fn sequence_to_media(&self, time: Rational) -> Rational {
        if self.speed.is_zero() {
            self.media_in
        } else if self.speed.is_negative() {
            self.media_in + (self.out_point() - time) * self.speed.abs()
        } else {
            (time - self.in_point) * self.speed + self.media_in
        }
    }

    /// Map a media time into sequence time
    ///
    /// A frozen clip maps everything to its in point.
    pub fn media_to_sequence(&self, time: Rational) -> Rational {
        let Ok(scaled) = (time - self.media_in).checked_div(self.speed.abs()) else {
            return self.in_point;
        };
        if self.speed.is_negative() {
            self.out_point() - scaled
        } else {
            scaled + self.in_point
        }
    }

    /// Whether the clip shows anything at `time`
    pub fn is_active_at(&self, time: Rational) -> bool {
        self.range().contains(time)
    }

    fn overlaps(&self, range: &TimeRange) -> bool {
        let clip = self.range();
        if range.is_empty() {
            clip.contains(range.in_point())
        } else {
            clip.overlaps_with(range, false, false)
        }
    }
}

impl NodeKind for ClipNode {
    fn id(&self) -> &'static str {
        CLIP_ID
    }

    fn name(&self) -> &'static str {
        "Clip"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Timeline
    }

    fn description(&self) -> &'static str {
        "A time-based node that represents a media source."
    }

    fn inputs(&self) -> Vec<NodeInput> {
        vec![
            NodeInput::new(BUFFER_INPUT, "Buffer", DataType::Buffer),
            NodeInput::new(IN_INPUT, "In", DataType::Rational)
                .with_default(Rational::ZERO)
                .not_connectable(),
            NodeInput::new(LENGTH_INPUT, "Length", DataType::Rational)
                .with_default(Rational::ONE)
                .not_connectable(),
            NodeInput::new(MEDIA_IN_INPUT, "Media In", DataType::Rational)
                .with_default(Rational::ZERO)
                .not_connectable(),
            NodeInput::new(SPEED_INPUT, "Speed", DataType::Rational)
                .with_default(Rational::ONE)
                .not_connectable(),
        ]
    }

    /// Keeps only the buffer received from the media input
    fn value(&self, _node: &Node, db: &mut NodeValueDatabase) -> NodeValueTable {
        let mut table = NodeValueTable::new();
        if let Some(buffer) = db[BUFFER_INPUT].get_with_meta(DataType::Buffer, "") {
            table.push(buffer.clone());
        }
        table
    }

    fn input_time_adjustment(&self, node: &Node, input: &str, range: TimeRange) -> TimeRange {
        if input != BUFFER_INPUT {
            return range;
        }
        let timing = ClipTiming::of(node);
        TimeRange::new(
            timing.sequence_to_media(range.in_point()),
            timing.sequence_to_media(range.out_point()),
        )
    }

    fn output_time_adjustment(&self, node: &Node, input: &str, range: TimeRange) -> TimeRange {
        if input != BUFFER_INPUT {
            return range;
        }
        let timing = ClipTiming::of(node);
        TimeRange::new(
            timing.media_to_sequence(range.in_point()),
            timing.media_to_sequence(range.out_point()),
        )
    }

    fn invalidation_range(&self, node: &Node, from_input: &str, range: TimeRange) -> Option<TimeRange> {
        if from_input != BUFFER_INPUT {
            return Some(range);
        }
        let timing = ClipTiming::of(node);
        if timing.speed.is_zero() {
            return Some(timing.range());
        }
        let mapped = self.output_time_adjustment(node, from_input, range);
        mapped.intersected(&timing.range()).filter(|r| !r.is_empty())
    }

    fn should_process_input(&self, node: &Node, input: &str, range: TimeRange) -> bool {
        input != BUFFER_INPUT || ClipTiming::of(node).overlaps(&range)
    }

    /// Outside its range a clip hashes as inactive. Inside, the speed and
    /// the media at the mapped time stand in for the sequence timing.
    fn hash(&self, node: &Node, hasher: &mut NodeHasher<'_>, time: Rational) {
        hasher.update(CLIP_ID);
        let timing = ClipTiming::of(node);
        if !timing.is_active_at(time) {
            hasher.update(INACTIVE_MARKER);
            return;
        }

        hasher.update(timing.speed.numerator().to_le_bytes());
        hasher.update(timing.speed.denominator().to_le_bytes());
        if let Some(upstream) = node.input(BUFFER_INPUT).and_then(NodeInput::connection) {
            if let Err(e) = hasher.hash_node(upstream.node, timing.sequence_to_media(time)) {
                tracing::warn!("Clip {} lost its media: {e}", node.id());
            }
        }
    }

    fn box_clone(&self) -> Box<dyn NodeKind> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::InputRef;
    use crate::graph::NodeGraph;
    use crate::node::NodeId;
    use crate::nodes::solid::{SolidNode, COLOR_INPUT};
    use crate::value::Color;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn timing(speed: Rational) -> ClipTiming {
        ClipTiming {
            in_point: r(10, 1),
            length: r(5, 1),
            media_in: r(2, 1),
            speed,
        }
    }

    #[test]
    fn test_forward_mapping() {
        let t = timing(Rational::ONE);
        assert_eq!(t.sequence_to_media(r(10, 1)), r(2, 1));
        assert_eq!(t.sequence_to_media(r(12, 1)), r(4, 1));
        assert_eq!(t.media_to_sequence(r(4, 1)), r(12, 1));
    }

    #[test]
    fn test_round_trip_with_speed_and_reversal() {
        for speed in [r(1, 1), r(2, 1), r(1, 3), r(-1, 1), r(-5, 2)] {
            let t = timing(speed);
            for time in [r(10, 1), r(21, 2), r(1001, 100), r(15, 1)] {
                assert_eq!(t.media_to_sequence(t.sequence_to_media(time)), time, "speed {speed}");
            }
        }
    }

    #[test]
    fn test_reversed_clip_starts_at_media_end() {
        let t = timing(-Rational::ONE);
        assert_eq!(t.sequence_to_media(r(10, 1)), r(7, 1));
        assert_eq!(t.sequence_to_media(r(15, 1)), r(2, 1));
    }

    #[test]
    fn test_freeze_frame() {
        let t = timing(Rational::ZERO);
        assert_eq!(t.sequence_to_media(r(13, 1)), r(2, 1));
        assert_eq!(t.media_to_sequence(r(9, 1)), r(10, 1));
    }

    #[test]
    fn test_overlap_with_instants() {
        let t = timing(Rational::ONE);
        assert!(t.overlaps(&TimeRange::instant(r(10, 1))));
        assert!(!t.overlaps(&TimeRange::instant(r(15, 1))));
        assert!(t.overlaps(&TimeRange::new(r(14, 1), r(20, 1))));
        assert!(!t.overlaps(&TimeRange::new(r(15, 1), r(20, 1))));
    }

    fn solid_clip(graph: &mut NodeGraph) -> (NodeId, NodeId) {
        let solid = graph.add_node(Node::from_kind(SolidNode)).unwrap();
        let clip = graph.add_node(Node::from_kind(ClipNode)).unwrap();
        graph.connect(solid, &InputRef::new(clip, BUFFER_INPUT)).unwrap();
        (solid, clip)
    }

    #[test]
    fn test_inactive_clip_hashes_without_its_media() {
        let mut graph = NodeGraph::default();
        let (solid, clip) = solid_clip(&mut graph);
        let active = graph.hash(clip, r(1, 2)).unwrap();
        let outside = graph.hash(clip, r(3, 1)).unwrap();
        assert_ne!(active, outside);
        assert_eq!(outside, graph.hash(clip, r(-1, 1)).unwrap());

        graph
            .set_standard_value(&InputRef::new(solid, COLOR_INPUT), Color::WHITE.into())
            .unwrap();
        assert_ne!(active, graph.hash(clip, r(1, 2)).unwrap());
        assert_eq!(outside, graph.hash(clip, r(3, 1)).unwrap());
    }

    #[test]
    fn test_speed_changes_the_digest() {
        let mut graph = NodeGraph::default();
        let (_, clip) = solid_clip(&mut graph);
        let before = graph.hash(clip, Rational::ZERO).unwrap();
        graph
            .set_standard_value(&InputRef::new(clip, SPEED_INPUT), r(2, 1).into())
            .unwrap();
        assert_ne!(before, graph.hash(clip, Rational::ZERO).unwrap());
    }
}
