// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track: a sequence of blocks laid out in time.

use crate::hash::NodeHasher;
use crate::node::{Node, NodeCategory, NodeKind};
use crate::nodes::clip::{ClipNode, ClipTiming};
use crate::param::NodeInput;
use crate::table::{NodeValueDatabase, NodeValueTable};
use crate::value::DataType;
use reel_time::Rational;
use std::any::Any;

/// Type id of [`TrackNode`]
pub const TRACK_ID: &str = "reel.track";

/// Id of the block array
pub const BLOCK_INPUT: &str = "block_in";
/// Id of the mute toggle
pub const MUTED_INPUT: &str = "muted_in";

/// Outputs whichever of its blocks is active at the requested time
///
/// Blocks outside the requested range produce nothing, so the topmost
/// remaining buffer wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackNode;

impl NodeKind for TrackNode {
    fn id(&self) -> &'static str {
        TRACK_ID
    }

    fn name(&self) -> &'static str {
        "Track"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Timeline
    }

    fn description(&self) -> &'static str {
        "A sequence of clips and transitions."
    }

    fn inputs(&self) -> Vec<NodeInput> {
        vec![
            NodeInput::new(BLOCK_INPUT, "Blocks", DataType::Buffer).array(),
            NodeInput::new(MUTED_INPUT, "Muted", DataType::Boolean)
                .with_default(false)
                .not_connectable(),
        ]
    }

    fn value(&self, _node: &Node, db: &mut NodeValueDatabase) -> NodeValueTable {
        let muted = db[MUTED_INPUT]
            .get(DataType::Boolean)
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(false);

        let mut table = NodeValueTable::new();
        if muted {
            return table;
        }
        if let Some(block) = db[BLOCK_INPUT].get_with_meta(DataType::Buffer, "") {
            table.push(block.clone());
        }
        table
    }

    /// Clips that are not active at `time` contribute nothing
    fn hash(&self, node: &Node, hasher: &mut NodeHasher<'_>, time: Rational) {
        hasher.update(TRACK_ID);
        let muted = node.value_at(MUTED_INPUT, time).as_bool().unwrap_or(false);
        hasher.update([u8::from(muted)]);
        if muted {
            return;
        }

        let graph = hasher.graph();
        let blocks = node.input(BLOCK_INPUT).map(NodeInput::sub_inputs).unwrap_or_default();
        for (index, block) in blocks.iter().enumerate() {
            let Some(upstream) = block.connection() else {
                continue;
            };
            let Some(upstream_node) = graph.node(upstream.node) else {
                tracing::warn!("Dangling edge into {}:{}", node.id(), block.id());
                continue;
            };
            let inactive_clip = upstream_node.kind_as::<ClipNode>().is_some()
                && !ClipTiming::of(upstream_node).is_active_at(time);
            if inactive_clip {
                continue;
            }

            hasher.update((index as u64).to_le_bytes());
            if let Err(e) = hasher.hash_node(upstream.node, time) {
                tracing::warn!("Track {} lost block {index}: {e}", node.id());
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
    use crate::media::VideoParams;
    use crate::nodes::clip::{ClipNode, BUFFER_INPUT, IN_INPUT, LENGTH_INPUT};
    use crate::nodes::solid::{SolidNode, COLOR_INPUT};
    use crate::param::array_input_id;
    use crate::traverser::{NodeTraverser, TraverserBackend};
    use crate::value::{Color, ParamValue};
    use reel_time::{Rational, TimeRange};

    struct Tiny;

    impl TraverserBackend for Tiny {
        fn video_params(&self) -> VideoParams {
            VideoParams { width: 1, height: 1 }
        }
    }

    /// Two adjacent one-second clips, black then white
    fn timeline() -> (NodeGraph, crate::node::NodeId) {
        let mut graph = NodeGraph::default();
        let track = graph.add_node(Node::from_kind(TrackNode)).unwrap();
        graph.resize_input_array(&InputRef::new(track, BLOCK_INPUT), 2).unwrap();

        for (i, color) in [Color::BLACK, Color::WHITE].into_iter().enumerate() {
            let solid = graph.add_node(Node::from_kind(SolidNode)).unwrap();
            graph
                .set_standard_value(&InputRef::new(solid, COLOR_INPUT), color.into())
                .unwrap();
            let clip = graph.add_node(Node::from_kind(ClipNode)).unwrap();
            graph
                .set_standard_value(
                    &InputRef::new(clip, IN_INPUT),
                    ParamValue::Rational(Rational::from_integer(i as i64)),
                )
                .unwrap();
            graph
                .set_standard_value(&InputRef::new(clip, LENGTH_INPUT), Rational::ONE.into())
                .unwrap();
            graph.connect(solid, &InputRef::new(clip, BUFFER_INPUT)).unwrap();
            graph
                .connect(clip, &InputRef::new(track, array_input_id(BLOCK_INPUT, i)))
                .unwrap();
        }
        (graph, track)
    }

    fn color_at(graph: &NodeGraph, track: crate::node::NodeId, time: Rational) -> Option<Color> {
        let table = NodeTraverser::new(graph, &Tiny)
            .generate_table(track, TimeRange::instant(time))
            .complete()
            .unwrap();
        table
            .get(DataType::Texture)
            .and_then(|v| v.as_texture().ok())
            .and_then(|f| f.pixel(0, 0))
    }

    #[test]
    fn test_active_block() {
        let (graph, track) = timeline();
        assert_eq!(color_at(&graph, track, Rational::new(1, 2).unwrap()), Some(Color::BLACK));
        assert_eq!(color_at(&graph, track, Rational::ONE), Some(Color::WHITE));
        assert_eq!(color_at(&graph, track, Rational::from_integer(2)), None);
    }

    #[test]
    fn test_muted_track_is_empty() {
        let (mut graph, track) = timeline();
        graph
            .set_standard_value(&InputRef::new(track, MUTED_INPUT), ParamValue::Boolean(true))
            .unwrap();
        assert_eq!(color_at(&graph, track, Rational::ZERO), None);
    }

    /// Node feeding `input` of `node`
    fn upstream(graph: &NodeGraph, node: crate::node::NodeId, input: &str) -> crate::node::NodeId {
        let node = graph.node(node).unwrap();
        let input = node
            .inputs_including_arrays()
            .find(|i| i.id() == input)
            .unwrap();
        input.connection().unwrap().node
    }

    #[test]
    fn test_trimming_a_clip_changes_the_digest() {
        let (mut graph, track) = timeline();
        let black = upstream(&graph, track, &array_input_id(BLOCK_INPUT, 0));
        let half = Rational::new(1, 2).unwrap();
        let before = graph.hash(track, half).unwrap();

        graph
            .set_standard_value(
                &InputRef::new(black, LENGTH_INPUT),
                Rational::new(1, 4).unwrap().into(),
            )
            .unwrap();
        assert_ne!(before, graph.hash(track, half).unwrap());
        assert_eq!(color_at(&graph, track, half), None);

        // Moving the clip back under the playhead restores the old key
        graph
            .set_standard_value(&InputRef::new(black, LENGTH_INPUT), Rational::ONE.into())
            .unwrap();
        assert_eq!(before, graph.hash(track, half).unwrap());
    }

    #[test]
    fn test_inactive_blocks_do_not_affect_the_digest() {
        let (mut graph, track) = timeline();
        let white_clip = upstream(&graph, track, &array_input_id(BLOCK_INPUT, 1));
        let white = upstream(&graph, white_clip, BUFFER_INPUT);
        let half = Rational::new(1, 2).unwrap();
        let later = Rational::new(3, 2).unwrap();
        let (early_before, late_before) = (graph.hash(track, half).unwrap(), graph.hash(track, later).unwrap());

        graph
            .set_standard_value(&InputRef::new(white, COLOR_INPUT), Color::new(0.0, 1.0, 0.0, 1.0).into())
            .unwrap();
        assert_eq!(early_before, graph.hash(track, half).unwrap());
        assert_ne!(late_before, graph.hash(track, later).unwrap());
    }

    #[test]
    fn test_muting_changes_the_digest() {
        let (mut graph, track) = timeline();
        let before = graph.hash(track, Rational::ZERO).unwrap();
        graph
            .set_standard_value(&InputRef::new(track, MUTED_INPUT), ParamValue::Boolean(true))
            .unwrap();
        assert_ne!(before, graph.hash(track, Rational::ZERO).unwrap());
    }
}
