// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end behavior of the evaluation engine.

use reel_graph::document::{load_graph, save_graph};
use reel_graph::graph::GraphError;
use reel_graph::media::{Footage, Stream, StreamKind, StreamRef, VideoParams};
use reel_graph::node::NodeKind;
use reel_graph::nodes::clip::{BUFFER_INPUT, IN_INPUT, LENGTH_INPUT, MEDIA_IN_INPUT, SPEED_INPUT};
use reel_graph::nodes::math::{METHOD_INPUT, PARAM_A_INPUT, PARAM_B_INPUT};
use reel_graph::nodes::media::FOOTAGE_INPUT;
use reel_graph::nodes::solid::COLOR_INPUT;
use reel_graph::nodes::viewer::TEXTURE_INPUT;
use reel_graph::nodes::{
    create_default_registry, ClipNode, MathNode, MathOperation, MediaInputNode, SolidNode, ViewerNode,
};
use reel_graph::traverser::evaluate_many;
use reel_graph::{
    CancelFlag, Color, DataType, FrameCache, InputRef, Node, NodeGraph, NodeId, NodeKeyframe, NodeTraverser,
    ParamValue, Traversal, TraverserBackend,
};
use reel_time::{Rational, TimeRange};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn r(n: i64, d: i64) -> Rational {
    Rational::new(n, d).unwrap()
}

fn int(n: i64) -> Rational {
    Rational::from_integer(n)
}

struct Tiny;

impl TraverserBackend for Tiny {
    fn video_params(&self) -> VideoParams {
        VideoParams { width: 2, height: 2 }
    }
}

fn set(graph: &mut NodeGraph, node: NodeId, input: &str, value: impl Into<ParamValue>) {
    graph.set_standard_value(&InputRef::new(node, input), value.into()).unwrap();
}

fn math(graph: &mut NodeGraph, a: f64, b: f64) -> NodeId {
    let node = graph.add_node(Node::from_kind(MathNode)).unwrap();
    set(graph, node, PARAM_A_INPUT, a);
    set(graph, node, PARAM_B_INPUT, b);
    node
}

fn float_at(graph: &NodeGraph, node: NodeId, time: Rational) -> Option<f64> {
    NodeTraverser::new(graph, &Tiny)
        .generate_table(node, TimeRange::instant(time))
        .complete()?
        .get(DataType::Float)
        .and_then(|v| v.as_float().ok())
}

fn clear_dirty(graph: &mut NodeGraph) {
    let ids: Vec<NodeId> = graph.node_ids().collect();
    for id in ids {
        graph.validate_cache(id, TimeRange::ALL).unwrap();
    }
}

fn video_footage() -> StreamRef {
    let footage = Footage::new("shot.mov", 1_700_000_000, vec![Stream::new(0, StreamKind::Video, r(1, 24))]);
    StreamRef::new(Arc::new(footage), 0)
}

/// Media feeding a clip at `in`/`media_in`/`speed`, returning (media, clip)
fn media_clip(graph: &mut NodeGraph, in_point: Rational, media_in: Rational, speed: Rational) -> (NodeId, NodeId) {
    let media = graph.add_node(Node::from_kind(MediaInputNode::default())).unwrap();
    set(graph, media, FOOTAGE_INPUT, ParamValue::Footage(video_footage()));
    let clip = graph.add_node(Node::from_kind(ClipNode)).unwrap();
    set(graph, clip, IN_INPUT, in_point);
    set(graph, clip, LENGTH_INPUT, int(5));
    set(graph, clip, MEDIA_IN_INPUT, media_in);
    set(graph, clip, SPEED_INPUT, speed);
    graph.connect(media, &InputRef::new(clip, BUFFER_INPUT)).unwrap();
    (media, clip)
}

#[test]
fn test_hash_is_deterministic_and_tracks_upstream_values() {
    let mut graph = NodeGraph::default();
    let solid = graph.add_node(Node::from_kind(SolidNode)).unwrap();
    let scale = math(&mut graph, 0.0, 0.5);
    let viewer = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
    graph.connect(solid, &InputRef::new(scale, PARAM_A_INPUT)).unwrap();
    graph.connect(scale, &InputRef::new(viewer, TEXTURE_INPUT)).unwrap();
    let unrelated = math(&mut graph, 1.0, 1.0);

    let before = graph.hash(viewer, Rational::ZERO).unwrap();
    assert_eq!(before, graph.hash(viewer, Rational::ZERO).unwrap());

    set(&mut graph, unrelated, PARAM_A_INPUT, 9.0);
    assert_eq!(before, graph.hash(viewer, Rational::ZERO).unwrap());

    set(&mut graph, solid, COLOR_INPUT, Color::WHITE);
    let after = graph.hash(viewer, Rational::ZERO).unwrap();
    assert_ne!(before, after);

    set(&mut graph, scale, METHOD_INPUT, ParamValue::Combo(MathOperation::Multiply.index()));
    assert_ne!(after, graph.hash(viewer, Rational::ZERO).unwrap());
}

#[test]
fn test_hash_of_missing_node_is_an_error() {
    let graph = NodeGraph::default();
    let missing = NodeId::new();
    assert_eq!(graph.hash(missing, Rational::ZERO), Err(GraphError::NodeNotFound(missing)));
}

#[test]
fn test_clips_showing_the_same_media_frame_share_a_hash() {
    let mut graph = NodeGraph::default();
    let (_, early) = media_clip(&mut graph, int(0), int(0), Rational::ONE);
    let (_, late) = media_clip(&mut graph, int(10), int(0), Rational::ONE);

    let a = graph.hash(early, int(1)).unwrap();
    assert_eq!(a, graph.hash(late, int(11)).unwrap());
    assert_ne!(a, graph.hash(early, int(2)).unwrap());
}

#[test]
fn test_clip_time_round_trip_through_graph() {
    let mut graph = NodeGraph::default();
    let (media, clip) = media_clip(&mut graph, int(10), int(2), r(3, 2));
    let node = graph.node(clip).unwrap();

    let range = TimeRange::new(r(21, 2), int(12));
    let to_media = node.kind().input_time_adjustment(node, BUFFER_INPUT, range);
    assert_eq!(to_media, TimeRange::new(r(11, 4), int(5)));
    assert_eq!(node.kind().output_time_adjustment(node, BUFFER_INPUT, to_media), range);

    // Inputs other than the buffer are not remapped
    assert_eq!(node.kind().input_time_adjustment(node, IN_INPUT, range), range);

    let mapped = graph.transform_time_to(clip, media, range, reel_graph::TransformDirection::Input);
    assert_eq!(mapped, vec![to_media]);
}

#[test]
fn test_invalidation_is_remapped_across_a_clip() {
    let mut graph = NodeGraph::default();
    let (media, clip) = media_clip(&mut graph, int(10), int(2), Rational::ONE);
    let viewer = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
    graph.connect(clip, &InputRef::new(viewer, TEXTURE_INPUT)).unwrap();
    clear_dirty(&mut graph);

    graph.invalidate_cache(media, FOOTAGE_INPUT, TimeRange::new(int(3), int(4)));
    let seq = TimeRange::new(int(11), int(12));
    assert_eq!(graph.node(media).unwrap().invalidated().as_slice(), &[TimeRange::new(int(3), int(4))]);
    assert_eq!(graph.node(clip).unwrap().invalidated().as_slice(), &[seq]);
    assert_eq!(graph.node(viewer).unwrap().invalidated().as_slice(), &[seq]);

    // Media the clip never shows dirties nothing downstream
    clear_dirty(&mut graph);
    graph.invalidate_cache(media, FOOTAGE_INPUT, TimeRange::new(int(40), int(50)));
    assert!(graph.node(clip).unwrap().invalidated().is_empty());
    assert!(graph.node(viewer).unwrap().invalidated().is_empty());
}

#[test]
fn test_frozen_clip_invalidates_its_whole_range() {
    let mut graph = NodeGraph::default();
    let (media, clip) = media_clip(&mut graph, int(10), int(2), Rational::ZERO);
    clear_dirty(&mut graph);

    graph.invalidate_cache(media, FOOTAGE_INPUT, TimeRange::new(int(2), int(3)));
    assert_eq!(
        graph.node(clip).unwrap().invalidated().as_slice(),
        &[TimeRange::new(int(10), int(15))]
    );
}

#[test]
fn test_editing_a_value_invalidates_downstream() {
    let mut graph = NodeGraph::default();
    let a = math(&mut graph, 1.0, 2.0);
    let b = math(&mut graph, 0.0, 1.0);
    graph.connect(a, &InputRef::new(b, PARAM_A_INPUT)).unwrap();
    clear_dirty(&mut graph);

    set(&mut graph, a, PARAM_B_INPUT, 5.0);
    assert!(graph.node(b).unwrap().invalidated().contains(int(1000)));

    // A keyframe only dirties the span it influences
    clear_dirty(&mut graph);
    let input = InputRef::new(a, PARAM_A_INPUT);
    graph.set_keyframing(&input, true).unwrap();
    graph.insert_keyframe(&input, NodeKeyframe::new(int(0), ParamValue::Float(0.0))).unwrap();
    graph.insert_keyframe(&input, NodeKeyframe::new(int(10), ParamValue::Float(10.0))).unwrap();
    clear_dirty(&mut graph);
    graph.insert_keyframe(&input, NodeKeyframe::new(int(4), ParamValue::Float(1.0))).unwrap();
    let dirty = graph.node(b).unwrap().invalidated();
    assert!(dirty.contains(int(5)));
    assert!(!dirty.contains(int(-1)));
    assert!(!dirty.contains(int(11)));
}

#[test]
fn test_diamond_routes_and_memoization() {
    let mut graph = NodeGraph::default();
    let source = math(&mut graph, 2.0, 3.0);
    let left = math(&mut graph, 0.0, 1.0);
    let right = math(&mut graph, 0.0, 10.0);
    let sink = math(&mut graph, 0.0, 0.0);
    graph.connect(source, &InputRef::new(left, PARAM_A_INPUT)).unwrap();
    graph.connect(source, &InputRef::new(right, PARAM_A_INPUT)).unwrap();
    graph.connect(left, &InputRef::new(sink, PARAM_A_INPUT)).unwrap();
    graph.connect(right, &InputRef::new(sink, PARAM_B_INPUT)).unwrap();

    assert_eq!(graph.routes_to(source, sink), 2);
    assert!(graph.outputs_to(source, sink));
    assert!(!graph.outputs_to(sink, source));
    assert_eq!(
        graph.connect(sink, &InputRef::new(source, PARAM_A_INPUT)),
        Err(GraphError::Cycle)
    );

    let range = TimeRange::instant(Rational::ZERO);
    let mut memoized = NodeTraverser::new(&graph, &Tiny);
    let with = memoized.generate_table(sink, range);
    let mut plain = NodeTraverser::new(&graph, &Tiny).with_memoization(false);
    let without = plain.generate_table(sink, range);

    assert_eq!(with, without);
    assert_eq!(with.complete().and_then(|t| t.get(DataType::Float).cloned()), Some(ParamValue::Float(21.0)));
    assert_eq!(memoized.stats().memo_hits, 1);
    assert!(plain.stats().nodes_evaluated > memoized.stats().nodes_evaluated);
}

#[test]
fn test_graph_owns_its_nodes() {
    #[derive(Debug, Default)]
    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl NodeKind for Counted {
        fn id(&self) -> &'static str {
            "test.counted"
        }
        fn name(&self) -> &'static str {
            "Counted"
        }
        fn inputs(&self) -> Vec<reel_graph::NodeInput> {
            Vec::new()
        }
        fn box_clone(&self) -> Box<dyn NodeKind> {
            Box::new(Counted(self.0.clone()))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let dropped = Arc::new(AtomicUsize::new(0));
    let mut graph = NodeGraph::default();
    let first = graph.add_node(Node::from_kind(Counted(dropped.clone()))).unwrap();
    graph.add_node(Node::from_kind(Counted(dropped.clone()))).unwrap();
    graph.add_node(Node::from_kind(Counted(dropped.clone()))).unwrap();

    graph.remove_node(first).unwrap();
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    drop(graph);
    assert_eq!(dropped.load(Ordering::SeqCst), 3);
}

#[test]
fn test_parallel_evaluation_matches_serial() {
    let mut graph = NodeGraph::default();
    let node = math(&mut graph, 0.0, 1.0);
    let input = InputRef::new(node, PARAM_A_INPUT);
    graph.set_keyframing(&input, true).unwrap();
    graph.insert_keyframe(&input, NodeKeyframe::new(int(0), ParamValue::Float(0.0))).unwrap();
    graph.insert_keyframe(&input, NodeKeyframe::new(int(8), ParamValue::Float(8.0))).unwrap();

    let ranges: Vec<TimeRange> = (0..16).map(|i| TimeRange::instant(r(i, 2))).collect();
    let parallel = evaluate_many(&graph, &Tiny, node, &ranges, &CancelFlag::new());

    for (range, result) in ranges.iter().zip(parallel) {
        let serial = float_at(&graph, node, range.in_point());
        let value = result.complete().and_then(|t| t.get(DataType::Float).and_then(|v| v.as_float().ok()));
        assert_eq!(value, serial);
        assert_eq!(value, Some(range.in_point().to_f64() + 1.0));
    }

    let cancel = CancelFlag::new();
    cancel.cancel();
    let cancelled = evaluate_many(&graph, &Tiny, node, &ranges, &cancel);
    assert!(cancelled.iter().all(Traversal::is_cancelled));
}

#[test]
fn test_frame_cache_reuses_equal_content() {
    let mut graph = NodeGraph::default();
    let solid = graph.add_node(Node::from_kind(SolidNode)).unwrap();
    let viewer = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
    graph.connect(solid, &InputRef::new(viewer, TEXTURE_INPUT)).unwrap();

    let cache = FrameCache::new(8);
    let cancel = CancelFlag::new();
    let first = cache
        .render(&graph, &Tiny, viewer, TimeRange::instant(int(0)), &cancel)
        .unwrap()
        .complete()
        .unwrap();
    // A static solid looks the same at every time
    let second = cache
        .render(&graph, &Tiny, viewer, TimeRange::instant(int(7)), &cancel)
        .unwrap()
        .complete()
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn test_document_round_trip_preserves_content() {
    let mut graph = NodeGraph::new("Edit");
    let solid = graph.add_node(Node::from_kind(SolidNode).with_position(10.0, -4.5)).unwrap();
    let scale = math(&mut graph, 0.0, 0.25);
    let viewer = graph.add_node(Node::from_kind(ViewerNode).with_label("Program")).unwrap();
    graph.connect(solid, &InputRef::new(scale, PARAM_A_INPUT)).unwrap();
    graph.connect(scale, &InputRef::new(viewer, TEXTURE_INPUT)).unwrap();
    let color = InputRef::new(solid, COLOR_INPUT);
    graph.set_keyframing(&color, true).unwrap();
    graph.insert_keyframe(&color, NodeKeyframe::new(r(1, 3), Color::WHITE.into())).unwrap();

    let loaded = load_graph(&save_graph(&graph), &create_default_registry()).unwrap();
    assert_eq!(loaded.name, "Edit");
    assert_eq!(loaded.node_count(), 3);
    assert_eq!(loaded.edges().len(), 2);
    assert_eq!(loaded.node(solid).unwrap().position, [10.0, -4.5]);
    assert_eq!(loaded.node(viewer).unwrap().label(), "Program");
    for time in [int(0), r(1, 3), int(2)] {
        assert_eq!(loaded.hash(viewer, time), graph.hash(viewer, time));
    }
}
