// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cache keys across timeline nodes: edits and time both reach the digest.

use reel_graph::media::VideoParams;
use reel_graph::nodes::clip::{BUFFER_INPUT, IN_INPUT, LENGTH_INPUT};
use reel_graph::nodes::solid::COLOR_INPUT;
use reel_graph::nodes::track::BLOCK_INPUT;
use reel_graph::nodes::transition::{self, IN_BLOCK_INPUT, OUT_BLOCK_INPUT, PROGRESS};
use reel_graph::nodes::viewer::TEXTURE_INPUT;
use reel_graph::nodes::{ClipNode, CrossDissolveNode, SolidNode, TrackNode, ViewerNode};
use reel_graph::param::array_input_id;
use reel_graph::{
    CancelFlag, Color, DataType, FrameCache, InputRef, Node, NodeGraph, NodeId, NodeValueTable, ParamValue,
    TraverserBackend,
};
use reel_time::{Rational, TimeRange};

fn r(n: i64, d: i64) -> Rational {
    Rational::new(n, d).unwrap()
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

struct Timeline {
    graph: NodeGraph,
    solid: NodeId,
    clip: NodeId,
    viewer: NodeId,
}

/// viewer <- track <- clip over [0, 1) <- solid
fn timeline() -> Timeline {
    let mut graph = NodeGraph::default();
    let solid = graph.add_node(Node::from_kind(SolidNode)).unwrap();
    set(&mut graph, solid, COLOR_INPUT, Color::BLACK);

    let clip = graph.add_node(Node::from_kind(ClipNode)).unwrap();
    set(&mut graph, clip, IN_INPUT, Rational::ZERO);
    set(&mut graph, clip, LENGTH_INPUT, Rational::ONE);
    graph.connect(solid, &InputRef::new(clip, BUFFER_INPUT)).unwrap();

    let track = graph.add_node(Node::from_kind(TrackNode)).unwrap();
    graph.resize_input_array(&InputRef::new(track, BLOCK_INPUT), 1).unwrap();
    graph
        .connect(clip, &InputRef::new(track, array_input_id(BLOCK_INPUT, 0)))
        .unwrap();

    let viewer = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
    graph.connect(track, &InputRef::new(viewer, TEXTURE_INPUT)).unwrap();
    Timeline {
        graph,
        solid,
        clip,
        viewer,
    }
}

fn render(cache: &FrameCache, graph: &NodeGraph, node: NodeId, time: Rational) -> (reel_graph::Digest, NodeValueTable) {
    cache
        .render(graph, &Tiny, node, TimeRange::instant(time), &CancelFlag::new())
        .unwrap()
        .complete()
        .unwrap()
}

fn has_picture(table: &NodeValueTable) -> bool {
    table.get(DataType::Texture).is_some()
}

#[test]
fn test_upstream_edit_reaches_the_viewer_through_clip_and_track() {
    let Timeline {
        mut graph,
        solid,
        viewer,
        ..
    } = timeline();
    let inside = r(1, 2);
    let outside = r(3, 1);
    let (inside_before, outside_before) = (graph.hash(viewer, inside).unwrap(), graph.hash(viewer, outside).unwrap());

    set(&mut graph, solid, COLOR_INPUT, Color::WHITE);
    assert_ne!(inside_before, graph.hash(viewer, inside).unwrap());
    assert_eq!(outside_before, graph.hash(viewer, outside).unwrap());
}

#[test]
fn test_trimmed_clip_is_not_served_from_cache() {
    let Timeline {
        mut graph,
        clip,
        viewer,
        ..
    } = timeline();
    let cache = FrameCache::new(8);
    let time = r(1, 2);

    let (before, table) = render(&cache, &graph, viewer, time);
    assert!(has_picture(&table));

    // The playhead now falls past the clip's out point
    set(&mut graph, clip, LENGTH_INPUT, r(1, 4));
    let (after, table) = render(&cache, &graph, viewer, time);
    assert_ne!(before, after);
    assert!(!has_picture(&table));
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_moved_clip_is_not_served_from_cache() {
    let Timeline {
        mut graph,
        clip,
        viewer,
        ..
    } = timeline();
    let cache = FrameCache::new(8);

    let (before, _) = render(&cache, &graph, viewer, r(1, 2));
    set(&mut graph, clip, IN_INPUT, r(1, 1));
    let (after, table) = render(&cache, &graph, viewer, r(1, 2));
    assert_ne!(before, after);
    assert!(!has_picture(&table));

    // Same content one second later
    let (shifted, table) = render(&cache, &graph, viewer, r(3, 2));
    assert_eq!(before, shifted);
    assert!(has_picture(&table));
    assert_eq!(cache.stats().hits, 1);
}

/// viewer <- dissolve over [0, 4) from a black to a white solid
fn dissolve() -> (NodeGraph, NodeId) {
    let mut graph = NodeGraph::default();
    let from = graph.add_node(Node::from_kind(SolidNode)).unwrap();
    set(&mut graph, from, COLOR_INPUT, Color::BLACK);
    let to = graph.add_node(Node::from_kind(SolidNode)).unwrap();
    set(&mut graph, to, COLOR_INPUT, Color::WHITE);

    let dissolve = graph.add_node(Node::from_kind(CrossDissolveNode)).unwrap();
    set(&mut graph, dissolve, transition::LENGTH_INPUT, r(4, 1));
    graph.connect(from, &InputRef::new(dissolve, OUT_BLOCK_INPUT)).unwrap();
    graph.connect(to, &InputRef::new(dissolve, IN_BLOCK_INPUT)).unwrap();

    let viewer = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
    graph.connect(dissolve, &InputRef::new(viewer, TEXTURE_INPUT)).unwrap();
    (graph, viewer)
}

#[test]
fn test_transition_digest_varies_with_time() {
    let (graph, viewer) = dissolve();
    let quarter = graph.hash(viewer, r(1, 1)).unwrap();
    let three_quarters = graph.hash(viewer, r(3, 1)).unwrap();
    assert_ne!(quarter, three_quarters);
    assert_eq!(quarter, graph.hash(viewer, r(1, 1)).unwrap());
}

#[test]
fn test_transition_frames_are_not_shared_across_times() {
    let (graph, viewer) = dissolve();
    let cache = FrameCache::new(8);

    let progress_at = |time: Rational| {
        let (_, table) = render(&cache, &graph, viewer, time);
        let Some(ParamValue::ShaderJob(job)) = table.get(DataType::ShaderJob) else {
            panic!("expected a shader job at {time}");
        };
        job.value(PROGRESS).cloned()
    };
    assert_eq!(progress_at(r(1, 1)), Some(ParamValue::Float(0.25)));
    assert_eq!(progress_at(r(3, 1)), Some(ParamValue::Float(0.75)));
    assert_eq!(cache.stats().hits, 0);
}
