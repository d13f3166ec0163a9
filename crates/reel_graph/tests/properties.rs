// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests for clip time mapping, table precedence and hashing.

use proptest::prelude::*;
use reel_graph::nodes::clip::ClipTiming;
use reel_graph::nodes::{MathNode, ViewerNode};
use reel_graph::{DataType, InputRef, Node, NodeGraph, NodeValueTable, ParamValue};
use reel_time::Rational;

fn rational(range: std::ops::Range<i64>) -> impl Strategy<Value = Rational> {
    (range, 1i64..48).prop_map(|(n, d)| Rational::new(n, d).unwrap())
}

fn nonzero_speed() -> impl Strategy<Value = Rational> {
    (1i64..16, 1i64..8, any::<bool>())
        .prop_map(|(n, d, reverse)| Rational::new(if reverse { -n } else { n }, d).unwrap())
}

proptest! {
    #[test]
    fn clip_mapping_round_trips(
        in_point in rational(-500..500),
        length in rational(1..500),
        media_in in rational(-500..500),
        speed in nonzero_speed(),
        time in rational(-1000..1000),
    ) {
        let clip = ClipTiming { in_point, length, media_in, speed };
        let media = clip.sequence_to_media(time);
        prop_assert_eq!(clip.media_to_sequence(media), time);
    }

    #[test]
    fn last_push_wins(values in prop::collection::vec(-1000.0f64..1000.0, 1..8)) {
        let mut table = NodeValueTable::new();
        for v in &values {
            table.push_data(ParamValue::Float(*v), None);
        }
        let last = values.last().copied().unwrap();
        prop_assert_eq!(table.take(DataType::Float), Some(ParamValue::Float(last)));
        if values.len() > 1 {
            let previous = values[values.len() - 2];
            prop_assert_eq!(table.get(DataType::Float), Some(&ParamValue::Float(previous)));
        }
    }

    #[test]
    fn distinct_values_hash_differently(a in -1.0e6f64..1.0e6, b in -1.0e6f64..1.0e6) {
        prop_assume!(a != b);
        let mut graph = NodeGraph::default();
        let math = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let viewer = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
        graph.connect(math, &InputRef::new(viewer, "texture_in")).unwrap();
        let input = InputRef::new(math, "param_a_in");

        graph.set_standard_value(&input, ParamValue::Float(a)).unwrap();
        let first = graph.hash(viewer, Rational::ZERO).unwrap();
        prop_assert_eq!(first, graph.hash(viewer, Rational::ZERO).unwrap());

        graph.set_standard_value(&input, ParamValue::Float(b)).unwrap();
        prop_assert_ne!(first, graph.hash(viewer, Rational::ZERO).unwrap());
    }
}
