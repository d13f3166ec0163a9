// SPDX-License-Identifier: MIT OR Apache-2.0
//! Footage source node.

use crate::node::{Node, NodeCategory, NodeKind};
use crate::param::NodeInput;
use crate::table::{NodeValueDatabase, NodeValueTable};
use crate::value::{DataType, ParamValue};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Type id of [`MediaInputNode`]
pub const MEDIA_ID: &str = "reel.media";

/// Id of the footage input
pub const FOOTAGE_INPUT: &str = "footage_in";

/// Leaf node exposing one stream of a footage file
///
/// Outputs the footage reference itself; the traverser's backend turns it
/// into decoded media at the requested time.
#[derive(Debug, Clone, Default)]
pub struct MediaInputNode {
    operations: Arc<AtomicUsize>,
}

impl MediaInputNode {
    /// Number of open evaluation batches reaching this node
    pub fn open_operations(&self) -> usize {
        self.operations.load(Ordering::Acquire)
    }
}

impl NodeKind for MediaInputNode {
    fn id(&self) -> &'static str {
        MEDIA_ID
    }

    fn name(&self) -> &'static str {
        "Media"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Input
    }

    fn description(&self) -> &'static str {
        "Import a footage stream into the graph."
    }

    fn inputs(&self) -> Vec<NodeInput> {
        vec![NodeInput::new(FOOTAGE_INPUT, "Footage", DataType::Footage).not_connectable()]
    }

    fn value(&self, _node: &Node, db: &mut NodeValueDatabase) -> NodeValueTable {
        let mut table = NodeValueTable::new();
        if let Some(footage) = db[FOOTAGE_INPUT].get_with_meta(DataType::Footage, "") {
            if let ParamValue::Footage(_) = footage.data() {
                table.push(footage.clone());
            }
        }
        table
    }

    fn begin_operation(&self) {
        let open = self.operations.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!("Media operation opened ({open} active)");
    }

    fn end_operation(&self) {
        // Unbalanced ends leave the counter at zero
        let _ = self
            .operations
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    fn box_clone(&self) -> Box<dyn NodeKind> {
        Box::new(self.clone())
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
    use crate::media::{Footage, Stream, StreamKind, StreamRef};
    use crate::nodes::ViewerNode;
    use crate::traverser::{DefaultBackend, NodeTraverser};
    use reel_time::{Rational, TimeRange};

    #[test]
    fn test_operation_bracket() {
        let mut graph = NodeGraph::default();
        let media = graph.add_node(Node::from_kind(MediaInputNode::default())).unwrap();
        let viewer = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
        graph.connect(media, &InputRef::new(viewer, "texture_in")).unwrap();

        let kind = || graph.node(media).unwrap().kind_as::<MediaInputNode>().unwrap().open_operations();
        {
            let guard = graph.begin_operation(media);
            assert_eq!(guard.nodes().len(), 2);
            assert_eq!(kind(), 1);
        }
        assert_eq!(kind(), 0);
    }

    #[test]
    fn test_undecodable_footage_degrades_to_empty() {
        let mut graph = NodeGraph::default();
        let media = graph.add_node(Node::from_kind(MediaInputNode::default())).unwrap();
        let footage = Arc::new(Footage::new(
            "missing.mov",
            0,
            vec![Stream::new(0, StreamKind::Video, Rational::new(1, 24).unwrap())],
        ));
        graph
            .set_standard_value(
                &InputRef::new(media, FOOTAGE_INPUT),
                ParamValue::Footage(StreamRef::new(footage, 0)),
            )
            .unwrap();

        let mut traverser = NodeTraverser::new(&graph, &DefaultBackend);
        let table = traverser
            .generate_table(media, TimeRange::instant(Rational::ZERO))
            .complete()
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(traverser.stats().resolve_failures, 1);
    }
}
