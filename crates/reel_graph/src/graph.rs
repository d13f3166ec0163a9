// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning nodes and the edges between them.
//!
//! All mutation goes through [`NodeGraph`] so that every change is fully
//! applied, then invalidated downstream, then announced to observers before
//! the mutating call returns. For concurrent use wrap the graph in a
//! [`SharedGraph`]: traversals take the read lock, edits the write lock.

use crate::edge::{InputRef, NodeEdge, OutputRef};
use crate::hash::{Digest, NodeHasher};
use crate::keyframe::NodeKeyframe;
use crate::node::{Node, NodeId};
use crate::param::NodeInput;
use crate::value::{ParamValue, ValueError};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use reel_time::{Rational, TimeRange};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A graph shared between an editing thread and render workers
pub type SharedGraph = Arc<RwLock<NodeGraph>>;

/// Structural change notification, sent after the change is applied
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node joined the graph
    NodeAdded(NodeId),
    /// A node left the graph
    NodeRemoved(NodeId),
    /// An edge was created
    EdgeAdded(NodeEdge),
    /// An edge was removed
    EdgeRemoved(NodeEdge),
    /// An input's standard value, keyframes or array size changed
    InputChanged(InputRef),
    /// A range of a node's output became stale
    CacheInvalidated {
        /// Affected node
        node: NodeId,
        /// Stale range in the node's time
        range: TimeRange,
    },
}

type Observer = Box<dyn Fn(&GraphEvent) + Send + Sync>;

/// Direction for [`NodeGraph::transform_time_to`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformDirection {
    /// From a node towards one of its upstream dependencies
    Input,
    /// From a node towards one of its downstream consumers
    Output,
}

/// Errors from graph mutation and queries
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node with this id is already owned by the graph
    #[error("Node already in graph: {0}")]
    DuplicateNode(NodeId),

    /// Input not found on a node
    #[error("Input not found: {}:{}", .0.node, .0.input)]
    InputNotFound(InputRef),

    /// Input cannot take an edge
    #[error("Input is not connectable: {}:{}", .0.node, .0.input)]
    NotConnectable(InputRef),

    /// Input is already connected
    #[error("Input already connected: {}:{}", .0.node, .0.input)]
    AlreadyConnected(InputRef),

    /// Input has no connection to remove
    #[error("Input not connected: {}:{}", .0.node, .0.input)]
    NotConnected(InputRef),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// The edge would close a cycle
    #[error("Connection would create a cycle")]
    Cycle,

    /// Input is not an array
    #[error("Input is not an array: {}:{}", .0.node, .0.input)]
    NotAnArray(InputRef),

    /// Input does not accept keyframes
    #[error("Input is not keyframable: {}:{}", .0.node, .0.input)]
    NotKeyframable(InputRef),

    /// No keyframe at the given time
    #[error("No keyframe at {time} on {}:{}", .input.node, .input.input)]
    KeyframeNotFound {
        /// Input
        input: InputRef,
        /// Requested time
        time: Rational,
    },

    /// Value does not fit the input's type
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// A node released from a graph together with the edges it had
#[derive(Debug)]
pub struct TakenNode {
    /// The node, with no edges attached
    pub node: Node,
    /// Edges that were removed to release it
    pub edges: Vec<NodeEdge>,
}

/// A node graph
pub struct NodeGraph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    observers: Vec<Observer>,
}

impl NodeGraph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            observers: Vec::new(),
        }
    }

    /// Wrap into a [`SharedGraph`]
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    /// Register an observer for structural changes
    pub fn subscribe(&mut self, observer: impl Fn(&GraphEvent) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&self, event: GraphEvent) {
        tracing::trace!(?event, "graph event");
        for observer in &self.observers {
            observer(&event);
        }
    }

    /// Take ownership of a node
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId, GraphError> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }

        // Edges are only valid inside the graph that recorded them
        let stale: Vec<String> = node
            .inputs_including_arrays()
            .filter(|i| i.is_connected())
            .map(|i| i.id().to_string())
            .collect();
        for input in stale {
            if let Some(input) = node.input_mut(&input) {
                input.set_connection(None);
            }
        }
        node.output_mut().clear_edges();

        tracing::debug!("Adding node {} ({})", id, node.type_id());
        self.nodes.insert(id, node);
        self.emit(GraphEvent::NodeAdded(id));
        Ok(id)
    }

    /// Release a node to the caller without destroying it
    ///
    /// Every edge attached to the node is disconnected first.
    pub fn take_node(&mut self, node_id: NodeId) -> Result<TakenNode, GraphError> {
        let node = self.node(node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let edges = node.edges();

        for edge in &edges {
            self.disconnect(&edge.input)?;
        }

        let node = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        tracing::debug!("Removed node {} ({})", node_id, node.type_id());
        self.emit(GraphEvent::NodeRemoved(node_id));
        Ok(TakenNode { node, edges })
    }

    /// Destroy a node, disconnecting it first
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        self.take_node(node_id).map(drop)
    }

    /// Destroy every owned node
    pub fn clear(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.remove_node(id) {
                tracing::warn!("Failed to remove node {id} while clearing: {e}");
            }
        }
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    ///
    /// Only presentation state (label, position) is mutable through this;
    /// values and edges change through the graph.
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether the graph owns a node
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every edge in the graph
    pub fn edges(&self) -> Vec<NodeEdge> {
        self.nodes.values().flat_map(Node::input_edges).collect()
    }

    fn input_of(&self, input: &InputRef) -> Result<&NodeInput, GraphError> {
        self.node(input.node)
            .ok_or(GraphError::NodeNotFound(input.node))?
            .input(&input.input)
            .ok_or_else(|| GraphError::InputNotFound(input.clone()))
    }

    fn input_of_mut(&mut self, input: &InputRef) -> Result<&mut NodeInput, GraphError> {
        self.nodes
            .get_mut(&input.node)
            .ok_or(GraphError::NodeNotFound(input.node))?
            .input_mut(&input.input)
            .ok_or_else(|| GraphError::InputNotFound(input.clone()))
    }

    /// Connect the primary output of `output_node` to an input
    pub fn connect(&mut self, output_node: NodeId, input: &InputRef) -> Result<NodeEdge, GraphError> {
        let source = self
            .node(output_node)
            .ok_or(GraphError::NodeNotFound(output_node))?;
        let output = OutputRef::new(output_node, source.output().id());
        let target = self.input_of(input)?;

        if !target.is_connectable() {
            return Err(GraphError::NotConnectable(input.clone()));
        }
        if target.is_connected() {
            return Err(GraphError::AlreadyConnected(input.clone()));
        }
        if output_node == input.node {
            return Err(GraphError::SelfLoop);
        }
        if self.outputs_to(input.node, output_node) {
            return Err(GraphError::Cycle);
        }

        self.input_of_mut(input)?.set_connection(Some(output.clone()));
        if let Some(source) = self.nodes.get_mut(&output_node) {
            source.output_mut().add_edge(input.clone());
        }

        let edge = NodeEdge::new(output, input.clone());
        tracing::debug!("Connected {edge}");
        self.invalidate_cache(input.node, &input.input, TimeRange::ALL);
        self.emit(GraphEvent::EdgeAdded(edge.clone()));
        Ok(edge)
    }

    /// Remove the edge feeding an input
    pub fn disconnect(&mut self, input: &InputRef) -> Result<NodeEdge, GraphError> {
        let output = self
            .input_of_mut(input)?
            .set_connection(None)
            .ok_or_else(|| GraphError::NotConnected(input.clone()))?;
        if let Some(source) = self.nodes.get_mut(&output.node) {
            source.output_mut().remove_edge(input);
        }

        let edge = NodeEdge::new(output, input.clone());
        tracing::debug!("Disconnected {edge}");
        self.invalidate_cache(input.node, &input.input, TimeRange::ALL);
        self.emit(GraphEvent::EdgeRemoved(edge.clone()));
        Ok(edge)
    }

    /// Replace an input's standard value, returning the previous one
    pub fn set_standard_value(&mut self, input: &InputRef, value: ParamValue) -> Result<ParamValue, GraphError> {
        let target = self.input_of_mut(input)?;
        if !value.fits(target.data_type()) {
            return Err(ValueError::TypeMismatch {
                expected: target.data_type(),
                found: value.data_type(),
            }
            .into());
        }
        let old = target.set_standard_value(value);
        let keyframing = target.is_keyframing() && !target.keyframes().is_empty();

        if !keyframing {
            self.invalidate_cache(input.node, &input.input, TimeRange::ALL);
        }
        self.emit(GraphEvent::InputChanged(input.clone()));
        Ok(old)
    }

    /// Switch an input between keyframes and its standard value
    pub fn set_keyframing(&mut self, input: &InputRef, keyframing: bool) -> Result<bool, GraphError> {
        let target = self.input_of_mut(input)?;
        if keyframing && !target.is_keyframable() {
            return Err(GraphError::NotKeyframable(input.clone()));
        }
        let old = target.set_keyframing(keyframing);
        if old != keyframing {
            self.invalidate_cache(input.node, &input.input, TimeRange::ALL);
            self.emit(GraphEvent::InputChanged(input.clone()));
        }
        Ok(old)
    }

    /// Insert a keyframe, returning the one it replaced at the same time
    ///
    /// Only the range between the keyframe's neighbours is invalidated.
    pub fn insert_keyframe(&mut self, input: &InputRef, key: NodeKeyframe) -> Result<Option<NodeKeyframe>, GraphError> {
        let target = self.input_of_mut(input)?;
        if !target.is_keyframable() {
            return Err(GraphError::NotKeyframable(input.clone()));
        }
        if !key.value.fits(target.data_type()) {
            return Err(ValueError::TypeMismatch {
                expected: target.data_type(),
                found: key.value.data_type(),
            }
            .into());
        }

        let time = key.time;
        let replaced = target.keyframes_mut().insert(key);
        let range = target.keyframes().affected_range(time);
        if target.is_keyframing() {
            self.invalidate_cache(input.node, &input.input, range);
        }
        self.emit(GraphEvent::InputChanged(input.clone()));
        Ok(replaced)
    }

    /// Remove the keyframe at an exact time
    pub fn remove_keyframe(&mut self, input: &InputRef, time: Rational) -> Result<NodeKeyframe, GraphError> {
        let target = self.input_of_mut(input)?;
        let range = target.keyframes().affected_range(time);
        let removed = target
            .keyframes_mut()
            .remove_at(time)
            .ok_or_else(|| GraphError::KeyframeNotFound {
                input: input.clone(),
                time,
            })?;
        if target.is_keyframing() {
            self.invalidate_cache(input.node, &input.input, range);
        }
        self.emit(GraphEvent::InputChanged(input.clone()));
        Ok(removed)
    }

    /// Resize an array input, disconnecting sub-inputs that go away
    ///
    /// Returns the previous size.
    pub fn resize_input_array(&mut self, input: &InputRef, size: usize) -> Result<usize, GraphError> {
        let target = self.input_of(input)?;
        if !target.is_array() {
            return Err(GraphError::NotAnArray(input.clone()));
        }
        let old = target.array_size();
        let doomed: Vec<InputRef> = target.sub_inputs()[size.min(old)..]
            .iter()
            .filter(|sub| sub.is_connected())
            .map(|sub| InputRef::new(input.node, sub.id()))
            .collect();

        for sub in &doomed {
            self.disconnect(sub)?;
        }
        self.input_of_mut(input)?.resize_array(size);

        if old != size {
            self.invalidate_cache(input.node, &input.input, TimeRange::ALL);
            self.emit(GraphEvent::InputChanged(input.clone()));
        }
        Ok(old)
    }

    /// Mark `range` stale on `node` and everything downstream of it
    ///
    /// Runs depth-first and synchronously: every dependent node's dirty
    /// list is updated before this returns. Each node maps the range
    /// through [`NodeKind::invalidation_range`](crate::node::NodeKind::invalidation_range)
    /// before relaying it.
    pub fn invalidate_cache(&mut self, node: NodeId, from_input: &str, range: TimeRange) {
        let mut stack = vec![(node, from_input.to_string(), range)];
        let mut visited: HashSet<(NodeId, TimeRange)> = HashSet::new();
        let mut touched = Vec::new();

        while let Some((id, input, range)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let Some(mapped) = node.kind().invalidation_range(node, &input, range) else {
                continue;
            };
            if !visited.insert((id, mapped)) {
                continue;
            }

            node.invalidated_mut().insert(mapped);
            touched.push((id, mapped));
            for edge in node.output().edges().iter().rev() {
                stack.push((edge.node, edge.input.clone(), mapped));
            }
        }

        for (node, range) in touched {
            self.emit(GraphEvent::CacheInvalidated { node, range });
        }
    }

    /// Clear a node's dirty list over `range` after re-rendering it
    pub fn validate_cache(&mut self, node: NodeId, range: TimeRange) -> Result<(), GraphError> {
        self.nodes
            .get_mut(&node)
            .ok_or(GraphError::NodeNotFound(node))?
            .invalidated_mut()
            .remove(range);
        Ok(())
    }

    /// Nodes feeding a node's inputs directly, in input order
    pub fn immediate_dependencies(&self, node: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(node) else {
            return Vec::new();
        };
        let deps: IndexSet<NodeId> = node
            .inputs_including_arrays()
            .filter_map(|i| i.connection().map(|c| c.node))
            .collect();
        deps.into_iter().collect()
    }

    /// Every node upstream of a node
    pub fn dependencies(&self, node: NodeId) -> Vec<NodeId> {
        let mut found = IndexSet::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            for dep in self.immediate_dependencies(id) {
                if found.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        found.into_iter().collect()
    }

    /// Dependencies reachable only through `node`, safe to delete with it
    pub fn exclusive_dependencies(&self, node: NodeId) -> Vec<NodeId> {
        let mut deps: IndexSet<NodeId> = self.dependencies(node).into_iter().collect();

        loop {
            let shared: Vec<NodeId> = deps
                .iter()
                .copied()
                .filter(|dep| {
                    self.node(*dep).is_some_and(|n| {
                        n.output()
                            .edges()
                            .iter()
                            .any(|e| e.node != node && !deps.contains(&e.node))
                    })
                })
                .collect();
            if shared.is_empty() {
                break;
            }
            for dep in shared {
                deps.shift_remove(&dep);
            }
        }
        deps.into_iter().collect()
    }

    /// Whether `from` feeds `to`, directly or through other nodes
    pub fn outputs_to(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            for edge in node.output().edges() {
                if edge.node == to {
                    return true;
                }
                if visited.insert(edge.node) {
                    stack.push(edge.node);
                }
            }
        }
        false
    }

    /// Whether `node` takes input from `upstream`, directly or indirectly
    pub fn inputs_from(&self, node: NodeId, upstream: NodeId) -> bool {
        self.outputs_to(upstream, node)
    }

    /// Number of distinct paths from `from` down to `to`
    pub fn routes_to(&self, from: NodeId, to: NodeId) -> usize {
        let mut memo = std::collections::HashMap::new();
        self.count_routes(from, to, &mut memo)
    }

    fn count_routes(&self, from: NodeId, to: NodeId, memo: &mut std::collections::HashMap<NodeId, usize>) -> usize {
        if let Some(count) = memo.get(&from) {
            return *count;
        }
        let Some(node) = self.node(from) else {
            return 0;
        };
        let count = node
            .output()
            .edges()
            .iter()
            .map(|e| if e.node == to { 1 } else { self.count_routes(e.node, to, memo) })
            .sum();
        memo.insert(from, count);
        count
    }

    /// Map a range from one node's time into another's along every path
    ///
    /// Returns one range per distinct result; empty when `to` is not
    /// reachable in the given direction.
    pub fn transform_time_to(&self, from: NodeId, to: NodeId, range: TimeRange, direction: TransformDirection) -> Vec<TimeRange> {
        let mut results = IndexSet::new();
        self.transform_step(from, to, range, direction, &mut results);
        results.into_iter().collect()
    }

    fn transform_step(&self, at: NodeId, to: NodeId, range: TimeRange, direction: TransformDirection, out: &mut IndexSet<TimeRange>) {
        let Some(node) = self.node(at) else {
            return;
        };
        match direction {
            TransformDirection::Input => {
                for input in node.inputs_including_arrays() {
                    let Some(upstream) = input.connection() else {
                        continue;
                    };
                    let adjusted = node.kind().input_time_adjustment(node, input.id(), range);
                    if upstream.node == to {
                        out.insert(adjusted);
                    } else {
                        self.transform_step(upstream.node, to, adjusted, direction, out);
                    }
                }
            }
            TransformDirection::Output => {
                for edge in node.output().edges() {
                    let Some(consumer) = self.node(edge.node) else {
                        continue;
                    };
                    let adjusted = consumer.kind().output_time_adjustment(consumer, &edge.input, range);
                    if edge.node == to {
                        out.insert(adjusted);
                    } else {
                        self.transform_step(edge.node, to, adjusted, direction, out);
                    }
                }
            }
        }
    }

    /// Open a batch of evaluations on `node` and everything downstream
    ///
    /// Each affected node sees one `begin_operation` now and one
    /// `end_operation` when the guard drops.
    pub fn begin_operation(&self, node: NodeId) -> OperationGuard<'_> {
        let mut nodes = IndexSet::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(n) = self.node(id) else {
                continue;
            };
            if nodes.insert(id) {
                stack.extend(n.output().edges().iter().map(|e| e.node));
            }
        }

        let nodes: Vec<NodeId> = nodes.into_iter().collect();
        for id in &nodes {
            if let Some(n) = self.node(*id) {
                n.kind().begin_operation();
            }
        }
        OperationGuard { graph: self, nodes }
    }

    /// Cache key for a node's output at a time
    pub fn hash(&self, node: NodeId, time: Rational) -> Result<Digest, GraphError> {
        let mut hasher = NodeHasher::new(self);
        hasher.hash_node(node, time)?;
        Ok(hasher.finish())
    }
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Closes a batch opened by [`NodeGraph::begin_operation`] on drop
#[must_use = "the operation ends when the guard is dropped"]
pub struct OperationGuard<'g> {
    graph: &'g NodeGraph,
    nodes: Vec<NodeId>,
}

impl OperationGuard<'_> {
    /// Nodes taking part in the operation
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        for id in self.nodes.iter().rev() {
            if let Some(node) = self.graph.node(*id) {
                node.kind().end_operation();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{MathNode, SolidNode, ViewerNode};

    fn chain() -> (NodeGraph, NodeId, NodeId, NodeId) {
        let mut graph = NodeGraph::default();
        let a = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let b = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let c = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
        graph.connect(a, &InputRef::new(b, "param_a_in")).unwrap();
        graph.connect(b, &InputRef::new(c, "texture_in")).unwrap();
        (graph, a, b, c)
    }

    #[test]
    fn test_connect_validation() {
        let (mut graph, a, b, c) = chain();

        assert_eq!(
            graph.connect(c, &InputRef::new(a, "param_a_in")),
            Err(GraphError::Cycle)
        );
        assert_eq!(
            graph.connect(a, &InputRef::new(a, "param_b_in")),
            Err(GraphError::SelfLoop)
        );
        assert!(matches!(
            graph.connect(a, &InputRef::new(b, "param_a_in")),
            Err(GraphError::AlreadyConnected(_))
        ));
        assert!(matches!(
            graph.connect(a, &InputRef::new(b, "missing")),
            Err(GraphError::InputNotFound(_))
        ));
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_take_node_disconnects_everything() {
        let (mut graph, a, b, c) = chain();
        let taken = graph.take_node(b).unwrap();

        assert_eq!(taken.edges.len(), 2);
        assert!(taken.node.edges().is_empty());
        assert!(graph.edges().is_empty());
        assert!(!graph.node(a).unwrap().output().is_connected());
        assert!(!graph.node(c).unwrap().input("texture_in").unwrap().is_connected());
    }

    #[test]
    fn test_set_value_type_checked() {
        let mut graph = NodeGraph::default();
        let solid = graph.add_node(Node::from_kind(SolidNode)).unwrap();
        let input = InputRef::new(solid, "color_in");

        assert!(matches!(
            graph.set_standard_value(&input, ParamValue::Text("red".into())),
            Err(GraphError::Value(_))
        ));
        let old = graph
            .set_standard_value(&input, crate::value::Color::WHITE.into())
            .unwrap();
        assert_eq!(old, ParamValue::Color(crate::nodes::solid::DEFAULT_COLOR));
    }

    #[test]
    fn test_events_follow_mutation() {
        let mut graph = NodeGraph::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        graph.subscribe(move |e| {
            if !matches!(e, GraphEvent::CacheInvalidated { .. }) {
                sink.lock().push(e.clone());
            }
        });

        let a = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let b = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
        let edge = graph.connect(a, &InputRef::new(b, "texture_in")).unwrap();
        graph.remove_node(a).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                GraphEvent::NodeAdded(a),
                GraphEvent::NodeAdded(b),
                GraphEvent::EdgeAdded(edge.clone()),
                GraphEvent::EdgeRemoved(edge),
                GraphEvent::NodeRemoved(a),
            ]
        );
    }

    #[test]
    fn test_exclusive_dependencies() {
        // a feeds b and d; b feeds c. Only b is exclusive to c
        let (mut graph, a, b, c) = chain();
        let d = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
        graph.connect(a, &InputRef::new(d, "texture_in")).unwrap();

        assert_eq!(graph.dependencies(c), vec![b, a]);
        assert_eq!(graph.exclusive_dependencies(c), vec![b]);
        assert_eq!(graph.exclusive_dependencies(b), Vec::<NodeId>::new());

        graph.remove_node(d).unwrap();
        assert_eq!(graph.exclusive_dependencies(c), vec![b, a]);
    }

    #[test]
    fn test_reachability() {
        let (graph, a, b, c) = chain();
        assert!(graph.outputs_to(a, c));
        assert!(!graph.outputs_to(c, a));
        assert!(graph.inputs_from(c, a));
        assert_eq!(graph.routes_to(a, c), 1);
        assert_eq!(graph.immediate_dependencies(c), vec![b]);
    }

    #[test]
    fn test_validate_clears_dirty_range() {
        let (mut graph, a, _, c) = chain();
        graph.validate_cache(c, TimeRange::ALL).unwrap();
        assert!(graph.node(c).unwrap().invalidated().is_empty());

        let range = TimeRange::new(Rational::ZERO, Rational::ONE);
        graph.invalidate_cache(a, "param_a_in", range);
        assert_eq!(graph.node(c).unwrap().invalidated().as_slice(), &[range]);
        assert!(graph.validate_cache(NodeId::new(), range).is_err());
    }
}
