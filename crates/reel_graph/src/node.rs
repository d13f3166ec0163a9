// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.
//!
//! A [`Node`] owns its parameters and a boxed [`NodeKind`] supplying the
//! behaviour of its variant. Every capability of [`NodeKind`] has a default
//! so a variant only overrides what it needs: most nodes are
//! time-transparent pass-throughs.

use crate::document::{DocumentError, Element};
use crate::edge::{InputRef, NodeEdge, OutputRef};
use crate::hash::NodeHasher;
use crate::job::{GenerateJob, SampleJob, ShaderCode};
use crate::media::{Frame, SampleBuffer};
use crate::param::{NodeInput, NodeOutput, NodeParam};
use crate::table::{NodeValueDatabase, NodeValueTable};
use crate::value::ParamValue;
use indexmap::IndexMap;
use reel_time::{Rational, TimeRange, TimeRangeList};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
///
/// Lifetime-scoped handle used by edges; distinct from the stable type id
/// that feeds the cache hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Media and footage sources
    Input,
    /// Sinks such as the viewer
    Output,
    /// Generators producing frames from parameters
    Generator,
    /// Math operations
    Math,
    /// Timeline blocks and tracks
    Timeline,
    /// Transitions between blocks
    Transition,
    /// Anything else
    General,
}

/// Structural errors on a node's parameter list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// A parameter with the same id already exists
    #[error("Duplicate parameter id: {0}")]
    DuplicateParam(String),
}

/// Behaviour of one node variant
///
/// Implementations must be cheap to clone: a kind is cloned when a node is
/// copied. Any per-batch state set up in [`NodeKind::begin_operation`] must
/// use interior mutability since operations run under shared access.
pub trait NodeKind: fmt::Debug + Send + Sync + Any {
    /// Stable type id, used for hashing and serialization
    fn id(&self) -> &'static str;

    /// Display name
    fn name(&self) -> &'static str;

    /// Category
    fn category(&self) -> NodeCategory {
        NodeCategory::General
    }

    /// Short description
    fn description(&self) -> &'static str {
        ""
    }

    /// Inputs a fresh node of this kind starts with, in order
    fn inputs(&self) -> Vec<NodeInput>;

    /// Compute this node's contribution from its resolved inputs
    ///
    /// The default passes every input table through unchanged.
    fn value(&self, _node: &Node, db: &mut NodeValueDatabase) -> NodeValueTable {
        db.merge()
    }

    /// Map a range requested of this node to the range requested of `input`
    fn input_time_adjustment(&self, _node: &Node, _input: &str, range: TimeRange) -> TimeRange {
        range
    }

    /// Map a range of `input` back into this node's time
    fn output_time_adjustment(&self, _node: &Node, _input: &str, range: TimeRange) -> TimeRange {
        range
    }

    /// Range of this node's output made stale by a change of `range` on
    /// `from_input`, or `None` to stop the signal here
    fn invalidation_range(&self, _node: &Node, _from_input: &str, range: TimeRange) -> Option<TimeRange> {
        Some(range)
    }

    /// Whether `input` contributes to the output over `range`
    fn should_process_input(&self, _node: &Node, _input: &str, _range: TimeRange) -> bool {
        true
    }

    /// Feed everything that determines this node's output at `time`
    fn hash(&self, node: &Node, hasher: &mut NodeHasher<'_>, time: Rational) {
        hasher.hash_node_inputs(node, time);
    }

    /// Shader source for a job this node produced
    fn shader_code(&self, _shader_id: &str) -> Option<ShaderCode> {
        None
    }

    /// Run a sample job this node produced, `None` if unsupported
    fn process_samples(&self, _node: &Node, _job: &SampleJob) -> Option<SampleBuffer> {
        None
    }

    /// Draw a generated frame for a job this node produced
    fn generate_frame(&self, _node: &Node, _frame: &mut Frame, _job: &GenerateJob) {}

    /// Called before a batch of evaluations reaching this node
    fn begin_operation(&self) {}

    /// Called after a batch of evaluations reaching this node
    fn end_operation(&self) {}

    /// Write kind-specific state beyond the parameters
    fn save_internal(&self, _element: &mut Element) {}

    /// Read kind-specific state written by [`NodeKind::save_internal`]
    fn load_internal(&mut self, _element: &Element) -> Result<(), DocumentError> {
        Ok(())
    }

    /// Clone into a box
    fn box_clone(&self) -> Box<dyn NodeKind>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn NodeKind> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// A node instance
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: Box<dyn NodeKind>,
    label: String,
    /// Position in an editor view
    pub position: [f32; 2],
    inputs: Vec<NodeInput>,
    output: NodeOutput,
    can_be_deleted: bool,
    invalidated: TimeRangeList,
}

impl Node {
    /// Create a new node of a kind
    pub fn new(kind: Box<dyn NodeKind>) -> Self {
        let inputs = kind.inputs();
        debug_assert!(
            inputs
                .iter()
                .enumerate()
                .all(|(i, a)| inputs[..i].iter().all(|b| b.id() != a.id())),
            "duplicate input id in {}",
            kind.id()
        );
        Self {
            id: NodeId::new(),
            kind,
            label: String::new(),
            position: [0.0, 0.0],
            inputs,
            output: NodeOutput::default(),
            can_be_deleted: true,
            invalidated: TimeRangeList::new(),
        }
    }

    /// Create a new node from a concrete kind
    pub fn from_kind<K: NodeKind>(kind: K) -> Self {
        Self::new(Box::new(kind))
    }

    /// Replace the node id, used when restoring saved graphs
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Instance id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Behaviour of this node
    pub fn kind(&self) -> &dyn NodeKind {
        self.kind.as_ref()
    }

    pub(crate) fn kind_mut(&mut self) -> &mut dyn NodeKind {
        self.kind.as_mut()
    }

    /// Downcast the kind
    pub fn kind_as<T: NodeKind>(&self) -> Option<&T> {
        self.kind.as_any().downcast_ref::<T>()
    }

    /// Stable type id
    pub fn type_id(&self) -> &'static str {
        self.kind.id()
    }

    /// Label if set, else the kind's name
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            self.kind.name()
        } else {
            &self.label
        }
    }

    /// User label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Set the user label
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Whether the user may delete this node
    pub fn can_be_deleted(&self) -> bool {
        self.can_be_deleted
    }

    /// Set whether the user may delete this node
    pub fn set_can_be_deleted(&mut self, can_be_deleted: bool) {
        self.can_be_deleted = can_be_deleted;
    }

    /// Append an input, rejecting duplicate ids
    pub fn add_input(&mut self, input: NodeInput) -> Result<(), NodeError> {
        if self.input(input.id()).is_some() || input.id() == self.output.id() {
            return Err(NodeError::DuplicateParam(input.id().to_string()));
        }
        self.inputs.push(input);
        Ok(())
    }

    /// Top-level inputs in order
    pub fn inputs(&self) -> &[NodeInput] {
        &self.inputs
    }

    /// Every connectable slot: plain inputs and each array's sub-inputs
    pub fn inputs_including_arrays(&self) -> impl Iterator<Item = &NodeInput> {
        self.inputs.iter().flat_map(|input| {
            if input.is_array() {
                input.sub_inputs().iter().collect::<Vec<_>>()
            } else {
                vec![input]
            }
        })
    }

    /// Input by id, including array sub-inputs
    pub fn input(&self, id: &str) -> Option<&NodeInput> {
        self.inputs.iter().find_map(|input| {
            if input.id() == id {
                Some(input)
            } else if input.is_array() {
                input.sub_inputs().iter().find(|sub| sub.id() == id)
            } else {
                None
            }
        })
    }

    pub(crate) fn input_mut(&mut self, id: &str) -> Option<&mut NodeInput> {
        self.inputs.iter_mut().find_map(|input| {
            if input.id() == id {
                Some(input)
            } else if input.is_array() {
                input.sub_inputs_mut().iter_mut().find(|sub| sub.id() == id)
            } else {
                None
            }
        })
    }

    /// The primary output
    pub fn output(&self) -> &NodeOutput {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut NodeOutput {
        &mut self.output
    }

    /// Every parameter: inputs first, the output last
    pub fn params(&self) -> impl Iterator<Item = NodeParam<'_>> {
        self.inputs
            .iter()
            .map(NodeParam::Input)
            .chain(std::iter::once(NodeParam::Output(&self.output)))
    }

    /// Standard value of an input
    pub fn standard_value(&self, input: &str) -> Option<&ParamValue> {
        self.input(input).map(NodeInput::standard_value)
    }

    /// Value of an input at a time, [`ParamValue::None`] for unknown ids
    pub fn value_at(&self, input: &str, time: Rational) -> ParamValue {
        self.input(input)
            .map(|i| i.value_at(time))
            .unwrap_or_default()
    }

    /// Edges feeding this node's inputs
    pub fn input_edges(&self) -> Vec<NodeEdge> {
        self.inputs_including_arrays()
            .filter_map(|input| {
                input.connection().map(|out| {
                    NodeEdge::new(out.clone(), InputRef::new(self.id, input.id()))
                })
            })
            .collect()
    }

    /// Edges leaving this node's output
    pub fn output_edges(&self) -> Vec<NodeEdge> {
        let from = OutputRef::new(self.id, self.output.id());
        self.output
            .edges()
            .iter()
            .map(|to| NodeEdge::new(from.clone(), to.clone()))
            .collect()
    }

    /// Every edge attached to this node
    pub fn edges(&self) -> Vec<NodeEdge> {
        let mut edges = self.input_edges();
        edges.extend(self.output_edges());
        edges
    }

    /// Ranges of this node's output marked stale and not yet validated
    pub fn invalidated(&self) -> &TimeRangeList {
        &self.invalidated
    }

    pub(crate) fn invalidated_mut(&mut self) -> &mut TimeRangeList {
        &mut self.invalidated
    }

    /// Copy with a fresh id, the same values and no edges
    pub fn copy(&self) -> Node {
        let mut output = self.output.clone();
        output.clear_edges();
        Node {
            id: NodeId::new(),
            kind: self.kind.clone(),
            label: self.label.clone(),
            position: self.position,
            inputs: self.inputs.iter().map(NodeInput::detached).collect(),
            output,
            can_be_deleted: self.can_be_deleted,
            invalidated: TimeRangeList::new(),
        }
    }
}

/// Registered node kind
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: &'static str,
    factory: fn() -> Box<dyn NodeKind>,
}

impl NodeType {
    /// Instantiate the kind
    pub fn create_kind(&self) -> Box<dyn NodeKind> {
        (self.factory)()
    }
}

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<&'static str, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node kind
    pub fn register<K: NodeKind + Default>(&mut self) {
        fn make<K: NodeKind + Default>() -> Box<dyn NodeKind> {
            Box::new(K::default())
        }

        let sample = K::default();
        let node_type = NodeType {
            id: sample.id(),
            name: sample.name(),
            category: sample.category(),
            description: sample.description(),
            factory: make::<K>,
        };
        self.types.insert(node_type.id, node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(|t| Node::new(t.create_kind()))
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}
