// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter definitions for node inputs and outputs.
//!
//! Parameters are owned by their node for its whole lifetime. Mutation of
//! values, keyframes and connections goes through the owning graph so every
//! change is followed by cache invalidation.

use crate::edge::{InputRef, OutputRef};
use crate::keyframe::KeyframeTrack;
use crate::value::{DataType, ParamValue};
use reel_time::Rational;
use serde::{Deserialize, Serialize};

/// Id of the primary output every node carries
pub const DEFAULT_OUTPUT: &str = "node_out";

/// Parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    /// Input parameter
    Input,
    /// Output parameter
    Output,
}

/// Id of the sub-input at `index` of array input `id`
pub fn array_input_id(id: &str, index: usize) -> String {
    format!("{id}_{index}")
}

/// A typed input holding a standard value or a single upstream connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    id: String,
    name: String,
    data_type: DataType,
    standard_value: ParamValue,
    keyframable: bool,
    keyframing: bool,
    keyframes: KeyframeTrack,
    connectable: bool,
    connection: Option<OutputRef>,
    array: bool,
    sub_inputs: Vec<NodeInput>,
}

impl NodeInput {
    /// Create a new input
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_type,
            standard_value: ParamValue::None,
            keyframable: false,
            keyframing: false,
            keyframes: KeyframeTrack::new(),
            connectable: true,
            connection: None,
            array: false,
            sub_inputs: Vec::new(),
        }
    }

    /// Set the standard value
    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.standard_value = value.into();
        self
    }

    /// Allow keyframes on this input
    pub fn keyframable(mut self) -> Self {
        self.keyframable = true;
        self
    }

    /// Prevent connections to this input
    pub fn not_connectable(mut self) -> Self {
        self.connectable = false;
        self
    }

    /// Turn this input into an array of sub-inputs
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Input id, unique within the node
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data type
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Value used when unconnected and not keyframing
    pub fn standard_value(&self) -> &ParamValue {
        &self.standard_value
    }

    pub(crate) fn set_standard_value(&mut self, value: ParamValue) -> ParamValue {
        std::mem::replace(&mut self.standard_value, value)
    }

    /// Whether keyframes may be added
    pub fn is_keyframable(&self) -> bool {
        self.keyframable
    }

    /// Whether keyframes drive the value instead of the standard value
    pub fn is_keyframing(&self) -> bool {
        self.keyframing
    }

    pub(crate) fn set_keyframing(&mut self, keyframing: bool) -> bool {
        std::mem::replace(&mut self.keyframing, keyframing)
    }

    /// Keyframes of this input
    pub fn keyframes(&self) -> &KeyframeTrack {
        &self.keyframes
    }

    pub(crate) fn keyframes_mut(&mut self) -> &mut KeyframeTrack {
        &mut self.keyframes
    }

    /// Value at a time: sampled keyframes when keyframing, else the standard value
    pub fn value_at(&self, time: Rational) -> ParamValue {
        if self.keyframing {
            if let Some(value) = self.keyframes.sample(time) {
                return value;
            }
        }
        self.standard_value.clone()
    }

    /// Whether an edge may target this input
    pub fn is_connectable(&self) -> bool {
        self.connectable && !self.array
    }

    /// Upstream output, if connected
    pub fn connection(&self) -> Option<&OutputRef> {
        self.connection.as_ref()
    }

    /// Whether an upstream output feeds this input
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn set_connection(&mut self, connection: Option<OutputRef>) -> Option<OutputRef> {
        std::mem::replace(&mut self.connection, connection)
    }

    /// Whether this input is an array of sub-inputs
    pub fn is_array(&self) -> bool {
        self.array
    }

    /// Sub-inputs of an array input
    pub fn sub_inputs(&self) -> &[NodeInput] {
        &self.sub_inputs
    }

    pub(crate) fn sub_inputs_mut(&mut self) -> &mut [NodeInput] {
        &mut self.sub_inputs
    }

    /// Number of sub-inputs
    pub fn array_size(&self) -> usize {
        self.sub_inputs.len()
    }

    /// Resize an array input, returning the sub-inputs that were dropped
    ///
    /// New sub-inputs inherit this input's type and standard value.
    pub(crate) fn resize_array(&mut self, size: usize) -> Vec<NodeInput> {
        if size < self.sub_inputs.len() {
            return self.sub_inputs.split_off(size);
        }
        for index in self.sub_inputs.len()..size {
            let mut sub = NodeInput::new(
                array_input_id(&self.id, index),
                format!("{} {}", self.name, index + 1),
                self.data_type,
            )
            .with_default(self.standard_value.clone());
            sub.keyframable = self.keyframable;
            sub.connectable = self.connectable;
            self.sub_inputs.push(sub);
        }
        Vec::new()
    }

    /// Copy without connection state
    pub(crate) fn detached(&self) -> NodeInput {
        let mut copy = self.clone();
        copy.connection = None;
        for sub in &mut copy.sub_inputs {
            sub.connection = None;
        }
        copy
    }
}

/// An output that may feed any number of inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    id: String,
    name: String,
    edges: Vec<InputRef>,
}

impl NodeOutput {
    /// Create a new output
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            edges: Vec::new(),
        }
    }

    /// Output id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Downstream inputs fed by this output
    pub fn edges(&self) -> &[InputRef] {
        &self.edges
    }

    /// Whether anything is connected downstream
    pub fn is_connected(&self) -> bool {
        !self.edges.is_empty()
    }

    pub(crate) fn add_edge(&mut self, input: InputRef) {
        self.edges.push(input);
    }

    pub(crate) fn remove_edge(&mut self, input: &InputRef) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e != input);
        self.edges.len() != before
    }

    pub(crate) fn clear_edges(&mut self) {
        self.edges.clear();
    }
}

impl Default for NodeOutput {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT, "Output")
    }
}

/// Borrowed view of any parameter of a node
#[derive(Debug, Clone, Copy)]
pub enum NodeParam<'a> {
    /// An input
    Input(&'a NodeInput),
    /// An output
    Output(&'a NodeOutput),
}

impl NodeParam<'_> {
    /// Parameter id
    pub fn id(&self) -> &str {
        match self {
            Self::Input(input) => input.id(),
            Self::Output(output) => output.id(),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Self::Input(input) => input.name(),
            Self::Output(output) => output.name(),
        }
    }

    /// Parameter direction
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Input(_) => ParamKind::Input,
            Self::Output(_) => ParamKind::Output,
        }
    }

    /// Whether any edge is attached
    pub fn is_connected(&self) -> bool {
        match self {
            Self::Input(input) => input.is_connected(),
            Self::Output(output) => output.is_connected(),
        }
    }
}
