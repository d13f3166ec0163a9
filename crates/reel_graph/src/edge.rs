// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.
//!
//! Edges are not owned by anything: each connection is recorded on both
//! endpoints (the input's connection and the output's edge list) and is
//! resolved through node id lookup in the owning graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an output parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Node owning the output
    pub node: NodeId,
    /// Output id
    pub output: String,
}

impl OutputRef {
    /// Create a new output reference
    pub fn new(node: NodeId, output: impl Into<String>) -> Self {
        Self {
            node,
            output: output.into(),
        }
    }
}

/// Reference to an input parameter, including array sub-inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    /// Node owning the input
    pub node: NodeId,
    /// Input id
    pub input: String,
}

impl InputRef {
    /// Create a new input reference
    pub fn new(node: NodeId, input: impl Into<String>) -> Self {
        Self {
            node,
            input: input.into(),
        }
    }
}

/// A connection from one output to one input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEdge {
    /// Upstream end
    pub output: OutputRef,
    /// Downstream end
    pub input: InputRef,
}

impl NodeEdge {
    /// Create a new edge
    pub fn new(output: OutputRef, input: InputRef) -> Self {
        Self { output, input }
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.output.node == node_id || self.input.node == node_id
    }
}

impl fmt::Display for NodeEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.output.node, self.output.output, self.input.node, self.input.input
        )
    }
}
