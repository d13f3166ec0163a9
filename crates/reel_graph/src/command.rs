// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reversible graph mutations.
//!
//! Every structural edit is expressible as a command that stores whatever
//! it needs to put the graph back exactly as it was.

use crate::edge::InputRef;
use crate::graph::{GraphError, NodeGraph, TakenNode};
use crate::keyframe::NodeKeyframe;
use crate::node::{Node, NodeId};
use crate::value::ParamValue;
use std::fmt;

/// A graph mutation with an exact inverse
pub trait GraphCommand: fmt::Debug + Send + Sync {
    /// Get a description of this command
    fn description(&self) -> String;

    /// Apply (or re-apply) the command
    fn redo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError>;

    /// Revert the command
    fn undo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError>;
}

/// Error type for command execution
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The graph rejected the mutation
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Undo or redo called out of order
    #[error("Invalid command state: {0}")]
    InvalidState(&'static str),
}

/// Add a node to the graph
#[derive(Debug)]
pub struct AddNodeCommand {
    id: NodeId,
    node: Option<Node>,
}

impl AddNodeCommand {
    /// Create a new add command owning `node` until applied
    pub fn new(node: Node) -> Self {
        Self {
            id: node.id(),
            node: Some(node),
        }
    }

    /// Id of the node being added
    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

impl GraphCommand for AddNodeCommand {
    fn description(&self) -> String {
        String::from("Add node")
    }

    fn redo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        let node = self.node.take().ok_or(CommandError::InvalidState("node already added"))?;
        graph.add_node(node)?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        self.node = Some(graph.take_node(self.id)?.node);
        Ok(())
    }
}

/// Remove a node, restoring it and its edges on undo
#[derive(Debug)]
pub struct RemoveNodeCommand {
    id: NodeId,
    taken: Option<TakenNode>,
}

impl RemoveNodeCommand {
    /// Create a new remove command
    pub fn new(id: NodeId) -> Self {
        Self { id, taken: None }
    }
}

impl GraphCommand for RemoveNodeCommand {
    fn description(&self) -> String {
        String::from("Remove node")
    }

    fn redo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        self.taken = Some(graph.take_node(self.id)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        let TakenNode { node, edges } = self
            .taken
            .take()
            .ok_or(CommandError::InvalidState("node not removed"))?;
        graph.add_node(node)?;
        for edge in &edges {
            graph.connect(edge.output.node, &edge.input)?;
        }
        Ok(())
    }
}

/// Connect a node's output to an input
#[derive(Debug)]
pub struct ConnectCommand {
    output: NodeId,
    input: InputRef,
}

impl ConnectCommand {
    /// Create a new connect command
    pub fn new(output: NodeId, input: InputRef) -> Self {
        Self { output, input }
    }
}

impl GraphCommand for ConnectCommand {
    fn description(&self) -> String {
        format!("Connect {}", self.input.input)
    }

    fn redo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        graph.connect(self.output, &self.input)?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        graph.disconnect(&self.input)?;
        Ok(())
    }
}

/// Disconnect whatever feeds an input
#[derive(Debug)]
pub struct DisconnectCommand {
    input: InputRef,
    output: Option<NodeId>,
}

impl DisconnectCommand {
    /// Create a new disconnect command
    pub fn new(input: InputRef) -> Self {
        Self { input, output: None }
    }
}

impl GraphCommand for DisconnectCommand {
    fn description(&self) -> String {
        format!("Disconnect {}", self.input.input)
    }

    fn redo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        let edge = graph.disconnect(&self.input)?;
        self.output = Some(edge.output.node);
        Ok(())
    }

    fn undo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        let output = self
            .output
            .take()
            .ok_or(CommandError::InvalidState("input not disconnected"))?;
        graph.connect(output, &self.input)?;
        Ok(())
    }
}

/// Change an input's standard value
#[derive(Debug)]
pub struct SetValueCommand {
    input: InputRef,
    value: ParamValue,
    previous: Option<ParamValue>,
}

impl SetValueCommand {
    /// Create a new set-value command
    pub fn new(input: InputRef, value: ParamValue) -> Self {
        Self {
            input,
            value,
            previous: None,
        }
    }
}

impl GraphCommand for SetValueCommand {
    fn description(&self) -> String {
        format!("Set {}", self.input.input)
    }

    fn redo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        self.previous = Some(graph.set_standard_value(&self.input, self.value.clone())?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        let previous = self
            .previous
            .take()
            .ok_or(CommandError::InvalidState("value not set"))?;
        graph.set_standard_value(&self.input, previous)?;
        Ok(())
    }
}

/// Insert or replace a keyframe
#[derive(Debug)]
pub struct SetKeyframeCommand {
    input: InputRef,
    key: NodeKeyframe,
    replaced: Option<Option<NodeKeyframe>>,
}

impl SetKeyframeCommand {
    /// Create a new keyframe command
    pub fn new(input: InputRef, key: NodeKeyframe) -> Self {
        Self {
            input,
            key,
            replaced: None,
        }
    }
}

impl GraphCommand for SetKeyframeCommand {
    fn description(&self) -> String {
        format!("Keyframe {} at {}", self.input.input, self.key.time)
    }

    fn redo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        self.replaced = Some(graph.insert_keyframe(&self.input, self.key.clone())?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut NodeGraph) -> Result<(), CommandError> {
        let replaced = self
            .replaced
            .take()
            .ok_or(CommandError::InvalidState("keyframe not set"))?;
        graph.remove_keyframe(&self.input, self.key.time)?;
        if let Some(previous) = replaced {
            graph.insert_keyframe(&self.input, previous)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{MathNode, ViewerNode};
    use reel_time::Rational;
    use std::collections::HashSet;

    #[test]
    fn test_remove_node_undo_restores_edges() {
        let mut graph = NodeGraph::default();
        let a = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let b = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let c = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
        graph.connect(a, &InputRef::new(b, "param_a_in")).unwrap();
        graph.connect(b, &InputRef::new(c, "texture_in")).unwrap();
        let before: HashSet<_> = graph.edges().into_iter().collect();

        let mut cmd = RemoveNodeCommand::new(b);
        cmd.redo(&mut graph).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.edges().is_empty());

        cmd.undo(&mut graph).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edges().into_iter().collect::<HashSet<_>>(), before);
    }

    #[test]
    fn test_add_node_round_trip() {
        let mut graph = NodeGraph::default();
        let mut cmd = AddNodeCommand::new(Node::from_kind(ViewerNode));
        let id = cmd.node_id();

        cmd.redo(&mut graph).unwrap();
        assert!(graph.contains(id));
        cmd.undo(&mut graph).unwrap();
        assert!(!graph.contains(id));
        cmd.redo(&mut graph).unwrap();
        assert!(graph.contains(id));
        assert!(matches!(cmd.redo(&mut graph), Err(CommandError::InvalidState(_))));
    }

    #[test]
    fn test_set_value_and_keyframe_undo() {
        let mut graph = NodeGraph::default();
        let a = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let input = InputRef::new(a, "param_a_in");

        let mut set = SetValueCommand::new(input.clone(), ParamValue::Float(4.0));
        set.redo(&mut graph).unwrap();
        assert_eq!(graph.node(a).unwrap().standard_value("param_a_in"), Some(&ParamValue::Float(4.0)));
        set.undo(&mut graph).unwrap();
        assert_eq!(graph.node(a).unwrap().standard_value("param_a_in"), Some(&ParamValue::Float(0.0)));

        let t = Rational::from_integer(2);
        graph
            .insert_keyframe(&input, NodeKeyframe::new(t, ParamValue::Float(1.0)))
            .unwrap();
        let mut key = SetKeyframeCommand::new(input.clone(), NodeKeyframe::new(t, ParamValue::Float(9.0)));
        key.redo(&mut graph).unwrap();
        key.undo(&mut graph).unwrap();
        let keys = graph.node(a).unwrap().input("param_a_in").unwrap().keyframes().clone();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.at(t).map(|k| k.value.clone()), Some(ParamValue::Float(1.0)));
    }

    #[test]
    fn test_disconnect_undo() {
        let mut graph = NodeGraph::default();
        let a = graph.add_node(Node::from_kind(MathNode::default())).unwrap();
        let v = graph.add_node(Node::from_kind(ViewerNode)).unwrap();
        let input = InputRef::new(v, "texture_in");
        let mut connect = ConnectCommand::new(a, input.clone());
        connect.redo(&mut graph).unwrap();

        let mut cmd = DisconnectCommand::new(input);
        cmd.redo(&mut graph).unwrap();
        assert!(graph.edges().is_empty());
        cmd.undo(&mut graph).unwrap();
        assert_eq!(graph.edges().len(), 1);
        connect.undo(&mut graph).unwrap();
        assert!(graph.edges().is_empty());
    }
}
