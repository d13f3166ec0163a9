// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured-document save and load for nodes and graphs.
//!
//! The core only depends on a stream of named elements with attributes and
//! text content. [`Element`] is the in-memory tree; anything implementing
//! [`DocumentWriter`] can receive it. Parameter values are stored as RON
//! text inside their elements.

use crate::edge::InputRef;
use crate::graph::{GraphError, NodeGraph};
use crate::keyframe::{InterpolationMode, NodeKeyframe};
use crate::node::{Node, NodeId, NodeRegistry};
use crate::param::NodeInput;
use crate::value::ParamValue;
use indexmap::IndexMap;
use reel_time::Rational;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors from reading a saved document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// A required attribute is absent
    #[error("<{element}> is missing attribute `{attribute}`")]
    MissingAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: String,
    },

    /// An attribute or text could not be parsed
    #[error("Invalid value in <{element}>: {reason}")]
    InvalidValue {
        /// Element name
        element: String,
        /// Parse failure
        reason: String,
    },

    /// Element of the wrong kind
    #[error("Expected <{expected}>, found <{found}>")]
    UnexpectedElement {
        /// Expected name
        expected: String,
        /// Actual name
        found: String,
    },

    /// The registry has no kind with this id
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Rebuilding the graph failed
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Receives a document as a stream of elements
pub trait DocumentWriter {
    /// Open a child element of the current one
    fn start_element(&mut self, name: &str);
    /// Set an attribute on the current element
    fn write_attribute(&mut self, name: &str, value: &str);
    /// Set the text content of the current element
    fn write_text(&mut self, text: &str);
    /// Close the current element
    fn end_element(&mut self);
}

/// A named element with ordered attributes, optional text and children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attributes in insertion order
    pub attributes: IndexMap<String, String>,
    /// Text content
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value, failing if absent
    pub fn require(&self, name: &str) -> Result<&str, DocumentError> {
        self.attribute(name).ok_or_else(|| DocumentError::MissingAttribute {
            element: self.name.clone(),
            attribute: name.to_string(),
        })
    }

    /// Children with a given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child with a given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn expect_name(&self, expected: &str) -> Result<(), DocumentError> {
        if self.name == expected {
            Ok(())
        } else {
            Err(DocumentError::UnexpectedElement {
                expected: expected.to_string(),
                found: self.name.clone(),
            })
        }
    }

    fn invalid(&self, reason: impl ToString) -> DocumentError {
        DocumentError::InvalidValue {
            element: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Stream this element and its children to a writer
    pub fn write_to(&self, writer: &mut dyn DocumentWriter) {
        writer.start_element(&self.name);
        for (name, value) in &self.attributes {
            writer.write_attribute(name, value);
        }
        if let Some(text) = &self.text {
            writer.write_text(text);
        }
        for child in &self.children {
            child.write_to(writer);
        }
        writer.end_element();
    }
}

/// Writer that rebuilds an [`Element`] tree
#[derive(Debug, Default)]
pub struct ElementWriter {
    stack: Vec<Element>,
    roots: Vec<Element>,
}

impl ElementWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed top-level elements
    pub fn finish(mut self) -> Vec<Element> {
        while !self.stack.is_empty() {
            self.end_element();
        }
        self.roots
    }
}

impl DocumentWriter for ElementWriter {
    fn start_element(&mut self, name: &str) {
        self.stack.push(Element::new(name));
    }

    fn write_attribute(&mut self, name: &str, value: &str) {
        if let Some(current) = self.stack.last_mut() {
            current.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn write_text(&mut self, text: &str) {
        if let Some(current) = self.stack.last_mut() {
            current.text = Some(text.to_string());
        }
    }

    fn end_element(&mut self) {
        let Some(done) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.push(done),
            None => self.roots.push(done),
        }
    }
}

fn value_to_text(value: &ParamValue) -> String {
    match ron::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Failed to save {:?} value: {e}", value.data_type());
            String::from("None")
        }
    }
}

fn value_from_element(element: &Element) -> Result<ParamValue, DocumentError> {
    let text = element.text.as_deref().unwrap_or("None");
    ron::from_str(text).map_err(|e| element.invalid(e))
}

fn interpolation_name(mode: InterpolationMode) -> &'static str {
    match mode {
        InterpolationMode::Constant => "constant",
        InterpolationMode::Linear => "linear",
        InterpolationMode::Bezier => "bezier",
    }
}

fn save_input(input: &NodeInput) -> Element {
    let mut element = Element::new("input")
        .with_attribute("id", input.id())
        .with_attribute("keyframing", input.is_keyframing().to_string());

    if input.is_array() {
        element = element.with_attribute("size", input.array_size().to_string());
    }
    element.push(Element::new("value").with_text(value_to_text(input.standard_value())));

    for key in input.keyframes().keys() {
        element.push(
            Element::new("keyframe")
                .with_attribute("time", key.time.to_string())
                .with_attribute("interpolation", interpolation_name(key.interpolation))
                .with_attribute("handles", format!("{}:{}", key.handles[0], key.handles[1]))
                .with_text(value_to_text(&key.value)),
        );
    }
    for sub in input.sub_inputs() {
        element.push(save_input(sub));
    }
    element
}

fn load_input(input: &mut NodeInput, element: &Element) -> Result<(), DocumentError> {
    if let Some(size) = element.attribute("size") {
        let size: usize = size.parse().map_err(|e| element.invalid(e))?;
        input.resize_array(size);
    }
    if let Some(keyframing) = element.attribute("keyframing") {
        input.set_keyframing(keyframing == "true");
    }
    if let Some(value) = element.child("value") {
        input.set_standard_value(value_from_element(value)?);
    }

    for key in element.children_named("keyframe") {
        let time: Rational = key.require("time")?.parse().map_err(|e| key.invalid(e))?;
        let interpolation = match key.attribute("interpolation").unwrap_or("linear") {
            "constant" => InterpolationMode::Constant,
            "bezier" => InterpolationMode::Bezier,
            _ => InterpolationMode::Linear,
        };
        let mut keyframe = NodeKeyframe::new(time, value_from_element(key)?)
            .with_interpolation(interpolation);
        if let Some((a, b)) = key.attribute("handles").and_then(|h| h.split_once(':')) {
            let a: f64 = a.parse().map_err(|e| key.invalid(e))?;
            let b: f64 = b.parse().map_err(|e| key.invalid(e))?;
            keyframe = keyframe.with_handles(a, b);
        }
        input.keyframes_mut().insert(keyframe);
    }

    for sub in element.children_named("input") {
        let id = sub.require("id")?;
        match input.sub_inputs_mut().iter_mut().find(|s| s.id() == id) {
            Some(target) => load_input(target, sub)?,
            None => tracing::debug!("Skipping unknown sub-input {id}"),
        }
    }
    Ok(())
}

/// Save a node: type id, instance id, position, label, then parameters
pub fn save_node(node: &Node) -> Element {
    let mut element = Element::new("node")
        .with_attribute("id", node.type_id())
        .with_attribute("ptr", node.id().0.to_string())
        .with_attribute("pos", format!("{}:{}", node.position[0], node.position[1]))
        .with_attribute("label", node.label());

    for input in node.inputs() {
        element.push(save_input(input));
    }
    element.push(Element::new("output").with_attribute("id", node.output().id()));
    node.kind().save_internal(&mut element);
    element
}

/// Load a node saved by [`save_node`]
///
/// Parameters the node kind no longer has are skipped.
pub fn load_node(element: &Element, registry: &NodeRegistry) -> Result<Node, DocumentError> {
    element.expect_name("node")?;
    let type_id = element.require("id")?;
    let mut node = registry
        .create_node(type_id)
        .ok_or_else(|| DocumentError::UnknownNodeType(type_id.to_string()))?;

    if let Some(ptr) = element.attribute("ptr") {
        let uuid = Uuid::parse_str(ptr).map_err(|e| element.invalid(e))?;
        node = node.with_id(NodeId(uuid));
    }
    if let Some((x, y)) = element.attribute("pos").and_then(|p| p.split_once(':')) {
        let x: f32 = x.parse().map_err(|e| element.invalid(e))?;
        let y: f32 = y.parse().map_err(|e| element.invalid(e))?;
        node.position = [x, y];
    }
    if let Some(label) = element.attribute("label") {
        node.set_label(label);
    }

    for child in element.children_named("input") {
        let id = child.require("id")?;
        match node.input_mut(id) {
            Some(input) => load_input(input, child)?,
            None => tracing::debug!("Skipping unknown input {id} on {type_id}"),
        }
    }
    node.kind_mut().load_internal(element)?;
    Ok(node)
}

/// Save a graph: every node, then every edge
pub fn save_graph(graph: &NodeGraph) -> Element {
    let mut root = Element::new("graph").with_attribute("name", graph.name.clone());
    for node in graph.nodes() {
        root.push(save_node(node));
    }
    for edge in graph.edges() {
        root.push(
            Element::new("edge")
                .with_attribute("output", edge.output.node.0.to_string())
                .with_attribute("node", edge.input.node.0.to_string())
                .with_attribute("input", edge.input.input),
        );
    }
    root
}

/// Load a graph saved by [`save_graph`] into a fresh graph
///
/// Nothing is returned unless every node and edge loaded.
pub fn load_graph(element: &Element, registry: &NodeRegistry) -> Result<NodeGraph, DocumentError> {
    element.expect_name("graph")?;
    let mut graph = NodeGraph::new(element.attribute("name").unwrap_or("Untitled"));

    for child in element.children_named("node") {
        graph.add_node(load_node(child, registry)?)?;
    }

    let parse_id = |e: &Element, name: &str| -> Result<NodeId, DocumentError> {
        Uuid::parse_str(e.require(name)?)
            .map(NodeId)
            .map_err(|err| e.invalid(err))
    };
    for edge in element.children_named("edge") {
        let output = parse_id(edge, "output")?;
        let input = InputRef::new(parse_id(edge, "node")?, edge.require("input")?);
        graph.connect(output, &input)?;
    }
    Ok(graph)
}
