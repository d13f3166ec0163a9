// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project files.
//!
//! A project is the RON encoding of a saved graph element. Saving goes
//! through a temporary file in the destination directory, so an
//! interrupted save never leaves a truncated project behind.

use crate::error::{AppError, Result};
use reel_graph::document::{load_graph, save_graph};
use reel_graph::nodes::clip::{BUFFER_INPUT, IN_INPUT, LENGTH_INPUT};
use reel_graph::nodes::math::{METHOD_INPUT, PARAM_A_INPUT, PARAM_B_INPUT};
use reel_graph::nodes::solid::COLOR_INPUT;
use reel_graph::nodes::track::BLOCK_INPUT;
use reel_graph::nodes::viewer::TEXTURE_INPUT;
use reel_graph::nodes::{ClipNode, MathNode, MathOperation, SolidNode, TrackNode, ViewerNode};
use reel_graph::param::array_input_id;
use reel_graph::{
    Color, DataType, Element, InputRef, Node, NodeCategory, NodeGraph, NodeId, NodeKeyframe, NodeRegistry, ParamValue,
};
use reel_time::Rational;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Project file extension
pub const PROJECT_EXTENSION: &str = "reel";

/// Write bytes to `path` through a temporary sibling file
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

/// Save a graph as a project file
pub fn save_project(graph: &NodeGraph, path: &Path) -> Result<()> {
    let element = save_graph(graph);
    let text = ron::ser::to_string_pretty(&element, ron::ser::PrettyConfig::default())?;
    write_atomic(path, text.as_bytes())?;
    tracing::info!("Saved project {:?} ({} nodes) to {}", graph.name, graph.node_count(), path.display());
    Ok(())
}

/// Load a project file into a fresh graph
pub fn load_project(path: &Path, registry: &NodeRegistry) -> Result<NodeGraph> {
    let text = std::fs::read_to_string(path)?;
    let element: Element = ron::from_str(&text).map_err(|source| AppError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let graph = load_graph(&element, registry)?;
    tracing::info!("Loaded project {:?} ({} nodes)", graph.name, graph.node_count());
    Ok(graph)
}

/// Find a node by label, or the first output node when no label is given
pub fn find_node(graph: &NodeGraph, label: Option<&str>) -> Result<NodeId> {
    match label {
        Some(label) => graph
            .nodes()
            .find(|n| n.label() == label || n.display_name() == label)
            .map(Node::id)
            .ok_or_else(|| AppError::NodeNotFound(label.to_string())),
        None => graph
            .nodes()
            .find(|n| n.kind().category() == NodeCategory::Output)
            .map(Node::id)
            .ok_or(AppError::NoOutput),
    }
}

/// Data type of a node's input
pub fn input_data_type(graph: &NodeGraph, node: NodeId, input: &str) -> Result<DataType> {
    graph
        .node(node)
        .and_then(|n| n.input(input))
        .map(|i| i.data_type())
        .ok_or_else(|| AppError::InvalidArgument(format!("node has no input {input:?}")))
}

/// Parse command-line text as a value of `data_type`
///
/// Colors are `r,g,b` or `r,g,b,a` and vectors are `x,y`.
pub fn parse_value(data_type: DataType, text: &str) -> Result<ParamValue> {
    let invalid = |reason: &dyn std::fmt::Display| {
        AppError::InvalidArgument(format!("{text:?} is not a valid {data_type:?} value: {reason}"))
    };
    let floats = |expected: &[usize]| -> Result<Vec<f64>> {
        let parts = text
            .split(',')
            .map(|part| part.trim().parse::<f64>().map_err(|e| invalid(&e)))
            .collect::<Result<Vec<_>>>()?;
        if expected.contains(&parts.len()) {
            Ok(parts)
        } else {
            Err(invalid(&format!("expected {expected:?} components")))
        }
    };

    let value = match data_type {
        DataType::Float | DataType::Any => ParamValue::Float(text.trim().parse::<f64>().map_err(|e| invalid(&e))?),
        DataType::Int => ParamValue::Int(text.trim().parse::<i64>().map_err(|e| invalid(&e))?),
        DataType::Combo => ParamValue::Combo(text.trim().parse::<i64>().map_err(|e| invalid(&e))?),
        DataType::Rational => ParamValue::Rational(text.parse::<Rational>().map_err(|e| invalid(&e))?),
        DataType::Boolean => ParamValue::Boolean(text.trim().parse::<bool>().map_err(|e| invalid(&e))?),
        DataType::Text => ParamValue::Text(text.to_string()),
        DataType::Color => {
            let c = floats(&[3, 4])?;
            let alpha = c.get(3).copied().unwrap_or(1.0);
            ParamValue::Color(Color::new(c[0] as f32, c[1] as f32, c[2] as f32, alpha as f32))
        }
        DataType::Vec2 => {
            let v = floats(&[2])?;
            ParamValue::Vec2([v[0], v[1]])
        }
        other => {
            return Err(AppError::InvalidArgument(format!(
                "{other:?} values cannot be set from the command line"
            )))
        }
    };
    Ok(value)
}

fn seconds(n: i64) -> Rational {
    Rational::from_integer(n)
}

/// Build the sample edit written by `reel demo`
///
/// Two solid clips play back to back on one track. A math node fades the
/// track to half brightness over the second clip before the viewer.
pub fn demo_graph() -> Result<NodeGraph> {
    let mut graph = NodeGraph::new("Demo");

    let track = graph.add_node(Node::from_kind(TrackNode).with_label("Track 1").with_position(400.0, 0.0))?;
    graph.resize_input_array(&InputRef::new(track, BLOCK_INPUT), 2)?;

    let colors = [Color::new(0.8, 0.1, 0.1, 1.0), Color::new(0.1, 0.2, 0.8, 1.0)];
    for (i, color) in colors.into_iter().enumerate() {
        let y = i as f32 * 120.0;
        let solid = graph.add_node(
            Node::from_kind(SolidNode)
                .with_label(format!("Solid {}", i + 1))
                .with_position(0.0, y),
        )?;
        graph.set_standard_value(&InputRef::new(solid, COLOR_INPUT), color.into())?;

        let clip = graph.add_node(
            Node::from_kind(ClipNode)
                .with_label(format!("Clip {}", i + 1))
                .with_position(200.0, y),
        )?;
        graph.set_standard_value(&InputRef::new(clip, IN_INPUT), seconds(2 * i as i64).into())?;
        graph.set_standard_value(&InputRef::new(clip, LENGTH_INPUT), seconds(2).into())?;
        graph.connect(solid, &InputRef::new(clip, BUFFER_INPUT))?;
        graph.connect(clip, &InputRef::new(track, array_input_id(BLOCK_INPUT, i)))?;
    }

    let fade = graph.add_node(Node::from_kind(MathNode).with_label("Fade").with_position(600.0, 0.0))?;
    graph.set_standard_value(
        &InputRef::new(fade, METHOD_INPUT),
        ParamValue::Combo(MathOperation::Multiply.index()),
    )?;
    let amount = InputRef::new(fade, PARAM_B_INPUT);
    graph.set_keyframing(&amount, true)?;
    graph.insert_keyframe(&amount, NodeKeyframe::new(seconds(2), ParamValue::Float(1.0)))?;
    graph.insert_keyframe(&amount, NodeKeyframe::new(seconds(4), ParamValue::Float(0.5)))?;
    graph.connect(track, &InputRef::new(fade, PARAM_A_INPUT))?;

    let viewer = graph.add_node(Node::from_kind(ViewerNode).with_label("Viewer").with_position(800.0, 0.0))?;
    graph.connect(fade, &InputRef::new(viewer, TEXTURE_INPUT))?;

    Ok(graph)
}
