// SPDX-License-Identifier: MIT OR Apache-2.0
//! Solid color generator.

use crate::job::GenerateJob;
use crate::media::Frame;
use crate::node::{Node, NodeCategory, NodeKind};
use crate::param::NodeInput;
use crate::table::{NodeValueDatabase, NodeValueTable};
use crate::value::{Color, DataType, ParamValue};
use std::any::Any;

/// Type id of [`SolidNode`]
pub const SOLID_ID: &str = "reel.solid";

/// Id of the color input
pub const COLOR_INPUT: &str = "color_in";

/// Color a new solid starts with
pub const DEFAULT_COLOR: Color = Color::new(1.0, 0.0, 0.0, 1.0);

/// Fills the frame with one color
#[derive(Debug, Clone, Copy, Default)]
pub struct SolidNode;

impl NodeKind for SolidNode {
    fn id(&self) -> &'static str {
        SOLID_ID
    }

    fn name(&self) -> &'static str {
        "Solid"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Generator
    }

    fn description(&self) -> &'static str {
        "Generate a solid color."
    }

    fn inputs(&self) -> Vec<NodeInput> {
        vec![NodeInput::new(COLOR_INPUT, "Color", DataType::Color)
            .with_default(DEFAULT_COLOR)
            .keyframable()]
    }

    fn value(&self, node: &Node, db: &mut NodeValueDatabase) -> NodeValueTable {
        let color = db[COLOR_INPUT]
            .get(DataType::Color)
            .cloned()
            .unwrap_or(ParamValue::Color(DEFAULT_COLOR));

        let mut table = NodeValueTable::new();
        table.push_data(
            ParamValue::GenerateJob(GenerateJob::new().with_value(COLOR_INPUT, color)),
            Some(node.id()),
        );
        table
    }

    fn generate_frame(&self, _node: &Node, frame: &mut Frame, job: &GenerateJob) {
        let color = job
            .value(COLOR_INPUT)
            .and_then(|v| v.as_color().ok())
            .unwrap_or(DEFAULT_COLOR);
        frame.fill(color);
    }

    fn box_clone(&self) -> Box<dyn NodeKind> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
