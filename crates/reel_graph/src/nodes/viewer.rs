// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph output sink.

use crate::node::{NodeCategory, NodeKind};
use crate::param::NodeInput;
use crate::value::DataType;
use std::any::Any;

/// Type id of [`ViewerNode`]
pub const VIEWER_ID: &str = "reel.viewer";

/// Id of the picture input
pub const TEXTURE_INPUT: &str = "texture_in";
/// Id of the audio input
pub const SAMPLES_INPUT: &str = "samples_in";

/// Terminal node whose table is what gets shown and played
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerNode;

impl NodeKind for ViewerNode {
    fn id(&self) -> &'static str {
        VIEWER_ID
    }

    fn name(&self) -> &'static str {
        "Viewer"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Output
    }

    fn description(&self) -> &'static str {
        "Display the result of the graph."
    }

    fn inputs(&self) -> Vec<NodeInput> {
        vec![
            NodeInput::new(TEXTURE_INPUT, "Texture", DataType::Buffer),
            NodeInput::new(SAMPLES_INPUT, "Samples", DataType::Samples),
        ]
    }

    fn box_clone(&self) -> Box<dyn NodeKind> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
