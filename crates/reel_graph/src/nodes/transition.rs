// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross dissolve between two blocks.

use crate::hash::NodeHasher;
use crate::job::{ShaderCode, ShaderJob};
use crate::node::{Node, NodeCategory, NodeKind};
use crate::param::NodeInput;
use crate::table::{NodeValueDatabase, NodeValueTable};
use crate::value::{DataType, ParamValue};
use reel_time::Rational;
use std::any::Any;

/// Type id of [`CrossDissolveNode`]
pub const CROSS_DISSOLVE_ID: &str = "reel.cross_dissolve";

/// Id of the outgoing block
pub const OUT_BLOCK_INPUT: &str = "out_block_in";
/// Id of the incoming block
pub const IN_BLOCK_INPUT: &str = "in_block_in";
/// Id of the transition start
pub const IN_INPUT: &str = "in";
/// Id of the transition length
pub const LENGTH_INPUT: &str = "length";
/// Bound in shader jobs: blend position from 0 to 1
pub const PROGRESS: &str = "progress";

/// Shader id for the dissolve
pub const CROSS_DISSOLVE_SHADER: &str = "cross_dissolve";

const CROSS_DISSOLVE_FRAGMENT: &str = r#"
uniform sampler2D out_block_in;
uniform sampler2D in_block_in;
uniform float progress;
in vec2 texcoord;
out vec4 frag_color;

void main() {
    frag_color = mix(texture(out_block_in, texcoord), texture(in_block_in, texcoord), progress);
}
"#;

/// Blends linearly from the outgoing to the incoming block
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossDissolveNode;

impl CrossDissolveNode {
    /// Blend position at `time` for a transition over `[in, in + length)`
    pub fn progress(time: Rational, in_point: Rational, length: Rational) -> f64 {
        match (time - in_point).checked_div(length) {
            Ok(t) => t.to_f64().clamp(0.0, 1.0),
            Err(_) => 1.0,
        }
    }
}

impl NodeKind for CrossDissolveNode {
    fn id(&self) -> &'static str {
        CROSS_DISSOLVE_ID
    }

    fn name(&self) -> &'static str {
        "Cross Dissolve"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Transition
    }

    fn description(&self) -> &'static str {
        "Smoothly blend one block into the next."
    }

    fn inputs(&self) -> Vec<NodeInput> {
        vec![
            NodeInput::new(OUT_BLOCK_INPUT, "From", DataType::Buffer),
            NodeInput::new(IN_BLOCK_INPUT, "To", DataType::Buffer),
            NodeInput::new(IN_INPUT, "In", DataType::Rational)
                .with_default(Rational::ZERO)
                .not_connectable(),
            NodeInput::new(LENGTH_INPUT, "Length", DataType::Rational)
                .with_default(Rational::ONE)
                .not_connectable(),
        ]
    }

    fn value(&self, node: &Node, db: &mut NodeValueDatabase) -> NodeValueTable {
        let rational = |id: &str, default: Rational| {
            db[id]
                .get(DataType::Rational)
                .and_then(|v| v.as_rational().ok())
                .unwrap_or(default)
        };
        let in_point = rational(IN_INPUT, Rational::ZERO);
        let length = rational(LENGTH_INPUT, Rational::ONE);
        let time = db.time().map_or(Rational::ZERO, |r| r.in_point());

        let outgoing = db[OUT_BLOCK_INPUT].get(DataType::Buffer).cloned();
        let incoming = db[IN_BLOCK_INPUT].get(DataType::Buffer).cloned();

        let mut table = NodeValueTable::new();
        if outgoing.is_none() && incoming.is_none() {
            return table;
        }

        let progress = Self::progress(time, in_point, length);
        let job = ShaderJob::new(CROSS_DISSOLVE_SHADER)
            .with_value(OUT_BLOCK_INPUT, outgoing.unwrap_or_default())
            .with_value(IN_BLOCK_INPUT, incoming.unwrap_or_default())
            .with_value(PROGRESS, ParamValue::Float(progress));
        table.push_data(ParamValue::ShaderJob(job), Some(node.id()));
        table
    }

    /// The blend position varies with time even when both blocks are still
    fn hash(&self, node: &Node, hasher: &mut NodeHasher<'_>, time: Rational) {
        hasher.hash_node_inputs(node, time);
        let rational = |id: &str, default: Rational| {
            node.value_at(id, time).as_rational().unwrap_or(default)
        };
        let in_point = rational(IN_INPUT, Rational::ZERO);
        let length = rational(LENGTH_INPUT, Rational::ONE);
        hasher.update(Self::progress(time, in_point, length).to_le_bytes());
    }

    fn shader_code(&self, shader_id: &str) -> Option<ShaderCode> {
        (shader_id == CROSS_DISSOLVE_SHADER).then(|| ShaderCode {
            fragment: CROSS_DISSOLVE_FRAGMENT.to_string(),
            vertex: String::new(),
        })
    }

    fn box_clone(&self) -> Box<dyn NodeKind> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
