// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic on numbers, colors, pictures and audio.
//!
//! Scalars and colors are computed directly. Pictures become a shader job
//! and audio a sample job, so the backend does the per-pixel or
//! per-sample work.

use crate::job::{SampleJob, ShaderCode, ShaderJob};
use crate::media::SampleBuffer;
use crate::node::{Node, NodeCategory, NodeKind};
use crate::param::NodeInput;
use crate::table::{NodeValueDatabase, NodeValueTable};
use crate::value::{Color, DataType, ParamValue};
use std::any::Any;
use std::fmt;

/// Type id of [`MathNode`]
pub const MATH_ID: &str = "reel.math";

/// Id of the operation selector
pub const METHOD_INPUT: &str = "method_in";
/// Id of the left operand
pub const PARAM_A_INPUT: &str = "param_a_in";
/// Id of the right operand
pub const PARAM_B_INPUT: &str = "param_b_in";

/// Shader id used for picture operands
pub const MATH_SHADER: &str = "math";

/// Bound in sample jobs: the non-audio operand
const OPERAND: &str = "operand";
/// Bound in sample jobs: whether the audio is the right operand
const SWAPPED: &str = "swapped";

const MATH_FRAGMENT: &str = r#"
uniform int method_in;
uniform sampler2D param_a_in;
uniform sampler2D param_b_in;
in vec2 texcoord;
out vec4 frag_color;

void main() {
    vec4 a = texture(param_a_in, texcoord);
    vec4 b = texture(param_b_in, texcoord);
    if (method_in == 0) frag_color = a + b;
    else if (method_in == 1) frag_color = a - b;
    else if (method_in == 2) frag_color = a * b;
    else if (method_in == 3) frag_color = a / b;
    else if (method_in == 4) frag_color = pow(a, b);
    else if (method_in == 5) frag_color = min(a, b);
    else frag_color = max(a, b);
}
"#;

/// Binary operation selected by `method_in`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MathOperation {
    /// a + b
    #[default]
    Add,
    /// a - b
    Subtract,
    /// a * b
    Multiply,
    /// a / b
    Divide,
    /// a raised to b
    Power,
    /// Smaller of a and b
    Min,
    /// Larger of a and b
    Max,
}

impl MathOperation {
    /// Every operation in combo order
    pub const ALL: [MathOperation; 7] = [
        MathOperation::Add,
        MathOperation::Subtract,
        MathOperation::Multiply,
        MathOperation::Divide,
        MathOperation::Power,
        MathOperation::Min,
        MathOperation::Max,
    ];

    /// Operation at a combo index, `Add` when out of range
    pub fn from_index(index: i64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or_default()
    }

    /// Combo index of this operation
    pub fn index(self) -> i64 {
        Self::ALL.iter().position(|op| *op == self).unwrap_or(0) as i64
    }

    /// Apply to two scalars
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
            Self::Power => a.powf(b),
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        }
    }

    fn apply_f32(self, a: f32, b: f32) -> f32 {
        self.apply(f64::from(a), f64::from(b)) as f32
    }

    /// Apply componentwise to two colors
    pub fn apply_color(self, a: Color, b: Color) -> Color {
        Color::new(
            self.apply_f32(a.r, b.r),
            self.apply_f32(a.g, b.g),
            self.apply_f32(a.b, b.b),
            self.apply_f32(a.a, b.a),
        )
    }

    /// Apply a scalar to the color channels, leaving alpha untouched
    pub fn apply_scalar(self, color: Color, scalar: f32, scalar_first: bool) -> Color {
        let op = |c: f32| {
            if scalar_first {
                self.apply_f32(scalar, c)
            } else {
                self.apply_f32(c, scalar)
            }
        };
        Color::new(op(color.r), op(color.g), op(color.b), color.a)
    }
}

impl fmt::Display for MathOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
            Self::Power => "Power",
            Self::Min => "Minimum",
            Self::Max => "Maximum",
        };
        f.write_str(name)
    }
}

/// Combines two operands with a [`MathOperation`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MathNode;

impl MathNode {
    fn method(db: &NodeValueDatabase) -> MathOperation {
        db[METHOD_INPUT]
            .get(DataType::Combo)
            .and_then(|v| v.as_int().ok())
            .map(MathOperation::from_index)
            .unwrap_or_default()
    }

    fn operand(db: &NodeValueDatabase, input: &str) -> ParamValue {
        db[input].get(DataType::Any).cloned().unwrap_or_default()
    }

    fn is_picture(value: &ParamValue) -> bool {
        matches!(
            value,
            ParamValue::Texture(_) | ParamValue::ShaderJob(_) | ParamValue::GenerateJob(_)
        )
    }
}

impl NodeKind for MathNode {
    fn id(&self) -> &'static str {
        MATH_ID
    }

    fn name(&self) -> &'static str {
        "Math"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Math
    }

    fn description(&self) -> &'static str {
        "Perform a mathematical operation between two values."
    }

    fn inputs(&self) -> Vec<NodeInput> {
        vec![
            NodeInput::new(METHOD_INPUT, "Method", DataType::Combo)
                .with_default(ParamValue::Combo(MathOperation::Add.index()))
                .not_connectable(),
            NodeInput::new(PARAM_A_INPUT, "Value", DataType::Any)
                .with_default(0.0)
                .keyframable(),
            NodeInput::new(PARAM_B_INPUT, "Value", DataType::Any)
                .with_default(0.0)
                .keyframable(),
        ]
    }

    fn value(&self, node: &Node, db: &mut NodeValueDatabase) -> NodeValueTable {
        let method = Self::method(db);
        let a = Self::operand(db, PARAM_A_INPUT);
        let b = Self::operand(db, PARAM_B_INPUT);

        let result = match (&a, &b) {
            _ if Self::is_picture(&a) || Self::is_picture(&b) => Some(ParamValue::ShaderJob(
                ShaderJob::new(MATH_SHADER)
                    .with_value(METHOD_INPUT, ParamValue::Combo(method.index()))
                    .with_value(PARAM_A_INPUT, a.clone())
                    .with_value(PARAM_B_INPUT, b.clone()),
            )),
            (ParamValue::Samples(samples), other) => Some(ParamValue::SampleJob(
                SampleJob::new(samples.clone())
                    .with_value(METHOD_INPUT, ParamValue::Combo(method.index()))
                    .with_value(OPERAND, other.clone())
                    .with_value(SWAPPED, ParamValue::Boolean(false)),
            )),
            (other, ParamValue::Samples(samples)) => Some(ParamValue::SampleJob(
                SampleJob::new(samples.clone())
                    .with_value(METHOD_INPUT, ParamValue::Combo(method.index()))
                    .with_value(OPERAND, other.clone())
                    .with_value(SWAPPED, ParamValue::Boolean(true)),
            )),
            (ParamValue::Color(x), ParamValue::Color(y)) => Some(ParamValue::Color(method.apply_color(*x, *y))),
            (ParamValue::Color(c), scalar) => scalar
                .as_float()
                .ok()
                .map(|s| ParamValue::Color(method.apply_scalar(*c, s as f32, false))),
            (scalar, ParamValue::Color(c)) => scalar
                .as_float()
                .ok()
                .map(|s| ParamValue::Color(method.apply_scalar(*c, s as f32, true))),
            (x, y) => match (x.as_float(), y.as_float()) {
                (Ok(x), Ok(y)) => Some(ParamValue::Float(method.apply(x, y))),
                _ => None,
            },
        };

        let mut table = NodeValueTable::new();
        match result {
            Some(value) => table.push_data(value, Some(node.id())),
            None => tracing::debug!(
                "{} cannot combine {:?} and {:?}",
                node.display_name(),
                a.data_type(),
                b.data_type()
            ),
        }
        table
    }

    fn shader_code(&self, shader_id: &str) -> Option<ShaderCode> {
        (shader_id == MATH_SHADER).then(|| ShaderCode {
            fragment: MATH_FRAGMENT.to_string(),
            vertex: String::new(),
        })
    }

    fn process_samples(&self, _node: &Node, job: &SampleJob) -> Option<SampleBuffer> {
        let method = job
            .value(METHOD_INPUT)
            .and_then(|v| v.as_int().ok())
            .map(MathOperation::from_index)
            .unwrap_or_default();
        let swapped = job.value(SWAPPED).and_then(|v| v.as_bool().ok()).unwrap_or(false);
        let operand = job.value(OPERAND)?;

        let mut out = (*job.samples).clone();
        for channel in 0..out.channel_count() {
            let other: Vec<f32> = match operand {
                ParamValue::Samples(other) => {
                    let source = other.channel(channel).unwrap_or(&[]);
                    (0..out.sample_count())
                        .map(|i| source.get(i).copied().unwrap_or(0.0))
                        .collect()
                }
                scalar => vec![scalar.as_float().ok()? as f32; out.sample_count()],
            };
            let Some(samples) = out.channel_mut(channel) else {
                continue;
            };
            for (sample, rhs) in samples.iter_mut().zip(other) {
                *sample = if swapped {
                    method.apply_f32(rhs, *sample)
                } else {
                    method.apply_f32(*sample, rhs)
                };
            }
        }
        Some(out)
    }

    fn box_clone(&self) -> Box<dyn NodeKind> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
