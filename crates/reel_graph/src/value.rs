// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed values carried by node parameters and evaluation tables.
//!
//! [`ParamValue`] is a closed tagged union. Every typed read goes through an
//! accessor that checks the tag and reports a [`ValueError`] on mismatch, so
//! a node reading the wrong kind of value gets an error it can degrade on.

use crate::job::{GenerateJob, SampleJob, ShaderJob};
use crate::media::{Frame, SampleBuffer, StreamRef};
use reel_time::Rational;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Data type tag for parameters and values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// No value
    None,
    /// Integer
    Int,
    /// Floating point number
    Float,
    /// Exact rational number, typically a time
    Rational,
    /// Boolean
    Boolean,
    /// RGBA color
    Color,
    /// 2D vector
    Vec2,
    /// Text
    Text,
    /// Index into a fixed list of choices
    Combo,
    /// Reference to a stream of a footage file
    Footage,
    /// Decoded image
    Texture,
    /// Decoded audio
    Samples,
    /// Deferred per-pixel work for the rendering backend
    ShaderJob,
    /// Deferred per-sample work
    SampleJob,
    /// Deferred frame generation
    GenerateJob,
    /// Anything that resolves to pixels or samples
    Buffer,
    /// Matches every type
    Any,
}

impl DataType {
    /// Whether a value of this type satisfies a request for `requested`
    pub fn matches(self, requested: DataType) -> bool {
        if self == requested || requested == DataType::Any {
            return true;
        }

        requested == DataType::Buffer
            && matches!(
                self,
                DataType::Footage
                    | DataType::Texture
                    | DataType::Samples
                    | DataType::ShaderJob
                    | DataType::SampleJob
                    | DataType::GenerateJob
            )
    }

    /// Whether values of this type are resolved by the rendering backend
    pub fn is_job(self) -> bool {
        matches!(
            self,
            DataType::Footage | DataType::ShaderJob | DataType::SampleJob | DataType::GenerateJob
        )
    }
}

/// Error for a typed read of the wrong kind of value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The value holds a different type than requested
    #[error("Type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// Requested type
        expected: DataType,
        /// Actual type
        found: DataType,
    },
}

/// RGBA color with straight alpha
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Create a color
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque black
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    /// Opaque white
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    /// Components as an array
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Componentwise linear blend
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Color::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Value that can be stored in an input or flow through a table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ParamValue {
    /// No value
    #[default]
    None,
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Rational
    Rational(Rational),
    /// Boolean
    Boolean(bool),
    /// Color
    Color(Color),
    /// 2D vector
    Vec2([f64; 2]),
    /// Text
    Text(String),
    /// Combo index
    Combo(i64),
    /// Footage stream reference
    Footage(StreamRef),
    /// Decoded image
    Texture(Arc<Frame>),
    /// Decoded audio
    Samples(Arc<SampleBuffer>),
    /// Deferred shader work
    ShaderJob(ShaderJob),
    /// Deferred sample work
    SampleJob(SampleJob),
    /// Deferred frame generation
    GenerateJob(GenerateJob),
}

impl ParamValue {
    /// Type tag of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Self::None => DataType::None,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Rational(_) => DataType::Rational,
            Self::Boolean(_) => DataType::Boolean,
            Self::Color(_) => DataType::Color,
            Self::Vec2(_) => DataType::Vec2,
            Self::Text(_) => DataType::Text,
            Self::Combo(_) => DataType::Combo,
            Self::Footage(_) => DataType::Footage,
            Self::Texture(_) => DataType::Texture,
            Self::Samples(_) => DataType::Samples,
            Self::ShaderJob(_) => DataType::ShaderJob,
            Self::SampleJob(_) => DataType::SampleJob,
            Self::GenerateJob(_) => DataType::GenerateJob,
        }
    }

    /// Whether this is [`ParamValue::None`]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Whether this value may be stored in an input of type `target`
    pub fn fits(&self, target: DataType) -> bool {
        match (self.data_type(), target) {
            (DataType::None, _) => true,
            (found, target) if found.matches(target) => true,
            // Numeric widening
            (DataType::Int, DataType::Float | DataType::Rational | DataType::Combo) => true,
            (DataType::Float, DataType::Int) => true,
            (DataType::Rational, DataType::Float) => true,
            (DataType::Combo, DataType::Int) => true,
            _ => false,
        }
    }

    fn mismatch(&self, expected: DataType) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.data_type(),
        }
    }

    /// Read as a float, widening integers and rationals
    pub fn as_float(&self) -> Result<f64, ValueError> {
        match self {
            Self::Float(v) => Ok(*v),
            Self::Int(v) | Self::Combo(v) => Ok(*v as f64),
            Self::Rational(v) => Ok(v.to_f64()),
            _ => Err(self.mismatch(DataType::Float)),
        }
    }

    /// Read as an integer
    pub fn as_int(&self) -> Result<i64, ValueError> {
        match self {
            Self::Int(v) | Self::Combo(v) => Ok(*v),
            _ => Err(self.mismatch(DataType::Int)),
        }
    }

    /// Read as a rational, widening integers
    pub fn as_rational(&self) -> Result<Rational, ValueError> {
        match self {
            Self::Rational(v) => Ok(*v),
            Self::Int(v) => Ok(Rational::from_integer(*v)),
            _ => Err(self.mismatch(DataType::Rational)),
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Self::Boolean(v) => Ok(*v),
            _ => Err(self.mismatch(DataType::Boolean)),
        }
    }

    /// Read as a color
    pub fn as_color(&self) -> Result<Color, ValueError> {
        match self {
            Self::Color(v) => Ok(*v),
            _ => Err(self.mismatch(DataType::Color)),
        }
    }

    /// Read as a 2D vector
    pub fn as_vec2(&self) -> Result<[f64; 2], ValueError> {
        match self {
            Self::Vec2(v) => Ok(*v),
            _ => Err(self.mismatch(DataType::Vec2)),
        }
    }

    /// Read as text
    pub fn as_text(&self) -> Result<&str, ValueError> {
        match self {
            Self::Text(v) => Ok(v),
            _ => Err(self.mismatch(DataType::Text)),
        }
    }

    /// Read as a footage stream reference
    pub fn as_stream(&self) -> Result<&StreamRef, ValueError> {
        match self {
            Self::Footage(v) => Ok(v),
            _ => Err(self.mismatch(DataType::Footage)),
        }
    }

    /// Read as a decoded image
    pub fn as_texture(&self) -> Result<&Arc<Frame>, ValueError> {
        match self {
            Self::Texture(v) => Ok(v),
            _ => Err(self.mismatch(DataType::Texture)),
        }
    }

    /// Read as decoded audio
    pub fn as_samples(&self) -> Result<&Arc<SampleBuffer>, ValueError> {
        match self {
            Self::Samples(v) => Ok(v),
            _ => Err(self.mismatch(DataType::Samples)),
        }
    }

    /// Stable byte encoding used when hashing unconnected inputs
    pub fn to_bytes(&self) -> Vec<u8> {
        match bincode::serialize(self) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to encode {:?} value for hashing: {e}", self.data_type());
                Vec::new()
            }
        }
    }

    /// Interpolate between two values of the same type
    ///
    /// Types without a meaningful blend hold `self` until `t` reaches 1.
    pub fn lerp(&self, other: &ParamValue, t: f64) -> ParamValue {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => Self::Float(mix(*a, *b)),
            (Self::Int(a), Self::Int(b)) => Self::Int(mix(*a as f64, *b as f64).round() as i64),
            (Self::Color(a), Self::Color(b)) => Self::Color(a.lerp(*b, t as f32)),
            (Self::Vec2(a), Self::Vec2(b)) => Self::Vec2([mix(a[0], b[0]), mix(a[1], b[1])]),
            _ if t >= 1.0 => other.clone(),
            _ => self.clone(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Rational> for ParamValue {
    fn from(value: Rational) -> Self {
        Self::Rational(value)
    }
}

impl From<Color> for ParamValue {
    fn from(value: Color) -> Self {
        Self::Color(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
