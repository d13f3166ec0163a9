// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deferred work descriptions handed to the rendering backend.
//!
//! A node's `value` only describes *what* to compute; jobs carry that
//! description (an identifier plus the bound input values) out of the
//! graph so a backend can decide *how*.

use crate::media::SampleBuffer;
use crate::value::ParamValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source code for a shader, supplied by a node on request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShaderCode {
    /// Fragment stage source
    pub fragment: String,
    /// Vertex stage source, empty for the backend's default
    pub vertex: String,
}

/// Per-pixel work bound to a set of input values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderJob {
    /// Which shader the producing node wants run
    pub shader_id: String,
    /// Bound values by input id
    pub values: IndexMap<String, ParamValue>,
}

impl ShaderJob {
    /// Create an empty job for a shader
    pub fn new(shader_id: impl Into<String>) -> Self {
        Self {
            shader_id: shader_id.into(),
            values: IndexMap::new(),
        }
    }

    /// Bind a value
    pub fn with_value(mut self, id: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(id.into(), value);
        self
    }

    /// Look up a bound value
    pub fn value(&self, id: &str) -> Option<&ParamValue> {
        self.values.get(id)
    }
}

/// Per-sample work over an audio buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleJob {
    /// Audio to process
    pub samples: Arc<SampleBuffer>,
    /// Bound values by input id
    pub values: IndexMap<String, ParamValue>,
}

impl SampleJob {
    /// Create a job over a buffer
    pub fn new(samples: Arc<SampleBuffer>) -> Self {
        Self {
            samples,
            values: IndexMap::new(),
        }
    }

    /// Bind a value
    pub fn with_value(mut self, id: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(id.into(), value);
        self
    }

    /// Look up a bound value
    pub fn value(&self, id: &str) -> Option<&ParamValue> {
        self.values.get(id)
    }
}

/// Request to synthesize a frame from bound values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerateJob {
    /// Bound values by input id
    pub values: IndexMap<String, ParamValue>,
}

impl GenerateJob {
    /// Create an empty job
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value
    pub fn with_value(mut self, id: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(id.into(), value);
        self
    }

    /// Look up a bound value
    pub fn value(&self, id: &str) -> Option<&ParamValue> {
        self.values.get(id)
    }
}
