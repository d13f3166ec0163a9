// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cache keys over a node's full upstream dependency chain.
//!
//! Two evaluations get the same [`Digest`] only if every contributing
//! input, transitively, resolves to identical source data at identical
//! times. The walk mirrors the traverser: same inputs, same time
//! adjustments, but feeding bytes into SHA-256 instead of evaluating.

use crate::graph::{GraphError, NodeGraph};
use crate::media::{StreamKind, StreamRef};
use crate::node::{Node, NodeId};
use crate::param::NodeInput;
use crate::value::ParamValue;
use reel_time::{Rational, TimeRange};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// SHA-256 digest identifying renderable content
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// Accumulates a node's hash, recursing through connected inputs
pub struct NodeHasher<'g> {
    graph: &'g NodeGraph,
    sha: Sha256,
}

impl<'g> NodeHasher<'g> {
    /// Create a hasher reading from `graph`
    pub fn new(graph: &'g NodeGraph) -> Self {
        Self {
            graph,
            sha: Sha256::new(),
        }
    }

    /// Graph the hasher reads from
    pub fn graph(&self) -> &'g NodeGraph {
        self.graph
    }

    /// Feed raw bytes
    pub fn update(&mut self, bytes: impl AsRef<[u8]>) {
        self.sha.update(bytes);
    }

    /// Hash a node at a time, dispatching to its kind
    pub fn hash_node(&mut self, node: NodeId, time: Rational) -> Result<(), GraphError> {
        let graph = self.graph;
        let node = graph.node(node).ok_or(GraphError::NodeNotFound(node))?;
        node.kind().hash(node, self, time);
        Ok(())
    }

    /// Default hash: the type id, then every input
    pub fn hash_node_inputs(&mut self, node: &Node, time: Rational) {
        self.update(node.type_id());
        for input in node.inputs_including_arrays() {
            self.hash_input(node, input, time);
        }
    }

    /// Hash one input: recurse if connected, else mix in its value
    pub fn hash_input(&mut self, node: &Node, input: &NodeInput, time: Rational) {
        let instant = TimeRange::instant(time);
        if !node.kind().should_process_input(node, input.id(), instant) {
            return;
        }

        let adjusted = node
            .kind()
            .input_time_adjustment(node, input.id(), instant)
            .in_point();

        match input.connection() {
            Some(upstream) => {
                if let Err(e) = self.hash_node(upstream.node, adjusted) {
                    tracing::warn!("Dangling edge into {}:{}: {e}", node.id(), input.id());
                }
            }
            None => {
                let value = input.value_at(adjusted);
                self.hash_value(&value, adjusted);
            }
        }
    }

    /// Mix in an unconnected value
    ///
    /// Footage is hashed by identity (file, modification time, stream)
    /// plus the exact time for time-bearing streams rather than by bytes.
    pub fn hash_value(&mut self, value: &ParamValue, time: Rational) {
        match value {
            ParamValue::Footage(stream) => self.hash_footage(stream, time),
            other => {
                let bytes = other.to_bytes();
                self.update(bytes);
            }
        }
    }

    fn hash_footage(&mut self, stream_ref: &StreamRef, time: Rational) {
        let footage = &stream_ref.footage;
        self.update(footage.filename.to_string_lossy().as_bytes());
        self.update(footage.timestamp.to_le_bytes());
        self.update((stream_ref.index as u64).to_le_bytes());

        let Some(stream) = stream_ref.stream() else {
            return;
        };
        if stream.is_picture() {
            self.update(stream.colorspace.as_bytes());
            self.update([u8::from(stream.premultiplied_alpha)]);
        }
        if matches!(stream.kind, StreamKind::Video | StreamKind::Audio) {
            self.update(format!("{}/{}", time.numerator(), time.denominator()));
            self.update(stream.start_time.to_le_bytes());
        }
    }

    /// Finish and return the digest
    pub fn finish(self) -> Digest {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.sha.finalize());
        Digest(bytes)
    }
}
