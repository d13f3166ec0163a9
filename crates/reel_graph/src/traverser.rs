// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive evaluation of a node's output at a time range.
//!
//! A [`NodeTraverser`] walks from a root node upstream, resolving each
//! input into a [`NodeValueDatabase`] and calling the node's `value` on the
//! way back down. Footage and job values are handed to a pluggable
//! [`TraverserBackend`]. Expected failures (missing decoder, unreadable
//! media) degrade the affected entry to nothing; only cancellation changes
//! the shape of the result.

use crate::graph::NodeGraph;
use crate::job::{GenerateJob, SampleJob, ShaderJob};
use crate::media::{Frame, SampleBuffer, StreamRef, VideoParams};
use crate::node::{Node, NodeId};
use crate::param::NodeInput;
use crate::table::{NodeValue, NodeValueDatabase, NodeValueTable};
use crate::value::ParamValue;
use rayon::prelude::*;
use reel_time::{Rational, TimeRange};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of a traversal: a result, or an explicit cancellation
#[derive(Debug, Clone, PartialEq)]
pub enum Traversal<T> {
    /// Evaluation finished; the value may still be empty
    Complete(T),
    /// Evaluation stopped before completion
    Cancelled,
}

impl<T> Traversal<T> {
    /// Whether the traversal was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The completed value, if any
    pub fn complete(self) -> Option<T> {
        match self {
            Self::Complete(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    /// Map the completed value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Traversal<U> {
        match self {
            Self::Complete(value) => Traversal::Complete(f(value)),
            Self::Cancelled => Traversal::Cancelled,
        }
    }
}

/// Reasons a footage or job value could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No decoder for this kind of stream
    #[error("No decoder for {0}")]
    NoDecoder(String),

    /// The media file could not be read
    #[error("Unreadable media {path:?}: {reason}")]
    Unreadable {
        /// File path
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// The operation was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// The backend cannot run this job
    #[error("Unsupported job: {0}")]
    Unsupported(String),
}

/// Decoding and rendering collaborator used to resolve footage and jobs
///
/// Returning `Ok(None)` from a job method leaves the job in the table for
/// a later consumer; an error drops the entry.
pub trait TraverserBackend: Send + Sync {
    /// Resolution of generated and decoded frames
    fn video_params(&self) -> VideoParams {
        VideoParams::default()
    }

    /// Decode the picture of a stream at an exact time
    fn decode_frame(&self, stream: &StreamRef, _time: Rational) -> Result<Frame, ResolveError> {
        Err(ResolveError::NoDecoder(stream.footage.filename.display().to_string()))
    }

    /// Decode a stream's audio over a range
    fn decode_samples(&self, stream: &StreamRef, _range: TimeRange) -> Result<SampleBuffer, ResolveError> {
        Err(ResolveError::NoDecoder(stream.footage.filename.display().to_string()))
    }

    /// Run a shader job
    fn run_shader(&self, _node: &Node, _range: TimeRange, _job: &ShaderJob) -> Result<Option<Frame>, ResolveError> {
        Ok(None)
    }

    /// Run a sample job through the producing node
    fn run_samples(&self, node: &Node, _range: TimeRange, job: &SampleJob) -> Result<Option<SampleBuffer>, ResolveError> {
        Ok(node.kind().process_samples(node, job))
    }

    /// Generate a frame through the producing node
    fn generate(&self, node: &Node, _range: TimeRange, job: &GenerateJob) -> Result<Option<Frame>, ResolveError> {
        let params = self.video_params();
        let mut frame = Frame::new(params.width, params.height);
        node.kind().generate_frame(node, &mut frame, job);
        Ok(Some(frame))
    }
}

/// Backend without decoders or a renderer
///
/// Footage resolves to nothing, shader jobs stay as descriptions, sample
/// and generate jobs run through their nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackend;

impl TraverserBackend for DefaultBackend {}

/// Counters for one traverser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Nodes whose `value` ran
    pub nodes_evaluated: usize,
    /// Lookups answered from the per-traversal memo
    pub memo_hits: usize,
    /// Footage or job entries dropped after a resolution failure
    pub resolve_failures: usize,
}

/// Evaluates nodes of one graph
pub struct NodeTraverser<'g> {
    graph: &'g NodeGraph,
    backend: &'g dyn TraverserBackend,
    cancel: CancelFlag,
    memoize: bool,
    memo: HashMap<(NodeId, TimeRange), NodeValueTable>,
    stats: TraversalStats,
}

impl<'g> NodeTraverser<'g> {
    /// Create a memoizing traverser
    pub fn new(graph: &'g NodeGraph, backend: &'g dyn TraverserBackend) -> Self {
        Self {
            graph,
            backend,
            cancel: CancelFlag::new(),
            memoize: true,
            memo: HashMap::new(),
            stats: TraversalStats::default(),
        }
    }

    /// Observe a cancellation flag
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enable or disable memoization by (node, range)
    pub fn with_memoization(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Counters so far
    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Forget memoized tables
    pub fn clear_memo(&mut self) {
        self.memo.clear();
    }

    /// Evaluate a node's output over a range
    ///
    /// An unknown node evaluates to an empty table.
    pub fn generate_table(&mut self, node: NodeId, range: TimeRange) -> Traversal<NodeValueTable> {
        if self.cancel.is_cancelled() {
            return Traversal::Cancelled;
        }
        if let Some(table) = self.memo.get(&(node, range)) {
            self.stats.memo_hits += 1;
            return Traversal::Complete(table.clone());
        }

        let graph = self.graph;
        let Some(n) = graph.node(node) else {
            tracing::warn!("Traversal reached unknown node {node}");
            return Traversal::Complete(NodeValueTable::new());
        };

        let Traversal::Complete(mut db) = self.generate_database(n, range) else {
            return Traversal::Cancelled;
        };
        let mut table = n.kind().value(n, &mut db);
        self.stats.nodes_evaluated += 1;

        let Traversal::Complete(()) = self.resolve_jobs(n, range, &mut table) else {
            return Traversal::Cancelled;
        };

        if self.memoize {
            self.memo.insert((node, range), table.clone());
        }
        Traversal::Complete(table)
    }

    /// Resolve every input of a node into a fresh database
    pub fn generate_database(&mut self, node: &Node, range: TimeRange) -> Traversal<NodeValueDatabase> {
        let mut db = NodeValueDatabase::for_time(range);

        for input in node.inputs() {
            if !node.kind().should_process_input(node, input.id(), range) {
                continue;
            }

            let table = if input.is_array() {
                let mut tables = Vec::with_capacity(input.array_size());
                for sub in input.sub_inputs() {
                    let Traversal::Complete(t) = self.process_input(node, sub, range) else {
                        return Traversal::Cancelled;
                    };
                    db.insert(sub.id(), t.clone());
                    tables.push(t);
                }
                NodeValueTable::merge(tables)
            } else {
                let Traversal::Complete(t) = self.process_input(node, input, range) else {
                    return Traversal::Cancelled;
                };
                t
            };
            db.insert(input.id(), table);
        }

        Traversal::Complete(db)
    }

    fn process_input(&mut self, node: &Node, input: &NodeInput, range: TimeRange) -> Traversal<NodeValueTable> {
        let adjusted = node.kind().input_time_adjustment(node, input.id(), range);

        if let Some(upstream) = input.connection() {
            return self.generate_table(upstream.node, adjusted);
        }

        let value = input.value_at(adjusted.in_point());
        let mut table = NodeValueTable::new();
        if !value.is_none() {
            let found = value.data_type();
            let data_type = if found.matches(input.data_type()) {
                found
            } else {
                input.data_type()
            };
            table.push(NodeValue::new(data_type, value, Some(node.id())).with_tag(input.id()));
        }
        Traversal::Complete(table)
    }

    fn resolve_jobs(&mut self, node: &Node, range: TimeRange, table: &mut NodeValueTable) -> Traversal<()> {
        let graph = self.graph;
        let mut resolved = Vec::with_capacity(table.len());

        for entry in std::mem::take(table) {
            if !entry.data_type().is_job() {
                resolved.push(entry);
                continue;
            }
            if self.cancel.is_cancelled() {
                return Traversal::Cancelled;
            }

            // Jobs passed through unresolved still belong to the node that made them
            let source = entry.source().and_then(|id| graph.node(id)).unwrap_or(node);
            match self.resolve_value(source, range, entry.data()) {
                Ok(Some(data)) => resolved.push(entry.with_data(data)),
                Ok(None) => resolved.push(entry),
                Err(ResolveError::Cancelled) => return Traversal::Cancelled,
                Err(e) => {
                    tracing::warn!("Dropping {:?} from {}: {e}", entry.data_type(), source.display_name());
                    self.stats.resolve_failures += 1;
                }
            }
        }

        *table = resolved.into_iter().collect();
        Traversal::Complete(())
    }

    fn resolve_value(&self, node: &Node, range: TimeRange, value: &ParamValue) -> Result<Option<ParamValue>, ResolveError> {
        let backend = self.backend;
        match value {
            ParamValue::Footage(stream) => {
                let kind = stream
                    .stream()
                    .map(|s| s.kind)
                    .ok_or_else(|| ResolveError::NoDecoder(format!("stream {}", stream.index)))?;
                if matches!(kind, crate::media::StreamKind::Audio) {
                    let samples = backend.decode_samples(stream, range)?;
                    Ok(Some(ParamValue::Samples(Arc::new(samples))))
                } else {
                    let frame = backend.decode_frame(stream, range.in_point())?;
                    Ok(Some(ParamValue::Texture(Arc::new(frame))))
                }
            }
            ParamValue::ShaderJob(job) => Ok(backend
                .run_shader(node, range, job)?
                .map(|f| ParamValue::Texture(Arc::new(f)))),
            ParamValue::SampleJob(job) => Ok(backend
                .run_samples(node, range, job)?
                .map(|s| ParamValue::Samples(Arc::new(s)))),
            ParamValue::GenerateJob(job) => Ok(backend
                .generate(node, range, job)?
                .map(|f| ParamValue::Texture(Arc::new(f)))),
            _ => Ok(None),
        }
    }
}

/// Evaluate one node over many ranges in parallel
///
/// Each range gets its own traverser, so memoization is per range. The
/// caller must hold the graph immutably for the whole call, e.g. under a
/// [`SharedGraph`](crate::graph::SharedGraph) read lock.
pub fn evaluate_many(
    graph: &NodeGraph,
    backend: &dyn TraverserBackend,
    node: NodeId,
    ranges: &[TimeRange],
    cancel: &CancelFlag,
) -> Vec<Traversal<NodeValueTable>> {
    ranges
        .par_iter()
        .map(|range| {
            NodeTraverser::new(graph, backend)
                .with_cancel(cancel.clone())
                .generate_table(node, *range)
        })
        .collect()
}
