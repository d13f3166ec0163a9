// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph evaluation and caching engine for the Reel editor.
//!
//! Every frame and audio buffer the editor shows is the output of a
//! directed acyclic graph of nodes evaluated at a time range.
//!
//! ## Architecture
//!
//! The engine is built on a small set of pieces:
//! - [`NodeGraph`] owns nodes and their edges and rejects cycles
//! - [`NodeTraverser`] pulls values through the graph, remapping time
//!   across clips and resolving deferred jobs through a backend
//! - [`NodeHasher`] computes content hashes used as cache keys
//! - Cache invalidation walks downstream, translating dirty ranges
//!   through each node's time mapping
//! - [`document`] and [`command`] provide save/load and undoable edits

pub mod cache;
pub mod command;
pub mod document;
pub mod edge;
pub mod graph;
pub mod hash;
pub mod job;
pub mod keyframe;
pub mod media;
pub mod node;
pub mod nodes;
pub mod param;
pub mod table;
pub mod traverser;
pub mod value;

pub use cache::FrameCache;
pub use command::{CommandError, GraphCommand};
pub use document::{DocumentError, Element};
pub use edge::{InputRef, NodeEdge, OutputRef};
pub use graph::{GraphError, GraphEvent, NodeGraph, SharedGraph, TransformDirection};
pub use hash::{Digest, NodeHasher};
pub use keyframe::{InterpolationMode, NodeKeyframe};
pub use node::{Node, NodeCategory, NodeId, NodeKind, NodeRegistry, NodeType};
pub use param::{NodeInput, NodeOutput, NodeParam};
pub use table::{NodeValue, NodeValueDatabase, NodeValueTable};
pub use traverser::{CancelFlag, NodeTraverser, Traversal, TraverserBackend};
pub use value::{Color, DataType, ParamValue};
