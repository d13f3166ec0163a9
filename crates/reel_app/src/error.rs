// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error type for the command-line front end.

use crate::history::HistoryError;
use reel_graph::document::DocumentError;
use reel_graph::GraphError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a `reel` command
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings or project file is not valid RON
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser error with position
        source: ron::error::SpannedError,
    },

    /// A value could not be encoded as RON
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// JSON report encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Replacing the destination file failed
    #[error("Failed to replace file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Project document error
    #[error("Project error: {0}")]
    Document(#[from] DocumentError),

    /// Graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Undo history error
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Image export failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// No node matched a command-line selector
    #[error("No node labelled {0:?}")]
    NodeNotFound(String),

    /// The graph has no output node to default to
    #[error("Project has no output node")]
    NoOutput,

    /// Rejected command-line argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Worker pool could not be created
    #[error("Failed to build render pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for app operations
pub type Result<T> = std::result::Result<T, AppError>;
