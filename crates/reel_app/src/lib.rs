// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application layer of the Reel engine.
//!
//! Wraps the node graph with what a front end needs: engine settings,
//! project files, an undo history, a CPU rendering backend and a cached
//! parallel renderer. The `reel` binary is a thin CLI over this crate.

pub mod backend;
pub mod error;
pub mod history;
pub mod project;
pub mod render;
pub mod settings;

pub use error::{AppError, Result};
