// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of graph commands.
//!
//! Each entry owns a command that already knows how to revert itself, so
//! stepping back and forth only replays commands against the graph.

use reel_graph::command::{CommandError, GraphCommand};
use reel_graph::NodeGraph;
use std::collections::VecDeque;
use thiserror::Error;

/// Maximum undo history depth
const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// The command failed against the graph
    #[error("Command failed: {0}")]
    Command(#[from] CommandError),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Commands applied and reverted together
#[derive(Debug)]
pub struct CommandGroup {
    /// Human-readable description
    pub description: String,
    commands: Vec<Box<dyn GraphCommand>>,
}

impl CommandGroup {
    /// Create an empty group
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            commands: Vec::new(),
        }
    }

    /// Append a command
    pub fn push(&mut self, command: impl GraphCommand + 'static) {
        self.commands.push(Box::new(command));
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the group has no commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl GraphCommand for CommandGroup {
    fn description(&self) -> String {
        self.description.clone()
    }

    /// Applies every command in order, reverting the applied prefix if one fails
    fn redo(&mut self, graph: &mut NodeGraph) -> std::result::Result<(), CommandError> {
        for i in 0..self.commands.len() {
            if let Err(e) = self.commands[i].redo(graph) {
                for done in self.commands[..i].iter_mut().rev() {
                    if let Err(undo_err) = done.undo(graph) {
                        tracing::error!("Failed to roll back {}: {undo_err}", done.description());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn undo(&mut self, graph: &mut NodeGraph) -> std::result::Result<(), CommandError> {
        for command in self.commands.iter_mut().rev() {
            command.undo(graph)?;
        }
        Ok(())
    }
}

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Box<dyn GraphCommand>>,
    redo_stack: VecDeque<Box<dyn GraphCommand>>,
    max_depth: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
        }
    }

    /// Apply a command and record it
    ///
    /// A command that fails is not recorded and the redo stack is kept.
    pub fn execute(&mut self, graph: &mut NodeGraph, command: impl GraphCommand + 'static) -> Result<()> {
        let mut command: Box<dyn GraphCommand> = Box::new(command);
        command.redo(graph)?;
        tracing::debug!("Executed {}", command.description());

        self.redo_stack.clear();
        self.undo_stack.push_back(command);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        Ok(())
    }

    /// Undo the last command
    pub fn undo(&mut self, graph: &mut NodeGraph) -> Result<String> {
        let mut command = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        if let Err(e) = command.undo(graph) {
            self.undo_stack.push_back(command);
            return Err(e.into());
        }
        let description = command.description();
        self.redo_stack.push_back(command);
        Ok(description)
    }

    /// Redo the last undone command
    pub fn redo(&mut self, graph: &mut NodeGraph) -> Result<String> {
        let mut command = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;
        if let Err(e) = command.redo(graph) {
            self.redo_stack.push_back(command);
            return Err(e.into());
        }
        let description = command.description();
        self.undo_stack.push_back(command);
        Ok(description)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            max_depth: self.max_depth,
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.description())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
