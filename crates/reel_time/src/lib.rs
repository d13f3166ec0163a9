// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exact time arithmetic for the Reel editor.
//!
//! This crate provides the time foundation every other engine crate
//! builds on:
//! - [`Rational`] timestamps that never drift over long timelines
//! - [`TimeRange`] intervals with lenient, self-normalizing construction
//! - [`TimeRangeList`] coalesced dirty regions for cache invalidation

pub mod range;
pub mod range_list;
pub mod rational;

pub use range::TimeRange;
pub use range_list::TimeRangeList;
pub use rational::{Rational, RationalError};
