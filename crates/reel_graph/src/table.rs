// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-evaluation scratch tables.
//!
//! A traversal resolves every input of a node into a [`NodeValueTable`]
//! and collects them in a [`NodeValueDatabase`] keyed by input id. Both
//! exist only for the duration of one traversal call.

use crate::node::NodeId;
use crate::param::NodeInput;
use crate::value::{DataType, ParamValue};
use indexmap::IndexMap;
use reel_time::{Rational, TimeRange};
use std::ops::{Index, IndexMut};

/// Id of the table that carries the requested time
pub const GLOBAL_TABLE: &str = "global";

/// Tag of the requested range's in point in the global table
pub const TIME_IN_TAG: &str = "time_in";

/// Tag of the requested range's out point in the global table
pub const TIME_OUT_TAG: &str = "time_out";

/// A single typed result annotated with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValue {
    data_type: DataType,
    data: ParamValue,
    source: Option<NodeId>,
    tag: String,
}

impl NodeValue {
    /// Create a value
    pub fn new(data_type: DataType, data: ParamValue, source: Option<NodeId>) -> Self {
        Self {
            data_type,
            data,
            source,
            tag: String::new(),
        }
    }

    /// Create a value typed after its payload
    pub fn from_data(data: ParamValue, source: Option<NodeId>) -> Self {
        Self::new(data.data_type(), data, source)
    }

    /// Attach a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Type tag
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Payload
    pub fn data(&self) -> &ParamValue {
        &self.data
    }

    /// Consume into the payload
    pub fn into_data(self) -> ParamValue {
        self.data
    }

    /// Node that produced this value
    pub fn source(&self) -> Option<NodeId> {
        self.source
    }

    /// Optional tag, empty when unset
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replace the payload, keeping provenance and tag
    pub fn with_data(self, data: ParamValue) -> Self {
        Self {
            data_type: data.data_type(),
            data,
            ..self
        }
    }
}

/// Ordered stack of values accumulated while evaluating one input
///
/// Later entries take precedence: lookups scan from the most recently
/// pushed value backwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeValueTable {
    values: Vec<NodeValue>,
}

impl NodeValueTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the most relevant entry for a type and optional tag
    ///
    /// Prefers the most recent entry matching both. If a tag was requested
    /// and nothing carries it, falls back to the most recent type match.
    fn find(&self, data_type: DataType, tag: &str) -> Option<usize> {
        let mut fallback = None;
        for (i, v) in self.values.iter().enumerate().rev() {
            if !v.data_type.matches(data_type) {
                continue;
            }
            if tag.is_empty() || v.tag == tag {
                return Some(i);
            }
            fallback.get_or_insert(i);
        }
        fallback
    }

    /// Most relevant payload for a type, `None` if absent
    pub fn get(&self, data_type: DataType) -> Option<&ParamValue> {
        self.get_tagged(data_type, "")
    }

    /// Most relevant payload for a type and tag
    pub fn get_tagged(&self, data_type: DataType, tag: &str) -> Option<&ParamValue> {
        self.get_with_meta(data_type, tag).map(NodeValue::data)
    }

    /// Most relevant entry for a type and tag, with provenance
    pub fn get_with_meta(&self, data_type: DataType, tag: &str) -> Option<&NodeValue> {
        self.find(data_type, tag).map(|i| &self.values[i])
    }

    /// Remove and return the most relevant payload for a type
    pub fn take(&mut self, data_type: DataType) -> Option<ParamValue> {
        self.take_with_meta(data_type, "").map(NodeValue::into_data)
    }

    /// Remove and return the most relevant entry for a type and tag
    pub fn take_with_meta(&mut self, data_type: DataType, tag: &str) -> Option<NodeValue> {
        self.find(data_type, tag).map(|i| self.values.remove(i))
    }

    /// Push a value on top
    pub fn push(&mut self, value: NodeValue) {
        self.values.push(value);
    }

    /// Push a payload on top
    pub fn push_data(&mut self, data: ParamValue, source: Option<NodeId>) {
        self.push(NodeValue::from_data(data, source));
    }

    /// Insert a value at the bottom, lowest precedence
    pub fn prepend(&mut self, value: NodeValue) {
        self.values.insert(0, value);
    }

    /// Entry at a position, bottom first
    pub fn at(&self, index: usize) -> Option<&NodeValue> {
        self.values.get(index)
    }

    /// Remove the entry at a position
    pub fn take_at(&mut self, index: usize) -> Option<NodeValue> {
        (index < self.values.len()).then(|| self.values.remove(index))
    }

    /// Whether any entry matches a type
    pub fn has(&self, data_type: DataType) -> bool {
        self.values.iter().any(|v| v.data_type.matches(data_type))
    }

    /// Remove the first entry equal to `value`
    pub fn remove(&mut self, value: &NodeValue) {
        if let Some(i) = self.values.iter().position(|v| v == value) {
            self.values.remove(i);
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries bottom first
    pub fn iter(&self) -> std::slice::Iter<'_, NodeValue> {
        self.values.iter()
    }

    /// Mutable entries bottom first
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, NodeValue> {
        self.values.iter_mut()
    }

    /// Keep only entries matching a predicate
    pub fn retain(&mut self, f: impl FnMut(&NodeValue) -> bool) {
        self.values.retain(f);
    }

    /// Concatenate tables in order
    ///
    /// Relative order inside each table is kept, so entries from a later
    /// table take precedence on lookup.
    pub fn merge<I>(tables: I) -> NodeValueTable
    where
        I: IntoIterator<Item = NodeValueTable>,
    {
        let values = tables.into_iter().flat_map(|t| t.values).collect();
        NodeValueTable { values }
    }
}

impl FromIterator<NodeValue> for NodeValueTable {
    fn from_iter<I: IntoIterator<Item = NodeValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for NodeValueTable {
    type Item = NodeValue;
    type IntoIter = std::vec::IntoIter<NodeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Resolved tables of every input of one node for one evaluation
#[derive(Debug, Clone, Default)]
pub struct NodeValueDatabase {
    tables: IndexMap<String, NodeValueTable>,
}

impl NodeValueDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database whose global table carries `range`
    pub fn for_time(range: TimeRange) -> Self {
        let mut db = Self::new();
        let global = db.table_mut(GLOBAL_TABLE);
        global.push(NodeValue::from_data(range.in_point().into(), None).with_tag(TIME_IN_TAG));
        global.push(NodeValue::from_data(range.out_point().into(), None).with_tag(TIME_OUT_TAG));
        db
    }

    /// Requested time range, if the global table carries one
    pub fn time(&self) -> Option<TimeRange> {
        let global = self.tables.get(GLOBAL_TABLE)?;
        let read = |tag| -> Option<Rational> {
            global
                .get_with_meta(DataType::Rational, tag)
                .filter(|v| v.tag() == tag)
                .and_then(|v| v.data().as_rational().ok())
        };
        Some(TimeRange::new(read(TIME_IN_TAG)?, read(TIME_OUT_TAG)?))
    }

    /// Table for an input id, if present
    pub fn get(&self, input_id: &str) -> Option<&NodeValueTable> {
        self.tables.get(input_id)
    }

    /// Table for an input id, created empty if absent
    pub fn table_mut(&mut self, input_id: &str) -> &mut NodeValueTable {
        self.tables.entry(input_id.to_string()).or_default()
    }

    /// Replace the table for an input id
    pub fn insert(&mut self, input_id: impl Into<String>, table: NodeValueTable) {
        self.tables.insert(input_id.into(), table);
    }

    /// Whether a table exists for an input id
    pub fn contains(&self, input_id: &str) -> bool {
        self.tables.contains_key(input_id)
    }

    /// Input ids and tables in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeValueTable)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge every input table except the global one, in insertion order
    pub fn merge(&self) -> NodeValueTable {
        NodeValueTable::merge(
            self.tables
                .iter()
                .filter(|(id, _)| id.as_str() != GLOBAL_TABLE)
                .map(|(_, t)| t.clone()),
        )
    }
}

static EMPTY_TABLE: NodeValueTable = NodeValueTable { values: Vec::new() };

impl Index<&str> for NodeValueDatabase {
    type Output = NodeValueTable;

    /// Unknown ids read as an empty table
    fn index(&self, input_id: &str) -> &NodeValueTable {
        self.tables.get(input_id).unwrap_or(&EMPTY_TABLE)
    }
}

impl Index<&NodeInput> for NodeValueDatabase {
    type Output = NodeValueTable;

    fn index(&self, input: &NodeInput) -> &NodeValueTable {
        &self[input.id()]
    }
}

impl IndexMut<&str> for NodeValueDatabase {
    fn index_mut(&mut self, input_id: &str) -> &mut NodeValueTable {
        self.table_mut(input_id)
    }
}

impl IndexMut<&NodeInput> for NodeValueDatabase {
    fn index_mut(&mut self, input: &NodeInput) -> &mut NodeValueTable {
        self.table_mut(input.id())
    }
}
