//! Caller-supplied condition, sort and projection shapes.

use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An ordered list of groups; the full where condition of a request.
pub type QueryParam = Vec<QueryGroup>;

/// `field -> "asc" | "desc"`.
pub type SortParams = BTreeMap<String, String>;

/// `field -> selected`. Fields mapped to `true` are selected.
pub type ProjectParams = BTreeMap<String, bool>;

/// A single `field -> { operator -> value }` condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryItem {
    pub group_item: BTreeMap<String, BTreeMap<String, FieldValue>>,
    pub group_item_order: i32,
    /// Link to the next item in the same group (`and` / `or`).
    pub group_item_op: String,
}

impl QueryItem {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        let mut ops = BTreeMap::new();
        ops.insert(operator.into(), value.into());
        let mut group_item = BTreeMap::new();
        group_item.insert(field.into(), ops);
        Self {
            group_item,
            group_item_order: 0,
            group_item_op: String::new(),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.group_item_order = order;
        self
    }

    pub fn link_op(mut self, op: impl Into<String>) -> Self {
        self.group_item_op = op.into();
        self
    }
}

/// An ordered group of items, rendered as one parenthesized clause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryGroup {
    pub group_name: String,
    pub group_items: Vec<QueryItem>,
    pub group_order: i32,
    /// Link to the next group (`and` / `or`).
    pub group_link_op: String,
}

impl QueryGroup {
    pub fn new(items: Vec<QueryItem>) -> Self {
        Self {
            group_items: items,
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.group_name = name.into();
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.group_order = order;
        self
    }

    pub fn link_op(mut self, op: impl Into<String>) -> Self {
        self.group_link_op = op.into();
        self
    }
}
