//! Row storage for the review projection.
//!
//! # Responsibility
//! - Rebuild the three-level row tree from a group snapshot.
//! - Reuse existing rows in place and trim trailing rows per level.
//!
//! # Invariants
//! - Row counts always match domain counts after a rebuild.
//! - A reused row keeps its `RowId`; only appended rows get fresh ids.

use crate::model::instance::{Instance, InstanceGroup, InstanceState, Variable, VariableValue};
use crate::projection::tree::{CellValue, Column, RowId, TreePath};
use chrono::Datelike;

/// Placeholder shown for variables holding no value.
pub const NEED_VALUE_LABEL: &str = "(Need Value)";

/// Depth-0 row payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub name: String,
}

/// Depth-1 row payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRow {
    pub date_label: String,
    pub state: InstanceState,
    pub date_key: i64,
}

impl InstanceRow {
    pub fn state_label(&self) -> &'static str {
        self.state.label()
    }

    pub fn state_sensitive(&self) -> bool {
        self.state.is_user_editable()
    }
}

/// Depth-2 row payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRow {
    pub name: String,
    pub value_label: String,
    pub needs_value: bool,
}

/// Row payload; the variant fixes the depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowData {
    Group(GroupRow),
    Instance(InstanceRow),
    Variable(VariableRow),
}

impl RowData {
    pub fn depth(&self) -> usize {
        match self {
            Self::Group(_) => 0,
            Self::Instance(_) => 1,
            Self::Variable(_) => 2,
        }
    }

    pub fn value(&self, column: Column) -> CellValue {
        match (self, column) {
            (Self::Group(row), Column::Name) => CellValue::Text(Some(row.name.clone())),
            (Self::Instance(row), Column::Name) => CellValue::Text(Some(row.date_label.clone())),
            (Self::Variable(row), Column::Name) => CellValue::Text(Some(row.name.clone())),

            (Self::Instance(row), Column::InstanceState) => {
                CellValue::Text(Some(row.state_label().to_string()))
            }
            (_, Column::InstanceState) => CellValue::Text(None),

            (Self::Variable(row), Column::VariableValue) => {
                CellValue::Text(Some(row.value_label.clone()))
            }
            (_, Column::VariableValue) => CellValue::Text(None),

            (_, Column::InstanceVisible) => CellValue::Bool(matches!(self, Self::Instance(_))),
            (_, Column::VariableVisible) => CellValue::Bool(matches!(self, Self::Variable(_))),

            (Self::Instance(row), Column::InstanceStateSensitive) => {
                CellValue::Bool(row.state_sensitive())
            }
            (_, Column::InstanceStateSensitive) => CellValue::Bool(false),

            (Self::Instance(row), Column::InstanceDate) => CellValue::Int(row.date_key),
            (_, Column::InstanceDate) => CellValue::Int(i64::MAX),
        }
    }

    fn for_group(group: &InstanceGroup) -> Self {
        Self::Group(GroupRow {
            name: group.sx.name.clone(),
        })
    }

    fn for_instance(instance: &Instance) -> Self {
        Self::Instance(InstanceRow {
            date_label: instance.date.format("%Y-%m-%d").to_string(),
            state: instance.state,
            date_key: i64::from(instance.date.num_days_from_ce()),
        })
    }

    fn for_variable(variable: &Variable) -> Self {
        let (value_label, needs_value) = match variable.value {
            VariableValue::Bound(amount) => (amount.to_string(), false),
            VariableValue::Unbound => (NEED_VALUE_LABEL.to_string(), true),
        };
        Self::Variable(VariableRow {
            name: variable.name.clone(),
            value_label,
            needs_value,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) id: RowId,
    pub(crate) data: RowData,
    pub(crate) children: Vec<Node>,
}

/// Three-level row tree.
#[derive(Debug, Default)]
pub struct TreeStore {
    roots: Vec<Node>,
    next_id: u64,
}

impl TreeStore {
    /// Re-derives every row from `groups`.
    pub fn rebuild(&mut self, groups: &[InstanceGroup]) {
        let mut group_count = 0;
        for group in groups.iter().filter(|group| !group.is_empty()) {
            let group_node = upsert(
                &mut self.roots,
                &mut self.next_id,
                group_count,
                RowData::for_group(group),
            );
            group_count += 1;

            let mut instance_count = 0;
            for instance in &group.instances {
                let instance_node = upsert(
                    &mut group_node.children,
                    &mut self.next_id,
                    instance_count,
                    RowData::for_instance(instance),
                );
                instance_count += 1;

                let mut variable_count = 0;
                for variable in instance.editable_variables() {
                    upsert(
                        &mut instance_node.children,
                        &mut self.next_id,
                        variable_count,
                        RowData::for_variable(variable),
                    );
                    variable_count += 1;
                }
                instance_node.children.truncate(variable_count);
            }
            group_node.children.truncate(instance_count);
        }
        self.roots.truncate(group_count);
    }

    /// Removes one top-level row and its subtree.
    pub fn remove_root(&mut self, index: usize) -> bool {
        if index >= self.roots.len() {
            return false;
        }
        self.roots.remove(index);
        true
    }

    pub(crate) fn node(&self, path: &TreePath) -> Option<&Node> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.roots.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    pub(crate) fn children(&self, parent: Option<&TreePath>) -> Option<&[Node]> {
        match parent {
            None => Some(&self.roots),
            Some(path) => self.node(path).map(|node| node.children.as_slice()),
        }
    }
}

fn upsert<'a>(
    siblings: &'a mut Vec<Node>,
    next_id: &mut u64,
    index: usize,
    data: RowData,
) -> &'a mut Node {
    if index < siblings.len() {
        let node = &mut siblings[index];
        node.data = data;
        return node;
    }

    *next_id += 1;
    siblings.push(Node {
        id: RowId(*next_id),
        data,
        children: Vec::new(),
    });
    let last = siblings.len() - 1;
    &mut siblings[last]
}
