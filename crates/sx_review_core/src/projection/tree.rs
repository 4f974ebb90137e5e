//! Generic tree data-source contract for presentation layers.
//!
//! # Responsibility
//! - Address rows by `TreePath` (indices from the root).
//! - Expose typed column values and sibling/child navigation.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Path of indices from the root; depth 1 addresses a top-level row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath(Vec<usize>);

impl TreePath {
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Path of the `index`-th child of this row.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Path of the parent row; `None` for top-level rows.
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Path of the next sibling position (may not exist).
    pub fn next_sibling(&self) -> Option<Self> {
        let (last, rest) = self.0.split_last()?;
        let mut indices = rest.to_vec();
        indices.push(last + 1);
        Some(Self(indices))
    }
}

impl Display for TreePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join(":"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePathParseError(pub String);

impl Display for TreePathParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid tree path `{}`", self.0)
    }
}

impl Error for TreePathParseError {}

impl FromStr for TreePath {
    type Err = TreePathParseError;

    /// Parses `"2:0:1"`-style path strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TreePathParseError(s.to_string()));
        }
        trimmed
            .split(':')
            .map(|part| part.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
            .map_err(|_| TreePathParseError(s.to_string()))
    }
}

/// Presentation columns of the review tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Group name, instance date or variable name.
    Name,
    InstanceState,
    VariableValue,
    InstanceVisible,
    VariableVisible,
    InstanceStateSensitive,
    /// Sortable instance date key; `i64::MAX` on non-instance rows.
    InstanceDate,
}

/// Typed column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(Option<String>),
    Bool(bool),
    Int(i64),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => value.as_deref(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

/// Stable identity of one presentation row.
///
/// Survives rebuilds as long as the row position keeps existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub(crate) u64);

/// Read-only hierarchical data source.
pub trait TreeDataSource {
    /// Number of children of `parent`; `None` counts top-level rows.
    fn n_children(&self, parent: Option<&TreePath>) -> usize;

    /// Identity of the row at `path`, if it exists.
    fn row_id(&self, path: &TreePath) -> Option<RowId>;

    /// Typed value of `column` at `path`.
    fn value(&self, path: &TreePath, column: Column) -> Option<CellValue>;

    fn is_valid(&self, path: &TreePath) -> bool {
        self.row_id(path).is_some()
    }

    fn has_child(&self, path: &TreePath) -> bool {
        self.n_children(Some(path)) > 0
    }

    fn nth_child(&self, parent: Option<&TreePath>, n: usize) -> Option<TreePath> {
        if n >= self.n_children(parent) {
            return None;
        }
        Some(match parent {
            Some(parent) => parent.child(n),
            None => TreePath::root(n),
        })
    }

    fn next_sibling(&self, path: &TreePath) -> Option<TreePath> {
        let next = path.next_sibling()?;
        self.is_valid(&next).then_some(next)
    }

    fn parent(&self, path: &TreePath) -> Option<TreePath> {
        path.parent().filter(|parent| self.is_valid(parent))
    }

    fn text(&self, path: &TreePath, column: Column) -> Option<String> {
        self.value(path, column)?.as_text().map(str::to_string)
    }
}
