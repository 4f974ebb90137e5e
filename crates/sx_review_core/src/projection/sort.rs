//! Presentation ordering for the review tree.
//!
//! # Responsibility
//! - Provide the "by occurrence" and "by status" top-level comparators.
//! - Keep a top-level permutation (`SortProxy`) and convert paths between
//!   the sorted view and the projection.
//!
//! # Invariants
//! - Comparators only order depth-1 paths; deeper rows compare equal and
//!   keep projection order.
//! - Name ties fall back to the raw string, so both comparators are total.

use crate::model::preferences::{SortColumn, SortOrder};
use crate::projection::tree::{Column, TreeDataSource, TreePath};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Accent- and case-insensitive collation key.
pub fn collation_key(value: &str) -> String {
    value
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compares display strings; identical keys fall back to code-point order.
pub fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collate_optional(a: Option<String>, b: Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => collate(&a, &b),
        (a, b) => a.cmp(&b),
    }
}

fn compare_names<S: TreeDataSource + ?Sized>(source: &S, a: &TreePath, b: &TreePath) -> Ordering {
    collate_optional(source.text(a, Column::Name), source.text(b, Column::Name))
}

/// Rows with children sort before childless rows.
fn compare_child_presence<S: TreeDataSource + ?Sized>(
    source: &S,
    a: &TreePath,
    b: &TreePath,
) -> Ordering {
    source.has_child(b).cmp(&source.has_child(a))
}

/// Orders groups by presence of instances, then earliest instance date, then
/// name.
pub fn compare_by_occurrence<S: TreeDataSource + ?Sized>(
    source: &S,
    a: &TreePath,
    b: &TreePath,
) -> Ordering {
    if a.depth() != 1 || b.depth() != 1 {
        return Ordering::Equal;
    }

    let mut ordering = compare_child_presence(source, a, b);
    if ordering == Ordering::Equal && source.has_child(a) {
        let earliest = |path: &TreePath| {
            (0..source.n_children(Some(path)))
                .filter_map(|index| {
                    source
                        .value(&path.child(index), Column::InstanceDate)
                        .and_then(|value| value.as_int())
                })
                .min()
                .unwrap_or(i64::MAX)
        };
        ordering = earliest(a).cmp(&earliest(b));
    }
    ordering.then_with(|| compare_names(source, a, b))
}

/// Orders groups by presence of instances, then the first instance's status
/// label, then name.
pub fn compare_by_status<S: TreeDataSource + ?Sized>(
    source: &S,
    a: &TreePath,
    b: &TreePath,
) -> Ordering {
    if a.depth() != 1 || b.depth() != 1 {
        return Ordering::Equal;
    }

    let mut ordering = compare_child_presence(source, a, b);
    if ordering == Ordering::Equal && source.has_child(a) {
        ordering = collate_optional(
            source.text(&a.child(0), Column::InstanceState),
            source.text(&b.child(0), Column::InstanceState),
        );
    }
    ordering.then_with(|| compare_names(source, a, b))
}

/// Comparator keyed by sort column.
pub fn compare_by<S: TreeDataSource + ?Sized>(
    column: SortColumn,
    source: &S,
    a: &TreePath,
    b: &TreePath,
) -> Ordering {
    match column {
        SortColumn::Transaction => compare_by_occurrence(source, a, b),
        SortColumn::Status => compare_by_status(source, a, b),
    }
}

/// Top-level permutation layered over a tree data source.
///
/// Only depth-1 rows are reordered; instance and variable rows keep
/// projection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortProxy {
    column: SortColumn,
    order: SortOrder,
    /// `view index -> projection index` for top-level rows.
    permutation: Vec<usize>,
}

impl SortProxy {
    pub fn new<S: TreeDataSource + ?Sized>(source: &S, column: SortColumn, order: SortOrder) -> Self {
        let mut proxy = Self {
            column,
            order,
            permutation: Vec::new(),
        };
        proxy.resort(source);
        proxy
    }

    pub fn column(&self) -> SortColumn {
        self.column
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Changes the sort key and re-sorts.
    pub fn set_sort<S: TreeDataSource + ?Sized>(
        &mut self,
        source: &S,
        column: SortColumn,
        order: SortOrder,
    ) {
        self.column = column;
        self.order = order;
        self.resort(source);
    }

    /// Recomputes the permutation after the source changed.
    pub fn resort<S: TreeDataSource + ?Sized>(&mut self, source: &S) {
        let column = self.column;
        let ascending = self.order.is_ascending();
        let mut permutation = (0..source.n_children(None)).collect::<Vec<_>>();
        permutation.sort_by(|a, b| {
            let ordering = compare_by(column, source, &TreePath::root(*a), &TreePath::root(*b));
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        self.permutation = permutation;
    }

    pub fn len(&self) -> usize {
        self.permutation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permutation.is_empty()
    }

    /// Maps a sorted-view path to the projection path.
    pub fn view_to_child(&self, view: &TreePath) -> Option<TreePath> {
        let (first, rest) = view.indices().split_first()?;
        let child_root = *self.permutation.get(*first)?;
        let mut indices = Vec::with_capacity(view.depth());
        indices.push(child_root);
        indices.extend_from_slice(rest);
        Some(TreePath::new(indices))
    }

    /// Maps a projection path to its sorted-view path.
    pub fn child_to_view(&self, child: &TreePath) -> Option<TreePath> {
        let (first, rest) = child.indices().split_first()?;
        let view_root = self.permutation.iter().position(|index| index == first)?;
        let mut indices = Vec::with_capacity(child.depth());
        indices.push(view_root);
        indices.extend_from_slice(rest);
        Some(TreePath::new(indices))
    }
}

#[cfg(test)]
mod tests {
    use super::{collate, compare_by_occurrence, compare_by_status, SortProxy};
    use crate::model::preferences::{SortColumn, SortOrder};
    use crate::projection::tree::{CellValue, Column, RowId, TreeDataSource, TreePath};
    use std::cmp::Ordering;

    struct FakeTree {
        groups: Vec<(&'static str, Vec<(i64, &'static str)>)>,
    }

    impl TreeDataSource for FakeTree {
        fn n_children(&self, parent: Option<&TreePath>) -> usize {
            match parent.map(TreePath::indices) {
                None => self.groups.len(),
                Some([group]) => self.groups.get(*group).map_or(0, |(_, rows)| rows.len()),
                Some(_) => 0,
            }
        }

        fn row_id(&self, path: &TreePath) -> Option<RowId> {
            match path.indices() {
                [group] => self.groups.get(*group).map(|_| RowId(*group as u64)),
                [group, instance] => self
                    .groups
                    .get(*group)
                    .and_then(|(_, rows)| rows.get(*instance))
                    .map(|_| RowId(1000 + *instance as u64)),
                _ => None,
            }
        }

        fn value(&self, path: &TreePath, column: Column) -> Option<CellValue> {
            match (path.indices(), column) {
                ([group], Column::Name) => self
                    .groups
                    .get(*group)
                    .map(|(name, _)| CellValue::Text(Some(name.to_string()))),
                ([group, instance], Column::InstanceDate) => self
                    .groups
                    .get(*group)?
                    .1
                    .get(*instance)
                    .map(|(date, _)| CellValue::Int(*date)),
                ([group, instance], Column::InstanceState) => self
                    .groups
                    .get(*group)?
                    .1
                    .get(*instance)
                    .map(|(_, label)| CellValue::Text(Some(label.to_string()))),
                _ => None,
            }
        }
    }

    fn fixture() -> FakeTree {
        FakeTree {
            groups: vec![
                ("rent", vec![(20, "To-Create")]),
                ("Électricité", vec![(10, "Reminder")]),
                ("Water", vec![(10, "To-Create")]),
                ("empty", vec![]),
                ("Gym", vec![(10, "Ignored"), (5, "To-Create")]),
                ("insurance", vec![(30, "Postponed")]),
                ("Alarm", vec![]),
            ],
        }
    }

    fn names(tree: &FakeTree, proxy: &SortProxy) -> Vec<&'static str> {
        (0..proxy.len())
            .map(|view| {
                let child = proxy.view_to_child(&TreePath::root(view)).unwrap();
                tree.groups[child.indices()[0]].0
            })
            .collect()
    }

    #[test]
    fn collation_ignores_case_and_accents() {
        assert!(collate("electricite", "Électricité").is_ne());
        assert_eq!(collate("Électricité", "Gym"), Ordering::Less);
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("same", "same"), Ordering::Equal);
    }

    #[test]
    fn occurrence_orders_by_earliest_date_then_name() {
        let tree = fixture();
        let proxy = SortProxy::new(&tree, SortColumn::Transaction, SortOrder::Ascending);
        // Gym's second instance (5) is its earliest.
        assert_eq!(
            names(&tree, &proxy),
            vec!["Gym", "Électricité", "Water", "rent", "insurance", "Alarm", "empty"]
        );
    }

    #[test]
    fn status_orders_by_first_state_label_then_name() {
        let tree = fixture();
        let proxy = SortProxy::new(&tree, SortColumn::Status, SortOrder::Ascending);
        assert_eq!(
            names(&tree, &proxy),
            vec!["Gym", "insurance", "Électricité", "rent", "Water", "Alarm", "empty"]
        );
    }

    #[test]
    fn comparators_are_total_orders() {
        let tree = fixture();
        let paths = (0..tree.groups.len()).map(TreePath::root).collect::<Vec<_>>();
        for compare in [
            compare_by_occurrence::<FakeTree>,
            compare_by_status::<FakeTree>,
        ] {
            for a in &paths {
                assert_eq!(compare(&tree, a, a), Ordering::Equal);
                for b in &paths {
                    assert_eq!(compare(&tree, a, b), compare(&tree, b, a).reverse());
                    for c in &paths {
                        if compare(&tree, a, b).is_le() && compare(&tree, b, c).is_le() {
                            assert!(compare(&tree, a, c).is_le());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn deeper_paths_compare_equal() {
        let tree = fixture();
        let a = TreePath::new(vec![4, 0]);
        let b = TreePath::new(vec![4, 1]);
        assert_eq!(compare_by_occurrence(&tree, &a, &b), Ordering::Equal);
        assert_eq!(compare_by_status(&tree, &a, &b), Ordering::Equal);
    }

    #[test]
    fn descending_reverses_and_paths_convert_both_ways() {
        let tree = fixture();
        let proxy = SortProxy::new(&tree, SortColumn::Transaction, SortOrder::Descending);
        assert_eq!(names(&tree, &proxy)[0], "empty");

        for view in 0..proxy.len() {
            let view_path = TreePath::new(vec![view, 0]);
            let child = proxy.view_to_child(&view_path).unwrap();
            assert_eq!(proxy.child_to_view(&child), Some(view_path));
        }
        assert!(proxy.view_to_child(&TreePath::root(99)).is_none());
    }
}
