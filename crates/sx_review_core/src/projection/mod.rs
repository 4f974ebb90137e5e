//! Hierarchical projection of an instance collection.
//!
//! # Responsibility
//! - Mirror groups → instances → editable variables as presentation rows.
//! - Stay in sync through collection events (`added`/`updated` rebuild,
//!   `removing` drops one subtree).
//! - Resolve presentation paths back to live collection positions.
//!
//! # Invariants
//! - The projection is always in collection order; sorting is layered
//!   outside (`sort::SortProxy`).
//! - Path lookups are recomputed from the live collection on every call and
//!   are depth-checked: a wrong depth yields `None`, never a parent object.
//! - Groups with zero instances are neither projected nor counted by path
//!   indices.

pub mod sort;
pub mod store;
pub mod tree;

use crate::collection::events::{
    BlockGuard, CollectionEvent, CollectionListener, EventKind, Subscription,
};
use crate::collection::InstanceCollection;
use crate::model::instance::{InstanceGroup, InstanceKey, VariableNeeded};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use store::{RowData, TreeStore};
use tree::{CellValue, Column, RowId, TreeDataSource, TreePath};

/// Domain position addressed by one projection row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTarget {
    Group { group_index: usize },
    Instance(InstanceKey),
    Variable(VariableTarget),
}

/// Editable variable addressed by a depth-3 path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableTarget {
    pub instance: InstanceKey,
    pub editable_index: usize,
    pub name: String,
}

/// Listener half of the projection: owns the rows.
#[derive(Debug, Default)]
struct ProjectionRows {
    store: RefCell<TreeStore>,
    refresh_count: Cell<usize>,
    /// Bumped on every row change, rebuild or removal.
    generation: Cell<u64>,
}

impl ProjectionRows {
    fn rebuild(&self, groups: &[InstanceGroup]) {
        self.store.borrow_mut().rebuild(groups);
        self.refresh_count.set(self.refresh_count.get() + 1);
        self.bump_generation();
    }

    fn bump_generation(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    fn remove_group(&self, event: &CollectionEvent, groups: &[InstanceGroup]) {
        let sx_id = event.sx_id();
        let Some(raw_index) = groups.iter().position(|group| group.sx.id == sx_id) else {
            warn!("event=projection_remove module=projection status=error reason=unknown_group sx={sx_id}");
            return;
        };
        if groups[raw_index].is_empty() {
            return;
        }

        let row_index = groups[..raw_index]
            .iter()
            .filter(|group| !group.is_empty())
            .count();
        if self.store.borrow_mut().remove_root(row_index) {
            self.bump_generation();
        } else {
            warn!(
                "event=projection_remove module=projection status=error reason=missing_row index={row_index}"
            );
        }
    }
}

impl CollectionListener for ProjectionRows {
    fn on_event(&self, event: &CollectionEvent, groups: &[InstanceGroup]) {
        debug!(
            "event=projection_sync module=projection status=start kind={} sx={}",
            event.kind(),
            event.sx_id()
        );
        match event {
            CollectionEvent::Added(_) | CollectionEvent::Updated(_) => self.rebuild(groups),
            CollectionEvent::Removing(_) => self.remove_group(event, groups),
        }
    }
}

/// Three-level review tree bound to one collection for its lifetime.
pub struct ReviewProjection<C: InstanceCollection> {
    collection: Rc<RefCell<C>>,
    rows: Rc<ProjectionRows>,
    subscription: Subscription,
}

impl<C: InstanceCollection> ReviewProjection<C> {
    /// Builds the rows and subscribes to collection changes.
    pub fn new(collection: Rc<RefCell<C>>) -> Self {
        let rows = Rc::new(ProjectionRows::default());
        let listener: Rc<dyn CollectionListener> = rows.clone();
        let subscription = {
            let mut source = collection.borrow_mut();
            rows.rebuild(source.groups());
            source.subscribe(Rc::downgrade(&listener))
        };
        Self {
            collection,
            rows,
            subscription,
        }
    }

    pub fn collection(&self) -> &Rc<RefCell<C>> {
        &self.collection
    }

    /// Re-derives every row from the current collection snapshot.
    pub fn refresh(&self) {
        let source = self.collection.borrow();
        self.rows.rebuild(source.groups());
    }

    /// Number of full rebuilds since creation, including the initial one.
    pub fn refresh_count(&self) -> usize {
        self.rows.refresh_count.get()
    }

    /// Changes whenever rows are rebuilt or removed.
    ///
    /// Layers that cache row positions compare this to detect staleness.
    pub fn generation(&self) -> u64 {
        self.rows.generation.get()
    }

    /// Stops `updated` rebuilds until the guard is dropped.
    pub fn suppress_updates(&self) -> BlockGuard<'_> {
        self.subscription.block(EventKind::Updated)
    }

    /// Payload of the row at `path`.
    pub fn row_data(&self, path: &TreePath) -> Option<RowData> {
        self.rows
            .store
            .borrow()
            .node(path)
            .map(|node| node.data.clone())
    }

    /// Resolves any path to the domain position it addresses.
    pub fn row_at(&self, path: &TreePath) -> Option<RowTarget> {
        match path.depth() {
            1 => self
                .group_at(path)
                .map(|group_index| RowTarget::Group { group_index }),
            2 => self.instance_at(path).map(RowTarget::Instance),
            3 => self
                .instance_and_variable_at(path)
                .map(RowTarget::Variable),
            _ => None,
        }
    }

    /// Collection index of the group at a depth-1 path.
    pub fn group_at(&self, path: &TreePath) -> Option<usize> {
        if path.depth() != 1 {
            return None;
        }
        self.group_index_for_row(path.indices()[0])
    }

    /// Instance key at a depth-2 path.
    pub fn instance_at(&self, path: &TreePath) -> Option<InstanceKey> {
        if path.depth() != 2 {
            return None;
        }
        self.instance_key(path.indices()[0], path.indices()[1])
    }

    /// Instance key plus editable variable at a depth-3 path.
    pub fn instance_and_variable_at(&self, path: &TreePath) -> Option<VariableTarget> {
        if path.depth() != 3 {
            return None;
        }
        let indices = path.indices();
        let key = self.instance_key(indices[0], indices[1])?;
        let source = self.collection.borrow();
        let variable = source.instance(key)?.editable_variable(indices[2])?;
        Some(VariableTarget {
            instance: key,
            editable_index: indices[2],
            name: variable.name.clone(),
        })
    }

    /// Projection path of an unbound-variable entry.
    pub fn path_for_variable(&self, needed: &VariableNeeded) -> Option<TreePath> {
        let source = self.collection.borrow();
        let groups = source.groups();
        let group = groups.get(needed.instance.group_index)?;
        if group.is_empty() {
            return None;
        }
        let instance = group.instances.get(needed.instance.instance_index)?;
        let editable_index = instance.editable_index_of(&needed.name)?;
        let row_index = groups[..needed.instance.group_index]
            .iter()
            .filter(|group| !group.is_empty())
            .count();
        Some(TreePath::new(vec![
            row_index,
            needed.instance.instance_index,
            editable_index,
        ]))
    }

    fn group_index_for_row(&self, row_index: usize) -> Option<usize> {
        let source = self.collection.borrow();
        source
            .groups()
            .iter()
            .enumerate()
            .filter(|(_, group)| !group.is_empty())
            .nth(row_index)
            .map(|(index, _)| index)
    }

    fn instance_key(&self, row_index: usize, instance_index: usize) -> Option<InstanceKey> {
        let group_index = self.group_index_for_row(row_index)?;
        let source = self.collection.borrow();
        let group = source.groups().get(group_index)?;
        (instance_index < group.instances.len())
            .then(|| InstanceKey::new(group_index, instance_index))
    }
}

impl<C: InstanceCollection> TreeDataSource for ReviewProjection<C> {
    fn n_children(&self, parent: Option<&TreePath>) -> usize {
        self.rows
            .store
            .borrow()
            .children(parent)
            .map_or(0, <[_]>::len)
    }

    fn row_id(&self, path: &TreePath) -> Option<RowId> {
        self.rows.store.borrow().node(path).map(|node| node.id)
    }

    fn value(&self, path: &TreePath, column: Column) -> Option<CellValue> {
        self.rows
            .store
            .borrow()
            .node(path)
            .map(|node| node.data.value(column))
    }
}

impl<C: InstanceCollection> Drop for ReviewProjection<C> {
    fn drop(&mut self) {
        match self.collection.try_borrow_mut() {
            Ok(mut source) => {
                source.unsubscribe(self.subscription.id());
            }
            // The weak listener dies with `rows`; the registry prunes it.
            Err(_) => debug!("event=projection_drop module=projection status=deferred_unsubscribe"),
        }
    }
}
