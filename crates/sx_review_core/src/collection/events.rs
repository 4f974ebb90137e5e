//! Change notifications emitted by instance collections.
//!
//! # Responsibility
//! - Register listeners and deliver events synchronously in registration
//!   order.
//! - Allow a subscriber to temporarily block one event kind.
//!
//! # Invariants
//! - Listeners are held weakly; dropped listeners are pruned on emit.
//! - Block counts nest; delivery resumes only when every guard is released.

use crate::model::instance::{InstanceGroup, SxId};
use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};

/// Change notification for one scheduled transaction group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionEvent {
    /// Group was appended to the collection.
    Added(SxId),
    /// Group instances or their state/variables changed.
    Updated(SxId),
    /// Group is about to be removed; still present in the snapshot.
    Removing(SxId),
}

impl CollectionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::Added,
            Self::Updated(_) => EventKind::Updated,
            Self::Removing(_) => EventKind::Removing,
        }
    }

    pub fn sx_id(&self) -> SxId {
        match self {
            Self::Added(id) | Self::Updated(id) | Self::Removing(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Updated,
    Removing,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Updated => write!(f, "updated"),
            Self::Removing => write!(f, "removing"),
        }
    }
}

/// Receiver of collection change notifications.
///
/// Handlers get the post-change group snapshot (pre-removal for
/// `Removing`) and must finish their work before returning.
pub trait CollectionListener {
    fn on_event(&self, event: &CollectionEvent, groups: &[InstanceGroup]);
}

/// Registry-assigned subscriber id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
struct BlockState {
    added: Cell<u32>,
    updated: Cell<u32>,
    removing: Cell<u32>,
}

impl BlockState {
    fn counter(&self, kind: EventKind) -> &Cell<u32> {
        match kind {
            EventKind::Added => &self.added,
            EventKind::Updated => &self.updated,
            EventKind::Removing => &self.removing,
        }
    }

    fn is_blocked(&self, kind: EventKind) -> bool {
        self.counter(kind).get() > 0
    }
}

/// Handle returned by `subscribe`; owns the right to block delivery.
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    blocks: Rc<BlockState>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Blocks delivery of `kind` to this subscriber until the guard drops.
    pub fn block(&self, kind: EventKind) -> BlockGuard<'_> {
        let counter = self.blocks.counter(kind);
        counter.set(counter.get() + 1);
        BlockGuard {
            blocks: &self.blocks,
            kind,
        }
    }

    pub fn is_blocked(&self, kind: EventKind) -> bool {
        self.blocks.is_blocked(kind)
    }
}

/// Scoped block on one event kind; releases on drop.
#[must_use = "delivery is unblocked as soon as the guard is dropped"]
pub struct BlockGuard<'a> {
    blocks: &'a BlockState,
    kind: EventKind,
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        let counter = self.blocks.counter(self.kind);
        counter.set(counter.get().saturating_sub(1));
    }
}

struct ListenerEntry {
    id: ListenerId,
    listener: Weak<dyn CollectionListener>,
    blocks: Rc<BlockState>,
}

/// Ordered set of collection listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Weak<dyn CollectionListener>) -> Subscription {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        let blocks = Rc::new(BlockState::default());
        self.entries.push(ListenerEntry {
            id,
            listener,
            blocks: Rc::clone(&blocks),
        });
        Subscription { id, blocks }
    }

    /// Removes one listener. Returns `false` when the id is unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.listener.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every live, unblocked listener.
    pub fn emit(&mut self, event: &CollectionEvent, groups: &[InstanceGroup]) {
        self.entries
            .retain(|entry| entry.listener.strong_count() > 0);

        let kind = event.kind();
        for entry in &self.entries {
            if entry.blocks.is_blocked(kind) {
                log::trace!(
                    "event=collection_emit module=collection status=blocked kind={} listener={}",
                    kind,
                    entry.id.0
                );
                continue;
            }
            if let Some(listener) = entry.listener.upgrade() {
                listener.on_event(event, groups);
            }
        }
    }
}
