//! Registry holding weak pointers

use super::IdentityRegistry;
use crate::core::{CompositeNode, NodeId, RootId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Identity registry whose entries never keep a node alive
///
/// A lookup after the node's owner dropped it returns `None`. Dead entries
/// stay in the table until overwritten, unregistered or [`pruned`](Self::prune).
#[derive(Default)]
pub struct WeakRegistry {
    entries: RefCell<HashMap<(RootId, NodeId), Weak<dyn CompositeNode>>>,
}

impl WeakRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries whose node is still alive
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Drop entries whose node is gone, returning how many were removed
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Pruned dead registry entries");
        }
        removed
    }
}

impl IdentityRegistry for WeakRegistry {
    fn register(&self, root: RootId, node: &Rc<dyn CompositeNode>) {
        let previous = self
            .entries
            .borrow_mut()
            .insert((root, node.id()), Rc::downgrade(node));
        trace!(root = %root, node = %node.id(), overwritten = previous.is_some(), "Registered node (weak)");
    }

    fn unregister(&self, root: RootId, id: NodeId) -> bool {
        let removed = self.entries.borrow_mut().remove(&(root, id)).is_some();
        trace!(root = %root, node = %id, removed, "Unregistered node (weak)");
        removed
    }

    fn get_by_id(&self, root: RootId, id: NodeId) -> Option<Rc<dyn CompositeNode>> {
        self.entries
            .borrow()
            .get(&(root, id))
            .and_then(|weak| weak.upgrade())
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl std::fmt::Debug for WeakRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakRegistry")
            .field("entries", &self.len())
            .field("live", &self.live_count())
            .finish()
    }
}
