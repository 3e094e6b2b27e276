//! Registry holding strong pointers grouped by root

use super::IdentityRegistry;
use crate::core::{CompositeNode, NodeId, RootId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Identity registry that keeps registered nodes alive until unregistered
///
/// Entries are grouped per root so a root's disable hook can drop all of them
/// at once with [`unregister_root`](Self::unregister_root).
#[derive(Default)]
pub struct ScopedRegistry {
    roots: RefCell<HashMap<RootId, HashMap<NodeId, Rc<dyn CompositeNode>>>>,
}

impl ScopedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry of one root, returning how many were removed
    pub fn unregister_root(&self, root: RootId) -> usize {
        let removed = self
            .roots
            .borrow_mut()
            .remove(&root)
            .map(|entries| entries.len())
            .unwrap_or(0);
        debug!(root = %root, removed, "Unregistered root scope");
        removed
    }

    /// Roots that currently have at least one entry
    pub fn roots(&self) -> Vec<RootId> {
        self.roots.borrow().keys().copied().collect()
    }

    /// Number of entries registered under one root
    pub fn root_len(&self, root: RootId) -> usize {
        self.roots.borrow().get(&root).map_or(0, |entries| entries.len())
    }
}

impl IdentityRegistry for ScopedRegistry {
    fn register(&self, root: RootId, node: &Rc<dyn CompositeNode>) {
        let previous = self
            .roots
            .borrow_mut()
            .entry(root)
            .or_default()
            .insert(node.id(), node.clone());
        trace!(root = %root, node = %node.id(), overwritten = previous.is_some(), "Registered node (scoped)");
    }

    fn unregister(&self, root: RootId, id: NodeId) -> bool {
        let mut roots = self.roots.borrow_mut();
        let Some(entries) = roots.get_mut(&root) else {
            return false;
        };
        let removed = entries.remove(&id).is_some();
        if entries.is_empty() {
            roots.remove(&root);
        }
        trace!(root = %root, node = %id, removed, "Unregistered node (scoped)");
        removed
    }

    fn get_by_id(&self, root: RootId, id: NodeId) -> Option<Rc<dyn CompositeNode>> {
        self.roots
            .borrow()
            .get(&root)
            .and_then(|entries| entries.get(&id))
            .cloned()
    }

    fn len(&self) -> usize {
        self.roots.borrow().values().map(|entries| entries.len()).sum()
    }
}

impl std::fmt::Debug for ScopedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedRegistry")
            .field("roots", &self.roots.borrow().len())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeKind;
    use crate::state::Trigger;

    #[test]
    fn test_scoped_registry_keeps_node_alive() {
        let registry = ScopedRegistry::new();
        let root = RootId::new();
        let node: Rc<dyn CompositeNode> = Trigger::create("Jump");
        let id = node.id();

        registry.register(root, &node);
        drop(node);

        let found = registry.get_by_id(root, id).unwrap();
        assert_eq!(found.name(), "Jump");
    }

    #[test]
    fn test_unregister_root_drops_all_entries() {
        let registry = ScopedRegistry::new();
        let root = RootId::new();
        let other = RootId::new();
        let a: Rc<dyn CompositeNode> = Trigger::create("a");
        let b: Rc<dyn CompositeNode> = Trigger::create("b");

        registry.register(root, &a);
        registry.register(root, &b);
        registry.register(other, &a);
        assert_eq!(registry.root_len(root), 2);

        assert_eq!(registry.unregister_root(root), 2);
        assert_eq!(registry.unregister_root(root), 0);
        assert_eq!(registry.roots(), vec![other]);
        assert!(registry.get_by_id(other, a.id()).is_some());
    }

    #[test]
    fn test_empty_scope_is_removed() {
        let registry = ScopedRegistry::new();
        let root = RootId::new();
        let node: Rc<dyn CompositeNode> = Trigger::create("a");

        registry.register(root, &node);
        registry.unregister(root, node.id());
        assert!(registry.roots().is_empty());
    }
}
