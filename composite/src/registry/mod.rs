//! Identity registries mapping (root, id) to live nodes
//!
//! Two lifetime policies share one contract:
//!
//! - [`WeakRegistry`] holds weak pointers. A node dropped by its owner simply
//!   stops resolving. Use it when registration is tied to node construction
//!   and nobody is guaranteed to unregister.
//! - [`ScopedRegistry`] holds strong pointers grouped by root. Entries must be
//!   unregistered once per registration, normally from the root's disable
//!   hook. Use it when the root controls enable/disable explicitly.
//!
//! Both are single-threaded and use interior mutability so they can be shared
//! as `Rc<dyn IdentityRegistry>`.

mod scoped;
mod weak;

pub use scoped::ScopedRegistry;
pub use weak::WeakRegistry;

use crate::core::{collect_subtree, downcast_node, CompositeNode, NodeId, RootId};
use std::rc::Rc;

/// Lookup table from (root, id) to node
pub trait IdentityRegistry {
    /// Insert or overwrite the entry for `(root, node.id())`
    fn register(&self, root: RootId, node: &Rc<dyn CompositeNode>);

    /// Remove the entry if present, returning whether anything was removed
    fn unregister(&self, root: RootId, id: NodeId) -> bool;

    /// Resolve a node, `None` when unknown or no longer alive
    fn get_by_id(&self, root: RootId, id: NodeId) -> Option<Rc<dyn CompositeNode>>;

    /// Number of stored entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, root: RootId, id: NodeId) -> bool {
        self.get_by_id(root, id).is_some()
    }
}

/// Resolve a node and downcast it to a concrete kind
pub fn get_typed<T: CompositeNode>(
    registry: &dyn IdentityRegistry,
    root: RootId,
    id: NodeId,
) -> Option<Rc<T>> {
    registry.get_by_id(root, id).and_then(downcast_node::<T>)
}

/// Register a node and all of its descendants, returning how many were registered
pub fn register_tree(
    registry: &dyn IdentityRegistry,
    root: RootId,
    node: &Rc<dyn CompositeNode>,
) -> usize {
    let nodes = collect_subtree(node);
    for node in &nodes {
        registry.register(root, node);
    }
    nodes.len()
}

/// Unregister a node and all of its descendants, returning how many entries were removed
pub fn unregister_tree(
    registry: &dyn IdentityRegistry,
    root: RootId,
    node: &Rc<dyn CompositeNode>,
) -> usize {
    collect_subtree(node)
        .iter()
        .filter(|node| registry.unregister(root, node.id()))
        .count()
}
