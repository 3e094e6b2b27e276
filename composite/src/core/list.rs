//! Ordered, owning node lists with authoring policy flags

use super::node::{collect_subtree, CompositeNode, NodeId, Owner};
use crate::error::CompositeError;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Ordered, owning collection of nodes
///
/// The list is the single owner of its elements: inserting a node sets its
/// parent link to the list's owner, removing it clears the link. Insertion
/// order is the traversal and display order.
///
/// `can_add_remove` and `can_reorder` gate the authoring operations (`add`,
/// `insert`, `remove_at`, `remove`, `clear`, `move_item`). Code that builds a
/// fixed shape programmatically uses [`CompositeList::attach`] instead, which
/// ignores the flags but still enforces id uniqueness.
pub struct CompositeList<T: ?Sized + CompositeNode> {
    owner: Owner,
    items: Vec<Rc<T>>,
    can_add_remove: bool,
    can_reorder: bool,
}

impl<T: ?Sized + CompositeNode> CompositeList<T> {
    /// Create an empty list that allows every mutation
    pub fn new(owner: Owner) -> Self {
        Self::with_policy(owner, true, true)
    }

    /// Create an empty list with explicit policy flags
    pub fn with_policy(owner: Owner, can_add_remove: bool, can_reorder: bool) -> Self {
        Self {
            owner,
            items: Vec::new(),
            can_add_remove,
            can_reorder,
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn can_add_remove(&self) -> bool {
        self.can_add_remove
    }

    pub fn can_reorder(&self) -> bool {
        self.can_reorder
    }

    pub fn set_can_add_remove(&mut self, allowed: bool) {
        self.can_add_remove = allowed;
    }

    pub fn set_can_reorder(&mut self, allowed: bool) {
        self.can_reorder = allowed;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rc<T>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<T>> {
        self.items.iter()
    }

    /// Position of the element with the given id
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.items.iter().position(|node| node.id() == id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }

    /// First element with the given name (linear scan)
    pub fn find_by_name(&self, name: &str) -> Option<&Rc<T>> {
        self.items.iter().find(|node| node.core().name_is(name))
    }

    /// Type-erased handles to every element, in order
    pub fn nodes(&self) -> Vec<Rc<dyn CompositeNode>> {
        self.items.iter().map(|node| node.clone().as_node()).collect()
    }

    /// Ids of every element and all of their descendants
    pub fn reachable_ids(&self) -> HashSet<NodeId> {
        self.items
            .iter()
            .flat_map(|node| collect_subtree(&node.clone().as_node()))
            .map(|node| node.id())
            .collect()
    }

    /// Append a node (authoring operation)
    pub fn add(&mut self, node: Rc<T>) -> Result<(), CompositeError> {
        self.check_add_remove()?;
        self.attach(node)
    }

    /// Insert a node at `index` (authoring operation)
    pub fn insert(&mut self, index: usize, node: Rc<T>) -> Result<(), CompositeError> {
        self.check_add_remove()?;
        self.attach_at(index, node)
    }

    /// Remove and return the node at `index` (authoring operation)
    pub fn remove_at(&mut self, index: usize) -> Result<Rc<T>, CompositeError> {
        self.check_add_remove()?;
        self.detach_at(index)
    }

    /// Remove and return the node with the given id (authoring operation)
    pub fn remove(&mut self, id: NodeId) -> Result<Rc<T>, CompositeError> {
        self.check_add_remove()?;
        let index = self.index_of(id).ok_or(CompositeError::NotAMember(id))?;
        self.detach_at(index)
    }

    /// Remove every node (authoring operation)
    pub fn clear(&mut self) -> Result<Vec<Rc<T>>, CompositeError> {
        self.check_add_remove()?;
        let removed: Vec<Rc<T>> = self.items.drain(..).collect();
        for node in &removed {
            node.core().set_parent(None);
        }
        debug!(owner = ?self.owner, count = removed.len(), "Cleared composite list");
        Ok(removed)
    }

    /// Move the node at `from` so it ends up at `to` (authoring operation)
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), CompositeError> {
        if !self.can_reorder {
            warn!(owner = ?self.owner, from, to, "Refusing reorder on a fixed-order list");
            return Err(CompositeError::ReorderLocked);
        }
        let len = self.items.len();
        for index in [from, to] {
            if index >= len {
                return Err(CompositeError::IndexOutOfRange { index, len });
            }
        }
        let node = self.items.remove(from);
        self.items.insert(to, node);
        trace!(owner = ?self.owner, from, to, "Moved list element");
        Ok(())
    }

    /// Append a node regardless of the policy flags
    ///
    /// Used when the list shape is generated by code rather than authored.
    /// Fails if the node already has an owner or if any id in its subtree is
    /// already reachable from this list.
    pub fn attach(&mut self, node: Rc<T>) -> Result<(), CompositeError> {
        let index = self.items.len();
        self.attach_at(index, node)
    }

    /// Insert a node at `index` regardless of the policy flags
    pub fn attach_at(&mut self, index: usize, node: Rc<T>) -> Result<(), CompositeError> {
        let len = self.items.len();
        if index > len {
            return Err(CompositeError::IndexOutOfRange { index, len });
        }
        self.validate_incoming(&node)?;

        node.core().set_parent(Some(self.owner));
        trace!(owner = ?self.owner, node = %node.id(), index, "Attached node to list");
        self.items.insert(index, node);
        Ok(())
    }

    /// Replace the node at `index` regardless of the policy flags, returning the old node
    pub fn replace(&mut self, index: usize, node: Rc<T>) -> Result<Rc<T>, CompositeError> {
        let old = self.detach_at(index)?;
        if let Err(e) = self.attach_at(index, node) {
            // Put the previous occupant back so the list is unchanged on failure
            old.core().set_parent(Some(self.owner));
            self.items.insert(index, old);
            return Err(e);
        }
        Ok(old)
    }

    /// Remove the node at `index` regardless of the policy flags
    pub fn detach_at(&mut self, index: usize) -> Result<Rc<T>, CompositeError> {
        let len = self.items.len();
        if index >= len {
            return Err(CompositeError::IndexOutOfRange { index, len });
        }
        let node = self.items.remove(index);
        node.core().set_parent(None);
        trace!(owner = ?self.owner, node = %node.id(), index, "Detached node from list");
        Ok(node)
    }

    fn check_add_remove(&self) -> Result<(), CompositeError> {
        if self.can_add_remove {
            Ok(())
        } else {
            warn!(owner = ?self.owner, "Refusing add/remove on a fixed-size list");
            Err(CompositeError::AddRemoveLocked)
        }
    }

    fn validate_incoming(&self, node: &Rc<T>) -> Result<(), CompositeError> {
        if node.parent().is_some() {
            warn!(node = %node.id(), parent = ?node.parent(), "Node is already owned by another list");
            return Err(CompositeError::AlreadyAttached(node.id()));
        }

        let existing = self.reachable_ids();
        for incoming in collect_subtree(&node.clone().as_node()) {
            let id = incoming.id();
            if existing.contains(&id) || self.owner == Owner::Node(id) {
                warn!(node = %id, owner = ?self.owner, "Duplicate node id in composite tree");
                return Err(CompositeError::DuplicateId(id));
            }
        }
        Ok(())
    }
}

impl<T: ?Sized + CompositeNode> fmt::Debug for CompositeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeList")
            .field("owner", &self.owner)
            .field(
                "items",
                &self.items.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .field("can_add_remove", &self.can_add_remove)
            .field("can_reorder", &self.can_reorder)
            .finish()
    }
}
