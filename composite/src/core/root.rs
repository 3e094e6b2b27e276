//! Root objects and tree validation

use super::list::CompositeList;
use super::node::{collect_subtree, CompositeNode, NodeId, Owner, RootId};
use crate::error::CompositeError;
use crate::registry::{register_tree, unregister_tree, IdentityRegistry};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, error, info, trace, warn};

/// Problems found by [`validate_tree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeIssue {
    /// Two reachable nodes share an id
    DuplicateId(NodeId),
    /// A node's parent link does not name the container it was reached through
    ParentMismatch {
        node: NodeId,
        expected: Owner,
        found: Option<Owner>,
    },
}

/// The external object that owns a top-level node list
///
/// A root scopes identity lookups: enabling it registers every reachable node
/// under its [`RootId`], disabling it removes them again.
pub struct CompositeRoot {
    id: RootId,
    name: String,
    nodes: CompositeList<dyn CompositeNode>,
    enabled: bool,
}

impl CompositeRoot {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(RootId::new(), name)
    }

    /// Create a root with a preserved id
    pub fn with_id(id: RootId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            nodes: CompositeList::new(Owner::Root(id)),
            enabled: false,
        }
    }

    pub fn id(&self) -> RootId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &CompositeList<dyn CompositeNode> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut CompositeList<dyn CompositeNode> {
        &mut self.nodes
    }

    /// Append a top-level node (authoring operation)
    pub fn add(&mut self, node: Rc<dyn CompositeNode>) -> Result<(), CompositeError> {
        self.nodes.add(node)
    }

    /// Insert a node into a list nested somewhere in this tree (authoring operation)
    ///
    /// A nested list only sees its own subtree, so the incoming ids are first
    /// checked against the whole tree. `insert` performs the actual list
    /// mutation and runs only when the check passes:
    ///
    /// ```ignore
    /// root.add_within(node, |node| folder.items_mut().add(node))?;
    /// ```
    pub fn add_within<T, F>(&self, node: Rc<T>, insert: F) -> Result<(), CompositeError>
    where
        T: ?Sized + CompositeNode,
        F: FnOnce(Rc<T>) -> Result<(), CompositeError>,
    {
        self.check_incoming(&node.clone().as_node())?;
        insert(node)
    }

    /// Fail if any id in the subtree of `node` is already reachable from this root
    pub fn check_incoming(&self, node: &Rc<dyn CompositeNode>) -> Result<(), CompositeError> {
        let existing = self.nodes.reachable_ids();
        for incoming in collect_subtree(node) {
            let id = incoming.id();
            if existing.contains(&id) {
                warn!(root = %self.id, node = %id, "Duplicate node id in composite tree");
                return Err(CompositeError::DuplicateId(id));
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register every reachable node under this root
    ///
    /// The tree is validated first. A tree in which two nodes share an id is
    /// refused and nothing is registered. Calling this again re-registers the
    /// current tree, overwriting the previous entries. Returns the number of
    /// nodes registered.
    pub fn enable(&mut self, registry: &dyn IdentityRegistry) -> Result<usize, CompositeError> {
        let duplicate = self.validate().into_iter().find_map(|issue| match issue {
            TreeIssue::DuplicateId(id) => Some(id),
            TreeIssue::ParentMismatch { .. } => None,
        });
        if let Some(id) = duplicate {
            error!(root = %self.id, node = %id, "Refusing to register a tree with duplicate ids");
            return Err(CompositeError::DuplicateId(id));
        }

        let count: usize = self
            .nodes
            .iter()
            .map(|node| register_tree(registry, self.id, node))
            .sum();
        self.enabled = true;
        info!(root = %self.id, name = %self.name, count, "Enabled composite root");
        Ok(count)
    }

    /// Unregister every reachable node of this root
    ///
    /// Returns the number of entries that were actually removed.
    pub fn disable(&mut self, registry: &dyn IdentityRegistry) -> usize {
        let count: usize = self
            .nodes
            .iter()
            .map(|node| unregister_tree(registry, self.id, node))
            .sum();
        self.enabled = false;
        info!(root = %self.id, name = %self.name, count, "Disabled composite root");
        count
    }

    /// Find a reachable node by id by walking the tree
    pub fn find(&self, id: NodeId) -> Option<Rc<dyn CompositeNode>> {
        self.nodes
            .iter()
            .flat_map(|node| collect_subtree(&node.clone()))
            .find(|node| node.id() == id)
    }

    /// Check identity uniqueness and parent links of the whole tree
    pub fn validate(&self) -> Vec<TreeIssue> {
        validate_tree(Owner::Root(self.id), &self.nodes.nodes())
    }
}

impl std::fmt::Debug for CompositeRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeRoot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Validate a tree given the owner of its top-level nodes
///
/// Walks breadth-first, checking that no two nodes share an id and that every
/// node's parent link names the container it was reached through.
pub fn validate_tree(owner: Owner, nodes: &[Rc<dyn CompositeNode>]) -> Vec<TreeIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: Vec<(Owner, Rc<dyn CompositeNode>)> =
        nodes.iter().map(|node| (owner, node.clone())).collect();
    let mut next_level = Vec::new();

    while !queue.is_empty() {
        for (expected, node) in queue.drain(..) {
            let id = node.id();
            if !seen.insert(id) {
                error!(node = %id, "Duplicate node id in composite tree");
                issues.push(TreeIssue::DuplicateId(id));
                // Descending again could loop on a cyclic tree
                continue;
            }

            let found = node.parent();
            if found != Some(expected) {
                error!(node = %id, expected = ?expected, found = ?found, "Stale parent link in composite tree");
                issues.push(TreeIssue::ParentMismatch {
                    node: id,
                    expected,
                    found,
                });
            }

            for child in node.children() {
                next_level.push((Owner::Node(id), child));
            }
        }

        std::mem::swap(&mut queue, &mut next_level);
    }

    if issues.is_empty() {
        trace!(node_count = seen.len(), "Tree validation passed");
    } else {
        debug!(issue_count = issues.len(), "Tree validation found issues");
    }

    issues
}
