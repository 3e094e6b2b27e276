//! Node identity and the polymorphic node trait

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::error;
use uuid::Uuid;

use super::factory::NodeFactory;

/// Stable identity of a node, assigned at creation and never reassigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing uuid, e.g. one restored by a persistence layer
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a root object, the scoping key of the identity registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootId(Uuid);

impl RootId {
    /// Generate a fresh random root id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RootId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Non-owning back reference from a node to the container that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    /// Owned by a top-level list of a root object
    Root(RootId),
    /// Owned by a list nested inside another node
    Node(NodeId),
}

/// Identity, name and parent link shared by every node type
#[derive(Debug)]
pub struct NodeCore {
    id: NodeId,
    name: RefCell<String>,
    parent: Cell<Option<Owner>>,
}

impl NodeCore {
    /// Create a core with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(NodeId::new(), name)
    }

    /// Create a core with a preserved id
    pub fn with_id(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: RefCell::new(name.into()),
            parent: Cell::new(None),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Compare the name without cloning it
    pub fn name_is(&self, name: &str) -> bool {
        *self.name.borrow() == name
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = name.into();
    }

    pub fn parent(&self) -> Option<Owner> {
        self.parent.get()
    }

    /// Only lists update the parent link, on insertion and removal
    pub(crate) fn set_parent(&self, parent: Option<Owner>) {
        self.parent.set(parent);
    }
}

/// An addressable element of the composite tree
///
/// Nodes are shared through `Rc` and use interior mutability, so every method
/// takes `&self`. Implementations are normally generated with
/// `#[derive(CompositeNode)]`.
pub trait CompositeNode: Any {
    /// Identity, name and parent link of this node
    fn core(&self) -> &NodeCore;

    /// Type tag used by the factory to construct this node type
    fn type_tag(&self) -> &'static str;

    /// Convert into `Rc<dyn Any>` for downcasting
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// Convert into a type-erased node handle
    fn as_node(self: Rc<Self>) -> Rc<dyn CompositeNode>;

    /// Nodes owned by lists nested inside this node, in list order
    fn children(&self) -> Vec<Rc<dyn CompositeNode>> {
        Vec::new()
    }

    fn id(&self) -> NodeId {
        self.core().id()
    }

    fn name(&self) -> String {
        self.core().name()
    }

    fn set_name(&self, name: &str) {
        self.core().set_name(name)
    }

    fn parent(&self) -> Option<Owner> {
        self.core().parent()
    }
}

/// A concrete node type the factory can construct
pub trait NodeKind: CompositeNode + Sized {
    /// Type tag under which this kind is registered
    fn kind_name() -> &'static str;

    /// Build an instance around an existing core, all other fields at their defaults
    fn construct(core: NodeCore) -> Self;

    /// Build a new detached instance with a fresh id
    fn create(name: &str) -> Rc<Self> {
        Rc::new(Self::construct(NodeCore::new(name)))
    }

    /// Register this kind with a factory
    fn register(factory: &mut NodeFactory) {
        factory.register::<Self>();
    }
}

/// Downcast a type-erased node to its concrete type
pub fn downcast_node<T: CompositeNode>(node: Rc<dyn CompositeNode>) -> Option<Rc<T>> {
    node.into_any().downcast::<T>().ok()
}

/// Collect a node and all of its descendants in depth-first pre-order
///
/// Nodes reachable twice are reported and skipped, so a malformed tree cannot
/// loop forever.
pub fn collect_subtree(node: &Rc<dyn CompositeNode>) -> Vec<Rc<dyn CompositeNode>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![node.clone()];

    while let Some(current) = stack.pop() {
        if !visited.insert(current.id()) {
            error!(node = %current.id(), "Node reachable more than once in composite tree");
            continue;
        }
        let children = current.children();
        out.push(current);
        stack.extend(children.into_iter().rev());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeGroup;

    #[test]
    fn test_node_core_name_and_parent() {
        let core = NodeCore::new("Idle");
        assert_eq!(core.name(), "Idle");
        assert!(core.name_is("Idle"));
        assert_eq!(core.parent(), None);

        core.set_name("Running");
        assert_eq!(core.name(), "Running");

        let root = RootId::new();
        core.set_parent(Some(Owner::Root(root)));
        assert_eq!(core.parent(), Some(Owner::Root(root)));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeCore::new("a");
        let b = NodeCore::new("a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_node_id_serialization() {
        let id = NodeId::new();
        let json = serde_json::to_string(&id).unwrap();
        let restored: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_downcast_node() {
        let group: Rc<dyn CompositeNode> = NodeGroup::create("Folder");
        assert_eq!(group.type_tag(), "Group");

        let typed = downcast_node::<NodeGroup>(group.clone());
        assert!(typed.is_some());

        let wrong = downcast_node::<crate::state::Trigger>(group);
        assert!(wrong.is_none());
    }

    #[test]
    fn test_collect_subtree_order() {
        let outer = NodeGroup::create("outer");
        let inner = NodeGroup::create("inner");
        let leaf = NodeGroup::create("leaf");
        let sibling = NodeGroup::create("sibling");

        inner.items_mut().add(leaf.clone()).unwrap();
        outer.items_mut().add(inner.clone()).unwrap();
        outer.items_mut().add(sibling.clone()).unwrap();

        let names: Vec<String> = collect_subtree(&outer.as_node())
            .iter()
            .map(|n| n.name())
            .collect();
        assert_eq!(names, vec!["outer", "inner", "leaf", "sibling"]);
    }
}
