//! Node factory for construction by type tag

use super::node::{downcast_node, CompositeNode, NodeCore, NodeKind};
use crate::error::CompositeError;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// A function that builds a node of one concrete kind around a core
pub type NodeConstructorFn = Arc<dyn Fn(NodeCore) -> Rc<dyn CompositeNode> + Send + Sync>;

/// Registry of node constructors keyed by type tag
///
/// The authoring surface populates a list slot by picking a type tag; the
/// persistence layer rebuilds nodes with their saved ids through
/// [`NodeFactory::create_with_core`].
#[derive(Default)]
pub struct NodeFactory {
    /// Maps type tags to their constructor functions
    constructors: HashMap<String, NodeConstructorFn>,
}

impl NodeFactory {
    /// Create a new empty factory
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register a node kind under its own type tag
    pub fn register<T: NodeKind>(&mut self) {
        self.register_as::<T>(T::kind_name());
    }

    /// Register a node kind under an explicit type tag
    ///
    /// Registering the same tag again replaces the previous constructor.
    pub fn register_as<T: NodeKind>(&mut self, type_tag: &str) {
        let constructor: NodeConstructorFn =
            Arc::new(|core: NodeCore| Rc::new(T::construct(core)) as Rc<dyn CompositeNode>);

        self.constructors.insert(type_tag.to_string(), constructor);
        debug!(type_tag = type_tag, "Registered node constructor");
    }

    /// Construct a detached node with a fresh id
    pub fn create(&self, type_tag: &str, name: &str) -> Result<Rc<dyn CompositeNode>, CompositeError> {
        self.create_with_core(type_tag, NodeCore::new(name))
    }

    /// Construct a detached node around an existing core, preserving its id
    pub fn create_with_core(
        &self,
        type_tag: &str,
        core: NodeCore,
    ) -> Result<Rc<dyn CompositeNode>, CompositeError> {
        let constructor = self
            .constructors
            .get(type_tag)
            .ok_or_else(|| CompositeError::UnknownType(type_tag.to_string()))?;
        let node = constructor(core);
        debug!(type_tag = type_tag, node = %node.id(), "Constructed node");
        Ok(node)
    }

    /// Construct a node and downcast it to the expected concrete kind
    pub fn create_typed<T: NodeKind>(&self, type_tag: &str, name: &str) -> Result<Rc<T>, CompositeError> {
        let node = self.create(type_tag, name)?;
        let found = node.type_tag();
        downcast_node::<T>(node).ok_or(CompositeError::TypeMismatch {
            expected: T::kind_name(),
            found,
        })
    }

    /// Check if a type tag is registered
    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.constructors.contains_key(type_tag)
    }

    /// Get all registered type tags
    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(|s| s.as_str())
    }

    /// Get the number of registered kinds
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Check if the factory is empty
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Create a factory with all node kinds shipped by this crate registered
    pub fn with_builtin_kinds() -> Self {
        use super::group::NodeGroup;
        use crate::state::{DecisionState, FlowState, Trigger};

        let mut factory = Self::new();

        NodeGroup::register(&mut factory);
        Trigger::register(&mut factory);
        DecisionState::register(&mut factory);
        FlowState::register(&mut factory);

        debug!(kind_count = factory.len(), "Created factory with builtin kinds");

        factory
    }
}

impl std::fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeFactory")
            .field(
                "registered_types",
                &self.constructors.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NodeGroup, NodeId};
    use crate::state::{FlowState, Trigger};

    #[test]
    fn test_factory_basic() {
        let mut factory = NodeFactory::new();
        assert!(factory.is_empty());

        factory.register::<Trigger>();
        assert_eq!(factory.len(), 1);
        assert!(factory.is_registered("Trigger"));
        assert!(!factory.is_registered("Unknown"));
    }

    #[test]
    fn test_factory_create_by_tag() {
        let factory = NodeFactory::with_builtin_kinds();

        let node = factory.create("FlowState", "Red").unwrap();
        assert_eq!(node.type_tag(), "FlowState");
        assert_eq!(node.name(), "Red");
        assert_eq!(node.parent(), None);
        assert!(downcast_node::<FlowState>(node).is_some());
    }

    #[test]
    fn test_factory_unknown_type() {
        let factory = NodeFactory::new();
        let result = factory.create("Missing", "x");
        assert!(matches!(result, Err(CompositeError::UnknownType(tag)) if tag == "Missing"));
    }

    #[test]
    fn test_factory_preserves_id() {
        let factory = NodeFactory::with_builtin_kinds();
        let id = NodeId::new();

        let node = factory
            .create_with_core("Group", NodeCore::with_id(id, "restored"))
            .unwrap();
        assert_eq!(node.id(), id);
        assert_eq!(node.name(), "restored");
    }

    #[test]
    fn test_factory_typed_mismatch() {
        let factory = NodeFactory::with_builtin_kinds();

        let group = factory.create_typed::<NodeGroup>("Group", "ok");
        assert!(group.is_ok());

        let mismatch = factory.create_typed::<Trigger>("Group", "wrong");
        assert!(matches!(
            mismatch,
            Err(CompositeError::TypeMismatch {
                expected: "Trigger",
                found: "Group"
            })
        ));
    }

    #[test]
    fn test_factory_register_alias() {
        let mut factory = NodeFactory::new();
        factory.register_as::<Trigger>("Event");

        let node = factory.create("Event", "Jump").unwrap();
        assert_eq!(node.type_tag(), "Trigger");

        let types: Vec<&str> = factory.registered_types().collect();
        assert_eq!(types, vec!["Event"]);
    }
}
