//! Lazy, non-owning references resolved through an identity registry

use crate::core::{downcast_node, CompositeNode, NodeId, RootId};
use crate::registry::IdentityRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::trace;

/// How the authoring surface may treat a reference's source root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceMode {
    /// The source can be picked freely
    #[default]
    Free,
    /// The source is fixed by code but still displayed
    FixedVisible,
    /// The source is fixed by code and not displayed
    FixedHidden,
}

/// Handle to a node somewhere in a tree, stored as `(source root, target id)`
///
/// The reference never holds a pointer to its target. Every call to
/// [`resolve`](Self::resolve) looks the target up again, so the result always
/// reflects the current registry state and may change between ticks.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct CompositeReference<T: ?Sized> {
    source: Option<RootId>,
    id: Option<NodeId>,
    #[serde(default)]
    source_mode: SourceMode,
    #[serde(skip)]
    _target: PhantomData<fn() -> Rc<T>>,
}

impl<T: ?Sized> CompositeReference<T> {
    /// An unset reference
    pub fn new() -> Self {
        Self {
            source: None,
            id: None,
            source_mode: SourceMode::Free,
            _target: PhantomData,
        }
    }

    /// A reference to `id` inside the tree of `source`
    pub fn to(source: RootId, id: NodeId) -> Self {
        Self {
            source: Some(source),
            id: Some(id),
            ..Self::new()
        }
    }

    pub fn source(&self) -> Option<RootId> {
        self.source
    }

    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn set_source(&mut self, source: Option<RootId>) {
        self.source = source;
    }

    pub fn set_id(&mut self, id: Option<NodeId>) {
        self.id = id;
    }

    /// Point at a node inside the tree of `source`
    pub fn set_target(&mut self, source: RootId, node: &dyn CompositeNode) {
        self.source = Some(source);
        self.id = Some(node.id());
    }

    /// Forget the target, keeping the source and its mode
    pub fn clear(&mut self) {
        self.id = None;
    }

    pub fn is_set(&self) -> bool {
        self.source.is_some() && self.id.is_some()
    }

    pub fn source_mode(&self) -> SourceMode {
        self.source_mode
    }

    pub fn set_source_mode(&mut self, mode: SourceMode) {
        self.source_mode = mode;
    }

    /// Whether the authoring surface may let the user change the source
    pub fn is_source_editable(&self) -> bool {
        self.source_mode == SourceMode::Free
    }

    /// Whether the authoring surface should display the source at all
    pub fn is_source_visible(&self) -> bool {
        self.source_mode != SourceMode::FixedHidden
    }

    /// Resolve to the type-erased target node
    pub fn resolve_node(&self, registry: &dyn IdentityRegistry) -> Option<Rc<dyn CompositeNode>> {
        let (source, id) = (self.source?, self.id?);
        let node = registry.get_by_id(source, id);
        if node.is_none() {
            trace!(source = %source, target = %id, "Reference target not found");
        }
        node
    }
}

impl<T: CompositeNode> CompositeReference<T> {
    /// Resolve to the target node, `None` when unset, missing or of another type
    pub fn resolve(&self, registry: &dyn IdentityRegistry) -> Option<Rc<T>> {
        self.resolve_node(registry).and_then(downcast_node::<T>)
    }
}

impl<T: ?Sized> Default for CompositeReference<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for CompositeReference<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            id: self.id,
            source_mode: self.source_mode,
            _target: PhantomData,
        }
    }
}

impl<T: ?Sized> PartialEq for CompositeReference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.id == other.id && self.source_mode == other.source_mode
    }
}

impl<T: ?Sized> Eq for CompositeReference<T> {}

impl<T: ?Sized> fmt::Debug for CompositeReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeReference")
            .field("source", &self.source)
            .field("id", &self.id)
            .field("source_mode", &self.source_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NodeGroup, NodeKind};
    use crate::registry::{ScopedRegistry, WeakRegistry};
    use crate::state::Trigger;

    #[test]
    fn test_unset_reference_resolves_to_none() {
        let registry = ScopedRegistry::new();
        let reference: CompositeReference<Trigger> = CompositeReference::new();
        assert!(!reference.is_set());
        assert!(reference.resolve(&registry).is_none());

        let mut only_source: CompositeReference<Trigger> = CompositeReference::new();
        only_source.set_source(Some(RootId::new()));
        assert!(only_source.resolve(&registry).is_none());
    }

    #[test]
    fn test_reference_resolves_through_registry() {
        let registry = ScopedRegistry::new();
        let root = RootId::new();
        let trigger = Trigger::create("Jump");
        registry.register(root, &(trigger.clone() as Rc<dyn CompositeNode>));

        let mut reference: CompositeReference<Trigger> = CompositeReference::new();
        reference.set_target(root, &*trigger);

        let resolved = reference.resolve(&registry).unwrap();
        assert!(Rc::ptr_eq(&resolved, &trigger));
    }

    #[test]
    fn test_reference_is_not_cached() {
        let registry = ScopedRegistry::new();
        let root = RootId::new();
        let trigger = Trigger::create("Jump");
        let node: Rc<dyn CompositeNode> = trigger.clone();
        registry.register(root, &node);

        let reference: CompositeReference<Trigger> = CompositeReference::to(root, trigger.id());
        assert!(reference.resolve(&registry).is_some());

        registry.unregister(root, trigger.id());
        assert!(reference.resolve(&registry).is_none());

        registry.register(root, &node);
        assert!(reference.resolve(&registry).is_some());
    }

    #[test]
    fn test_reference_does_not_keep_target_alive() {
        let registry = WeakRegistry::new();
        let root = RootId::new();
        let node: Rc<dyn CompositeNode> = Trigger::create("Jump");
        registry.register(root, &node);

        let reference: CompositeReference<Trigger> = CompositeReference::to(root, node.id());
        drop(node);
        assert!(reference.resolve(&registry).is_none());
    }

    #[test]
    fn test_reference_wrong_type_resolves_to_none() {
        let registry = ScopedRegistry::new();
        let root = RootId::new();
        let group: Rc<dyn CompositeNode> = NodeGroup::create("folder");
        registry.register(root, &group);

        let reference: CompositeReference<Trigger> = CompositeReference::to(root, group.id());
        assert!(reference.resolve(&registry).is_none());
        assert!(reference.resolve_node(&registry).is_some());
    }

    #[test]
    fn test_source_mode_policy() {
        let mut reference: CompositeReference<Trigger> = CompositeReference::new();
        assert!(reference.is_source_editable());
        assert!(reference.is_source_visible());

        reference.set_source_mode(SourceMode::FixedVisible);
        assert!(!reference.is_source_editable());
        assert!(reference.is_source_visible());

        reference.set_source_mode(SourceMode::FixedHidden);
        assert!(!reference.is_source_visible());

        // The mode does not restrict programmatic changes
        reference.set_source(Some(RootId::new()));
        assert!(reference.source().is_some());
    }

    #[test]
    fn test_reference_serialization() {
        let mut reference: CompositeReference<Trigger> =
            CompositeReference::to(RootId::new(), NodeId::new());
        reference.set_source_mode(SourceMode::FixedVisible);

        let json = serde_json::to_string(&reference).unwrap();
        let restored: CompositeReference<Trigger> = serde_json::from_str(&json).unwrap();
        assert_eq!(reference, restored);

        let legacy = format!(
            r#"{{"source":"{}","id":null}}"#,
            reference.source().unwrap()
        );
        let restored: CompositeReference<Trigger> = serde_json::from_str(&legacy).unwrap();
        assert_eq!(restored.source_mode(), SourceMode::Free);
        assert!(restored.id().is_none());
    }
}
