//! Composite tree functionality
//!
//! This module provides node identity, the polymorphic node trait, owning
//! node lists, the type-tag factory and the root object that scopes a tree.

pub mod factory;
pub mod group;
pub mod list;
pub mod node;
pub mod root;

// Re-export commonly used types
pub use factory::NodeFactory;
pub use group::NodeGroup;
pub use list::CompositeList;
pub use node::{
    collect_subtree, downcast_node, CompositeNode, NodeCore, NodeId, NodeKind, Owner, RootId,
};
pub use root::{validate_tree, CompositeRoot, TreeIssue};
