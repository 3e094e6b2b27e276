//! Generic folder node owning a nested list of arbitrary nodes

use crate::{CompositeList, CompositeNode, NodeCore};
use std::cell::{Ref, RefCell, RefMut};

/// A node whose only purpose is to own other nodes
#[derive(CompositeNode)]
#[composite(name = "Group")]
pub struct NodeGroup {
    #[composite(core)]
    core: NodeCore,
    #[composite(children)]
    items: RefCell<CompositeList<dyn CompositeNode>>,
}

impl NodeGroup {
    pub fn items(&self) -> Ref<'_, CompositeList<dyn CompositeNode>> {
        self.items.borrow()
    }

    pub fn items_mut(&self) -> RefMut<'_, CompositeList<dyn CompositeNode>> {
        self.items.borrow_mut()
    }
}
