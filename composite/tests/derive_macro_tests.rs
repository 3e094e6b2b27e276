//! Integration tests for the CompositeNode derive macro

use composite::prelude::*;
use composite::registry::{register_tree, unregister_tree};
use composite::{collect_subtree, downcast_node};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Uses the default type tag and the field named `core`
#[derive(CompositeNode)]
struct Inventory {
    core: NodeCore,
    #[composite(children)]
    slots: RefCell<CompositeList<dyn CompositeNode>>,
    capacity: Cell<u32>,
}

#[derive(CompositeNode)]
#[composite(name = "Item")]
struct Sword {
    #[composite(core)]
    header: NodeCore,
    damage: Cell<f32>,
}

/// Two children lists, reported in declaration order
#[derive(CompositeNode)]
#[composite(name = "Hand")]
struct Hand {
    core: NodeCore,
    #[composite(children)]
    left: RefCell<CompositeList<Sword>>,
    #[composite(children)]
    right: RefCell<CompositeList<Sword>>,
}

#[test]
fn test_type_tags() {
    assert_eq!(Inventory::kind_name(), "Inventory");
    assert_eq!(Sword::kind_name(), "Item");

    let sword = Sword::create("Excalibur");
    assert_eq!(sword.type_tag(), "Item");
    assert_eq!(sword.name(), "Excalibur");
}

#[test]
fn test_construct_defaults() {
    let bag = Inventory::create("bag");
    assert_eq!(bag.capacity.get(), 0);
    assert_eq!(bag.slots.borrow().owner(), Owner::Node(bag.id()));
    assert!(bag.slots.borrow().is_empty());

    let sword = Sword::create("short");
    assert_eq!(sword.damage.get(), 0.0);
    sword.damage.set(4.5);
    assert_eq!(sword.damage.get(), 4.5);
}

#[test]
fn test_children_follow_list_order() {
    let bag = Inventory::create("bag");
    let a = Sword::create("a");
    let b = Sword::create("b");
    bag.slots.borrow_mut().add(a.clone()).unwrap();
    bag.slots.borrow_mut().add(b.clone()).unwrap();

    let names: Vec<String> = bag.children().iter().map(|n| n.name()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(a.parent(), Some(Owner::Node(bag.id())));

    let hand = Hand::create("hand");
    hand.right.borrow_mut().add(Sword::create("r")).unwrap();
    hand.left.borrow_mut().add(Sword::create("l")).unwrap();
    let names: Vec<String> = hand.children().iter().map(|n| n.name()).collect();
    assert_eq!(names, vec!["l", "r"]);
}

#[test]
fn test_node_with_one_owner() {
    let bag = Inventory::create("bag");
    let chest = Inventory::create("chest");
    let sword = Sword::create("sword");

    bag.slots.borrow_mut().add(sword.clone()).unwrap();
    let result = chest.slots.borrow_mut().add(sword.clone());
    assert_eq!(result, Err(CompositeError::AlreadyAttached(sword.id())));

    // Detaching frees the node for another list
    bag.slots.borrow_mut().remove(sword.id()).unwrap();
    chest.slots.borrow_mut().add(sword.clone()).unwrap();
    assert_eq!(sword.parent(), Some(Owner::Node(chest.id())));
}

#[test]
fn test_factory_builds_derived_kinds() {
    let mut factory = NodeFactory::new();
    Inventory::register(&mut factory);
    Sword::register(&mut factory);

    let node = factory.create("Item", "forged").unwrap();
    let sword = downcast_node::<Sword>(node).unwrap();
    assert_eq!(sword.name(), "forged");

    let bag = factory.create_typed::<Inventory>("Inventory", "bag").unwrap();
    assert_eq!(bag.slots.borrow().owner(), Owner::Node(bag.id()));

    assert!(matches!(
        factory.create("Shield", "x"),
        Err(CompositeError::UnknownType(_))
    ));
}

#[test]
fn test_registry_sees_derived_subtree() {
    let registry = WeakRegistry::new();
    let root = RootId::new();

    let bag = Inventory::create("bag");
    let inner = Inventory::create("pouch");
    inner.slots.borrow_mut().add(Sword::create("dagger")).unwrap();
    bag.slots.borrow_mut().add(inner).unwrap();
    let node: Rc<dyn CompositeNode> = bag;

    assert_eq!(collect_subtree(&node).len(), 3);
    assert_eq!(register_tree(&registry, root, &node), 3);

    let dagger = collect_subtree(&node).pop().unwrap();
    let found = registry.get_by_id(root, dagger.id()).unwrap();
    assert_eq!(found.name(), "dagger");

    assert_eq!(unregister_tree(&registry, root, &node), 3);
    assert!(registry.get_by_id(root, dagger.id()).is_none());
}
