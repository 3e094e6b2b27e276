//! End-to-end scenarios driving the state machines through the public API

use composite::prelude::*;
use composite::state::{StateEvent, StateNotification};
use std::cell::RefCell;
use std::rc::Rc;

fn traffic_light() -> FlowStateMachine {
    let flow = FlowStateMachine::new("traffic_light");
    flow.add_flow_state("Red", 2.0, &["Green"]).unwrap();
    flow.add_flow_state("Green", 3.0, &["Yellow"]).unwrap();
    flow.add_flow_state("Yellow", 1.0, &["Red"]).unwrap();
    flow.initialize();
    flow
}

#[test]
fn test_traffic_light_cycles_on_timers() {
    let flow = traffic_light();
    let visited = Rc::new(RefCell::new(Vec::new()));
    for index in 0..flow.state_count() {
        let sink = visited.clone();
        flow.get_state(index)
            .unwrap()
            .state_core()
            .on_entered(move |n: &StateNotification| sink.borrow_mut().push(n.name.clone()));
    }

    flow.start().unwrap();
    // Half-second steps: 2s red, 3s green, 1s yellow, then red again
    for _ in 0..12 {
        flow.tick(0.5);
    }

    assert_eq!(
        *visited.borrow(),
        vec!["Red", "Green", "Yellow", "Red"]
    );
    assert!(flow.is_in_state("Red"));
    assert!(flow.diagnostics().is_empty());
}

#[test]
fn test_traffic_light_manual_override() {
    let flow = traffic_light();
    flow.start().unwrap();

    // Skipping ahead is not in Red's allow-list
    assert!(flow.transition_to_state("Yellow").is_err());
    assert_eq!(flow.diagnostics().len(), 1);

    flow.transition_to_state("Green").unwrap();
    let green = flow.current_state().unwrap();
    assert_eq!(flow.state_timer(&green), Some(3.0));
}

#[test]
fn test_exit_and_enter_notifications() {
    let flow = traffic_light();
    let events = Rc::new(RefCell::new(Vec::new()));
    let red = flow.get_state_by_name("Red").unwrap();
    let green = flow.get_state_by_name("Green").unwrap();

    let sink = events.clone();
    red.state_core()
        .on_exited(move |n| sink.borrow_mut().push((n.event, n.name.clone())));
    let sink = events.clone();
    green
        .state_core()
        .on_entered(move |n| sink.borrow_mut().push((n.event, n.name.clone())));

    flow.start().unwrap();
    flow.transition_to_state("Green").unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            (StateEvent::Exited, "Red".to_string()),
            (StateEvent::Entered, "Green".to_string())
        ]
    );
}

#[test]
fn test_machine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runtime.json");
    std::fs::write(&path, r#"{ "max_recorded_warnings": 2, "trace_transitions": true }"#).unwrap();

    let config = RuntimeConfig::load_from_file(&path).unwrap();
    let flow = FlowStateMachine::with_config("configured", config);
    flow.add_flow_state("Only", 0.0, &[]).unwrap();
    flow.start().unwrap();

    for target in ["a", "b", "c"] {
        assert!(flow.transition_to_state(target).is_err());
    }
    let warnings = flow.diagnostics().warnings();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[1].message.contains("'c'"));
}

#[test]
fn test_dialog_tree_with_weak_registry() {
    let registry = Rc::new(WeakRegistry::new());
    let dialog = DecisionStateMachine::new("merchant", registry.clone());

    let hello = dialog.add_state("Hello").unwrap();
    let trade = dialog.add_state("Trade").unwrap();
    let farewell = dialog.add_state("Farewell").unwrap();
    let buy = dialog.add_trigger("buy").unwrap();
    let leave = dialog.add_trigger("leave").unwrap();

    dialog.connect(&hello, Some(&*buy), &trade);
    dialog.connect(&hello, Some(&*leave), &farewell);
    dialog.connect(&trade, Some(&*leave), &farewell);

    dialog.enable();
    dialog.start().unwrap();

    dialog.next_by_trigger("buy").unwrap();
    assert!(dialog.is_in_state("Trade"));
    assert!(dialog.next_by_trigger("buy").is_err());
    dialog.next_by_trigger("leave").unwrap();
    assert!(dialog.is_in_state("Farewell"));

    // Options survive serialization as (root, id) pairs
    let json = serde_json::to_string(&*hello.options()).unwrap();
    let restored: Vec<DecisionOption> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, *hello.options());
    let target = restored[0].target.resolve(&*registry).unwrap();
    assert!(Rc::ptr_eq(&target, &trade));
}

#[test]
fn test_composite_root_owns_machine_nodes() {
    let registry = ScopedRegistry::new();
    let mut root = CompositeRoot::new("scene");
    let folder = NodeGroup::create("triggers");
    folder.items_mut().add(Trigger::create("open")).unwrap();
    folder.items_mut().add(Trigger::create("close")).unwrap();
    root.add(folder.clone()).unwrap();

    assert!(root.validate().is_empty());
    assert_eq!(root.enable(&registry), Ok(3));

    let close = folder.items().get(1).unwrap().clone();
    let reference: CompositeReference<Trigger> = CompositeReference::to(root.id(), close.id());
    assert_eq!(reference.resolve(&registry).unwrap().name(), "close");

    assert_eq!(root.disable(&registry), 3);
    assert!(reference.resolve(&registry).is_none());
}
