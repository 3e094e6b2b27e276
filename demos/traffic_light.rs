//! Traffic light and merchant dialog driven by the composite state machines
//!
//! Run with `RUST_LOG=debug` to see every transition.

use composite::prelude::*;
use std::rc::Rc;
use tracing::info;

const TICK: f32 = 0.25;

fn main() {
    // Initialize logging
    composite::init_logging();
    info!("Starting state machine demo");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "runtime.json".to_string());
    let config = RuntimeConfig::load_from_file(&config_path).expect("Failed to load runtime config");

    run_traffic_light(config.clone());
    run_dialog(config);
}

fn run_traffic_light(config: RuntimeConfig) {
    let flow = FlowStateMachine::with_config("traffic_light", config);
    flow.add_flow_state("Red", 2.0, &["Green"])
        .expect("Failed to add Red");
    flow.add_flow_state("Green", 3.0, &["Yellow"])
        .expect("Failed to add Green");
    flow.add_flow_state("Yellow", 1.0, &["Red"])
        .expect("Failed to add Yellow");

    let red = flow.get_state_by_name("Red").expect("Red exists");
    red.state_core().add_entered_action(StateAction::Log {
        message: "Stop".to_string(),
    });
    red.state_core().on_exited(|n| info!(state = %n.name, "Light changes"));

    flow.start().expect("Failed to start traffic light");

    let mut elapsed = 0.0;
    while elapsed < 12.0 {
        flow.tick(TICK);
        elapsed += TICK;
    }

    info!(
        state = ?flow.current_state_name(),
        ticks = flow.tick_count(),
        warnings = flow.diagnostics().len(),
        "Traffic light finished"
    );
    flow.shutdown();
}

fn run_dialog(config: RuntimeConfig) {
    let registry = Rc::new(ScopedRegistry::new());
    let dialog = DecisionStateMachine::with_config("merchant", registry, config);

    let greet = dialog.add_state("Greet").expect("Failed to add Greet");
    let trade = dialog.add_state("Trade").expect("Failed to add Trade");
    let farewell = dialog.add_state("Farewell").expect("Failed to add Farewell");
    let buy = dialog.add_trigger("buy").expect("Failed to add trigger");
    let leave = dialog.add_trigger("leave").expect("Failed to add trigger");

    dialog.connect(&greet, Some(&*buy), &trade);
    dialog.connect(&greet, Some(&*leave), &farewell);
    dialog.connect(&trade, Some(&*leave), &farewell);
    dialog.enable();
    dialog.start().expect("Failed to start dialog");

    for choice in ["buy", "haggle", "leave"] {
        match dialog.next_by_trigger(choice) {
            Ok(_) => info!(choice, state = ?dialog.current_state_name(), "Dialog advanced"),
            Err(e) => info!(choice, error = %e, "Dialog choice ignored"),
        }
        dialog.tick(TICK);
    }

    dialog.disable();
}
