//! Flow state machine: named transitions restricted by per-state allow-lists

use super::lifecycle::{CompositeState, StateContext, StateCore, TransitionPolicy};
use super::machine::StateMachine;
use crate::config::RuntimeConfig;
use crate::error::CompositeError;
use crate::{CompositeNode, NodeCore};
use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::Rc;
use tracing::{trace, warn};

/// State that lists the states it may transition to
///
/// A positive duration starts a timer on enter. When it expires the state
/// follows the first entry of its allow-list.
#[derive(CompositeNode)]
#[composite(name = "FlowState")]
pub struct FlowState {
    #[composite(core)]
    core: NodeCore,
    state: StateCore,
    transitions: RefCell<Vec<String>>,
    duration: Cell<f32>,
}

impl CompositeState for FlowState {
    fn state_core(&self) -> &StateCore {
        &self.state
    }

    fn on_enter(&self, ctx: &StateContext<'_>) {
        let duration = self.duration.get();
        if duration > 0.0 {
            ctx.start_timer(duration);
        }
    }

    fn on_exit(&self, ctx: &StateContext<'_>) {
        ctx.cancel_timer();
    }

    fn on_timer(&self, ctx: &StateContext<'_>) {
        let next = self.transitions.borrow().first().cloned();
        match next {
            Some(next) => {
                let _ = ctx.transition_to_state(&next);
            }
            None => trace!(state = %ctx.state_name(), "Timer expired with no outgoing transition"),
        }
    }

    fn allows_transition_to(&self, name: &str) -> bool {
        self.transitions.borrow().iter().any(|allowed| allowed == name)
    }
}

impl FlowState {
    /// Seconds spent in this state before following its first transition, 0 for no timer
    pub fn duration(&self) -> f32 {
        self.duration.get()
    }

    pub fn set_duration(&self, seconds: f32) {
        if seconds >= 0.0 {
            self.duration.set(seconds);
        } else {
            warn!(state = %self.name(), seconds, "Invalid flow state duration, using 0");
            self.duration.set(0.0);
        }
    }

    /// Names of the states this state may transition to, in order
    pub fn transitions(&self) -> Vec<String> {
        self.transitions.borrow().clone()
    }

    /// Allow a transition to `name`; adding a name twice keeps one entry
    pub fn add_transition(&self, name: &str) {
        let mut transitions = self.transitions.borrow_mut();
        if !transitions.iter().any(|allowed| allowed == name) {
            transitions.push(name.to_string());
        }
    }

    pub fn remove_transition(&self, name: &str) -> bool {
        let mut transitions = self.transitions.borrow_mut();
        let before = transitions.len();
        transitions.retain(|allowed| allowed != name);
        before != transitions.len()
    }

    pub fn set_transitions<I, N>(&self, names: I)
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        *self.transitions.borrow_mut() = names.into_iter().map(Into::into).collect();
    }
}

/// State machine whose named transitions must appear in the current state's allow-list
pub struct FlowStateMachine {
    machine: Rc<StateMachine<FlowState>>,
}

impl FlowStateMachine {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, RuntimeConfig::default())
    }

    pub fn with_config(name: &str, config: RuntimeConfig) -> Self {
        Self {
            machine: StateMachine::with_config(name, TransitionPolicy::Immediate, config),
        }
    }

    pub fn machine(&self) -> &Rc<StateMachine<FlowState>> {
        &self.machine
    }

    /// Create a state with a duration and an allow-list in one call
    pub fn add_flow_state(
        &self,
        name: &str,
        duration: f32,
        transitions: &[&str],
    ) -> Result<Rc<FlowState>, CompositeError> {
        let state = self.machine.add_state(name)?;
        state.set_duration(duration);
        state.set_transitions(transitions.iter().copied());
        Ok(state)
    }

    /// Allow `from` to transition to `to`
    pub fn connect(&self, from: &FlowState, to: &FlowState) {
        from.add_transition(&to.name());
    }

    /// Seconds left on a state's timer, `None` when it has none running
    pub fn state_timer(&self, state: &FlowState) -> Option<f32> {
        self.machine.timer_remaining(state.id())
    }
}

impl Deref for FlowStateMachine {
    type Target = StateMachine<FlowState>;

    fn deref(&self) -> &Self::Target {
        &self.machine
    }
}

impl std::fmt::Debug for FlowStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FlowStateMachine").field(&self.machine).finish()
    }
}
