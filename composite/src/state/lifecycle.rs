//! State lifecycle: enter/exit hooks, notifications and authored actions

use crate::core::{CompositeNode, NodeId};
use crate::error::TransitionError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{info, warn};

/// What a transition request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Exit and enter ran synchronously
    Transitioned,
    /// The transition was queued for the start of the next tick
    Deferred,
    /// The target was already the current state
    Unchanged,
}

/// How a machine handles named transitions requested outside another transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionPolicy {
    /// Run synchronously
    #[default]
    Immediate,
    /// Always wait for the next tick
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Entered,
    Exited,
}

/// Payload delivered to enter/exit listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateNotification {
    pub event: StateEvent,
    pub state: NodeId,
    pub name: String,
}

/// A named signal raised by a state's authored actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSignal {
    pub state: NodeId,
    pub name: String,
}

/// Native enter/exit listener
pub type StateListener = Box<dyn FnMut(&StateNotification)>;

/// User-configurable reaction to a state being entered or exited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StateAction {
    /// Write a message to the log
    Log { message: String },
    /// Request a named transition from this state
    TransitionTo { state: String },
    /// Raise a signal on the owning machine
    Signal { name: String },
}

/// The machine side of a state's back reference
///
/// States hold a weak pointer to this interface so they can request
/// transitions and schedule timers without knowing the concrete machine type.
pub trait MachineLink {
    /// Request a transition by name on behalf of the state `from`
    fn transition_from(&self, from: NodeId, name: &str) -> Result<TransitionOutcome, TransitionError>;

    /// Start or restart the single-shot timer owned by `owner`
    fn start_timer(&self, owner: NodeId, seconds: f32);

    /// Cancel the timer owned by `owner`, returning whether one was running
    fn cancel_timer(&self, owner: NodeId) -> bool;

    /// Deliver a signal to the machine's signal listeners
    fn emit_signal(&self, from: NodeId, signal: &str);

    /// Report a non-fatal problem on the machine's warning channel
    fn report(&self, message: &str);
}

/// Handle given to state hooks while the machine runs them
pub struct StateContext<'a> {
    machine: &'a dyn MachineLink,
    state: NodeId,
    name: String,
}

impl<'a> StateContext<'a> {
    pub fn new(machine: &'a dyn MachineLink, state: &dyn CompositeNode) -> Self {
        Self {
            machine,
            state: state.id(),
            name: state.name(),
        }
    }

    pub fn state_id(&self) -> NodeId {
        self.state
    }

    pub fn state_name(&self) -> &str {
        &self.name
    }

    /// Request a transition from this state
    pub fn transition_to_state(&self, name: &str) -> Result<TransitionOutcome, TransitionError> {
        self.machine.transition_from(self.state, name)
    }

    /// Start this state's single-shot timer; expiry calls `on_timer`
    pub fn start_timer(&self, seconds: f32) {
        self.machine.start_timer(self.state, seconds);
    }

    pub fn cancel_timer(&self) -> bool {
        self.machine.cancel_timer(self.state)
    }

    pub fn signal(&self, name: &str) {
        self.machine.emit_signal(self.state, name);
    }

    pub fn report(&self, message: &str) {
        self.machine.report(message);
    }

    fn run_action(&self, action: &StateAction) {
        match action {
            StateAction::Log { message } => {
                info!(state = %self.name, "{message}");
            }
            StateAction::TransitionTo { state } => {
                // Failures are already on the warning channel
                let _ = self.transition_to_state(state);
            }
            StateAction::Signal { name } => self.signal(name),
        }
    }
}

/// Machine binding, listeners and authored actions of a state
#[derive(Default)]
pub struct StateCore {
    machine: RefCell<Option<Weak<dyn MachineLink>>>,
    entered_listeners: RefCell<Vec<StateListener>>,
    exited_listeners: RefCell<Vec<StateListener>>,
    entered_actions: RefCell<Vec<StateAction>>,
    exited_actions: RefCell<Vec<StateAction>>,
}

impl StateCore {
    pub(crate) fn bind(&self, machine: Weak<dyn MachineLink>) {
        *self.machine.borrow_mut() = Some(machine);
    }

    pub(crate) fn unbind(&self) {
        *self.machine.borrow_mut() = None;
    }

    /// The owning machine, if bound and still alive
    pub fn machine(&self) -> Option<Rc<dyn MachineLink>> {
        self.machine.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_bound(&self) -> bool {
        self.machine().is_some()
    }

    /// Add a listener called after every enter
    pub fn on_entered(&self, listener: impl FnMut(&StateNotification) + 'static) {
        self.entered_listeners.borrow_mut().push(Box::new(listener));
    }

    /// Add a listener called after every exit
    pub fn on_exited(&self, listener: impl FnMut(&StateNotification) + 'static) {
        self.exited_listeners.borrow_mut().push(Box::new(listener));
    }

    pub fn clear_listeners(&self) {
        self.entered_listeners.borrow_mut().clear();
        self.exited_listeners.borrow_mut().clear();
    }

    pub fn add_entered_action(&self, action: StateAction) {
        self.entered_actions.borrow_mut().push(action);
    }

    pub fn add_exited_action(&self, action: StateAction) {
        self.exited_actions.borrow_mut().push(action);
    }

    pub fn entered_actions(&self) -> Vec<StateAction> {
        self.entered_actions.borrow().clone()
    }

    pub fn exited_actions(&self) -> Vec<StateAction> {
        self.exited_actions.borrow().clone()
    }

    pub fn set_entered_actions(&self, actions: Vec<StateAction>) {
        *self.entered_actions.borrow_mut() = actions;
    }

    pub fn set_exited_actions(&self, actions: Vec<StateAction>) {
        *self.exited_actions.borrow_mut() = actions;
    }

    /// Fan a notification out to native listeners, then run authored actions
    fn notify(&self, event: StateEvent, ctx: &StateContext<'_>) {
        let notification = StateNotification {
            event,
            state: ctx.state_id(),
            name: ctx.state_name().to_string(),
        };
        let (listeners, actions) = match event {
            StateEvent::Entered => (&self.entered_listeners, &self.entered_actions),
            StateEvent::Exited => (&self.exited_listeners, &self.exited_actions),
        };

        // Listeners may add listeners; take the list so no borrow is held while they run
        let mut running = std::mem::take(&mut *listeners.borrow_mut());
        for listener in running.iter_mut() {
            listener(&notification);
        }
        let mut slot = listeners.borrow_mut();
        running.append(&mut slot);
        *slot = running;
        drop(slot);

        let actions = actions.borrow().clone();
        for action in &actions {
            ctx.run_action(action);
        }
    }
}

impl std::fmt::Debug for StateCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCore")
            .field("bound", &self.is_bound())
            .field("entered_listeners", &self.entered_listeners.borrow().len())
            .field("exited_listeners", &self.exited_listeners.borrow().len())
            .field("entered_actions", &self.entered_actions.borrow())
            .field("exited_actions", &self.exited_actions.borrow())
            .finish()
    }
}

/// A node with an enter/exit lifecycle driven by a state machine
pub trait CompositeState: CompositeNode {
    fn state_core(&self) -> &StateCore;

    /// Called when the machine enters this state, before the entered notification
    fn on_enter(&self, _ctx: &StateContext<'_>) {}

    /// Called when the machine leaves this state, before the exited notification
    fn on_exit(&self, _ctx: &StateContext<'_>) {}

    /// Called once per tick while this state is current
    fn on_tick(&self, _ctx: &StateContext<'_>, _delta_time: f32) {}

    /// Called when this state's single-shot timer expires while it is current
    fn on_timer(&self, _ctx: &StateContext<'_>) {}

    /// Whether a named transition away from this state is permitted
    fn allows_transition_to(&self, _name: &str) -> bool {
        true
    }

    /// Run the enter hook and the entered notification; called by the machine
    fn enter(&self, ctx: &StateContext<'_>) {
        self.on_enter(ctx);
        self.state_core().notify(StateEvent::Entered, ctx);
    }

    /// Run the exit hook and the exited notification; called by the machine
    fn exit(&self, ctx: &StateContext<'_>) {
        self.on_exit(ctx);
        self.state_core().notify(StateEvent::Exited, ctx);
    }

    /// Ask the owning machine to transition to the state called `name`
    fn transition_to_state(&self, name: &str) -> Result<TransitionOutcome, TransitionError> {
        match self.state_core().machine() {
            Some(machine) => machine.transition_from(self.id(), name),
            None => {
                let state = self.name();
                warn!(state = %state, target = name, "Transition requested on a state that is not bound to a machine");
                Err(TransitionError::Unbound { state })
            }
        }
    }
}
