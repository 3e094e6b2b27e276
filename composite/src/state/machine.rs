//! Generic state machine engine

use super::lifecycle::{
    CompositeState, MachineLink, StateContext, StateSignal, TransitionOutcome, TransitionPolicy,
};
use super::scheduler::{Command, Pending, Scheduler};
use crate::config::RuntimeConfig;
use crate::core::{CompositeList, CompositeNode, NodeFactory, NodeId, NodeKind, Owner, RootId};
use crate::diagnostics::Diagnostics;
use crate::error::{CompositeError, TransitionError};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace};

/// Listener for signals raised by authored state actions
pub type SignalListener = Box<dyn FnMut(&StateSignal)>;

/// Marks a transition in progress for as long as it is alive
struct TransitionGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> TransitionGuard<'a> {
    fn begin(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// Owns an ordered list of states and at most one current state
///
/// The machine is the root of its states' tree and always lives in an `Rc`
/// so states can hold a weak back reference to it. All transitions go
/// through [`set_state`](Self::set_state) or a named request. A request made
/// while another transition is running (from an enter or exit hook) is queued
/// and executed at the start of the next [`tick`](Self::tick).
pub struct StateMachine<S: CompositeState + NodeKind> {
    root: RootId,
    name: String,
    self_ref: Weak<Self>,
    policy: TransitionPolicy,
    config: RuntimeConfig,
    states: RefCell<CompositeList<S>>,
    current: RefCell<Option<Rc<S>>>,
    initialized: Cell<bool>,
    transitioning: Cell<bool>,
    tick_count: Cell<u64>,
    scheduler: RefCell<Scheduler<S>>,
    signal_listeners: RefCell<Vec<SignalListener>>,
    diagnostics: Diagnostics,
}

impl<S: CompositeState + NodeKind> StateMachine<S> {
    pub fn new(name: &str, policy: TransitionPolicy) -> Rc<Self> {
        Self::with_config(name, policy, RuntimeConfig::default())
    }

    pub fn with_config(name: &str, policy: TransitionPolicy, config: RuntimeConfig) -> Rc<Self> {
        let config = config.sanitized();
        let root = RootId::new();
        debug!(machine = name, root = %root, ?policy, "Creating state machine");
        Rc::new_cyclic(|self_ref| Self {
            root,
            name: name.to_string(),
            self_ref: self_ref.clone(),
            policy,
            states: RefCell::new(CompositeList::new(Owner::Root(root))),
            current: RefCell::new(None),
            initialized: Cell::new(false),
            transitioning: Cell::new(false),
            tick_count: Cell::new(0),
            scheduler: RefCell::new(Scheduler::new()),
            signal_listeners: RefCell::new(Vec::new()),
            diagnostics: Diagnostics::new(name, config.max_recorded_warnings),
            config,
        })
    }

    pub fn root_id(&self) -> RootId {
        self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Warnings reported by this machine and its states
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count.get()
    }

    fn link(&self) -> Weak<dyn MachineLink> {
        self.self_ref.clone()
    }

    /// Bind every state to this machine; calling it again does nothing
    pub fn initialize(&self) {
        if self.initialized.replace(true) {
            trace!(machine = %self.name, "State machine already initialized");
            return;
        }
        let link = self.link();
        let states = self.states.borrow();
        for state in states.iter() {
            state.state_core().bind(link.clone());
        }
        debug!(machine = %self.name, states = states.len(), "Initialized state machine");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn current_state(&self) -> Option<Rc<S>> {
        self.current.borrow().clone()
    }

    pub fn current_state_name(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|state| state.name())
    }

    pub fn is_in_state(&self, name: &str) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|state| state.core().name_is(name))
    }

    pub fn states(&self) -> Ref<'_, CompositeList<S>> {
        self.states.borrow()
    }

    pub fn state_count(&self) -> usize {
        self.states.borrow().len()
    }

    pub fn get_state(&self, index: usize) -> Option<Rc<S>> {
        self.states.borrow().get(index).cloned()
    }

    /// First state with the given name
    pub fn get_state_by_name(&self, name: &str) -> Option<Rc<S>> {
        self.states.borrow().find_by_name(name).cloned()
    }

    /// Position of a state in this machine's list
    ///
    /// # Panics
    ///
    /// Panics if `state` is not a member of this machine. Asking for the index
    /// of a foreign state is a programming error.
    pub fn index_of_state(&self, state: &S) -> usize {
        self.states
            .borrow()
            .index_of(state.id())
            .unwrap_or_else(|| {
                panic!(
                    "state '{}' is not a member of state machine '{}'",
                    state.name(),
                    self.name
                )
            })
    }

    /// Create a state of the machine's kind, append it and bind it
    pub fn add_state(&self, name: &str) -> Result<Rc<S>, CompositeError> {
        let state = S::create(name);
        self.attach_state(state.clone())?;
        Ok(state)
    }

    /// Create a state through a factory type tag, append it and bind it
    pub fn add_state_from(
        &self,
        factory: &NodeFactory,
        type_tag: &str,
        name: &str,
    ) -> Result<Rc<S>, CompositeError> {
        let state = factory.create_typed::<S>(type_tag, name)?;
        self.attach_state(state.clone())?;
        Ok(state)
    }

    /// Return the state at `index`, creating states until the slot exists
    ///
    /// Filler states created on the way are named after their index.
    pub fn ensure_state(&self, index: usize, name: &str) -> Result<Rc<S>, CompositeError> {
        if let Some(state) = self.get_state(index) {
            return Ok(state);
        }
        while self.state_count() < index {
            let filler = format!("State {}", self.state_count());
            self.add_state(&filler)?;
        }
        self.add_state(name)
    }

    /// Append an existing state (authoring operation, honours the list policy)
    pub fn push_state(&self, state: Rc<S>) -> Result<(), CompositeError> {
        self.states.borrow_mut().add(state.clone())?;
        self.bind_if_initialized(&state);
        Ok(())
    }

    /// Remove the state at `index` (authoring operation, honours the list policy)
    ///
    /// Removing the current state also exits it.
    pub fn remove_state_at(&self, index: usize) -> Result<Rc<S>, CompositeError> {
        let removed = self.states.borrow_mut().remove_at(index)?;
        let was_current = self
            .current
            .borrow()
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &removed));
        if was_current {
            self.exit_current();
        }
        self.scheduler.borrow_mut().cancel_owner(removed.id());
        removed.state_core().unbind();
        debug!(machine = %self.name, state = %removed.name(), "Removed state");
        Ok(removed)
    }

    /// Reorder states (authoring operation, honours the list policy)
    pub fn move_state(&self, from: usize, to: usize) -> Result<(), CompositeError> {
        self.states.borrow_mut().move_item(from, to)
    }

    /// Lock or unlock authoring changes to the state list
    pub fn set_state_policy(&self, can_add_remove: bool, can_reorder: bool) {
        let mut states = self.states.borrow_mut();
        states.set_can_add_remove(can_add_remove);
        states.set_can_reorder(can_reorder);
    }

    fn attach_state(&self, state: Rc<S>) -> Result<(), CompositeError> {
        self.states.borrow_mut().attach(state.clone())?;
        state.state_core().bind(self.link());
        trace!(machine = %self.name, state = %state.name(), "Added state");
        Ok(())
    }

    fn bind_if_initialized(&self, state: &Rc<S>) {
        if self.initialized.get() {
            state.state_core().bind(self.link());
        }
    }

    /// Make `target` the current state
    ///
    /// Exits the old state, then enters the new one. Selecting the current
    /// state again does nothing. Inside another transition the request is
    /// queued for the next tick.
    pub fn set_state(&self, target: &Rc<S>) -> Result<TransitionOutcome, TransitionError> {
        self.change_state(Some(target.clone()))
    }

    pub fn set_state_by_index(&self, index: usize) -> Result<TransitionOutcome, TransitionError> {
        match self.get_state(index) {
            Some(target) => self.change_state(Some(target)),
            None => {
                let len = self.state_count();
                self.diagnostics.report(format!(
                    "state index {index} out of range for state machine '{}' with {len} states",
                    self.name
                ));
                Err(TransitionError::StateIndexOutOfRange { index, len })
            }
        }
    }

    /// Exit the current state and leave the machine without one
    pub fn clear_state(&self) -> Result<TransitionOutcome, TransitionError> {
        self.change_state(None)
    }

    /// Request a transition from the current state to the state called `name`
    pub fn transition_to_state(&self, name: &str) -> Result<TransitionOutcome, TransitionError> {
        self.request_transition(None, name)
    }

    /// Enter the first state unless a state is already current
    pub fn start(&self) -> Result<TransitionOutcome, TransitionError> {
        self.initialize();
        if self.current.borrow().is_some() {
            return Ok(TransitionOutcome::Unchanged);
        }
        let Some(first) = self.get_state(0) else {
            self.diagnostics
                .report(format!("state machine '{}' has no states to start", self.name));
            return Err(TransitionError::NoStates);
        };
        info!(machine = %self.name, state = %first.name(), "Starting state machine");
        self.change_state(Some(first))
    }

    /// Exit the current state and drop all queued work
    pub fn shutdown(&self) {
        self.exit_current();
        self.scheduler.borrow_mut().clear();
        info!(machine = %self.name, "State machine shut down");
    }

    /// Advance the machine by one tick
    ///
    /// Runs the deferred commands queued before this tick, then the timers,
    /// then the current state's tick hook. A timer started by one of this
    /// tick's commands starts counting on the next tick, like any timer
    /// started outside a tick.
    pub fn tick(&self, delta_time: f32) {
        let tick = self.tick_count.get() + 1;
        self.tick_count.set(tick);
        self.diagnostics.set_tick(tick);
        self.scheduler.borrow_mut().begin_tick(tick);

        let due = self
            .scheduler
            .borrow_mut()
            .take_due(self.config.max_commands_per_tick);
        for pending in due {
            self.execute(pending);
        }

        let expired = self.scheduler.borrow_mut().advance(delta_time);
        for owner in expired {
            match self.current_state() {
                Some(state) if state.id() == owner => {
                    trace!(machine = %self.name, state = %state.name(), "State timer expired");
                    let ctx = StateContext::new(self, &*state);
                    state.on_timer(&ctx);
                }
                _ => trace!(machine = %self.name, owner = %owner, "Dropping timer of inactive state"),
            }
        }

        if let Some(state) = self.current_state() {
            let ctx = StateContext::new(self, &*state);
            state.on_tick(&ctx, delta_time);
        }
    }

    /// Deferred commands waiting for the next tick
    pub fn pending_count(&self) -> usize {
        self.scheduler.borrow().pending_commands()
    }

    /// Seconds left on a state's timer
    pub fn timer_remaining(&self, state: NodeId) -> Option<f32> {
        self.scheduler.borrow().timer_remaining(state)
    }

    /// Add a listener for signals raised by state actions
    pub fn on_signal(&self, listener: impl FnMut(&StateSignal) + 'static) {
        self.signal_listeners.borrow_mut().push(Box::new(listener));
    }

    fn find_state(&self, id: NodeId) -> Option<Rc<S>> {
        let states = self.states.borrow();
        states.index_of(id).and_then(|index| states.get(index).cloned())
    }

    fn request_transition(
        &self,
        from: Option<NodeId>,
        name: &str,
    ) -> Result<TransitionOutcome, TransitionError> {
        let current = self.current_state();
        let source = match from {
            Some(from) => match current {
                Some(state) if state.id() == from => Some(state),
                _ => {
                    let state = self
                        .find_state(from)
                        .map(|state| state.name())
                        .unwrap_or_else(|| from.to_string());
                    self.diagnostics.report(format!(
                        "state '{state}' requested a transition to '{name}' but is not the current state"
                    ));
                    return Err(TransitionError::NotActive { state });
                }
            },
            None => current,
        };

        if let Some(source) = &source {
            if !source.allows_transition_to(name) {
                let from = source.name();
                self.diagnostics
                    .report(format!("no transition from '{from}' to '{name}'"));
                return Err(TransitionError::NotAllowed {
                    from,
                    to: name.to_string(),
                });
            }
        }

        let Some(target) = self.get_state_by_name(name) else {
            self.diagnostics.report(format!(
                "no state named '{name}' in state machine '{}'",
                self.name
            ));
            return Err(TransitionError::UnknownState {
                name: name.to_string(),
            });
        };

        if self.policy == TransitionPolicy::Deferred || self.transitioning.get() {
            let owner = source.as_ref().map(|state| state.id());
            self.scheduler
                .borrow_mut()
                .push(owner, Command::TransitionTo(name.to_string()));
            debug!(machine = %self.name, target = name, "Deferred transition to next tick");
            return Ok(TransitionOutcome::Deferred);
        }

        self.change_state(Some(target))
    }

    fn change_state(&self, target: Option<Rc<S>>) -> Result<TransitionOutcome, TransitionError> {
        if let Some(target) = &target {
            if !self.states.borrow().contains(target.id()) {
                self.diagnostics.report(format!(
                    "state '{}' is not a member of state machine '{}'",
                    target.name(),
                    self.name
                ));
                return Err(TransitionError::NotAMember(target.id()));
            }
        }

        let previous = self.current_state();
        let unchanged = match (&previous, &target) {
            (Some(previous), Some(target)) => Rc::ptr_eq(previous, target),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            trace!(machine = %self.name, "Transition to the current state ignored");
            return Ok(TransitionOutcome::Unchanged);
        }

        if self.transitioning.get() {
            let owner = previous.as_ref().map(|state| state.id());
            self.scheduler
                .borrow_mut()
                .push(owner, Command::SetState(target));
            debug!(machine = %self.name, "Transition requested during a transition, deferred");
            return Ok(TransitionOutcome::Deferred);
        }

        let _guard = TransitionGuard::begin(&self.transitioning);

        if let Some(previous) = &previous {
            let ctx = StateContext::new(self, &**previous);
            previous.exit(&ctx);
            // Anything the exited state scheduled, including from its exit hook, is void
            self.scheduler.borrow_mut().cancel_owner(previous.id());
        }

        *self.current.borrow_mut() = target.clone();

        if let Some(next) = &target {
            if !next.state_core().is_bound() {
                next.state_core().bind(self.link());
            }
            let ctx = StateContext::new(self, &**next);
            next.enter(&ctx);
        }

        self.log_transition(previous.as_deref(), target.as_deref());
        Ok(TransitionOutcome::Transitioned)
    }

    fn exit_current(&self) {
        let Some(previous) = self.current_state() else {
            return;
        };
        let _guard = TransitionGuard::begin(&self.transitioning);
        let ctx = StateContext::new(self, &*previous);
        previous.exit(&ctx);
        self.scheduler.borrow_mut().cancel_owner(previous.id());
        *self.current.borrow_mut() = None;
        self.log_transition(Some(&*previous), None);
    }

    fn execute(&self, pending: Pending<S>) {
        if let Some(owner) = pending.owner {
            let still_current = self
                .current
                .borrow()
                .as_ref()
                .is_some_and(|state| state.id() == owner);
            if !still_current {
                debug!(machine = %self.name, owner = %owner, "Dropping deferred command of an exited state");
                return;
            }
        }

        let result = match pending.command {
            Command::SetState(target) => self.change_state(target),
            Command::TransitionTo(name) => match self.get_state_by_name(&name) {
                Some(target) => self.change_state(Some(target)),
                None => {
                    self.diagnostics.report(format!(
                        "no state named '{name}' in state machine '{}'",
                        self.name
                    ));
                    Err(TransitionError::UnknownState { name })
                }
            },
        };
        if let Err(e) = result {
            debug!(machine = %self.name, error = %e, "Deferred transition failed");
        }
    }

    fn log_transition(&self, from: Option<&S>, to: Option<&S>) {
        let from = from.map(|state| state.name()).unwrap_or_default();
        let to = to.map(|state| state.name()).unwrap_or_default();
        if self.config.trace_transitions {
            info!(machine = %self.name, from = %from, to = %to, "State changed");
        } else {
            debug!(machine = %self.name, from = %from, to = %to, "State changed");
        }
    }
}

impl<S: CompositeState + NodeKind> MachineLink for StateMachine<S> {
    fn transition_from(&self, from: NodeId, name: &str) -> Result<TransitionOutcome, TransitionError> {
        self.request_transition(Some(from), name)
    }

    fn start_timer(&self, owner: NodeId, seconds: f32) {
        trace!(machine = %self.name, owner = %owner, seconds, "Starting state timer");
        self.scheduler.borrow_mut().start_timer(owner, seconds);
    }

    fn cancel_timer(&self, owner: NodeId) -> bool {
        self.scheduler.borrow_mut().cancel_timer(owner)
    }

    fn emit_signal(&self, from: NodeId, signal: &str) {
        let signal = StateSignal {
            state: from,
            name: signal.to_string(),
        };
        debug!(machine = %self.name, signal = %signal.name, "State signal");

        let mut listeners = std::mem::take(&mut *self.signal_listeners.borrow_mut());
        for listener in listeners.iter_mut() {
            listener(&signal);
        }
        let mut slot = self.signal_listeners.borrow_mut();
        listeners.append(&mut slot);
        *slot = listeners;
    }

    fn report(&self, message: &str) {
        self.diagnostics.report(message);
    }
}

impl<S: CompositeState + NodeKind> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("policy", &self.policy)
            .field("states", &self.state_count())
            .field("current", &self.current_state_name())
            .field("pending", &self.pending_count())
            .field("timers", &self.scheduler.borrow().active_timers())
            .finish()
    }
}
