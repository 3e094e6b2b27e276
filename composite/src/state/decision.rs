//! Decision state machine: states advance by following authored options

use super::lifecycle::{CompositeState, StateCore, TransitionOutcome, TransitionPolicy};
use super::machine::StateMachine;
use crate::config::RuntimeConfig;
use crate::error::{CompositeError, TransitionError};
use crate::reference::CompositeReference;
use crate::registry::IdentityRegistry;
use crate::{CompositeList, CompositeNode, NodeCore, NodeFactory, NodeId, NodeKind, Owner, RootId};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::ops::Deref;
use std::rc::Rc;
use tracing::{debug, info};

/// Named key used to pick among a decision state's options
#[derive(CompositeNode)]
#[composite(name = "Trigger")]
pub struct Trigger {
    #[composite(core)]
    core: NodeCore,
}

/// One outgoing edge of a decision state
///
/// An unset trigger makes the option reachable only by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub trigger: CompositeReference<Trigger>,
    pub target: CompositeReference<DecisionState>,
}

impl DecisionOption {
    pub fn new(trigger: CompositeReference<Trigger>, target: CompositeReference<DecisionState>) -> Self {
        Self { trigger, target }
    }
}

/// State whose successors are listed as options
#[derive(CompositeNode)]
#[composite(name = "DecisionState")]
pub struct DecisionState {
    #[composite(core)]
    core: NodeCore,
    state: StateCore,
    options: RefCell<Vec<DecisionOption>>,
}

impl CompositeState for DecisionState {
    fn state_core(&self) -> &StateCore {
        &self.state
    }
}

impl DecisionState {
    pub fn add_option(&self, option: DecisionOption) {
        self.options.borrow_mut().push(option);
    }

    pub fn options(&self) -> Ref<'_, Vec<DecisionOption>> {
        self.options.borrow()
    }

    pub fn option(&self, index: usize) -> Option<DecisionOption> {
        self.options.borrow().get(index).cloned()
    }

    pub fn option_count(&self) -> usize {
        self.options.borrow().len()
    }

    pub fn set_options(&self, options: Vec<DecisionOption>) {
        *self.options.borrow_mut() = options;
    }

    pub fn clear_options(&self) {
        self.options.borrow_mut().clear();
    }
}

/// State machine whose transitions are chosen by option index or trigger name
///
/// Option targets and triggers are references resolved through the identity
/// registry, so the machine's states and triggers must be registered under
/// its root, which [`enable`](Self::enable) does. Named transitions are
/// always deferred to the next tick.
///
/// Build and remove states through this type rather than through the engine
/// it derefs to, so registrations follow the state list while enabled.
pub struct DecisionStateMachine {
    machine: Rc<StateMachine<DecisionState>>,
    triggers: RefCell<CompositeList<Trigger>>,
    registry: Rc<dyn IdentityRegistry>,
    enabled: Cell<bool>,
    /// Ids currently registered under the machine's root
    registered: RefCell<HashSet<NodeId>>,
}

impl DecisionStateMachine {
    pub fn new(name: &str, registry: Rc<dyn IdentityRegistry>) -> Self {
        Self::with_config(name, registry, RuntimeConfig::default())
    }

    pub fn with_config(name: &str, registry: Rc<dyn IdentityRegistry>, config: RuntimeConfig) -> Self {
        let machine = StateMachine::with_config(name, TransitionPolicy::Deferred, config);
        let triggers = CompositeList::new(Owner::Root(machine.root_id()));
        Self {
            machine,
            triggers: RefCell::new(triggers),
            registry,
            enabled: Cell::new(false),
            registered: RefCell::new(HashSet::new()),
        }
    }

    /// The underlying engine
    pub fn machine(&self) -> &Rc<StateMachine<DecisionState>> {
        &self.machine
    }

    pub fn registry(&self) -> &Rc<dyn IdentityRegistry> {
        &self.registry
    }

    /// Register every state and trigger under this machine's root
    ///
    /// Calling it again re-registers the current states and triggers,
    /// overwriting the previous entries. Returns the number registered.
    pub fn enable(&self) -> usize {
        self.enabled.set(true);
        let nodes = self.owned_nodes();
        for node in &nodes {
            self.register(node);
        }
        info!(machine = %self.name(), registered = nodes.len(), "Enabled decision state machine");
        nodes.len()
    }

    /// Unregister everything this machine registered, including states removed since
    pub fn disable(&self) -> usize {
        if !self.enabled.replace(false) {
            return 0;
        }
        let root = self.root_id();
        let ids: Vec<NodeId> = self.registered.borrow_mut().drain().collect();
        let removed = ids
            .into_iter()
            .filter(|id| self.registry.unregister(root, *id))
            .count();
        info!(machine = %self.name(), removed, "Disabled decision state machine");
        removed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn owned_nodes(&self) -> Vec<Rc<dyn CompositeNode>> {
        let mut nodes = self.machine.states().nodes();
        nodes.extend(self.triggers.borrow().nodes());
        nodes
    }

    fn register(&self, node: &Rc<dyn CompositeNode>) {
        self.registry.register(self.root_id(), node);
        self.registered.borrow_mut().insert(node.id());
    }

    fn register_if_enabled(&self, node: Rc<dyn CompositeNode>) {
        if self.enabled.get() {
            self.register(&node);
        }
    }

    /// Create a state, registering it if the machine is enabled
    pub fn add_state(&self, name: &str) -> Result<Rc<DecisionState>, CompositeError> {
        let state = self.machine.add_state(name)?;
        self.register_if_enabled(state.clone());
        Ok(state)
    }

    /// Create a state through a factory type tag, registering it if the machine is enabled
    pub fn add_state_from(
        &self,
        factory: &NodeFactory,
        type_tag: &str,
        name: &str,
    ) -> Result<Rc<DecisionState>, CompositeError> {
        let state = self.machine.add_state_from(factory, type_tag, name)?;
        self.register_if_enabled(state.clone());
        Ok(state)
    }

    /// Return the state at `index`, creating it and any filler states first
    ///
    /// Every state created on the way is registered if the machine is enabled.
    pub fn ensure_state(&self, index: usize, name: &str) -> Result<Rc<DecisionState>, CompositeError> {
        let before = self.machine.state_count();
        let state = self.machine.ensure_state(index, name)?;
        for created in before..self.machine.state_count() {
            if let Some(created) = self.machine.get_state(created) {
                self.register_if_enabled(created);
            }
        }
        Ok(state)
    }

    /// Append an existing state (authoring operation), registering it if the machine is enabled
    pub fn push_state(&self, state: Rc<DecisionState>) -> Result<(), CompositeError> {
        self.machine.push_state(state.clone())?;
        self.register_if_enabled(state);
        Ok(())
    }

    /// Remove the state at `index` (authoring operation) and unregister it
    pub fn remove_state_at(&self, index: usize) -> Result<Rc<DecisionState>, CompositeError> {
        let removed = self.machine.remove_state_at(index)?;
        if self.registered.borrow_mut().remove(&removed.id()) {
            self.registry.unregister(self.root_id(), removed.id());
        }
        Ok(removed)
    }

    /// Create a trigger, registering it if the machine is enabled
    pub fn add_trigger(&self, name: &str) -> Result<Rc<Trigger>, CompositeError> {
        let trigger = Trigger::create(name);
        self.triggers.borrow_mut().attach(trigger.clone())?;
        self.register_if_enabled(trigger.clone());
        Ok(trigger)
    }

    pub fn triggers(&self) -> Ref<'_, CompositeList<Trigger>> {
        self.triggers.borrow()
    }

    pub fn get_trigger(&self, name: &str) -> Option<Rc<Trigger>> {
        self.triggers.borrow().find_by_name(name).cloned()
    }

    /// Append an option from `from` to `target`, optionally keyed by `trigger`
    pub fn connect(&self, from: &DecisionState, trigger: Option<&Trigger>, target: &DecisionState) {
        let root = self.root_id();
        let mut option = DecisionOption::default();
        if let Some(trigger) = trigger {
            option.trigger.set_target(root, trigger);
        }
        option.target.set_target(root, target);
        from.add_option(option);
    }

    /// Follow the current state's first option
    pub fn next(&self) -> Result<TransitionOutcome, TransitionError> {
        self.next_by_index(0)
    }

    /// Follow the current state's option at `index`
    pub fn next_by_index(&self, index: usize) -> Result<TransitionOutcome, TransitionError> {
        let current = self.current_or_report()?;
        let Some(option) = current.option(index) else {
            let len = current.option_count();
            self.diagnostics().report(format!(
                "state '{}' has no option {index} ({len} options)",
                current.name()
            ));
            return Err(TransitionError::OptionOutOfRange { index, len });
        };
        self.follow(&current, index, &option)
    }

    /// Follow the first option of the current state whose trigger has the given name
    pub fn next_by_trigger(&self, trigger: &str) -> Result<TransitionOutcome, TransitionError> {
        let current = self.current_or_report()?;
        let options = current.options().clone();
        let matched = options.iter().enumerate().find(|(_, option)| {
            option
                .trigger
                .resolve(&*self.registry)
                .is_some_and(|resolved| resolved.core().name_is(trigger))
        });

        match matched {
            Some((index, option)) => self.follow(&current, index, option),
            None => {
                let state = current.name();
                self.diagnostics()
                    .report(format!("state '{state}' has no option for trigger '{trigger}'"));
                Err(TransitionError::NoMatchingTrigger {
                    state,
                    trigger: trigger.to_string(),
                })
            }
        }
    }

    fn current_or_report(&self) -> Result<Rc<DecisionState>, TransitionError> {
        self.machine.current_state().ok_or_else(|| {
            self.diagnostics().report(format!(
                "decision state machine '{}' has no current state",
                self.name()
            ));
            TransitionError::NoCurrentState
        })
    }

    fn follow(
        &self,
        current: &DecisionState,
        index: usize,
        option: &DecisionOption,
    ) -> Result<TransitionOutcome, TransitionError> {
        match option.target.resolve(&*self.registry) {
            Some(target) => {
                debug!(machine = %self.name(), from = %current.name(), to = %target.name(), index, "Following decision option");
                self.machine.set_state(&target)
            }
            None => {
                let state = current.name();
                self.diagnostics().report(format!(
                    "option {index} of state '{state}' does not resolve to a state"
                ));
                Err(TransitionError::UnresolvedOption { state, index })
            }
        }
    }

    pub fn root_id(&self) -> RootId {
        self.machine.root_id()
    }
}

impl Deref for DecisionStateMachine {
    type Target = StateMachine<DecisionState>;

    fn deref(&self) -> &Self::Target {
        &self.machine
    }
}

impl Drop for DecisionStateMachine {
    fn drop(&mut self) {
        self.disable();
    }
}

impl std::fmt::Debug for DecisionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionStateMachine")
            .field("machine", &self.machine)
            .field("triggers", &self.triggers.borrow().len())
            .field("enabled", &self.enabled.get())
            .field("registered", &self.registered.borrow().len())
            .finish()
    }
}
