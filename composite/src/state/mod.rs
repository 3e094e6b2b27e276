//! State machines built on the composite tree
//!
//! A [`StateMachine`] owns an ordered list of states of one kind and drives
//! their enter/exit lifecycle. [`DecisionStateMachine`] and
//! [`FlowStateMachine`] specialise it with option-based and allow-list based
//! transitions.

pub mod decision;
pub mod flow;
pub mod lifecycle;
pub mod machine;
mod scheduler;

// Re-export commonly used types
pub use decision::{DecisionOption, DecisionState, DecisionStateMachine, Trigger};
pub use flow::{FlowState, FlowStateMachine};
pub use lifecycle::{
    CompositeState, MachineLink, StateAction, StateContext, StateCore, StateEvent, StateListener,
    StateNotification, StateSignal, TransitionOutcome, TransitionPolicy,
};
pub use machine::{SignalListener, StateMachine};
