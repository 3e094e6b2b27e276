//! Composite object runtime
//!
//! This crate provides a polymorphic tree of named nodes with stable identity,
//! lazy cross-tree references resolved through identity registries, and a
//! tick-driven state machine engine with decision and flow variants.

// Lets `composite_derive` expand to `::composite::...` paths inside this crate too.
extern crate self as composite;

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod reference;
pub mod registry;
pub mod state;

pub use crate::core::{
    collect_subtree, downcast_node, CompositeList, CompositeNode, CompositeRoot, NodeCore,
    NodeFactory, NodeGroup, NodeId, NodeKind, Owner, RootId,
};
pub use composite_derive::CompositeNode;
pub use config::RuntimeConfig;
pub use diagnostics::{Diagnostics, Warning};
pub use error::{CompositeError, TransitionError};
pub use reference::{CompositeReference, SourceMode};
pub use registry::{IdentityRegistry, ScopedRegistry, WeakRegistry};
pub use state::{
    CompositeState, DecisionOption, DecisionState, DecisionStateMachine, FlowState,
    FlowStateMachine, MachineLink, StateAction, StateContext, StateCore, StateMachine,
    TransitionOutcome, TransitionPolicy, Trigger,
};

// Re-export commonly used types
pub mod prelude {
    // Tree types
    pub use crate::core::{
        CompositeList, CompositeNode, CompositeRoot, NodeCore, NodeFactory, NodeGroup, NodeId,
        NodeKind, Owner, RootId,
    };
    pub use composite_derive::CompositeNode;

    // Registry and reference types
    pub use crate::reference::{CompositeReference, SourceMode};
    pub use crate::registry::{IdentityRegistry, ScopedRegistry, WeakRegistry};

    // State machine types
    pub use crate::state::{
        CompositeState, DecisionOption, DecisionState, DecisionStateMachine, FlowState, FlowStateMachine,
        StateAction, StateContext, StateCore, StateMachine, TransitionOutcome, TransitionPolicy,
        Trigger,
    };

    // Errors and settings
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{CompositeError, TransitionError};
}

/// Initialize logging for the runtime
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
