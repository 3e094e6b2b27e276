//! Error types for tree mutation and state transitions

use crate::core::NodeId;

/// Errors produced by list mutation, tree validation and node construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositeError {
    /// The list refuses add/remove while `can_add_remove` is false
    #[error("list does not allow adding or removing elements")]
    AddRemoveLocked,

    /// The list refuses reordering while `can_reorder` is false
    #[error("list does not allow reordering")]
    ReorderLocked,

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Another reachable node already carries this id
    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),

    /// The node is still owned by another list
    #[error("node {0} is already attached to another list")]
    AlreadyAttached(NodeId),

    #[error("node {0} is not a member of this list")]
    NotAMember(NodeId),

    /// No constructor registered for the type tag
    #[error("unknown node type: {0}")]
    UnknownType(String),

    #[error("node type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors produced by state machine transitions
///
/// Every variant describes an authoring or usage problem that leaves the
/// machine unchanged. None of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no state named '{name}'")]
    UnknownState { name: String },

    /// The source state's allow-list does not contain the target
    #[error("no transition from '{from}' to '{to}'")]
    NotAllowed { from: String, to: String },

    /// The state has not been bound to a machine
    #[error("state '{state}' is not bound to a state machine")]
    Unbound { state: String },

    /// Only the current state may request a named transition
    #[error("state '{state}' is not the current state")]
    NotActive { state: String },

    #[error("state {0} is not a member of this state machine")]
    NotAMember(NodeId),

    #[error("state machine has no current state")]
    NoCurrentState,

    #[error("state machine has no states")]
    NoStates,

    #[error("no option of state '{state}' matches trigger '{trigger}'")]
    NoMatchingTrigger { state: String, trigger: String },

    #[error("state index {index} out of range for {len} states")]
    StateIndexOutOfRange { index: usize, len: usize },

    #[error("option index {index} out of range for {len} options")]
    OptionOutOfRange { index: usize, len: usize },

    /// The option's target reference did not resolve
    #[error("option {index} of state '{state}' does not resolve to a state")]
    UnresolvedOption { state: String, index: usize },
}
