//! Task analysis error types.
//!
//! Every variant is an internal consistency failure: the input was not
//! produced the way the flattening stage promises, or the pass was run twice
//! over the same records. None of them is recoverable by retrying.

use ntspor_nts::{NtsError, StateId, TransitionId};
use std::fmt;
use thiserror::Error;

/// A node that can carry an analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId {
    State(StateId),
    Transition(TransitionId),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::State(id) => write!(f, "state {id}"),
            NodeId::Transition(id) => write!(f, "transition {id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TasksError {
    #[error("{node} already carries an analysis record")]
    DuplicateRecord { node: NodeId },

    #[error("state '{state}' ({id}) of '{unit}' has no origin annotation")]
    MissingOriginMetadata {
        unit: String,
        state: String,
        id: StateId,
    },

    #[error("{node} has no analysis record yet")]
    MissingRecord { node: NodeId },

    #[error("transitive strategy returned {got} summaries for {expected} tasks")]
    InvalidStrategyResult { expected: usize, got: usize },

    #[error("invalid program: {0}")]
    InvalidProgram(#[from] NtsError),
}

pub type TasksResult<T> = Result<T, TasksError>;
