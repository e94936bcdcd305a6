//! Per-node analysis records, kept in a side table keyed by node identity.

use crate::error::{NodeId, TasksError, TasksResult};
use crate::globals::Globals;
use crate::task::TaskId;
use ntspor_nts::{StateId, TransitionId};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Additional information about a state: the task it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfo {
    pub st: StateId,
    /// `None` only while partitioning is in progress.
    pub task: Option<TaskId>,
}

/// Additional information about a transition.
///
/// Each transition belongs to the task of its `from` state. `global` holds
/// the globals the transition reads and the globals it may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionInfo {
    pub transition: TransitionId,
    pub global: Globals,
}

/// Side table holding at most one record per state and per transition.
#[derive(Debug, Clone, Default)]
pub struct NodeRecords {
    states: BTreeMap<StateId, StateInfo>,
    transitions: BTreeMap<TransitionId, TransitionInfo>,
}

impl NodeRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fresh, unowned record to `st`.
    pub fn attach_state(&mut self, st: StateId) -> TasksResult<&mut StateInfo> {
        match self.states.entry(st) {
            Entry::Occupied(_) => Err(TasksError::DuplicateRecord {
                node: NodeId::State(st),
            }),
            Entry::Vacant(entry) => Ok(entry.insert(StateInfo { st, task: None })),
        }
    }

    /// Attach a computed record to its transition.
    pub fn attach_transition(&mut self, info: TransitionInfo) -> TasksResult<()> {
        match self.transitions.entry(info.transition) {
            Entry::Occupied(_) => Err(TasksError::DuplicateRecord {
                node: NodeId::Transition(info.transition),
            }),
            Entry::Vacant(entry) => {
                entry.insert(info);
                Ok(())
            }
        }
    }

    pub fn state(&self, st: StateId) -> Option<&StateInfo> {
        self.states.get(&st)
    }

    pub fn transition(&self, t: TransitionId) -> Option<&TransitionInfo> {
        self.transitions.get(&t)
    }

    /// Owning task of a state, once partitioned.
    pub fn owner(&self, st: StateId) -> Option<TaskId> {
        self.states.get(&st).and_then(|si| si.task)
    }

    /// State records in identity order.
    pub fn states(&self) -> impl Iterator<Item = &StateInfo> {
        self.states.values()
    }

    /// Transition records in identity order.
    pub fn transitions(&self) -> impl Iterator<Item = &TransitionInfo> {
        self.transitions.values()
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.transitions.is_empty()
    }

    /// Drop every record, making the table reusable for a fresh pass.
    pub fn clear(&mut self) {
        self.states.clear();
        self.transitions.clear();
    }
}
