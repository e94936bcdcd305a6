//! Tasks: the schedulable units POR reasons about.
//!
//! A task is a group of states (and the transitions leaving them) that came
//! from one thread body. During execution, instances of a task are assigned
//! to threads. A task uses some subset of the global variables and may cause
//! other tasks to run.

use crate::error::{NodeId, TasksError, TasksResult};
use crate::flow::ControlFlow;
use crate::globals::Globals;
use crate::info::NodeRecords;
use ntspor_nts::{Nts, StateId};
use serde::Serialize;
use std::fmt;

/// Handle of a task inside a `Tasks` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TaskId {
    /// Index into `Tasks::tasks`.
    Named(usize),
    /// The sentinel collecting states no named task claims.
    Idle,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Named(i) => write!(f, "#{i}"),
            TaskId::Idle => write!(f, "idle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub name: String,
    /// States owned by this task, in the order they were assigned.
    pub states: Vec<StateId>,

    /// Globals used directly by this task's own transitions.
    pub direct_global: Globals,

    /// Globals used directly by this task or by any task it may activate,
    /// directly or indirectly.
    ///
    /// If a global is not in this set, running this task and everything it
    /// activates never touches that global.
    pub transitive_global: Globals,

    pub initial_states: Vec<StateId>,
    pub final_states: Vec<StateId>,

    pub number: Option<u32>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            direct_global: Globals::default(),
            transitive_global: Globals::default(),
            initial_states: Vec::new(),
            final_states: Vec::new(),
            number: None,
        }
    }

    /// Union the effects of every transition leaving one of this task's states.
    ///
    /// Requires every such transition to carry its record already.
    pub fn compute_direct_globals(
        &mut self,
        flow: &ControlFlow,
        records: &NodeRecords,
    ) -> TasksResult<()> {
        let mut direct = Globals::default();
        for &st in &self.states {
            for &t in flow.outgoing(st) {
                let ti = records.transition(t).ok_or(TasksError::MissingRecord {
                    node: NodeId::Transition(t),
                })?;
                direct.union_with(&ti.global);
            }
        }
        self.direct_global = direct;
        Ok(())
    }

    /// Find the states where control enters and leaves this task.
    ///
    /// A state is initial if its unit marks it so or if no transition from
    /// another state of `me` reaches it; final is the mirror image.
    pub fn compute_boundary_states(
        &mut self,
        me: TaskId,
        nts: &Nts,
        flow: &ControlFlow,
        records: &NodeRecords,
    ) {
        let inside = |st: StateId| records.owner(st) == Some(me);
        let mut initial = Vec::new();
        let mut fin = Vec::new();

        for &st in &self.states {
            let (marked_initial, marked_final) = nts
                .state(st)
                .map(|s| (s.initial, s.is_final))
                .unwrap_or((false, false));

            let entered_from_inside = flow.incoming(st).iter().any(|t| {
                nts.transition(*t).is_some_and(|tr| {
                    inside(StateId {
                        unit: t.unit,
                        state: tr.from,
                    })
                })
            });
            let leaves_to_inside = flow.outgoing(st).iter().any(|t| {
                nts.transition(*t).is_some_and(|tr| {
                    inside(StateId {
                        unit: t.unit,
                        state: tr.to,
                    })
                })
            });

            if marked_initial || !entered_from_inside {
                initial.push(st);
            }
            if marked_final || !leaves_to_inside {
                fin.push(st);
            }
        }

        self.initial_states = initial;
        self.final_states = fin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::{GlobalReads, GlobalWrites};
    use crate::info::TransitionInfo;
    use ntspor_nts::{BasicNts, GlobalId, State, Transition, TransitionId};

    fn chain(len: usize) -> Nts {
        let states = (0..len)
            .map(|i| State {
                name: format!("s{i}"),
                initial: false,
                is_final: false,
                annotations: vec![],
            })
            .collect();
        let transitions = (1..len)
            .map(|i| Transition {
                from: i - 1,
                to: i,
                rule: vec![],
            })
            .collect();
        Nts {
            name: "sys".to_string(),
            globals: vec![],
            basic_nts: vec![BasicNts {
                name: "main".to_string(),
                locals: vec![],
                states,
                transitions,
            }],
            instances: vec![],
        }
    }

    fn sid(state: usize) -> StateId {
        StateId { unit: 0, state }
    }

    fn tid(transition: usize) -> TransitionId {
        TransitionId {
            unit: 0,
            transition,
        }
    }

    #[test]
    fn test_direct_globals_union() {
        let nts = chain(3);
        let flow = ControlFlow::build(&nts, &[0]);
        let mut records = NodeRecords::new();
        records
            .attach_transition(TransitionInfo {
                transition: tid(0),
                global: Globals::new(
                    [GlobalId(0)].into_iter().collect(),
                    [GlobalId(1)].into_iter().collect(),
                ),
            })
            .unwrap();
        records
            .attach_transition(TransitionInfo {
                transition: tid(1),
                global: Globals::new(GlobalReads::new(), GlobalWrites::Universal),
            })
            .unwrap();

        let mut task = Task::new("t");
        task.states = vec![sid(0), sid(1), sid(2)];
        task.compute_direct_globals(&flow, &records).unwrap();
        assert!(task.direct_global.reads.contains(GlobalId(0)));
        assert!(task.direct_global.writes.is_universal());

        // Only the first state: the universal transition is not ours.
        let mut head = Task::new("head");
        head.states = vec![sid(0)];
        head.compute_direct_globals(&flow, &records).unwrap();
        assert_eq!(
            head.direct_global.writes,
            [GlobalId(1)].into_iter().collect::<GlobalWrites>()
        );
    }

    #[test]
    fn test_direct_globals_requires_records() {
        let nts = chain(2);
        let flow = ControlFlow::build(&nts, &[0]);
        let mut task = Task::new("t");
        task.states = vec![sid(0)];
        let err = task
            .compute_direct_globals(&flow, &NodeRecords::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TasksError::MissingRecord {
                node: NodeId::Transition(t)
            } if t == tid(0)
        ));
    }

    #[test]
    fn test_boundary_states() {
        let nts = chain(4);
        let flow = ControlFlow::build(&nts, &[0]);
        let mut records = NodeRecords::new();
        // s0, s1 belong to #0; s2, s3 to #1.
        for (state, owner) in [(0, 0), (1, 0), (2, 1), (3, 1)] {
            records.attach_state(sid(state)).unwrap().task = Some(TaskId::Named(owner));
        }

        let mut first = Task::new("first");
        first.states = vec![sid(0), sid(1)];
        first.compute_boundary_states(TaskId::Named(0), &nts, &flow, &records);
        assert_eq!(first.initial_states, vec![sid(0)]);
        assert_eq!(first.final_states, vec![sid(1)]);

        let mut second = Task::new("second");
        second.states = vec![sid(2), sid(3)];
        second.compute_boundary_states(TaskId::Named(1), &nts, &flow, &records);
        assert_eq!(second.initial_states, vec![sid(2)]);
        assert_eq!(second.final_states, vec![sid(3)]);
    }
}
