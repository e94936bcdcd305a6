//! Profile of a task analysis: conflict matrices, warnings, recommendations.

use crate::globals::{GlobalWrites, Globals};
use crate::task::{Task, TaskId};
use crate::tasks::Tasks;
use ntspor_nts::{Nts, StateId};
use serde::Serialize;
use std::fmt;

/// Summary of how much independence POR can hope to exploit.
#[derive(Debug, Serialize)]
pub struct TasksProfile {
    pub num_tasks: usize,
    pub num_states: usize,
    pub num_transitions: usize,
    pub idle_states: usize,
    /// Task names, in the row/column order of the matrices below.
    pub task_names: Vec<String>,
    /// `direct_conflicts[i][j]`: direct summaries of tasks i and j may collide.
    pub direct_conflicts: Vec<Vec<bool>>,
    /// Same, over transitive summaries. This is what the POR engine sees.
    pub transitive_conflicts: Vec<Vec<bool>>,
    /// Fraction of distinct task pairs whose direct summaries are independent (0.0-1.0).
    pub direct_independence_ratio: f64,
    pub warnings: Vec<Warning>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub enum Warning {
    MainNotInstantiated { main: String },
    UniversalWriter { task: String },
    SharedByAll { var: String },
    IdleTaskWrites { vars: String },
}

#[derive(Debug, Serialize)]
pub enum Recommendation {
    RefineActivation { independence_pct: u32 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MainNotInstantiated { main } => {
                write!(f, "Main unit '{}' is not instantiated", main)
            }
            Warning::UniversalWriter { task } => {
                write!(f, "Task '{}' may write every global variable", task)
            }
            Warning::SharedByAll { var } => {
                write!(f, "Global '{}' is used by every task", var)
            }
            Warning::IdleTaskWrites { vars } => {
                write!(f, "States outside any thread body write {}", vars)
            }
        }
    }
}

impl Warning {
    pub fn fix_hint(&self) -> &'static str {
        match self {
            Warning::MainNotInstantiated { .. } => {
                "pass the name of the instantiated entry unit with --main"
            }
            Warning::UniversalWriter { .. } => {
                "writes through unresolved pointers conflict with everything; resolve the address before flattening"
            }
            Warning::SharedByAll { .. } => {
                "no pair of tasks is independent on this variable; POR gains nothing from it"
            }
            Warning::IdleTaskWrites { .. } => {
                "check that the inliner annotated thread bodies with '<task>:<n>:<label>' origins"
            }
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::RefineActivation { independence_pct } => {
                write!(
                    f,
                    "{}% of task pairs are directly independent, but every task may activate every task; an activation graph would let POR use them",
                    independence_pct
                )
            }
        }
    }
}

/// Analyze a task result and produce a profile.
pub fn analyze(tasks: &Tasks, nts: &Nts) -> TasksProfile {
    let named: Vec<(TaskId, &Task)> = tasks
        .iter()
        .filter(|(id, _)| matches!(id, TaskId::Named(_)))
        .collect();
    let n = named.len();

    let direct_conflicts = conflict_matrix(&named, direct_of);
    let transitive_conflicts = conflict_matrix(&named, transitive_of);

    let direct_independence_ratio = if n > 1 {
        let independent_pairs = direct_conflicts
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .filter(move |(j, _)| i != *j)
                    .filter(|(_, &v)| !v)
            })
            .count();
        independent_pairs as f64 / (n * (n - 1)) as f64
    } else {
        0.0
    };

    let mut warnings = Vec::new();

    if tasks.main_task.is_none() {
        warnings.push(Warning::MainNotInstantiated {
            main: tasks.config().main_nts.clone(),
        });
    }

    for (_, task) in &named {
        if task.direct_global.writes.is_universal() {
            warnings.push(Warning::UniversalWriter {
                task: task.name.clone(),
            });
        }
    }

    if n > 1 {
        for info in tasks.global_variable_info(nts) {
            let users = info.users();
            if named.iter().all(|(id, _)| users.contains(id)) {
                warnings.push(Warning::SharedByAll {
                    var: nts.global_name(info.var),
                });
            }
        }
    }

    let idle_writes = &tasks.idle_worker_task.direct_global.writes;
    if !idle_writes.is_empty() {
        let vars = match idle_writes {
            GlobalWrites::Universal => "every global".to_string(),
            GlobalWrites::Exact(vars) => vars
                .iter()
                .map(|g| nts.global_name(*g))
                .collect::<Vec<_>>()
                .join(", "),
        };
        warnings.push(Warning::IdleTaskWrites { vars });
    }

    let mut recommendations = Vec::new();
    let independence_pct = (direct_independence_ratio * 100.0) as u32;
    let transitive_all_conflict = transitive_conflicts.iter().flatten().all(|&c| c);
    if independence_pct >= 20 && transitive_all_conflict {
        recommendations.push(Recommendation::RefineActivation { independence_pct });
    }

    TasksProfile {
        num_tasks: n,
        num_states: tasks.records().num_states(),
        num_transitions: tasks.records().num_transitions(),
        idle_states: tasks.idle_worker_task.states.len(),
        task_names: named.iter().map(|(_, t)| t.name.clone()).collect(),
        direct_conflicts,
        transitive_conflicts,
        direct_independence_ratio,
        warnings,
        recommendations,
    }
}

fn direct_of(task: &Task) -> &Globals {
    &task.direct_global
}

fn transitive_of(task: &Task) -> &Globals {
    &task.transitive_global
}

fn conflict_matrix(named: &[(TaskId, &Task)], pick: fn(&Task) -> &Globals) -> Vec<Vec<bool>> {
    named
        .iter()
        .map(|(_, a)| {
            named
                .iter()
                .map(|(_, b)| pick(a).may_collide_with(pick(b)))
                .collect()
        })
        .collect()
}

/// One line per analysed transition: owner, endpoints and effect.
pub fn format_transition_info(tasks: &Tasks, nts: &Nts) -> String {
    let mut out = String::new();
    for ti in tasks.records().transitions() {
        let id = ti.transition;
        let Some(bn) = nts.basic_nts.get(id.unit) else {
            continue;
        };
        let Some(t) = bn.transitions.get(id.transition) else {
            continue;
        };
        let state_name = |i: usize| {
            bn.states
                .get(i)
                .map(|s| s.name.as_str())
                .unwrap_or("?")
        };
        let owner = tasks
            .owner(StateId {
                unit: id.unit,
                state: t.from,
            })
            .map(|o| tasks.task(o).name.as_str())
            .unwrap_or("?");
        out.push_str(&format!(
            "{}: {} -> {} [{}] {}\n",
            bn.name,
            state_name(t.from),
            state_name(t.to),
            owner,
            ti.global.display(nts)
        ));
    }
    out
}
