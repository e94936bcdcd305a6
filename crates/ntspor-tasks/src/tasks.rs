//! Partition a flattened system into tasks and compute their global effects.

use crate::config::TasksConfig;
use crate::effects::{GlobalEffects, StatementEffects};
use crate::error::{TasksError, TasksResult};
use crate::flow::ControlFlow;
use crate::globals::Globals;
use crate::info::{NodeRecords, TransitionInfo};
use crate::task::{Task, TaskId};
use crate::transitive::{EveryTaskActivatesEvery, TransitiveStrategy};
use ntspor_nts::{find_annot_string, Nts, StateId, TransitionId};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, trace, warn};

/// Result of the task analysis.
///
/// Owns the per-node records of the pass. The program itself is only
/// borrowed while the pass runs.
#[derive(Debug, Clone)]
pub struct Tasks {
    /// Named tasks in the order their names were first seen.
    pub tasks: Vec<Task>,
    /// Name lookup. The sentinel is never entered here.
    pub name_to_task: BTreeMap<String, TaskId>,
    /// Task of the main unit, if the main unit is instantiated.
    pub main_task: Option<TaskId>,
    /// Sentinel collecting states that came from no thread body.
    pub idle_worker_task: Task,
    toplevel_bnts: Vec<usize>,
    records: NodeRecords,
    config: TasksConfig,
}

impl Tasks {
    fn new(config: TasksConfig, records: NodeRecords) -> Self {
        Self {
            tasks: Vec::new(),
            name_to_task: BTreeMap::new(),
            main_task: None,
            idle_worker_task: Task::new(config.idle_task_name.clone()),
            toplevel_bnts: Vec::new(),
            records,
            config,
        }
    }

    /// Compute tasks with the default effect primitive and the conservative
    /// transitive strategy.
    ///
    /// All states and transitions of `main_nts` are treated as one task.
    /// Every other instantiated unit is split by the `origin` annotations of
    /// its states.
    pub fn compute_tasks(nts: &Nts, main_nts: &str) -> TasksResult<Tasks> {
        Self::compute_with(
            nts,
            &TasksConfig::with_main(main_nts),
            &StatementEffects,
            &EveryTaskActivatesEvery,
            NodeRecords::new(),
        )
    }

    /// Run the whole pass.
    ///
    /// `records` must not carry a record for any node of an instantiated
    /// unit; passing the records of an earlier run over the same system fails
    /// with `DuplicateRecord` on the first node processed.
    pub fn compute_with(
        nts: &Nts,
        config: &TasksConfig,
        effects: &dyn GlobalEffects,
        strategy: &dyn TransitiveStrategy,
        records: NodeRecords,
    ) -> TasksResult<Tasks> {
        nts.validate()?;

        let mut tasks = Tasks::new(config.clone(), records);
        tasks.calculate_toplevel_bnts(nts);
        tasks.split_to_tasks(nts)?;
        tasks.compute_transition_info(nts, effects)?;

        let flow = ControlFlow::build(nts, &tasks.toplevel_bnts);
        tasks.compute_direct_globals(&flow)?;
        tasks.compute_transitive_globals(strategy)?;
        tasks.compute_task_structure(nts, &flow);

        info!(
            tasks = tasks.tasks.len(),
            states = tasks.records.num_states(),
            transitions = tasks.records.num_transitions(),
            idle_states = tasks.idle_worker_task.states.len(),
            "computed tasks"
        );
        Ok(tasks)
    }

    /// Units instantiated at toplevel, in order of first instantiation.
    fn calculate_toplevel_bnts(&mut self, nts: &Nts) {
        let mut seen = HashSet::new();
        self.toplevel_bnts = nts
            .instances
            .iter()
            .filter_map(|inst| nts.basic_nts_by_name(&inst.basic_nts).map(|(i, _)| i))
            .filter(|i| seen.insert(*i))
            .collect();
        debug!(units = self.toplevel_bnts.len(), "discovered toplevel units");
    }

    fn split_to_tasks(&mut self, nts: &Nts) -> TasksResult<()> {
        let mut main_seen = false;
        for i in 0..self.toplevel_bnts.len() {
            let unit = self.toplevel_bnts[i];
            let is_main = nts.basic_nts[unit].name == self.config.main_nts;
            main_seen |= is_main;
            self.split_unit_to_tasks(nts, unit, !is_main)?;
        }

        if main_seen {
            self.main_task = self.name_to_task.get(&self.config.main_nts).copied();
        } else {
            warn!(main = %self.config.main_nts, "main unit is not instantiated");
        }
        Ok(())
    }

    /// Assign every state of one unit to a task.
    ///
    /// With `split_by_annot`, the part of the origin annotation before the
    /// first separator names the task; an origin without a separator puts the
    /// state in the sentinel. Thread-creation glue, for example, is
    /// instantiated at toplevel and its states carry only their own name.
    /// Without `split_by_annot`, the unit's name is the task name.
    fn split_unit_to_tasks(
        &mut self,
        nts: &Nts,
        unit: usize,
        split_by_annot: bool,
    ) -> TasksResult<()> {
        let bn = &nts.basic_nts[unit];
        // The unit's own task exists even when the unit has no states.
        let unit_task = (!split_by_annot).then(|| self.task_named(&bn.name));

        for (st, state) in bn.state_ids(unit).zip(&bn.states) {
            let id = match unit_task {
                Some(id) => id,
                None => {
                    let origin =
                        find_annot_string(&state.annotations, &self.config.origin_annotation)
                            .ok_or_else(|| TasksError::MissingOriginMetadata {
                                unit: bn.name.clone(),
                                state: state.name.clone(),
                                id: st,
                            })?;
                    match self.config.task_name_of(origin) {
                        Some(name) => self.task_named(name),
                        None => TaskId::Idle,
                    }
                }
            };

            self.records.attach_state(st)?.task = Some(id);
            match id {
                TaskId::Named(i) => self.tasks[i].states.push(st),
                TaskId::Idle => self.idle_worker_task.states.push(st),
            }
        }
        Ok(())
    }

    /// Look up a registered task by name, registering it on first sight.
    fn task_named(&mut self, name: &str) -> TaskId {
        if let Some(&id) = self.name_to_task.get(name) {
            trace!(task = name, "found task");
            return id;
        }
        debug!(task = name, "new task");
        let id = TaskId::Named(self.tasks.len());
        self.tasks.push(Task::new(name));
        self.name_to_task.insert(name.to_string(), id);
        id
    }

    fn compute_transition_info(
        &mut self,
        nts: &Nts,
        effects: &dyn GlobalEffects,
    ) -> TasksResult<()> {
        for &unit in &self.toplevel_bnts {
            let bn = &nts.basic_nts[unit];
            for (id, t) in bn.transition_ids(unit).zip(&bn.transitions) {
                let global = effects.transition_globals(nts, t);
                self.records.attach_transition(TransitionInfo {
                    transition: id,
                    global,
                })?;
            }
        }
        Ok(())
    }

    fn compute_direct_globals(&mut self, flow: &ControlFlow) -> TasksResult<()> {
        for task in &mut self.tasks {
            task.compute_direct_globals(flow, &self.records)?;
        }
        self.idle_worker_task.compute_direct_globals(flow, &self.records)
    }

    /// Feed every direct summary through `strategy`, in `strategy_index` order.
    ///
    /// Each result is widened by its task's direct summary, so a strategy
    /// that under-reports can never make a task look independent of itself.
    fn compute_transitive_globals(
        &mut self,
        strategy: &dyn TransitiveStrategy,
    ) -> TasksResult<()> {
        let direct: Vec<Globals> = self
            .tasks
            .iter()
            .chain(std::iter::once(&self.idle_worker_task))
            .map(|t| t.direct_global.clone())
            .collect();

        let transitive = strategy.transitive_globals(&direct);
        if transitive.len() != direct.len() {
            return Err(TasksError::InvalidStrategyResult {
                expected: direct.len(),
                got: transitive.len(),
            });
        }

        for (task, mut global) in self
            .tasks
            .iter_mut()
            .chain(std::iter::once(&mut self.idle_worker_task))
            .zip(transitive)
        {
            global.union_with(&task.direct_global);
            task.transitive_global = global;
        }
        Ok(())
    }

    fn compute_task_structure(&mut self, nts: &Nts, flow: &ControlFlow) {
        for (i, task) in self.tasks.iter_mut().enumerate() {
            task.compute_boundary_states(TaskId::Named(i), nts, flow, &self.records);
            task.number = u32::try_from(i).ok();
        }
        self.idle_worker_task
            .compute_boundary_states(TaskId::Idle, nts, flow, &self.records);
    }

    /// Replace the transitive summaries using another strategy.
    ///
    /// The strategy sees one direct summary per task: the named tasks in list
    /// order, then the sentinel at index `tasks.len()`. Activation edges must
    /// use the same numbering; see `strategy_index`. Direct summaries are
    /// left as they are. On error the previous transitive summaries stay.
    pub fn recompute_transitive(
        &mut self,
        strategy: &dyn TransitiveStrategy,
    ) -> TasksResult<()> {
        self.compute_transitive_globals(strategy)
    }

    /// Position of a task in the slice handed to a `TransitiveStrategy`.
    pub fn strategy_index(&self, id: TaskId) -> usize {
        match id {
            TaskId::Named(i) => i,
            TaskId::Idle => self.tasks.len(),
        }
    }

    pub fn task(&self, id: TaskId) -> &Task {
        match id {
            TaskId::Named(i) => &self.tasks[i],
            TaskId::Idle => &self.idle_worker_task,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.name_to_task.get(name).map(|&id| self.task(id))
    }

    pub fn main(&self) -> Option<&Task> {
        self.main_task.map(|id| self.task(id))
    }

    /// All tasks, named ones in order, then the sentinel.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (TaskId::Named(i), t))
            .chain(std::iter::once((TaskId::Idle, &self.idle_worker_task)))
    }

    /// Task owning a state of an instantiated unit.
    pub fn owner(&self, st: StateId) -> Option<TaskId> {
        self.records.owner(st)
    }

    /// Effect of one transition of an instantiated unit.
    pub fn transition_globals(&self, t: TransitionId) -> Option<&Globals> {
        self.records.transition(t).map(|ti| &ti.global)
    }

    /// Whether two tasks may interfere, judged by their transitive summaries.
    pub fn may_collide(&self, a: TaskId, b: TaskId) -> bool {
        self.task(a)
            .transitive_global
            .may_collide_with(&self.task(b).transitive_global)
    }

    /// Indices of the instantiated units.
    pub fn toplevel_bnts(&self) -> &[usize] {
        &self.toplevel_bnts
    }

    pub fn config(&self) -> &TasksConfig {
        &self.config
    }

    pub fn records(&self) -> &NodeRecords {
        &self.records
    }

    /// Give up the result, keeping only its per-node records.
    pub fn into_records(self) -> NodeRecords {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeId;
    use ntspor_nts::{
        AnnotValue, Annotation, BasicNts, Instance, State, Stmt, Term, Transition, VarRef,
        Variable,
    };

    fn state(name: &str, origin: Option<&str>) -> State {
        State {
            name: name.to_string(),
            initial: false,
            is_final: false,
            annotations: origin
                .map(|o| Annotation {
                    name: "origin".to_string(),
                    value: AnnotValue::Str {
                        value: o.to_string(),
                    },
                })
                .into_iter()
                .collect(),
        }
    }

    fn unit(name: &str, states: Vec<State>, transitions: Vec<Transition>) -> BasicNts {
        BasicNts {
            name: name.to_string(),
            locals: vec![],
            states,
            transitions,
        }
    }

    fn write(from: usize, to: usize, g: usize) -> Transition {
        Transition {
            from,
            to,
            rule: vec![Stmt::Assign {
                target: VarRef::global(g),
                value: Term::int(1),
            }],
        }
    }

    fn system(units: Vec<BasicNts>, instances: &[&str]) -> Nts {
        Nts {
            name: "sys".to_string(),
            globals: vec![
                Variable {
                    name: "g0".to_string(),
                    ty: Default::default(),
                },
                Variable {
                    name: "g1".to_string(),
                    ty: Default::default(),
                },
            ],
            basic_nts: units,
            instances: instances
                .iter()
                .map(|n| Instance {
                    basic_nts: n.to_string(),
                    count: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn test_main_unit_is_one_task() {
        // Origins inside main are ignored: main is never subdivided.
        let main = unit(
            "main",
            vec![state("m0", Some("worker:0:a")), state("m1", None)],
            vec![write(0, 1, 0)],
        );
        let nts = system(vec![main], &["main"]);
        let tasks = Tasks::compute_tasks(&nts, "main").unwrap();

        assert_eq!(tasks.tasks.len(), 1);
        assert_eq!(tasks.main_task, Some(TaskId::Named(0)));
        assert_eq!(tasks.main().unwrap().states.len(), 2);
        assert!(tasks.idle_worker_task.states.is_empty());
        assert_eq!(tasks.tasks[0].number, Some(0));
    }

    #[test]
    fn test_split_by_origin() {
        let threads = unit(
            "threads",
            vec![
                state("a", Some("worker:0:st_0_0")),
                state("b", Some("worker:1:st_0_1")),
                state("c", Some("s_running_1")),
                state("d", Some("reader:0:st_0_0")),
            ],
            vec![write(0, 1, 0), write(3, 3, 1)],
        );
        let nts = system(vec![threads], &["threads"]);
        let tasks = Tasks::compute_tasks(&nts, "main").unwrap();

        let names: Vec<_> = tasks.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["worker", "reader"]);
        assert_eq!(tasks.get("worker").unwrap().states.len(), 2);
        assert_eq!(
            tasks.owner(StateId { unit: 0, state: 2 }),
            Some(TaskId::Idle)
        );
        assert!(tasks.main_task.is_none());
        assert!(!tasks.name_to_task.contains_key("idle_worker_task"));
    }

    #[test]
    fn test_missing_origin_is_fatal() {
        let threads = unit("threads", vec![state("a", None)], vec![]);
        let nts = system(vec![threads], &["threads"]);
        let err = Tasks::compute_tasks(&nts, "main").unwrap_err();
        assert!(matches!(
            err,
            TasksError::MissingOriginMetadata { ref unit, ref state, .. }
                if unit == "threads" && state == "a"
        ));
    }

    #[test]
    fn test_uninstantiated_units_are_skipped() {
        // `helper` has unannotated states but is never instantiated.
        let main = unit("main", vec![state("m0", None)], vec![]);
        let helper = unit("helper", vec![state("h0", None)], vec![write(0, 0, 1)]);
        let nts = system(vec![main, helper], &["main", "main"]);
        let tasks = Tasks::compute_tasks(&nts, "main").unwrap();
        assert_eq!(tasks.toplevel_bnts(), &[0]);
        assert_eq!(tasks.records().num_states(), 1);
        assert!(tasks
            .transition_globals(TransitionId {
                unit: 1,
                transition: 0
            })
            .is_none());
    }

    #[test]
    fn test_rerun_over_same_records_fails() {
        let main = unit("main", vec![state("m0", None)], vec![write(0, 0, 0)]);
        let nts = system(vec![main], &["main"]);
        let first = Tasks::compute_tasks(&nts, "main").unwrap();

        let err = Tasks::compute_with(
            &nts,
            &TasksConfig::with_main("main"),
            &StatementEffects,
            &EveryTaskActivatesEvery,
            first.into_records(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TasksError::DuplicateRecord {
                node: NodeId::State(StateId { unit: 0, state: 0 })
            }
        ));
    }

    #[test]
    fn test_invalid_program_is_rejected() {
        let nts = system(vec![], &["ghost"]);
        assert!(matches!(
            Tasks::compute_tasks(&nts, "main"),
            Err(TasksError::InvalidProgram(_))
        ));
    }

    #[test]
    fn test_rerun_over_transition_record_fails() {
        let main = unit("main", vec![state("m0", None)], vec![write(0, 0, 0)]);
        let nts = system(vec![main], &["main"]);
        let t = TransitionId {
            unit: 0,
            transition: 0,
        };
        let mut records = NodeRecords::new();
        records
            .attach_transition(TransitionInfo {
                transition: t,
                global: Globals::default(),
            })
            .unwrap();

        let err = Tasks::compute_with(
            &nts,
            &TasksConfig::with_main("main"),
            &StatementEffects,
            &EveryTaskActivatesEvery,
            records,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TasksError::DuplicateRecord {
                node: NodeId::Transition(id)
            } if id == t
        ));
    }

    #[test]
    fn test_main_without_states_is_registered() {
        let main = unit("main", vec![], vec![]);
        let threads = unit(
            "threads",
            vec![state("a", Some("worker:0:x"))],
            vec![write(0, 0, 1)],
        );
        let nts = system(vec![main, threads], &["main", "threads"]);
        let tasks = Tasks::compute_tasks(&nts, "main").unwrap();

        assert_eq!(tasks.main_task, Some(TaskId::Named(0)));
        let main = tasks.main().unwrap();
        assert!(main.states.is_empty());
        assert!(main.direct_global.is_empty());
        assert_eq!(tasks.get("worker").unwrap().number, Some(1));
    }

    /// Returns no summaries at all.
    struct NoSummaries;

    impl TransitiveStrategy for NoSummaries {
        fn transitive_globals(&self, _direct: &[Globals]) -> Vec<Globals> {
            Vec::new()
        }
    }

    /// Returns one empty summary per task.
    struct EmptySummaries;

    impl TransitiveStrategy for EmptySummaries {
        fn transitive_globals(&self, direct: &[Globals]) -> Vec<Globals> {
            vec![Globals::default(); direct.len()]
        }
    }

    fn two_writers() -> Nts {
        let threads = unit(
            "threads",
            vec![state("a", Some("left:0:x")), state("b", Some("right:0:x"))],
            vec![write(0, 0, 0), write(1, 1, 1)],
        );
        system(vec![threads], &["threads"])
    }

    #[test]
    fn test_short_strategy_result_is_rejected() {
        let nts = two_writers();
        let err = Tasks::compute_with(
            &nts,
            &TasksConfig::with_main("main"),
            &StatementEffects,
            &NoSummaries,
            NodeRecords::new(),
        )
        .unwrap_err();
        // left, right and the sentinel.
        assert!(matches!(
            err,
            TasksError::InvalidStrategyResult {
                expected: 3,
                got: 0
            }
        ));
    }

    #[test]
    fn test_failed_recompute_keeps_summaries() {
        let mut tasks = Tasks::compute_tasks(&two_writers(), "main").unwrap();
        let before: Vec<Globals> = tasks
            .iter()
            .map(|(_, t)| t.transitive_global.clone())
            .collect();

        assert!(tasks.recompute_transitive(&NoSummaries).is_err());

        let after: Vec<Globals> = tasks
            .iter()
            .map(|(_, t)| t.transitive_global.clone())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_transitive_is_widened_by_direct() {
        let nts = two_writers();
        let tasks = Tasks::compute_with(
            &nts,
            &TasksConfig::with_main("main"),
            &StatementEffects,
            &EmptySummaries,
            NodeRecords::new(),
        )
        .unwrap();

        for (_, task) in tasks.iter() {
            assert_eq!(task.transitive_global, task.direct_global);
        }
        let left = tasks.name_to_task["left"];
        let right = tasks.name_to_task["right"];
        assert!(tasks.may_collide(left, left));
        assert!(!tasks.may_collide(left, right));
    }

    #[test]
    fn test_strategy_index() {
        let tasks = Tasks::compute_tasks(&two_writers(), "main").unwrap();
        assert_eq!(tasks.strategy_index(TaskId::Named(1)), 1);
        assert_eq!(tasks.strategy_index(TaskId::Idle), tasks.tasks.len());
        assert_eq!(tasks.strategy_index(TaskId::Idle), 2);
    }
}
