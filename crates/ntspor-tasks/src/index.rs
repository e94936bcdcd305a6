//! Reverse index: which tasks read and write each global.

use crate::globals::GlobalWrites;
use crate::task::TaskId;
use crate::tasks::Tasks;
use ntspor_nts::{GlobalId, Nts};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalVariableInfo {
    pub var: GlobalId,
    pub read_users: BTreeSet<TaskId>,
    pub write_users: BTreeSet<TaskId>,
}

impl GlobalVariableInfo {
    fn new(var: GlobalId) -> Self {
        Self {
            var,
            read_users: BTreeSet::new(),
            write_users: BTreeSet::new(),
        }
    }

    /// Tasks touching this global in any way.
    pub fn users(&self) -> BTreeSet<TaskId> {
        self.read_users.union(&self.write_users).copied().collect()
    }
}

impl Tasks {
    /// Build the reverse index from every task's direct summary, the sentinel
    /// included. A task with a universal write is a write user of every global.
    pub fn global_variable_info(&self, nts: &Nts) -> Vec<GlobalVariableInfo> {
        let mut index: Vec<GlobalVariableInfo> =
            nts.global_ids().map(GlobalVariableInfo::new).collect();

        for (id, task) in self.iter() {
            for g in task.direct_global.reads.iter() {
                if let Some(info) = index.get_mut(g.0) {
                    info.read_users.insert(id);
                }
            }
            match &task.direct_global.writes {
                GlobalWrites::Universal => {
                    for info in &mut index {
                        info.write_users.insert(id);
                    }
                }
                GlobalWrites::Exact(vars) => {
                    for g in vars {
                        if let Some(info) = index.get_mut(g.0) {
                            info.write_users.insert(id);
                        }
                    }
                }
            }
        }

        index
    }
}
