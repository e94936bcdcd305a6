//! Structural validation of a flattened system.

use crate::types::{Nts, VarRef};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NtsError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate basic nts name '{0}'")]
    DuplicateBasicNts(String),

    #[error("instance {instance} refers to unknown basic nts '{name}'")]
    UnknownBasicNts { instance: usize, name: String },

    #[error("'{unit}' transition {transition}: state index {state} out of bounds (have {count} states)")]
    StateOutOfBounds {
        unit: String,
        transition: usize,
        state: usize,
        count: usize,
    },

    #[error("'{unit}' transition {transition}: global index {index} out of bounds (have {count} globals)")]
    GlobalOutOfBounds {
        unit: String,
        transition: usize,
        index: usize,
        count: usize,
    },

    #[error("'{unit}' transition {transition}: local index {index} out of bounds (have {count} locals)")]
    LocalOutOfBounds {
        unit: String,
        transition: usize,
        index: usize,
        count: usize,
    },
}

pub type NtsResult<T> = Result<T, NtsError>;

impl Nts {
    /// Check that every index in the system points at something declared.
    ///
    /// This says nothing about annotations; missing origin metadata is a
    /// property the task analysis reports on its own.
    pub fn validate(&self) -> NtsResult<()> {
        let mut names = HashSet::new();
        for bn in &self.basic_nts {
            if !names.insert(bn.name.as_str()) {
                return Err(NtsError::DuplicateBasicNts(bn.name.clone()));
            }
        }

        for (i, inst) in self.instances.iter().enumerate() {
            if !names.contains(inst.basic_nts.as_str()) {
                return Err(NtsError::UnknownBasicNts {
                    instance: i,
                    name: inst.basic_nts.clone(),
                });
            }
        }

        let num_globals = self.globals.len();
        for bn in &self.basic_nts {
            let num_states = bn.states.len();
            let num_locals = bn.locals.len();
            for (ti, t) in bn.transitions.iter().enumerate() {
                for state in [t.from, t.to] {
                    if state >= num_states {
                        return Err(NtsError::StateOutOfBounds {
                            unit: bn.name.clone(),
                            transition: ti,
                            state,
                            count: num_states,
                        });
                    }
                }

                let mut bad = None;
                for stmt in &t.rule {
                    stmt.for_each_var(&mut |v| {
                        if bad.is_some() {
                            return;
                        }
                        match v {
                            VarRef::Global { index } if index >= num_globals => {
                                bad = Some(NtsError::GlobalOutOfBounds {
                                    unit: bn.name.clone(),
                                    transition: ti,
                                    index,
                                    count: num_globals,
                                });
                            }
                            VarRef::Local { index } if index >= num_locals => {
                                bad = Some(NtsError::LocalOutOfBounds {
                                    unit: bn.name.clone(),
                                    transition: ti,
                                    index,
                                    count: num_locals,
                                });
                            }
                            _ => {}
                        }
                    });
                }
                if let Some(err) = bad {
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
