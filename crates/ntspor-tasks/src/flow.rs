//! Control-flow adjacency over the discovered units.

use ntspor_nts::{Nts, StateId, TransitionId};
use std::collections::HashMap;

/// Outgoing and incoming transitions per state, restricted to a set of units.
#[derive(Debug, Default)]
pub struct ControlFlow {
    outgoing: HashMap<StateId, Vec<TransitionId>>,
    incoming: HashMap<StateId, Vec<TransitionId>>,
}

impl ControlFlow {
    pub fn build(nts: &Nts, units: &[usize]) -> Self {
        let mut flow = ControlFlow::default();
        for &unit in units {
            let Some(bn) = nts.basic_nts.get(unit) else {
                continue;
            };
            for (id, t) in bn.transition_ids(unit).zip(&bn.transitions) {
                let from = StateId {
                    unit,
                    state: t.from,
                };
                let to = StateId { unit, state: t.to };
                flow.outgoing.entry(from).or_default().push(id);
                flow.incoming.entry(to).or_default().push(id);
            }
        }
        flow
    }

    pub fn outgoing(&self, st: StateId) -> &[TransitionId] {
        self.outgoing.get(&st).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn incoming(&self, st: StateId) -> &[TransitionId] {
        self.incoming.get(&st).map(Vec::as_slice).unwrap_or(&[])
    }
}
