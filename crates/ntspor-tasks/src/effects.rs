//! Per-transition global effects.

use crate::globals::{GlobalReads, GlobalWrites, Globals};
use ntspor_nts::{GlobalId, Nts, Stmt, Term, Transition, VarRef};

/// Computes which globals a single transition reads and may write.
///
/// Implementations must report `GlobalWrites::Universal` whenever some write
/// target cannot be pinned to a specific global.
pub trait GlobalEffects {
    fn transition_globals(&self, nts: &Nts, transition: &Transition) -> Globals;
}

/// Effects read directly off a transition's statements.
///
/// - Every global appearing in a value, guard or address is read.
/// - `Assign` and `Havoc` of a global write exactly that global.
/// - `Store` through `&g` writes `g`; through anything else, the target is
///   unknown and the write is universal. Stores to address-taken locals stay
///   local.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementEffects;

impl GlobalEffects for StatementEffects {
    fn transition_globals(&self, _nts: &Nts, transition: &Transition) -> Globals {
        let mut reads = GlobalReads::new();
        let mut writes = GlobalWrites::new();

        for stmt in &transition.rule {
            stmt.for_each_read(&mut |v| {
                if let Some(g) = v.as_global() {
                    reads.insert(g);
                }
            });

            match stmt {
                Stmt::Assign { target, .. } | Stmt::Havoc { target } => {
                    if let Some(g) = target.as_global() {
                        writes.insert(g);
                    }
                }
                Stmt::Assume { .. } => {}
                Stmt::Store { address, .. } => match address {
                    Term::AddrOf {
                        var: VarRef::Global { index },
                    } => writes.insert(GlobalId(*index)),
                    Term::AddrOf {
                        var: VarRef::Local { .. },
                    } => {}
                    _ => writes.insert_everything(),
                },
            }
        }

        Globals::new(reads, writes)
    }
}
