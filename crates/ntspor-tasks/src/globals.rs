//! Global read/write effect summaries.
//!
//! A summary says which global variables some piece of code may read and
//! which it may write. Writes whose target cannot be resolved statically are
//! recorded as `GlobalWrites::Universal`: any global may be written.

use ntspor_nts::{GlobalId, Nts};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Set of global variables which may be modified by something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GlobalWrites {
    /// Exactly these globals (possibly none).
    Exact(BTreeSet<GlobalId>),
    /// Any global variable.
    Universal,
}

impl Default for GlobalWrites {
    fn default() -> Self {
        GlobalWrites::Exact(BTreeSet::new())
    }
}

impl GlobalWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, GlobalWrites::Universal)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GlobalWrites::Exact(vars) => vars.is_empty(),
            GlobalWrites::Universal => false,
        }
    }

    /// The exact set, or `None` when universal.
    pub fn vars(&self) -> Option<&BTreeSet<GlobalId>> {
        match self {
            GlobalWrites::Exact(vars) => Some(vars),
            GlobalWrites::Universal => None,
        }
    }

    /// Membership. Every global is a member of the universal set.
    pub fn contains(&self, var: GlobalId) -> bool {
        match self {
            GlobalWrites::Exact(vars) => vars.contains(&var),
            GlobalWrites::Universal => true,
        }
    }

    /// Add one global. No-op when already universal.
    pub fn insert(&mut self, var: GlobalId) {
        if let GlobalWrites::Exact(vars) = self {
            vars.insert(var);
        }
    }

    pub fn insert_everything(&mut self) {
        *self = GlobalWrites::Universal;
    }

    pub fn clear(&mut self) {
        *self = GlobalWrites::default();
    }

    pub fn union_with(&mut self, other: &GlobalWrites) {
        match other {
            GlobalWrites::Universal => self.insert_everything(),
            GlobalWrites::Exact(theirs) => {
                if let GlobalWrites::Exact(mine) = self {
                    mine.extend(theirs.iter().copied());
                }
            }
        }
    }

    pub fn union(&self, other: &GlobalWrites) -> GlobalWrites {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// True iff some global is a member of both sets.
    pub fn intersects_writes(&self, other: &GlobalWrites) -> bool {
        match (self, other) {
            (GlobalWrites::Universal, GlobalWrites::Universal) => true,
            (GlobalWrites::Universal, GlobalWrites::Exact(vars))
            | (GlobalWrites::Exact(vars), GlobalWrites::Universal) => !vars.is_empty(),
            (GlobalWrites::Exact(a), GlobalWrites::Exact(b)) => !a.is_disjoint(b),
        }
    }

    /// True iff some global in `reads` is a member of this set.
    pub fn intersects_reads(&self, reads: &GlobalReads) -> bool {
        match self {
            GlobalWrites::Universal => !reads.is_empty(),
            GlobalWrites::Exact(vars) => !vars.is_disjoint(&reads.0),
        }
    }
}

impl FromIterator<GlobalId> for GlobalWrites {
    fn from_iter<I: IntoIterator<Item = GlobalId>>(iter: I) -> Self {
        GlobalWrites::Exact(iter.into_iter().collect())
    }
}

/// Set of global variables which may be read by something.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalReads(pub BTreeSet<GlobalId>);

impl GlobalReads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, var: GlobalId) -> bool {
        self.0.contains(&var)
    }

    pub fn insert(&mut self, var: GlobalId) {
        self.0.insert(var);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.0.iter().copied()
    }

    pub fn union_with(&mut self, other: &GlobalReads) {
        self.0.extend(other.0.iter().copied());
    }
}

impl FromIterator<GlobalId> for GlobalReads {
    fn from_iter<I: IntoIterator<Item = GlobalId>>(iter: I) -> Self {
        GlobalReads(iter.into_iter().collect())
    }
}

/// Reads and writes of global state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Globals {
    pub reads: GlobalReads,
    pub writes: GlobalWrites,
}

impl Globals {
    pub fn new(reads: GlobalReads, writes: GlobalWrites) -> Self {
        Self { reads, writes }
    }

    /// Touches no global at all.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    pub fn union_with(&mut self, other: &Globals) {
        self.reads.union_with(&other.reads);
        self.writes.union_with(&other.writes);
    }

    pub fn union(&self, other: &Globals) -> Globals {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// Commutative.
    ///
    /// True iff there exists some global variable which is read or modified
    /// by one summary and modified by the other.
    pub fn may_collide_with(&self, other: &Globals) -> bool {
        self.writes.intersects_reads(&other.reads)
            || other.writes.intersects_reads(&self.reads)
            || self.writes.intersects_writes(&other.writes)
    }

    /// Render with variable names from `nts`.
    pub fn display<'a>(&'a self, nts: &'a Nts) -> NamedGlobals<'a> {
        NamedGlobals { globals: self, nts }
    }
}

impl fmt::Display for GlobalReads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ids(f, self.0.iter())
    }
}

impl fmt::Display for GlobalWrites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalWrites::Universal => write!(f, "*"),
            GlobalWrites::Exact(vars) => write_ids(f, vars.iter()),
        }
    }
}

impl fmt::Display for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reads {} writes {}", self.reads, self.writes)
    }
}

fn write_ids<'a>(
    f: &mut fmt::Formatter<'_>,
    ids: impl Iterator<Item = &'a GlobalId>,
) -> fmt::Result {
    let parts: Vec<String> = ids.map(|id| id.to_string()).collect();
    write!(f, "{{{}}}", parts.join(", "))
}

/// `Globals` rendered with the names of the system's variables.
pub struct NamedGlobals<'a> {
    globals: &'a Globals,
    nts: &'a Nts,
}

impl fmt::Display for NamedGlobals<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |ids: &BTreeSet<GlobalId>| -> String {
            ids.iter()
                .map(|id| self.nts.global_name(*id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "reads {{{}}} writes ", names(&self.globals.reads.0))?;
        match &self.globals.writes {
            GlobalWrites::Universal => write!(f, "everything"),
            GlobalWrites::Exact(vars) => write!(f, "{{{}}}", names(vars)),
        }
    }
}
