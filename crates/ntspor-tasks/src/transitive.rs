//! Transitive globals: what a task touches through every task it may activate.
//!
//! The precision of this step has a key impact on reduction: the smaller a
//! task's transitive set, the more often the POR engine finds a small ample
//! set. Strategies share one contract: per-task direct summaries in, per-task
//! transitive summaries out, index for index.

use crate::globals::Globals;
use std::collections::BTreeSet;

pub trait TransitiveStrategy {
    /// `direct[i]` is the direct summary of task `i`. The result must have the
    /// same length and satisfy `result[i] ⊇ direct[i]`.
    fn transitive_globals(&self, direct: &[Globals]) -> Vec<Globals>;
}

/// Assumes nothing: every task may activate every task, itself included.
///
/// Sound for any program, and exactly as imprecise as that sounds: every
/// transitive set is the union of all direct sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryTaskActivatesEvery;

impl TransitiveStrategy for EveryTaskActivatesEvery {
    fn transitive_globals(&self, direct: &[Globals]) -> Vec<Globals> {
        let all = direct.iter().fold(Globals::default(), |mut acc, g| {
            acc.union_with(g);
            acc
        });
        vec![all; direct.len()]
    }
}

/// Reachability over a known activation graph.
///
/// `edges` lists `(activator, activated)` task indices. A task's transitive
/// set is the union of the direct sets of every task reachable from it,
/// itself included. Indices outside `direct` are ignored.
#[derive(Debug, Clone, Default)]
pub struct ActivationClosure {
    edges: Vec<(usize, usize)>,
}

impl ActivationClosure {
    pub fn new(edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Self {
            edges: edges.into_iter().collect(),
        }
    }

    fn reachable(&self, n: usize, from: usize) -> BTreeSet<usize> {
        let mut adj = vec![Vec::new(); n];
        for &(a, b) in &self.edges {
            if a < n && b < n {
                adj[a].push(b);
            }
        }
        let mut seen = BTreeSet::from([from]);
        let mut stack = vec![from];
        while let Some(t) = stack.pop() {
            for &next in &adj[t] {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }
}

impl TransitiveStrategy for ActivationClosure {
    fn transitive_globals(&self, direct: &[Globals]) -> Vec<Globals> {
        let n = direct.len();
        (0..n)
            .map(|i| {
                self.reachable(n, i)
                    .into_iter()
                    .fold(Globals::default(), |mut acc, j| {
                        acc.union_with(&direct[j]);
                        acc
                    })
            })
            .collect()
    }
}
