//! Flattened numerical transition system types. No analysis lives here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the string annotation the inliner attaches to every flattened state.
pub const ORIGIN_ANNOTATION: &str = "origin";

/// A flattened numerical transition system.
///
/// All call rules have already been inlined, so each `BasicNts` is a plain
/// control-flow graph over its states. Only units referenced from `instances`
/// are ever scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nts {
    /// System name.
    pub name: String,
    /// Global variable declarations, shared by all units.
    #[serde(default)]
    pub globals: Vec<Variable>,
    /// Executable units.
    pub basic_nts: Vec<BasicNts>,
    /// Toplevel instantiations (which units run, and how many copies).
    pub instances: Vec<Instance>,
}

/// A variable declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub ty: VarType,
}

/// Variable sorts. The analysis never looks at them; they are kept so that
/// the model round-trips through the frontend's JSON unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind")]
pub enum VarType {
    #[default]
    Int,
    Bool,
    Real,
    BitVector {
        width: u32,
    },
}

/// An executable unit: states and the transitions between them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasicNts {
    pub name: String,
    #[serde(default)]
    pub locals: Vec<Variable>,
    pub states: Vec<State>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

/// A control state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct State {
    pub name: String,
    #[serde(default)]
    pub initial: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A named piece of metadata attached to a state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub name: String,
    pub value: AnnotValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum AnnotValue {
    Str { value: String },
    Int { value: i64 },
}

/// A transition `from -> to` guarded and updated by `rule`.
///
/// `from` and `to` index into the owning unit's `states`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    #[serde(default)]
    pub rule: Vec<Stmt>,
}

/// Statements of a transition rule, executed atomically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Stmt {
    /// `target' = value`.
    Assign { target: VarRef, value: Term },
    /// `target` takes an arbitrary value.
    Havoc { target: VarRef },
    /// Guard: the transition is enabled only if `cond` holds.
    Assume { cond: Term },
    /// Write through a pointer: `*address = value`.
    Store { address: Term, value: Term },
}

/// A reference to a declared variable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "scope")]
pub enum VarRef {
    /// Index into `Nts::globals`.
    Global { index: usize },
    /// Index into the owning unit's `locals`.
    Local { index: usize },
}

impl VarRef {
    pub fn global(index: usize) -> Self {
        VarRef::Global { index }
    }

    pub fn local(index: usize) -> Self {
        VarRef::Local { index }
    }

    /// The global identity, if this is a global reference.
    pub fn as_global(&self) -> Option<GlobalId> {
        match self {
            VarRef::Global { index } => Some(GlobalId(*index)),
            VarRef::Local { .. } => None,
        }
    }
}

/// Terms appearing on right-hand sides, guards and addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Term {
    Int {
        value: i64,
    },
    Bool {
        value: bool,
    },
    Var {
        var: VarRef,
    },
    /// Address of a variable. Does not read the variable.
    AddrOf {
        var: VarRef,
    },
    Binary {
        op: BinOp,
        left: Box<Term>,
        right: Box<Term>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Term>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Implies,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A toplevel instantiation of a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    /// Name of the instantiated `BasicNts`.
    pub basic_nts: String,
    #[serde(default = "default_instance_count")]
    pub count: u32,
}

fn default_instance_count() -> u32 {
    1
}

/// Identity of a global variable: its index in `Nts::globals`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId(pub usize);

/// Identity of a state: unit index and state index within that unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId {
    pub unit: usize,
    pub state: usize,
}

/// Identity of a transition: unit index and transition index within that unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionId {
    pub unit: usize,
    pub transition: usize,
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}.{}", self.unit, self.state)
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}.{}", self.unit, self.transition)
    }
}

impl Nts {
    /// Find a unit by name.
    pub fn basic_nts_by_name(&self, name: &str) -> Option<(usize, &BasicNts)> {
        self.basic_nts
            .iter()
            .enumerate()
            .find(|(_, bn)| bn.name == name)
    }

    pub fn global(&self, id: GlobalId) -> Option<&Variable> {
        self.globals.get(id.0)
    }

    /// Name of a global, or its `g<N>` form if the index is unknown.
    pub fn global_name(&self, id: GlobalId) -> String {
        self.global(id)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Iterate over the identities of all declared globals.
    pub fn global_ids(&self) -> impl Iterator<Item = GlobalId> + '_ {
        (0..self.globals.len()).map(GlobalId)
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.basic_nts.get(id.unit)?.states.get(id.state)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.basic_nts.get(id.unit)?.transitions.get(id.transition)
    }

    /// Parse a system from its JSON form.
    pub fn from_json(source: &str) -> crate::NtsResult<Nts> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn to_json_pretty(&self) -> crate::NtsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl BasicNts {
    /// State identities of this unit, given the unit's own index.
    pub fn state_ids(&self, unit: usize) -> impl Iterator<Item = StateId> {
        (0..self.states.len()).map(move |state| StateId { unit, state })
    }

    /// Transition identities of this unit, given the unit's own index.
    pub fn transition_ids(&self, unit: usize) -> impl Iterator<Item = TransitionId> {
        (0..self.transitions.len()).map(move |transition| TransitionId { unit, transition })
    }
}

impl Stmt {
    /// Visit every variable read by this statement.
    ///
    /// The assigned or havocked target itself is not a read.
    pub fn for_each_read(&self, f: &mut impl FnMut(VarRef)) {
        match self {
            Stmt::Assign { value, .. } => value.for_each_read(f),
            Stmt::Havoc { .. } => {}
            Stmt::Assume { cond } => cond.for_each_read(f),
            Stmt::Store { address, value } => {
                address.for_each_read(f);
                value.for_each_read(f);
            }
        }
    }

    /// Visit every variable mentioned anywhere in this statement.
    pub fn for_each_var(&self, f: &mut impl FnMut(VarRef)) {
        match self {
            Stmt::Assign { target, value } => {
                f(*target);
                value.for_each_var(f);
            }
            Stmt::Havoc { target } => f(*target),
            Stmt::Assume { cond } => cond.for_each_var(f),
            Stmt::Store { address, value } => {
                address.for_each_var(f);
                value.for_each_var(f);
            }
        }
    }
}

impl Term {
    pub fn var(var: VarRef) -> Self {
        Term::Var { var }
    }

    pub fn int(value: i64) -> Self {
        Term::Int { value }
    }

    pub fn binary(op: BinOp, left: Term, right: Term) -> Self {
        Term::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Visit every variable whose value this term depends on.
    pub fn for_each_read(&self, f: &mut impl FnMut(VarRef)) {
        match self {
            Term::Int { .. } | Term::Bool { .. } | Term::AddrOf { .. } => {}
            Term::Var { var } => f(*var),
            Term::Binary { left, right, .. } => {
                left.for_each_read(f);
                right.for_each_read(f);
            }
            Term::Unary { operand, .. } => operand.for_each_read(f),
        }
    }

    /// Visit every variable mentioned in this term, including address-taken ones.
    pub fn for_each_var(&self, f: &mut impl FnMut(VarRef)) {
        match self {
            Term::Int { .. } | Term::Bool { .. } => {}
            Term::Var { var } | Term::AddrOf { var } => f(*var),
            Term::Binary { left, right, .. } => {
                left.for_each_var(f);
                right.for_each_var(f);
            }
            Term::Unary { operand, .. } => operand.for_each_var(f),
        }
    }
}

/// Find a string annotation by name.
pub fn find_annot_string<'a>(annotations: &'a [Annotation], name: &str) -> Option<&'a str> {
    annotations.iter().find_map(|a| match &a.value {
        AnnotValue::Str { value } if a.name == name => Some(value.as_str()),
        _ => None,
    })
}

/// Find the `origin` annotation recorded by the inliner.
pub fn find_annot_origin(annotations: &[Annotation]) -> Option<&str> {
    find_annot_string(annotations, ORIGIN_ANNOTATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(value: &str) -> Annotation {
        Annotation {
            name: ORIGIN_ANNOTATION.to_string(),
            value: AnnotValue::Str {
                value: value.to_string(),
            },
        }
    }

    #[test]
    fn test_find_origin_skips_non_string_annotations() {
        let annots = vec![
            Annotation {
                name: ORIGIN_ANNOTATION.to_string(),
                value: AnnotValue::Int { value: 3 },
            },
            Annotation {
                name: "line".to_string(),
                value: AnnotValue::Str {
                    value: "12".to_string(),
                },
            },
            origin("worker:0:st_0_0"),
        ];
        assert_eq!(find_annot_origin(&annots), Some("worker:0:st_0_0"));
    }

    #[test]
    fn test_find_origin_missing() {
        assert_eq!(find_annot_origin(&[]), None);
    }

    #[test]
    fn test_parse_json() {
        let source = r#"{
            "name": "sys",
            "globals": [{ "name": "g" }],
            "basic_nts": [{
                "name": "main",
                "states": [
                    { "name": "s0", "initial": true },
                    { "name": "s1", "final": true }
                ],
                "transitions": [{
                    "from": 0,
                    "to": 1,
                    "rule": [{
                        "kind": "Assign",
                        "target": { "scope": "Global", "index": 0 },
                        "value": { "kind": "Int", "value": 1 }
                    }]
                }]
            }],
            "instances": [{ "basic_nts": "main" }]
        }"#;
        let nts = Nts::from_json(source).unwrap();
        assert_eq!(nts.globals[0].ty, VarType::Int);
        assert_eq!(nts.instances[0].count, 1);
        let bn = &nts.basic_nts[0];
        assert!(bn.states[0].initial);
        assert!(bn.states[1].is_final);
        assert_eq!(
            bn.transitions[0].rule[0],
            Stmt::Assign {
                target: VarRef::global(0),
                value: Term::int(1),
            }
        );
        assert_eq!(nts.basic_nts_by_name("main").map(|(i, _)| i), Some(0));
        assert_eq!(nts.global_name(GlobalId(0)), "g");
        assert_eq!(nts.global_name(GlobalId(7)), "g7");
    }

    #[test]
    fn test_reads_exclude_targets_and_addresses() {
        let stmt = Stmt::Assign {
            target: VarRef::global(0),
            value: Term::binary(
                BinOp::Add,
                Term::var(VarRef::global(1)),
                Term::AddrOf {
                    var: VarRef::global(2),
                },
            ),
        };
        let mut reads = Vec::new();
        stmt.for_each_read(&mut |v| reads.push(v));
        assert_eq!(reads, vec![VarRef::global(1)]);

        let mut all = Vec::new();
        stmt.for_each_var(&mut |v| all.push(v));
        assert_eq!(
            all,
            vec![VarRef::global(0), VarRef::global(1), VarRef::global(2)]
        );
    }
}
