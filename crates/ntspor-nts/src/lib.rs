//! Flattened numerical transition system model.
//!
//! This crate defines the program representation the POR task analysis runs
//! over: executable units whose calls have already been inlined, toplevel
//! instances, and per-state annotations left behind by the inliner. Frontends
//! produce it as JSON; `ntspor-tasks` only ever borrows it.

mod types;
mod validate;

pub use types::*;
pub use validate::{NtsError, NtsResult};
