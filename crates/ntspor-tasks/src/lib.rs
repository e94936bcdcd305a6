//! Task partitioning and global-effect summaries for partial order reduction.
//!
//! Given a flattened system, this crate groups its states into tasks (one per
//! thread body, plus the main unit and a catch-all sentinel), computes which
//! globals every transition reads and may write, and aggregates those effects
//! per task. The POR engine uses `Globals::may_collide_with` on the results to
//! decide which transitions are independent.

pub mod analyze;
pub mod config;
pub mod effects;
pub mod error;
pub mod flow;
pub mod globals;
pub mod index;
pub mod info;
pub mod task;
pub mod tasks;
pub mod transitive;

pub use config::{TasksConfig, IDLE_TASK_NAME};
pub use effects::{GlobalEffects, StatementEffects};
pub use error::{NodeId, TasksError, TasksResult};
pub use globals::{GlobalReads, GlobalWrites, Globals};
pub use index::GlobalVariableInfo;
pub use info::{NodeRecords, StateInfo, TransitionInfo};
pub use task::{Task, TaskId};
pub use tasks::Tasks;
pub use transitive::{ActivationClosure, EveryTaskActivatesEvery, TransitiveStrategy};
