//! Pass configuration.

use ntspor_nts::ORIGIN_ANNOTATION;

/// Name given to the catch-all task.
pub const IDLE_TASK_NAME: &str = "idle_worker_task";

/// Configuration for `Tasks::compute_with`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TasksConfig {
    /// Unit whose states form one task named after it, regardless of origin.
    pub main_nts: String,
    /// Name of the string annotation holding a state's origin.
    pub origin_annotation: String,
    /// Separator between the task name and the rest of an origin string.
    pub separator: char,
    /// Name of the sentinel task. Never entered into the name table, so it
    /// may coincide with a real task name.
    pub idle_task_name: String,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            main_nts: "main".to_string(),
            origin_annotation: ORIGIN_ANNOTATION.to_string(),
            separator: ':',
            idle_task_name: IDLE_TASK_NAME.to_string(),
        }
    }
}

impl TasksConfig {
    pub fn with_main(main_nts: impl Into<String>) -> Self {
        Self {
            main_nts: main_nts.into(),
            ..Self::default()
        }
    }

    /// Task name encoded in an origin string, if any.
    ///
    /// `"thread_func:0:st_0_0"` belongs to `thread_func`; `"s_running_1"` has
    /// no separator and belongs to no named task.
    pub fn task_name_of<'a>(&self, origin: &'a str) -> Option<&'a str> {
        origin.split_once(self.separator).map(|(name, _)| name)
    }
}
