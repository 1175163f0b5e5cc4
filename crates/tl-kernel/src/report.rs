use serde::Serialize;
use std::fmt;
use tl_core::Real;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Cancelled through `stop()` or a stop handle.
    Aborted,
    /// A component requested the stop.
    Failed { component: String, message: String },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Aborted => f.write_str("aborted"),
            RunStatus::Failed { component, message } => {
                write!(f, "failed in {component}: {message}")
            }
        }
    }
}

/// Outcome of a run: how far it got and why it ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub status: RunStatus,
    pub steps_completed: u64,
    pub total_steps: u64,
    pub final_time: Real,
    pub generation: Option<usize>,
    pub wall_time_s: Real,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
