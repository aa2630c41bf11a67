use serde::{Deserialize, Serialize};
use std::fmt;

/// The named queues this system runs. Each has its own default policy and
/// its own dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    /// One-shot and periodic follow-up work
    DeferredTasks,
    /// Cron-driven and on-demand report generation
    ScheduledReports,
}

impl QueueName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeferredTasks => "deferred-tasks",
            Self::ScheduledReports => "scheduled-reports",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
