use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{JobPolicy, QueueName};

/// Job message - immutable submission data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    /// Discriminant selecting the handler branch
    pub job_type: String,

    /// Opaque key-value payload, shape depends on `job_type`
    pub payload: Value,

    pub queue: QueueName,

    /// Policy copied from the queue (or the per-call override) at enqueue time
    pub policy: JobPolicy,

    /// When the job becomes eligible for processing
    pub run_at: DateTime<Utc>,

    /// Logical name of the repeating registration that fired this job, if any
    pub repeat_key: Option<String>,
}

impl JobMessage {
    pub fn new(queue: QueueName, job_type: impl Into<String>, payload: Value, policy: JobPolicy) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            queue,
            policy,
            run_at: Utc::now(),
            repeat_key: None,
        }
    }

    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = run_at;
        self
    }

    pub fn with_repeat_key(mut self, key: impl Into<String>) -> Self {
        self.repeat_key = Some(key.into());
        self
    }
}
