use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{JobPolicy, QueueName, Recurrence};

/// A named recurring schedule. The store keys it by `(queue, key)`, so
/// registering the same key again replaces the previous registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatRegistration {
    /// Stable logical name
    pub key: String,
    pub queue: QueueName,
    pub job_type: String,
    pub payload: Value,
    pub recurrence: Recurrence,
    pub policy: JobPolicy,
    /// Next time the store fires an instance
    pub next_run_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}
