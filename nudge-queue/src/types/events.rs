use chrono::{DateTime, Utc};
use nudge_core::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{JobId, QueueName};

/// Structured observations emitted while jobs move through their lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    Enqueued {
        job_id: JobId,
        queue: QueueName,
        job_type: String,
        run_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    Completed {
        job_id: JobId,
        queue: QueueName,
        job_type: String,
        attempts: u32,
        result: Option<Value>,
        at: DateTime<Utc>,
    },

    /// An attempt failed and another one is scheduled
    Retrying {
        job_id: JobId,
        queue: QueueName,
        job_type: String,
        attempts: u32,
        retry_at: DateTime<Utc>,
        error: String,
        error_kind: ErrorKind,
        at: DateTime<Utc>,
    },

    /// An attempt failed and no attempts remain
    Failed {
        job_id: JobId,
        queue: QueueName,
        job_type: String,
        payload: Value,
        attempts: u32,
        error: String,
        error_kind: ErrorKind,
        at: DateTime<Utc>,
    },

    RecurringRegistered {
        key: String,
        queue: QueueName,
        job_type: String,
        next_run_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    RecurringRemoved {
        key: String,
        queue: QueueName,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Completed { .. } => "completed",
            Self::Retrying { .. } => "retrying",
            Self::Failed { .. } => "failed",
            Self::RecurringRegistered { .. } => "recurring_registered",
            Self::RecurringRemoved { .. } => "recurring_removed",
        }
    }

    /// The job this event is about; recurring events have none
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Enqueued { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Retrying { job_id, .. }
            | Self::Failed { job_id, .. } => Some(job_id),
            Self::RecurringRegistered { .. } | Self::RecurringRemoved { .. } => None,
        }
    }

    pub fn queue(&self) -> QueueName {
        match self {
            Self::Enqueued { queue, .. }
            | Self::Completed { queue, .. }
            | Self::Retrying { queue, .. }
            | Self::Failed { queue, .. }
            | Self::RecurringRegistered { queue, .. }
            | Self::RecurringRemoved { queue, .. } => *queue,
        }
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. }
            | Self::Completed { at, .. }
            | Self::Retrying { at, .. }
            | Self::Failed { at, .. }
            | Self::RecurringRegistered { at, .. }
            | Self::RecurringRemoved { at, .. } => at,
        }
    }
}
