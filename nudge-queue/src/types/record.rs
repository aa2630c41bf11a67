use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{JobId, JobMessage, LeaseToken};

/// Job lifecycle: waiting -> delayed -> active -> {completed | retry-pending | exhausted}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Eligible now, waiting for a dispatcher
    Waiting,

    /// Not eligible before `run_at`
    Delayed { run_at: DateTime<Utc> },

    /// Leased by a dispatcher
    Active { lease_until: DateTime<Utc> },

    /// Last attempt failed, next attempt not before `retry_at`
    RetryPending { retry_at: DateTime<Utc> },

    Completed { completed_at: DateTime<Utc> },

    /// Out of attempts (or failed in a way no retry can fix)
    Exhausted { failed_at: DateTime<Utc>, error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Exhausted { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Check if the job can be leased at `now`
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Waiting => true,
            Self::Delayed { run_at } => *run_at <= now,
            Self::RetryPending { retry_at } => *retry_at <= now,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Delayed { .. } => "delayed",
            Self::Active { .. } => "active",
            Self::RetryPending { .. } => "retry-pending",
            Self::Completed { .. } => "completed",
            Self::Exhausted { .. } => "exhausted",
        }
    }
}

/// Job record - mutable runtime state owned by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,

    /// Immutable job message data
    pub message: JobMessage,

    pub status: JobStatus,

    /// Attempts started so far; never exceeds `message.policy.max_attempts`
    pub attempts_made: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_error: Option<String>,

    /// Handler result of the successful attempt
    pub result: Option<Value>,

    pub lease_token: Option<LeaseToken>,

    pub lease_until: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(job_id: JobId, message: JobMessage, now: DateTime<Utc>) -> Self {
        let status = if message.run_at > now {
            JobStatus::Delayed { run_at: message.run_at }
        } else {
            JobStatus::Waiting
        };

        Self {
            job_id,
            message,
            status,
            attempts_made: 0,
            created_at: now,
            updated_at: now,
            last_error: None,
            result: None,
            lease_token: None,
            lease_until: None,
        }
    }

    /// Attempts still available after the current one
    pub fn attempts_remaining(&self) -> u32 {
        self.message.policy.max_attempts.saturating_sub(self.attempts_made)
    }

    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.status, &self.lease_until) {
            (JobStatus::Active { .. }, Some(lease_until)) => *lease_until < now,
            _ => false,
        }
    }

    /// Lease the job for one attempt
    pub fn start_attempt(&mut self, lease_token: LeaseToken, lease_until: DateTime<Utc>, now: DateTime<Utc>) {
        self.attempts_made += 1;
        self.status = JobStatus::Active { lease_until };
        self.lease_token = Some(lease_token);
        self.lease_until = Some(lease_until);
        self.updated_at = now;
    }

    pub fn complete(&mut self, result: Option<Value>, now: DateTime<Utc>) {
        self.status = JobStatus::Completed { completed_at: now };
        self.result = result;
        self.release_lease(now);
    }

    pub fn exhaust(&mut self, error: String, now: DateTime<Utc>) {
        self.status = JobStatus::Exhausted { failed_at: now, error: error.clone() };
        self.last_error = Some(error);
        self.release_lease(now);
    }

    pub fn schedule_retry(&mut self, retry_at: DateTime<Utc>, error: String, now: DateTime<Utc>) {
        self.status = JobStatus::RetryPending { retry_at };
        self.last_error = Some(error);
        self.release_lease(now);
    }

    fn release_lease(&mut self, now: DateTime<Utc>) {
        self.lease_token = None;
        self.lease_until = None;
        self.updated_at = now;
    }
}

/// A job that has been leased for processing
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub record: JobRecord,

    /// Lease token for acknowledgment
    pub lease_token: LeaseToken,

    pub lease_until: DateTime<Utc>,
}

impl LeasedJob {
    pub fn job_id(&self) -> &JobId {
        &self.record.job_id
    }

    pub fn message(&self) -> &JobMessage {
        &self.record.message
    }

    pub fn attempt(&self) -> u32 {
        self.record.attempts_made
    }
}

/// What the store decided after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FailOutcome {
    Retrying { retry_at: DateTime<Utc>, attempts_made: u32 },
    Exhausted { attempts_made: u32, retained: bool },
}

impl FailOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Per-queue job counts by lifecycle state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub waiting: usize,
    pub delayed: usize,
    pub active: usize,
    pub retry_pending: usize,
    pub completed: usize,
    pub exhausted: usize,
}

impl JobCounts {
    pub fn record(&mut self, status: &JobStatus) {
        match status {
            JobStatus::Waiting => self.waiting += 1,
            JobStatus::Delayed { .. } => self.delayed += 1,
            JobStatus::Active { .. } => self.active += 1,
            JobStatus::RetryPending { .. } => self.retry_pending += 1,
            JobStatus::Completed { .. } => self.completed += 1,
            JobStatus::Exhausted { .. } => self.exhausted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.waiting + self.delayed + self.active + self.retry_pending + self.completed + self.exhausted
    }
}
