#[cfg(feature = "memory")]
pub mod memory;

use async_trait::async_trait;
use std::time::Duration;

use crate::{
    FailOutcome, JobCounts, JobId, JobMessage, JobRecord, JobStatus, LeasedJob, QueueName,
    QueueResult, RepeatRegistration,
    types::LeaseToken,
};

/// Contract of the durable queue store. The store is the sole source of
/// truth for job state; dispatchers only move jobs through it.
///
/// Every method may suspend on network I/O and reports an unreachable store
/// as [`QueueError::Unavailable`](crate::QueueError::Unavailable).
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Persist a new job and return its record
    async fn enqueue(&self, message: JobMessage) -> QueueResult<JobRecord>;

    /// Lease the next eligible job of `queue`, if any.
    ///
    /// Due delayed jobs and due repeating registrations are promoted first.
    async fn dequeue(&self, queue: QueueName, lease: Duration) -> QueueResult<Option<LeasedJob>>;

    /// Record a successful attempt; prunes the job when its policy says so
    async fn ack_complete(
        &self,
        job_id: &JobId,
        lease_token: &LeaseToken,
        result: Option<serde_json::Value>,
    ) -> QueueResult<()>;

    /// Record a failed attempt. The store applies the job's backoff policy:
    /// it either schedules the next attempt or exhausts the job. A
    /// non-retryable failure exhausts immediately.
    async fn ack_fail(
        &self,
        job_id: &JobId,
        lease_token: &LeaseToken,
        error: String,
        retryable: bool,
    ) -> QueueResult<FailOutcome>;

    /// Extend the lease of an active attempt
    async fn heartbeat_extend(
        &self,
        job_id: &JobId,
        lease_token: &LeaseToken,
        extra_time: Duration,
    ) -> QueueResult<()>;

    /// Register (or replace) a repeating registration keyed by `(queue, key)`
    async fn add_repeatable(&self, registration: RepeatRegistration) -> QueueResult<()>;

    /// Deregister by logical name. In-flight instances are unaffected.
    async fn remove_repeatable(&self, queue: QueueName, key: &str) -> QueueResult<bool>;

    async fn repeatables(&self, queue: QueueName) -> QueueResult<Vec<RepeatRegistration>>;

    async fn get_status(&self, job_id: &JobId) -> QueueResult<JobStatus>;

    async fn get_record(&self, job_id: &JobId) -> QueueResult<JobRecord>;

    async fn job_counts(&self, queue: QueueName) -> QueueResult<JobCounts>;

    /// Cheap connectivity check
    async fn ping(&self) -> QueueResult<()>;

    /// Release the connection; later calls fail with `Unavailable`
    async fn close(&self) -> QueueResult<()>;
}
