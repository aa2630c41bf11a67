use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    backend::QueueBackend,
    clock::{Clock, SystemClock},
    job::Job,
    observability::{MetricsSnapshot, ObservabilityLayer},
    EnqueueOptions, JobCounts, JobId, JobMessage, JobPolicy, JobRecord, QueueError, QueueName,
    QueueResult, Recurrence, RepeatRegistration,
};

/// A named queue with its default execution policy.
///
/// Cloning is cheap; clones share the store connection and the
/// observation sink.
pub struct JobQueue<B: QueueBackend + ?Sized = dyn QueueBackend> {
    name: QueueName,
    backend: Arc<B>,
    policy: JobPolicy,
    observability: Arc<ObservabilityLayer>,
    clock: Arc<dyn Clock>,
}

impl<B: QueueBackend + ?Sized> JobQueue<B> {
    pub fn new(name: QueueName, backend: Arc<B>, policy: JobPolicy) -> Self {
        Self {
            name,
            backend,
            policy,
            observability: Arc::new(ObservabilityLayer::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Deferred-tasks queue: 3 attempts, exponential backoff from 1s
    pub fn deferred_tasks(backend: Arc<B>) -> Self {
        Self::new(QueueName::DeferredTasks, backend, JobPolicy::deferred_tasks())
    }

    /// Scheduled-reports queue: 2 attempts, fixed 5s backoff
    pub fn scheduled_reports(backend: Arc<B>) -> Self {
        Self::new(QueueName::ScheduledReports, backend, JobPolicy::scheduled_reports())
    }

    pub fn with_observability(mut self, observability: Arc<ObservabilityLayer>) -> Self {
        self.observability = observability;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist a one-shot job. Store failures come back as
    /// [`QueueError::Unavailable`] and are not retried here.
    #[instrument(skip(self, payload, options), fields(queue = %self.name))]
    pub async fn enqueue(
        &self,
        job_type: &str,
        payload: Value,
        options: EnqueueOptions,
    ) -> QueueResult<JobRecord> {
        let now = self.clock.now();
        let run_at = match options.delay {
            Some(delay) => now + to_chrono(delay)?,
            None => now,
        };
        let policy = options.policy.unwrap_or(self.policy);

        let message = JobMessage::new(self.name, job_type, payload, policy).with_run_at(run_at);
        let record = self.backend.enqueue(message).await?;

        self.observability.record_enqueued(&record, now);
        Ok(record)
    }

    /// Enqueue a typed job; it must belong to this queue
    pub async fn enqueue_job<J: Job>(&self, job: &J, options: EnqueueOptions) -> QueueResult<JobRecord> {
        if J::QUEUE != self.name {
            return Err(QueueError::InvalidArgument(format!(
                "{} belongs on {}, not {}",
                job.job_type(),
                J::QUEUE,
                self.name
            )));
        }
        self.enqueue(job.job_type(), job.payload(), options).await
    }

    /// Register (or replace) the repeating registration named `key`
    #[instrument(skip(self, payload, recurrence), fields(queue = %self.name))]
    pub async fn schedule_repeating(
        &self,
        key: &str,
        job_type: &str,
        payload: Value,
        recurrence: Recurrence,
    ) -> QueueResult<RepeatRegistration> {
        let now = self.clock.now();
        let next_run_at = recurrence
            .next_after(now)?
            .ok_or_else(|| QueueError::InvalidSchedule {
                expression: recurrence.describe(),
                reason: "schedule never fires".to_string(),
            })?;

        let registration = RepeatRegistration {
            key: key.to_string(),
            queue: self.name,
            job_type: job_type.to_string(),
            payload,
            recurrence,
            policy: self.policy,
            next_run_at,
            registered_at: now,
        };

        self.backend.add_repeatable(registration.clone()).await?;
        self.observability.record_recurring_registered(&registration, now);
        Ok(registration)
    }

    /// Stop future firings of `key`; instances already dispatched still run.
    pub async fn remove_repeating(&self, key: &str) -> QueueResult<bool> {
        let removed = self.backend.remove_repeatable(self.name, key).await?;
        if removed {
            self.observability
                .record_recurring_removed(self.name, key, self.clock.now());
        } else {
            debug!(queue = %self.name, key, "no recurring job to remove");
        }
        Ok(removed)
    }

    pub async fn repeating(&self) -> QueueResult<Vec<RepeatRegistration>> {
        self.backend.repeatables(self.name).await
    }

    pub async fn get_job(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        self.backend.get_record(job_id).await
    }

    pub async fn counts(&self) -> QueueResult<JobCounts> {
        self.backend.job_counts(self.name).await
    }

    /// Counters observed through this queue's observation sink
    pub fn metrics(&self) -> MetricsSnapshot {
        self.observability.metrics().snapshot(self.clock.now())
    }

    /// Close the store connection
    pub async fn close(&self) -> QueueResult<()> {
        self.backend.close().await
    }

    pub fn name(&self) -> QueueName {
        self.name
    }

    pub fn policy(&self) -> &JobPolicy {
        &self.policy
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn observability(&self) -> &Arc<ObservabilityLayer> {
        &self.observability
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl<B: QueueBackend + ?Sized> Clone for JobQueue<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            backend: self.backend.clone(),
            policy: self.policy,
            observability: self.observability.clone(),
            clock: self.clock.clone(),
        }
    }
}

fn to_chrono(delay: std::time::Duration) -> QueueResult<chrono::Duration> {
    chrono::Duration::from_std(delay)
        .map_err(|e| QueueError::InvalidArgument(format!("delay out of range: {}", e)))
}
