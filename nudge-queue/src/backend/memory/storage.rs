use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    backend::QueueBackend,
    clock::{Clock, SystemClock},
    types::LeaseToken,
    FailOutcome, JobCounts, JobId, JobMessage, JobRecord, JobStatus, LeasedJob, QueueError,
    QueueName, QueueResult, RepeatRegistration,
};

// Type aliases to reduce complexity
type QueueLists = HashMap<QueueName, VecDeque<JobId>>;
type RepeatTable = HashMap<(QueueName, String), RepeatRegistration>;

#[derive(Default)]
pub(crate) struct StoreState {
    /// Job records indexed by job_id
    pub(crate) jobs: HashMap<JobId, JobRecord>,

    /// Pending job ids per queue, in enqueue order
    pub(crate) queues: QueueLists,

    /// Repeating registrations keyed by (queue, logical name)
    pub(crate) repeatables: RepeatTable,
}

/// In-memory store for tests and single-process deployments.
///
/// Clones share the same state, the way several connections share one server.
#[derive(Clone)]
pub struct MemoryBackend {
    pub(crate) state: Arc<RwLock<StoreState>>,
    pub(crate) clock: Arc<dyn Clock>,
    closed: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            clock,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_open(&self) -> QueueResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Unavailable("memory store is closed".to_string()));
        }
        Ok(())
    }

    /// Reopen a closed store (simulates the server coming back)
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::Release);
    }

    /// Push a job's lease into the past so the reaper treats it as stalled (test helper)
    pub fn force_lease_expiry(&self, job_id: &JobId) -> QueueResult<()> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let record = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        if let JobStatus::Active { ref mut lease_until } = record.status {
            *lease_until = now - chrono::Duration::seconds(1);
            record.lease_until = Some(*lease_until);
            record.updated_at = now;
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn to_chrono(duration: Duration) -> QueueResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| QueueError::InvalidArgument(format!("duration out of range: {}", e)))
}

/// Lease checks shared by every acknowledgment
fn validate_lease(record: &JobRecord, lease_token: &LeaseToken, now: DateTime<Utc>) -> QueueResult<()> {
    if record.status.is_terminal() {
        return Err(QueueError::JobAlreadyTerminal);
    }
    if record.lease_token.as_ref() != Some(lease_token) {
        return Err(QueueError::InvalidLeaseToken);
    }
    if let Some(lease_until) = record.lease_until {
        if now > lease_until {
            return Err(QueueError::LeaseExpired);
        }
    }
    Ok(())
}

impl StoreState {
    /// Fire every registration of `queue` that is due. Missed slots collapse
    /// into a single instance.
    fn promote_repeatables(&mut self, queue: QueueName, now: DateTime<Utc>) -> QueueResult<()> {
        let mut finished = Vec::new();

        for ((reg_queue, key), registration) in self.repeatables.iter_mut() {
            if *reg_queue != queue || registration.next_run_at > now {
                continue;
            }

            let fire_at = registration.next_run_at;
            let job_id = JobId::repeat_instance(key, fire_at);
            if !self.jobs.contains_key(&job_id) {
                let message = JobMessage::new(
                    queue,
                    registration.job_type.clone(),
                    registration.payload.clone(),
                    registration.policy,
                )
                .with_run_at(fire_at)
                .with_repeat_key(key.clone());

                self.jobs.insert(job_id.clone(), JobRecord::new(job_id.clone(), message, now));
                self.queues.entry(queue).or_default().push_back(job_id.clone());
                debug!(queue = %queue, key = %key, job_id = %job_id, "fired repeating job");
            }

            match registration.recurrence.next_after(now)? {
                Some(next) => registration.next_run_at = next,
                None => finished.push((*reg_queue, key.clone())),
            }
        }

        for entry in finished {
            self.repeatables.remove(&entry);
        }
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn enqueue(&self, message: JobMessage) -> QueueResult<JobRecord> {
        self.check_open()?;
        let now = self.clock.now();
        let job_id = JobId::new();
        let queue = message.queue;

        let record = JobRecord::new(job_id.clone(), message, now);

        let mut state = self.state.write();
        state.jobs.insert(job_id.clone(), record.clone());
        state.queues.entry(queue).or_default().push_back(job_id);

        Ok(record)
    }

    async fn dequeue(&self, queue: QueueName, lease: Duration) -> QueueResult<Option<LeasedJob>> {
        self.check_open()?;
        let now = self.clock.now();
        let lease = to_chrono(lease)?;

        let mut guard = self.state.write();
        guard.promote_repeatables(queue, now)?;

        let StoreState { jobs, queues, .. } = &mut *guard;
        let list = queues.entry(queue).or_default();

        // Ids of active, finished or pruned jobs no longer belong in the list
        list.retain(|id| {
            jobs.get(id)
                .map(|r| !r.status.is_terminal() && !r.status.is_active())
                .unwrap_or(false)
        });

        let position = list.iter().position(|id| {
            jobs.get(id).map(|r| r.status.is_eligible(now)).unwrap_or(false)
        });

        let Some(job_id) = position.and_then(|index| list.remove(index)) else {
            return Ok(None);
        };

        let record = jobs
            .get_mut(&job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        let lease_token = LeaseToken::new();
        let lease_until = now + lease;
        record.start_attempt(lease_token.clone(), lease_until, now);

        Ok(Some(LeasedJob {
            record: record.clone(),
            lease_token,
            lease_until,
        }))
    }

    async fn ack_complete(
        &self,
        job_id: &JobId,
        lease_token: &LeaseToken,
        result: Option<serde_json::Value>,
    ) -> QueueResult<()> {
        self.check_open()?;
        let now = self.clock.now();
        let mut state = self.state.write();

        let record = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        validate_lease(record, lease_token, now)?;

        record.complete(result, now);
        if record.message.policy.remove_on_complete {
            state.jobs.remove(job_id);
        }
        Ok(())
    }

    async fn ack_fail(
        &self,
        job_id: &JobId,
        lease_token: &LeaseToken,
        error: String,
        retryable: bool,
    ) -> QueueResult<FailOutcome> {
        self.check_open()?;
        let now = self.clock.now();
        let mut guard = self.state.write();
        let StoreState { jobs, queues, .. } = &mut *guard;

        let record = jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        validate_lease(record, lease_token, now)?;

        let attempts_made = record.attempts_made;
        if !retryable || record.attempts_remaining() == 0 {
            record.exhaust(error, now);
            let retained = !record.message.policy.remove_on_fail;
            if !retained {
                jobs.remove(job_id);
            }
            return Ok(FailOutcome::Exhausted { attempts_made, retained });
        }

        let delay = record.message.policy.backoff.delay_for(attempts_made);
        let retry_at = now + to_chrono(delay)?;
        record.schedule_retry(retry_at, error, now);
        queues
            .entry(record.message.queue)
            .or_default()
            .push_back(job_id.clone());

        Ok(FailOutcome::Retrying { retry_at, attempts_made })
    }

    /// The lease now runs until `now + extra_time`
    async fn heartbeat_extend(
        &self,
        job_id: &JobId,
        lease_token: &LeaseToken,
        extra_time: Duration,
    ) -> QueueResult<()> {
        self.check_open()?;
        let now = self.clock.now();
        let mut state = self.state.write();

        let record = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        validate_lease(record, lease_token, now)?;

        let lease_until = now + to_chrono(extra_time)?;
        record.status = JobStatus::Active { lease_until };
        record.lease_until = Some(lease_until);
        record.updated_at = now;
        Ok(())
    }

    async fn add_repeatable(&self, registration: RepeatRegistration) -> QueueResult<()> {
        self.check_open()?;
        let mut state = self.state.write();
        state
            .repeatables
            .insert((registration.queue, registration.key.clone()), registration);
        Ok(())
    }

    async fn remove_repeatable(&self, queue: QueueName, key: &str) -> QueueResult<bool> {
        self.check_open()?;
        let mut state = self.state.write();
        Ok(state.repeatables.remove(&(queue, key.to_string())).is_some())
    }

    async fn repeatables(&self, queue: QueueName) -> QueueResult<Vec<RepeatRegistration>> {
        self.check_open()?;
        let state = self.state.read();
        let mut registrations: Vec<_> = state
            .repeatables
            .values()
            .filter(|r| r.queue == queue)
            .cloned()
            .collect();
        registrations.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(registrations)
    }

    async fn get_status(&self, job_id: &JobId) -> QueueResult<JobStatus> {
        self.get_record(job_id).await.map(|record| record.status)
    }

    async fn get_record(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        self.check_open()?;
        let state = self.state.read();
        state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))
    }

    async fn job_counts(&self, queue: QueueName) -> QueueResult<JobCounts> {
        self.check_open()?;
        let state = self.state.read();
        let mut counts = JobCounts::default();
        for record in state.jobs.values().filter(|r| r.message.queue == queue) {
            counts.record(&record.status);
        }
        Ok(counts)
    }

    async fn ping(&self) -> QueueResult<()> {
        self.check_open()
    }

    async fn close(&self) -> QueueResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
