use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use nudge_core::NudgeConfigSnapshot;
use serde_json::Value;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    backend::QueueBackend, job::Job, reconnect::ReconnectPolicy, FailOutcome, JobError, JobQueue,
    LeasedJob, QueueError, QueueResult,
};

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Jobs of this queue running at once
    pub concurrency: usize,
    /// Pause after finding the queue empty
    pub poll_interval: Duration,
    /// Lease taken on every dequeued job
    pub lease_duration: Duration,
    /// How often a running job's lease is renewed
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: Duration::from_millis(100),
            lease_duration: Duration::from_secs(300), // 5 minutes
            heartbeat_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    /// Read `queue.*` keys, keeping defaults for anything missing
    pub fn from_config(config: &NudgeConfigSnapshot) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            config.get_u64(key).map(Duration::from_millis).unwrap_or(default)
        };
        let secs = |key: &str, default: Duration| {
            config.get_u64(key).map(Duration::from_secs).unwrap_or(default)
        };

        Self {
            concurrency: config
                .get_usize("queue.concurrency")
                .unwrap_or(defaults.concurrency)
                .max(1),
            poll_interval: millis("queue.poll_interval_ms", defaults.poll_interval),
            lease_duration: secs("queue.lease_secs", defaults.lease_duration),
            heartbeat_interval: secs("queue.heartbeat_secs", defaults.heartbeat_interval),
            reconnect: ReconnectPolicy::new(
                millis("queue.reconnect.step_ms", defaults.reconnect.step),
                millis("queue.reconnect.max_delay_ms", defaults.reconnect.max_delay),
            ),
        }
    }
}

type Task = (oneshot::Sender<()>, JoinHandle<QueueResult<()>>);

/// Handle for managing dispatcher lifecycle
pub struct WorkerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<QueueResult<()>>,
    /// Background tasks stopped after the main one, e.g. a lease reaper
    companions: Vec<Task>,
}

impl WorkerHandle {
    pub(crate) fn new(shutdown_tx: oneshot::Sender<()>, join_handle: JoinHandle<QueueResult<()>>) -> Self {
        Self {
            shutdown_tx,
            join_handle,
            companions: Vec::new(),
        }
    }

    /// Tie another background task to this one, so that a single
    /// [`shutdown`](Self::shutdown) stops both.
    pub fn alongside(mut self, other: WorkerHandle) -> Self {
        self.companions.push((other.shutdown_tx, other.join_handle));
        self.companions.extend(other.companions);
        self
    }

    /// Stop pulling new jobs and wait for in-flight ones to finish, then stop
    /// the companion tasks.
    pub async fn shutdown(self) -> QueueResult<()> {
        let result = stop((self.shutdown_tx, self.join_handle)).await;
        for companion in self.companions {
            stop(companion).await?;
        }
        result
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

async fn stop((shutdown_tx, join_handle): Task) -> QueueResult<()> {
    let _ = shutdown_tx.send(());
    join_handle
        .await
        .map_err(|e| QueueError::Internal(format!("Worker join error: {}", e)))?
}

/// Consumer loop of one queue: leases the next eligible job, routes it by
/// type tag through `J`, and reports the outcome back to the store.
pub struct Dispatcher<J: Job, B: QueueBackend + ?Sized = dyn QueueBackend> {
    queue: JobQueue<B>,
    context: Arc<J::Context>,
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
    _jobs: PhantomData<fn() -> J>,
}

impl<J: Job, B: QueueBackend + ?Sized + 'static> Dispatcher<J, B> {
    pub fn new(queue: JobQueue<B>, context: J::Context, config: DispatcherConfig) -> QueueResult<Self> {
        if queue.name() != J::QUEUE {
            return Err(QueueError::InvalidArgument(format!(
                "jobs of {} cannot be dispatched from {}",
                J::QUEUE,
                queue.name()
            )));
        }

        // A lease must survive until at least the second renewal attempt
        if config.heartbeat_interval.is_zero()
            || config.heartbeat_interval.saturating_mul(2) > config.lease_duration
        {
            return Err(QueueError::InvalidArgument(format!(
                "heartbeat interval {:?} must be non-zero and at most half the lease duration {:?}",
                config.heartbeat_interval, config.lease_duration
            )));
        }

        let concurrency = config.concurrency.max(1);
        Ok(Self {
            queue,
            context: Arc::new(context),
            config: DispatcherConfig { concurrency, ..config },
            permits: Arc::new(Semaphore::new(concurrency)),
            _jobs: PhantomData,
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Spawn the consumer loop
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(async move { self.run(shutdown_rx).await });

        WorkerHandle::new(shutdown_tx, join_handle)
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> QueueResult<()> {
        let queue = self.queue.name();
        let mut reconnect_attempts: u32 = 0;

        info!(queue = %queue, concurrency = self.config.concurrency, "Dispatcher started");

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown_rx => break,
                permit = self.permits.clone().acquire_owned() => {
                    permit.map_err(|_| QueueError::WorkerShutdown)?
                }
            };

            let next = tokio::select! {
                _ = &mut shutdown_rx => break,
                next = self.queue.backend().dequeue(queue, self.config.lease_duration) => next,
            };

            let pause = match next {
                Ok(Some(leased)) => {
                    reconnect_attempts = 0;
                    let dispatcher = self.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = dispatcher.process_leased(leased).await {
                            error!(queue = %queue, error = %e, "Failed to record job outcome");
                        }
                    });
                    continue;
                }
                Ok(None) => {
                    reconnect_attempts = 0;
                    self.config.poll_interval
                }
                Err(e) if e.is_connectivity() => {
                    reconnect_attempts = reconnect_attempts.saturating_add(1);
                    let delay = self.config.reconnect.delay_for(reconnect_attempts);
                    warn!(
                        queue = %queue,
                        attempt = reconnect_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Queue store unreachable, reconnecting"
                    );
                    delay
                }
                Err(e) => {
                    error!(queue = %queue, error = %e, "Error pulling next job");
                    self.config.poll_interval
                }
            };
            drop(permit);

            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(queue = %queue, "Dispatcher shutdown requested, waiting for in-flight jobs");
        let _drained = self
            .permits
            .acquire_many(self.config.concurrency as u32)
            .await
            .map_err(|_| QueueError::WorkerShutdown)?;

        let totals = self.queue.metrics().global;
        info!(
            queue = %queue,
            completed = totals.jobs_completed,
            failed = totals.jobs_failed,
            success_rate = totals.success_rate(),
            "Dispatcher stopped"
        );
        Ok(())
    }

    /// Lease and run at most one job inline. Returns whether a job was found.
    pub async fn process_next(&self) -> QueueResult<bool> {
        let leased = self
            .queue
            .backend()
            .dequeue(self.queue.name(), self.config.lease_duration)
            .await?;

        match leased {
            Some(leased) => {
                self.process_leased(leased).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self, leased), fields(queue = %self.queue.name(), job_id = %leased.job_id(), job_type = %leased.message().job_type, attempt = leased.attempt()))]
    async fn process_leased(&self, leased: LeasedJob) -> QueueResult<()> {
        let backend = self.queue.backend();
        let observability = self.queue.observability();
        let job_id = leased.job_id();
        let message = leased.message();
        let attempts = leased.attempt();

        debug!("Processing job");

        let outcome = match J::decode(&message.job_type, &message.payload) {
            Ok(job) => self.execute_with_heartbeat(job, &leased).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                self.acknowledge(&leased, || {
                    backend.ack_complete(job_id, &leased.lease_token, result.clone())
                })
                .await?;
                let at = self.queue.clock().now();
                observability.record_completed(job_id, message, attempts, result, at);
            }
            Err(job_error) => {
                let error = job_error.describe();
                let retryable = job_error.is_retryable();
                let fail = self
                    .acknowledge(&leased, || {
                        backend.ack_fail(job_id, &leased.lease_token, error.clone(), retryable)
                    })
                    .await?;

                let at = self.queue.clock().now();
                match fail {
                    FailOutcome::Retrying { retry_at, attempts_made } => {
                        observability.record_retrying(job_id, message, attempts_made, retry_at, &job_error, at)
                    }
                    FailOutcome::Exhausted { attempts_made, .. } => {
                        observability.record_failed(job_id, message, attempts_made, &job_error, at)
                    }
                }
            }
        }

        Ok(())
    }

    /// Report an attempt's outcome, retrying through store outages with the
    /// reconnect backoff. Gives up once the lease can no longer be trusted to
    /// be held; the job is then left to lease expiry.
    async fn acknowledge<T, F, Fut>(&self, leased: &LeasedJob, mut ack: F) -> QueueResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = QueueResult<T>>,
    {
        // The last successful heartbeat may be one interval old
        let budget = self
            .config
            .lease_duration
            .saturating_sub(self.config.heartbeat_interval);
        let deadline = Instant::now() + budget;
        let mut attempt: u32 = 0;

        loop {
            match ack().await {
                Err(e) if e.is_connectivity() => {
                    attempt = attempt.saturating_add(1);
                    let delay = self.config.reconnect.delay_for(attempt);
                    if Instant::now() + delay >= deadline {
                        error!(job_id = %leased.job_id(), attempt, error = %e, "Giving up on recording job outcome");
                        return Err(e);
                    }
                    warn!(
                        job_id = %leased.job_id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Could not record job outcome, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Run the job while renewing its lease, so a slow attempt is never
    /// reclaimed and started a second time.
    async fn execute_with_heartbeat(&self, job: J, leased: &LeasedJob) -> Result<Option<Value>, JobError> {
        let every = self.config.heartbeat_interval;
        let mut ticker = interval_at(Instant::now() + every, every);

        let execution = job.execute(&self.context);
        tokio::pin!(execution);

        loop {
            tokio::select! {
                result = &mut execution => return result,
                _ = ticker.tick() => {
                    let renewed = self
                        .queue
                        .backend()
                        .heartbeat_extend(leased.job_id(), &leased.lease_token, self.config.lease_duration)
                        .await;
                    if let Err(e) = renewed {
                        warn!(job_id = %leased.job_id(), error = %e, "Lease heartbeat failed");
                    }
                }
            }
        }
    }
}

impl<J: Job, B: QueueBackend + ?Sized> Clone for Dispatcher<J, B> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            context: self.context.clone(),
            config: self.config.clone(),
            permits: self.permits.clone(),
            _jobs: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::clock::{Clock, ManualClock};
    use crate::services::FollowUpOperations;
    use crate::{DeferredTask, EnqueueOptions, JobEvent, JobStatus};
    use async_trait::async_trait;
    use nudge_core::{ErrorKind, NudgeConfig};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingFollowUps {
        sent: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl FollowUpOperations for CountingFollowUps {
        async fn send_follow_up(&self, _follow_up_id: i64) -> anyhow::Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("chat unreachable");
            }
            Ok(())
        }

        async fn process_pending_follow_ups(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn setup(
        ops: Arc<CountingFollowUps>,
    ) -> (JobQueue<MemoryBackend>, Dispatcher<DeferredTask, MemoryBackend>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
        let queue = JobQueue::deferred_tasks(backend).with_clock(clock.clone());
        let context: Arc<dyn FollowUpOperations> = ops;
        let dispatcher = Dispatcher::new(queue.clone(), context, DispatcherConfig::default()).unwrap();
        (queue, dispatcher, clock)
    }

    #[tokio::test]
    async fn test_success_is_acknowledged_and_pruned() {
        let ops = Arc::new(CountingFollowUps::default());
        let (queue, dispatcher, _) = setup(ops.clone());
        let mut events = queue.observability().subscribe();

        let record = queue
            .enqueue_job(&DeferredTask::SendFollowUp { follow_up_id: 3 }, EnqueueOptions::immediate())
            .await
            .unwrap();

        assert!(dispatcher.process_next().await.unwrap());
        assert!(!dispatcher.process_next().await.unwrap());
        assert_eq!(ops.sent.load(Ordering::SeqCst), 1);

        assert_eq!(events.recv().await.unwrap().event_name(), "enqueued");
        assert!(matches!(events.recv().await.unwrap(), JobEvent::Completed { attempts: 1, .. }));
        assert!(matches!(
            queue.get_job(&record.job_id).await,
            Err(QueueError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_exhausts_without_retry() {
        let ops = Arc::new(CountingFollowUps::default());
        let (queue, dispatcher, clock) = setup(ops);
        let mut events = queue.observability().subscribe();

        let record = queue
            .enqueue("send_carrier_pigeon", json!({}), EnqueueOptions::immediate())
            .await
            .unwrap();
        assert!(dispatcher.process_next().await.unwrap());

        let kept = queue.get_job(&record.job_id).await.unwrap();
        assert_eq!(kept.attempts_made, 1);
        match kept.status {
            JobStatus::Exhausted { error, .. } => assert!(error.contains("Unknown job type")),
            other => panic!("unexpected status {:?}", other),
        }

        assert_eq!(events.recv().await.unwrap().event_name(), "enqueued");
        match events.recv().await.unwrap() {
            JobEvent::Failed { error_kind, error, at, .. } => {
                assert_eq!(error_kind, ErrorKind::UnknownJobType);
                assert_eq!(error, "Unknown job type: send_carrier_pigeon");
                assert_eq!(at, clock.now());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failures_follow_exponential_backoff() {
        let ops = Arc::new(CountingFollowUps { fail: true, ..Default::default() });
        let (queue, dispatcher, clock) = setup(ops.clone());

        let record = queue
            .enqueue_job(&DeferredTask::SendFollowUp { follow_up_id: 9 }, EnqueueOptions::immediate())
            .await
            .unwrap();

        assert!(dispatcher.process_next().await.unwrap());
        // 1s after the first failure, 2s after the second
        clock.advance(Duration::from_millis(999));
        assert!(!dispatcher.process_next().await.unwrap());
        clock.advance(Duration::from_millis(1));
        assert!(dispatcher.process_next().await.unwrap());

        clock.advance(Duration::from_millis(1999));
        assert!(!dispatcher.process_next().await.unwrap());
        clock.advance(Duration::from_millis(1));
        assert!(dispatcher.process_next().await.unwrap());

        let kept = queue.get_job(&record.job_id).await.unwrap();
        assert_eq!(kept.attempts_made, 3);
        assert!(matches!(kept.status, JobStatus::Exhausted { .. }));
        assert_eq!(kept.last_error.as_deref(), Some("chat unreachable"));
        assert_eq!(ops.sent.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_wrong_queue_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = JobQueue::scheduled_reports(backend);
        let context: Arc<dyn FollowUpOperations> = Arc::new(CountingFollowUps::default());

        let result = Dispatcher::<DeferredTask, _>::new(queue, context, DispatcherConfig::default());
        assert!(matches!(result, Err(QueueError::InvalidArgument(_))));
    }

    #[test]
    fn test_config_from_snapshot() {
        let mut config = NudgeConfig::new();
        config.set("queue.concurrency", "4");
        config.set("queue.reconnect.max_delay_ms", "500");
        config.set("queue.lease_secs", "60");

        let dispatcher = DispatcherConfig::from_config(&config.snapshot());
        assert_eq!(dispatcher.concurrency, 4);
        assert_eq!(dispatcher.lease_duration, Duration::from_secs(60));
        assert_eq!(dispatcher.reconnect.max_delay, Duration::from_millis(500));
        assert_eq!(dispatcher.reconnect.step, Duration::from_millis(50));
        assert_eq!(dispatcher.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_heartbeat_must_fit_inside_the_lease() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = JobQueue::deferred_tasks(backend);
        let build = |config: DispatcherConfig| {
            let context: Arc<dyn FollowUpOperations> = Arc::new(CountingFollowUps::default());
            Dispatcher::<DeferredTask, _>::new(queue.clone(), context, config)
        };

        // lease_secs=10 with the default 30s heartbeat
        let mut config = NudgeConfig::new();
        config.set("queue.lease_secs", "10");
        let short_lease = DispatcherConfig::from_config(&config.snapshot());
        assert!(matches!(build(short_lease), Err(QueueError::InvalidArgument(_))));

        let zero_heartbeat = DispatcherConfig {
            heartbeat_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(build(zero_heartbeat), Err(QueueError::InvalidArgument(_))));

        config.set("queue.heartbeat_secs", "5");
        let fitted = DispatcherConfig::from_config(&config.snapshot());
        assert!(build(fitted).is_ok());
    }

    #[tokio::test]
    async fn test_worker_processes_and_shuts_down() {
        let ops = Arc::new(CountingFollowUps::default());
        let backend = Arc::new(MemoryBackend::new());
        let queue = JobQueue::deferred_tasks(backend);
        let context: Arc<dyn FollowUpOperations> = ops.clone();
        let config = DispatcherConfig {
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        let handle = Dispatcher::<DeferredTask, _>::new(queue.clone(), context, config)
            .unwrap()
            .start();

        let mut events = queue.observability().event_stream();
        queue
            .enqueue_job(&DeferredTask::SendFollowUp { follow_up_id: 1 }, EnqueueOptions::immediate())
            .await
            .unwrap();

        use futures::StreamExt;
        let completed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(JobEvent::Completed { .. }) = events.next().await {
                    break;
                }
            }
        })
        .await;
        assert!(completed.is_ok());

        handle.shutdown().await.unwrap();
        assert_eq!(ops.sent.load(Ordering::SeqCst), 1);
    }
}
