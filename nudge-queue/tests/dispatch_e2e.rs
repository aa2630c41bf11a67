use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use nudge_queue::{
    backend::QueueBackend, types::LeaseToken, DeferredTask, Dispatcher, DispatcherConfig,
    EnqueueOptions, FailOutcome, FollowUpOperations, JobCounts, JobEvent, JobId, JobMessage,
    JobQueue, JobRecord, JobStatus, LeaseReaper, LeasedJob, ManualClock, MemoryBackend, QueueError, QueueName,
    QueueResult, ReconnectPolicy, RepeatRegistration, ReportOperations, ReportRequest, ReportTask,
};

/// Report generator that fails a set number of times before succeeding
struct FlakyReports {
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FlakyReports {
    fn failing(times: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(times),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ReportOperations for FlakyReports {
    async fn generate_report(&self, request: ReportRequest) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("warehouse timeout");
        }
        Ok(json!({ "reportType": request.report_type, "rows": 12 }))
    }
}

struct FailingFollowUps {
    calls: AtomicU32,
}

#[async_trait]
impl FollowUpOperations for FailingFollowUps {
    async fn send_follow_up(&self, follow_up_id: i64) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("follow-up {} bounced", follow_up_id)
    }

    async fn process_pending_follow_ups(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Report job failing once then succeeding: 2 attempts, a completion
/// observation, and the job pruned afterwards.
#[tokio::test]
async fn test_daily_report_recovers_on_second_attempt() {
    let clock = Arc::new(ManualClock::default());
    let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
    let queue = JobQueue::scheduled_reports(backend).with_clock(clock.clone());
    let reports = FlakyReports::failing(1);
    let context: Arc<dyn ReportOperations> = reports.clone();
    let dispatcher =
        Dispatcher::<ReportTask, _>::new(queue.clone(), context, DispatcherConfig::default()).unwrap();
    let mut events = queue.observability().event_stream();

    let record = queue
        .enqueue("generate_daily_report", json!({ "reportType": "daily" }), EnqueueOptions::immediate())
        .await
        .unwrap();

    // First attempt fails; fixed 5s backoff
    assert!(dispatcher.process_next().await.unwrap());
    assert!(matches!(
        queue.get_job(&record.job_id).await.unwrap().status,
        JobStatus::RetryPending { .. }
    ));
    clock.advance(Duration::from_millis(4999));
    assert!(!dispatcher.process_next().await.unwrap());
    clock.advance(Duration::from_millis(1));

    // Second attempt succeeds
    assert!(dispatcher.process_next().await.unwrap());
    assert_eq!(reports.calls.load(Ordering::SeqCst), 2);

    let names: Vec<_> = events.by_ref().take(3).collect::<Vec<_>>().await;
    assert_eq!(names[0].event_name(), "enqueued");
    assert!(matches!(names[1], JobEvent::Retrying { attempts: 1, .. }));
    match &names[2] {
        JobEvent::Completed { job_id, attempts, result, .. } => {
            assert_eq!(job_id, &record.job_id);
            assert_eq!(*attempts, 2);
            assert_eq!(result, &Some(json!({ "reportType": "daily", "rows": 12 })));
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert!(matches!(
        queue.get_job(&record.job_id).await,
        Err(QueueError::JobNotFound(_))
    ));
}

/// A handler that always fails is attempted exactly max_attempts times and
/// the exhausted job is kept.
#[tokio::test]
async fn test_always_failing_follow_up_is_exhausted_and_retained() {
    let clock = Arc::new(ManualClock::default());
    let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
    let queue = JobQueue::deferred_tasks(backend).with_clock(clock.clone());
    let ops = Arc::new(FailingFollowUps { calls: AtomicU32::new(0) });
    let context: Arc<dyn FollowUpOperations> = ops.clone();
    let dispatcher =
        Dispatcher::<DeferredTask, _>::new(queue.clone(), context, DispatcherConfig::default()).unwrap();

    let record = queue
        .enqueue_job(&DeferredTask::SendFollowUp { follow_up_id: 77 }, EnqueueOptions::immediate())
        .await
        .unwrap();

    for _ in 0..10 {
        dispatcher.process_next().await.unwrap();
        clock.advance(Duration::from_secs(10));
    }

    let kept = queue.get_job(&record.job_id).await.unwrap();
    assert_eq!(kept.attempts_made, 3);
    assert_eq!(ops.calls.load(Ordering::SeqCst), 3);
    match kept.status {
        JobStatus::Exhausted { error, .. } => assert_eq!(error, "follow-up 77 bounced"),
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(queue.counts().await.unwrap().exhausted, 1);
    assert_eq!(queue.observability().metrics().jobs_failed(), 1);
    assert_eq!(queue.observability().metrics().jobs_retried(), 2);
}

/// Store wrapper that fails dequeues and acknowledgments with a connectivity
/// error a set number of times each
struct DroppingStore {
    inner: MemoryBackend,
    drops_left: AtomicU32,
    ack_drops_left: AtomicU32,
    dequeue_calls: AtomicU32,
}

impl DroppingStore {
    fn new(dequeue_drops: u32, ack_drops: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBackend::new(),
            drops_left: AtomicU32::new(dequeue_drops),
            ack_drops_left: AtomicU32::new(ack_drops),
            dequeue_calls: AtomicU32::new(0),
        })
    }
}

fn drop_once(counter: &AtomicU32) -> QueueResult<()> {
    let left = counter.load(Ordering::SeqCst);
    if left > 0 {
        counter.store(left - 1, Ordering::SeqCst);
        return Err(QueueError::Unavailable("connection reset".into()));
    }
    Ok(())
}

#[async_trait]
impl QueueBackend for DroppingStore {
    async fn enqueue(&self, message: JobMessage) -> QueueResult<JobRecord> {
        self.inner.enqueue(message).await
    }

    async fn dequeue(&self, queue: QueueName, lease: Duration) -> QueueResult<Option<LeasedJob>> {
        self.dequeue_calls.fetch_add(1, Ordering::SeqCst);
        drop_once(&self.drops_left)?;
        self.inner.dequeue(queue, lease).await
    }

    async fn ack_complete(&self, job_id: &JobId, lease_token: &LeaseToken, result: Option<Value>) -> QueueResult<()> {
        drop_once(&self.ack_drops_left)?;
        self.inner.ack_complete(job_id, lease_token, result).await
    }

    async fn ack_fail(
        &self,
        job_id: &JobId,
        lease_token: &LeaseToken,
        error: String,
        retryable: bool,
    ) -> QueueResult<FailOutcome> {
        drop_once(&self.ack_drops_left)?;
        self.inner.ack_fail(job_id, lease_token, error, retryable).await
    }

    async fn heartbeat_extend(&self, job_id: &JobId, lease_token: &LeaseToken, extra_time: Duration) -> QueueResult<()> {
        self.inner.heartbeat_extend(job_id, lease_token, extra_time).await
    }

    async fn add_repeatable(&self, registration: RepeatRegistration) -> QueueResult<()> {
        self.inner.add_repeatable(registration).await
    }

    async fn remove_repeatable(&self, queue: QueueName, key: &str) -> QueueResult<bool> {
        self.inner.remove_repeatable(queue, key).await
    }

    async fn repeatables(&self, queue: QueueName) -> QueueResult<Vec<RepeatRegistration>> {
        self.inner.repeatables(queue).await
    }

    async fn get_status(&self, job_id: &JobId) -> QueueResult<JobStatus> {
        self.inner.get_status(job_id).await
    }

    async fn get_record(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        self.inner.get_record(job_id).await
    }

    async fn job_counts(&self, queue: QueueName) -> QueueResult<JobCounts> {
        self.inner.job_counts(queue).await
    }

    async fn ping(&self) -> QueueResult<()> {
        self.inner.ping().await
    }

    async fn close(&self) -> QueueResult<()> {
        self.inner.close().await
    }
}

/// Transient store outages delay dispatch but never stall it
#[tokio::test]
async fn test_dispatcher_reconnects_after_store_outage() {
    let store = DroppingStore::new(4, 0);
    let queue = JobQueue::scheduled_reports(store.clone());
    let reports = FlakyReports::failing(0);
    let context: Arc<dyn ReportOperations> = reports.clone();
    let config = DispatcherConfig {
        poll_interval: Duration::from_millis(5),
        reconnect: ReconnectPolicy::new(Duration::from_millis(2), Duration::from_millis(20)),
        ..Default::default()
    };

    let mut events = queue.observability().event_stream();
    queue
        .enqueue_job(&ReportTask::Weekly, EnqueueOptions::immediate())
        .await
        .unwrap();

    let handle = Dispatcher::<ReportTask, _>::new(queue.clone(), context, config)
        .unwrap()
        .start();

    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.next().await {
            if let JobEvent::Completed { .. } = event {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(completed, Ok(true));

    handle.shutdown().await.unwrap();
    assert_eq!(reports.calls.load(Ordering::SeqCst), 1);
    assert!(store.dequeue_calls.load(Ordering::SeqCst) >= 5);
}

/// An outcome that hits a short store outage is recorded once the store is
/// back, so the job does not stay active.
#[tokio::test]
async fn test_outcome_is_recorded_after_store_outage() {
    let store = DroppingStore::new(0, 2);
    let queue = JobQueue::scheduled_reports(store.clone());
    let reports = FlakyReports::failing(0);
    let context: Arc<dyn ReportOperations> = reports.clone();
    let config = DispatcherConfig {
        poll_interval: Duration::from_millis(5),
        reconnect: ReconnectPolicy::new(Duration::from_millis(2), Duration::from_millis(20)),
        ..Default::default()
    };

    let mut events = queue.observability().event_stream();
    let record = queue
        .enqueue_job(&ReportTask::Weekly, EnqueueOptions::immediate())
        .await
        .unwrap();

    let reaper = LeaseReaper::with_interval(Arc::new(store.inner.clone()), Duration::from_millis(10));
    let handle = Dispatcher::<ReportTask, _>::new(queue.clone(), context, config)
        .unwrap()
        .start()
        .alongside(reaper.spawn());

    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.next().await {
            if let JobEvent::Completed { attempts, .. } = event {
                return Some(attempts);
            }
        }
        None
    })
    .await;
    assert_eq!(completed, Ok(Some(1)));

    handle.shutdown().await.unwrap();
    assert_eq!(reports.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.ack_drops_left.load(Ordering::SeqCst), 0);
    assert!(matches!(
        queue.get_job(&record.job_id).await,
        Err(QueueError::JobNotFound(_))
    ));
    assert_eq!(queue.counts().await.unwrap().active, 0);
}
