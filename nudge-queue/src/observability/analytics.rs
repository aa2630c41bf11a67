use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

use super::LiveMetrics;
use crate::{JobError, JobEvent, JobId, JobMessage, JobRecord, QueueName, RepeatRegistration};

const EVENT_CAPACITY: usize = 10_000;

/// Observation sink: every lifecycle change is logged, counted and broadcast
/// as a [`JobEvent`].
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<JobEvent>,
    metrics: Arc<LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            event_broadcaster,
            metrics: Arc::new(LiveMetrics::new()),
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.event_broadcaster.send(event);
    }

    pub fn record_enqueued(&self, record: &JobRecord, at: DateTime<Utc>) {
        let message = &record.message;
        self.metrics.increment_jobs_enqueued(&message.job_type);
        debug!(
            job_id = %record.job_id,
            queue = %message.queue,
            job_type = %message.job_type,
            run_at = %message.run_at,
            "job enqueued"
        );

        self.emit(JobEvent::Enqueued {
            job_id: record.job_id.clone(),
            queue: message.queue,
            job_type: message.job_type.clone(),
            run_at: message.run_at,
            at,
        });
    }

    pub fn record_completed(
        &self,
        job_id: &JobId,
        message: &JobMessage,
        attempts: u32,
        result: Option<Value>,
        at: DateTime<Utc>,
    ) {
        self.metrics.increment_jobs_completed(&message.job_type);
        info!(
            job_id = %job_id,
            queue = %message.queue,
            job_type = %message.job_type,
            attempts,
            result = ?result,
            "job completed"
        );

        self.emit(JobEvent::Completed {
            job_id: job_id.clone(),
            queue: message.queue,
            job_type: message.job_type.clone(),
            attempts,
            result,
            at,
        });
    }

    pub fn record_retrying(
        &self,
        job_id: &JobId,
        message: &JobMessage,
        attempts: u32,
        retry_at: DateTime<Utc>,
        error: &JobError,
        at: DateTime<Utc>,
    ) {
        self.metrics.increment_jobs_retried(&message.job_type);
        let error_kind = error.kind();
        let error = error.describe();
        warn!(
            job_id = %job_id,
            queue = %message.queue,
            job_type = %message.job_type,
            payload = %message.payload,
            attempts,
            retry_at = %retry_at,
            kind = error_kind.code(),
            error = %error,
            "job attempt failed, retry scheduled"
        );

        self.emit(JobEvent::Retrying {
            job_id: job_id.clone(),
            queue: message.queue,
            job_type: message.job_type.clone(),
            attempts,
            retry_at,
            error,
            error_kind,
            at,
        });
    }

    pub fn record_failed(
        &self,
        job_id: &JobId,
        message: &JobMessage,
        attempts: u32,
        error: &JobError,
        at: DateTime<Utc>,
    ) {
        self.metrics.increment_jobs_failed(&message.job_type);
        let error_kind = error.kind();
        let error = error.describe();
        error!(
            job_id = %job_id,
            queue = %message.queue,
            job_type = %message.job_type,
            payload = %message.payload,
            attempts,
            kind = error_kind.code(),
            error = %error,
            "job failed"
        );

        self.emit(JobEvent::Failed {
            job_id: job_id.clone(),
            queue: message.queue,
            job_type: message.job_type.clone(),
            payload: message.payload.clone(),
            attempts,
            error,
            error_kind,
            at,
        });
    }

    pub fn record_recurring_registered(&self, registration: &RepeatRegistration, at: DateTime<Utc>) {
        info!(
            key = %registration.key,
            queue = %registration.queue,
            job_type = %registration.job_type,
            schedule = %registration.recurrence.describe(),
            next_run_at = %registration.next_run_at,
            "recurring job registered"
        );

        self.emit(JobEvent::RecurringRegistered {
            key: registration.key.clone(),
            queue: registration.queue,
            job_type: registration.job_type.clone(),
            next_run_at: registration.next_run_at,
            at,
        });
    }

    pub fn record_recurring_removed(&self, queue: QueueName, key: &str, at: DateTime<Utc>) {
        info!(key, queue = %queue, "recurring job removed");

        self.emit(JobEvent::RecurringRemoved {
            key: key.to_string(),
            queue,
            at,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_broadcaster.subscribe()
    }

    /// Events from now on. A subscriber that falls behind skips what it missed.
    pub fn event_stream(&self) -> BoxStream<'static, JobEvent> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }

    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobPolicy;
    use nudge_core::ErrorKind;
    use serde_json::json;

    fn report_record() -> JobRecord {
        let message = JobMessage::new(
            QueueName::ScheduledReports,
            "generate_weekly_report",
            json!({ "reportType": "weekly" }),
            JobPolicy::scheduled_reports(),
        );
        JobRecord::new(JobId::new(), message, Utc::now())
    }

    #[tokio::test]
    async fn events_reach_stream_subscribers() {
        let observability = ObservabilityLayer::new();
        let mut events = observability.event_stream();
        let record = report_record();

        let at = Utc::now();
        observability.record_enqueued(&record, at);
        observability.record_failed(
            &record.job_id,
            &record.message,
            2,
            &JobError::retryable("smtp down"),
            at,
        );

        let first = events.next().await.unwrap();
        assert_eq!(first.event_name(), "enqueued");

        match events.next().await.unwrap() {
            JobEvent::Failed { payload, attempts, error, error_kind, at: seen, .. } => {
                assert_eq!(payload, json!({ "reportType": "weekly" }));
                assert_eq!(attempts, 2);
                assert_eq!(error, "smtp down");
                assert_eq!(error_kind, ErrorKind::Generic);
                assert_eq!(seen, at);
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert_eq!(observability.metrics().jobs_failed(), 1);
    }

    #[test]
    fn recording_without_subscribers_is_harmless() {
        let observability = ObservabilityLayer::new();
        let record = report_record();
        observability.record_completed(&record.job_id, &record.message, 1, None, Utc::now());
        assert_eq!(observability.metrics().jobs_completed(), 1);
    }
}
