use chrono::{DateTime, Utc};
use nudge_core::NudgeConfigSnapshot;
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    backend::QueueBackend,
    job::{Job, ReportTask, ReportType},
    clamp_delay, DeferredTask, EnqueueOptions, JobQueue, JobRecord, QueueResult, Recurrence,
    RepeatRegistration,
};

/// Logical name of the periodic follow-up sweep
pub const FOLLOW_UP_PROCESSING_KEY: &str = "process-pending-follow-ups";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period of the pending follow-up sweep
    pub follow_up_interval_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            follow_up_interval_minutes: 15,
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &NudgeConfigSnapshot) -> Self {
        Self {
            follow_up_interval_minutes: config
                .get_u32("scheduler.follow_up_interval_minutes")
                .unwrap_or(Self::default().follow_up_interval_minutes),
        }
    }
}

/// Scheduling operations on top of the two queues, plus idempotent
/// (re)registration of every recurring job at process start.
pub struct Scheduler<B: QueueBackend + ?Sized = dyn QueueBackend> {
    deferred: JobQueue<B>,
    reports: JobQueue<B>,
    config: SchedulerConfig,
}

impl<B: QueueBackend + ?Sized> Scheduler<B> {
    pub fn new(deferred: JobQueue<B>, reports: JobQueue<B>) -> Self {
        Self {
            deferred,
            reports,
            config: SchedulerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Send follow-up `follow_up_id` at `at`. A time in the past runs as soon
    /// as possible.
    #[instrument(skip(self))]
    pub async fn schedule_follow_up(&self, follow_up_id: i64, at: DateTime<Utc>) -> QueueResult<JobRecord> {
        let delay = clamp_delay(at, self.deferred.clock().now());
        let task = DeferredTask::SendFollowUp { follow_up_id };

        let record = self
            .deferred
            .enqueue_job(&task, EnqueueOptions::delayed(delay))
            .await?;
        info!(job_id = %record.job_id, delay_ms = delay.as_millis() as u64, "Follow-up scheduled");
        Ok(record)
    }

    /// Sweep pending follow-ups every `interval_minutes`
    #[instrument(skip(self))]
    pub async fn schedule_follow_up_processing(&self, interval_minutes: u32) -> QueueResult<RepeatRegistration> {
        let task = DeferredTask::ProcessPendingFollowUps;
        self.deferred
            .schedule_repeating(
                FOLLOW_UP_PROCESSING_KEY,
                task.job_type(),
                task.payload(),
                Recurrence::every_minutes(interval_minutes)?,
            )
            .await
    }

    /// Register the cron schedule of `report_type` (`daily`, `weekly` or
    /// `monthly`). Anything else fails before the store is touched.
    #[instrument(skip(self))]
    pub async fn schedule_report(&self, report_type: &str) -> QueueResult<RepeatRegistration> {
        let report_type: ReportType = report_type.parse()?;
        let task = report_type.task();

        self.reports
            .schedule_repeating(
                report_type.schedule_key(),
                task.job_type(),
                task.payload(),
                Recurrence::cron(report_type.cron_expression())?,
            )
            .await
    }

    /// Generate a report with a free-form payload right away
    #[instrument(skip(self, payload))]
    pub async fn schedule_custom_report(&self, payload: Value) -> QueueResult<JobRecord> {
        self.reports
            .enqueue_job(&ReportTask::Custom(payload), EnqueueOptions::immediate())
            .await
    }

    /// Deregister a recurring job by logical name, on whichever queue has it
    pub async fn cancel_recurring(&self, name: &str) -> QueueResult<bool> {
        let removed_deferred = self.deferred.remove_repeating(name).await?;
        let removed_report = self.reports.remove_repeating(name).await?;
        Ok(removed_deferred || removed_report)
    }

    /// Every recurring registration across both queues
    pub async fn recurring(&self) -> QueueResult<Vec<RepeatRegistration>> {
        let mut registrations = self.deferred.repeating().await?;
        registrations.extend(self.reports.repeating().await?);
        Ok(registrations)
    }

    /// Names managed by [`Scheduler::initialize_scheduled_jobs`]
    pub fn managed_names() -> Vec<&'static str> {
        let mut names = vec![FOLLOW_UP_PROCESSING_KEY];
        names.extend(ReportType::all().iter().map(|t| t.schedule_key()));
        names
    }

    /// Remove then re-add every managed recurring job. Safe to run on every
    /// start: each name ends up with exactly one registration.
    #[instrument(skip(self))]
    pub async fn initialize_scheduled_jobs(&self) -> QueueResult<Vec<RepeatRegistration>> {
        for name in Self::managed_names() {
            self.cancel_recurring(name).await?;
        }

        let mut registrations = vec![
            self.schedule_follow_up_processing(self.config.follow_up_interval_minutes)
                .await?,
        ];
        for report_type in ReportType::all() {
            registrations.push(self.schedule_report(report_type.as_str()).await?);
        }

        info!(count = registrations.len(), "Scheduled jobs initialized");
        Ok(registrations)
    }

    pub fn deferred_queue(&self) -> &JobQueue<B> {
        &self.deferred
    }

    pub fn report_queue(&self) -> &JobQueue<B> {
        &self.reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::clock::{Clock, ManualClock};
    use crate::{JobStatus, QueueError};
    use nudge_core::NudgeConfig;
    use serde_json::json;
    use std::sync::Arc;

    fn scheduler() -> (Scheduler<MemoryBackend>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
        let deferred = JobQueue::deferred_tasks(backend.clone()).with_clock(clock.clone());
        let reports = JobQueue::scheduled_reports(backend).with_clock(clock.clone());
        (Scheduler::new(deferred, reports), clock)
    }

    #[tokio::test]
    async fn past_follow_up_runs_immediately() {
        let (scheduler, clock) = scheduler();
        let yesterday = clock.now() - chrono::Duration::days(1);

        let record = scheduler.schedule_follow_up(4, yesterday).await.unwrap();
        assert_eq!(record.message.run_at, clock.now());
        assert_eq!(record.status, JobStatus::Waiting);
        assert_eq!(record.message.payload, json!({ "followUpId": 4 }));
    }

    #[tokio::test]
    async fn future_follow_up_is_delayed() {
        let (scheduler, clock) = scheduler();
        let at = clock.now() + chrono::Duration::minutes(30);

        let record = scheduler.schedule_follow_up(4, at).await.unwrap();
        assert_eq!(record.status, JobStatus::Delayed { run_at: at });
    }

    #[tokio::test]
    async fn unknown_report_type_never_reaches_the_store() {
        let (scheduler, _) = scheduler();

        let err = scheduler.schedule_report("hourly").await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
        assert!(scheduler.recurring().await.unwrap().is_empty());
        assert_eq!(scheduler.report_queue().counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn initialization_is_idempotent() {
        let (scheduler, _) = scheduler();

        scheduler.initialize_scheduled_jobs().await.unwrap();
        scheduler.initialize_scheduled_jobs().await.unwrap();

        let recurring = scheduler.recurring().await.unwrap();
        let mut keys: Vec<_> = recurring.iter().map(|r| r.key.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["daily-report", "monthly-report", "process-pending-follow-ups", "weekly-report"]
        );
    }

    #[tokio::test]
    async fn cancel_recurring_finds_either_queue() {
        let (scheduler, _) = scheduler();
        scheduler.initialize_scheduled_jobs().await.unwrap();

        assert!(scheduler.cancel_recurring("weekly-report").await.unwrap());
        assert!(scheduler.cancel_recurring(FOLLOW_UP_PROCESSING_KEY).await.unwrap());
        assert!(!scheduler.cancel_recurring("weekly-report").await.unwrap());
        assert_eq!(scheduler.recurring().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn custom_report_is_enqueued_now() {
        let (scheduler, _) = scheduler();
        let record = scheduler
            .schedule_custom_report(json!({ "reportType": "cohort" }))
            .await
            .unwrap();
        assert_eq!(record.message.job_type, "generate_custom_report");
        assert_eq!(record.status, JobStatus::Waiting);
    }

    #[test]
    fn interval_comes_from_config() {
        let mut config = NudgeConfig::new();
        config.set("scheduler.follow_up_interval_minutes", "5");
        assert_eq!(
            SchedulerConfig::from_config(&config.snapshot()).follow_up_interval_minutes,
            5
        );
        assert_eq!(
            SchedulerConfig::from_config(&NudgeConfig::new().snapshot()),
            SchedulerConfig::default()
        );
    }
}
