use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Live counters for queue activity
#[derive(Default)]
pub struct LiveMetrics {
    jobs_enqueued: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_retried: AtomicU64,

    // Per-job-type metrics
    job_type_metrics: RwLock<HashMap<String, JobTypeMetrics>>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_jobs_enqueued(&self, job_type: &str) {
        self.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
        self.update_job_type(job_type, |m| m.enqueued += 1);
    }

    pub fn increment_jobs_completed(&self, job_type: &str) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.update_job_type(job_type, |m| m.completed += 1);
    }

    pub fn increment_jobs_failed(&self, job_type: &str) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        self.update_job_type(job_type, |m| m.failed += 1);
    }

    pub fn increment_jobs_retried(&self, job_type: &str) {
        self.jobs_retried.fetch_add(1, Ordering::Relaxed);
        self.update_job_type(job_type, |m| m.retried += 1);
    }

    fn update_job_type(&self, job_type: &str, update: impl FnOnce(&mut JobTypeMetrics)) {
        let mut metrics = self.job_type_metrics.write();
        update(metrics.entry(job_type.to_string()).or_default());
    }

    pub fn jobs_enqueued(&self) -> u64 {
        self.jobs_enqueued.load(Ordering::Relaxed)
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    pub fn jobs_retried(&self) -> u64 {
        self.jobs_retried.load(Ordering::Relaxed)
    }

    pub fn job_type_metrics(&self, job_type: &str) -> Option<JobTypeMetrics> {
        self.job_type_metrics.read().get(job_type).cloned()
    }

    /// Copy of every counter, stamped with `at`
    pub fn snapshot(&self, at: DateTime<Utc>) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: at,
            global: GlobalMetrics {
                jobs_enqueued: self.jobs_enqueued(),
                jobs_completed: self.jobs_completed(),
                jobs_failed: self.jobs_failed(),
                jobs_retried: self.jobs_retried(),
            },
            job_types: self.job_type_metrics.read().clone(),
        }
    }
}

/// Metrics for a specific job type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobTypeMetrics {
    pub enqueued: u64,
    pub completed: u64,
    /// Jobs that ran out of attempts
    pub failed: u64,
    /// Failed attempts followed by another one
    pub retried: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub global: GlobalMetrics,
    pub job_types: HashMap<String, JobTypeMetrics>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalMetrics {
    pub jobs_enqueued: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_retried: u64,
}

impl GlobalMetrics {
    /// Completed share of finished jobs, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total_processed = self.jobs_completed + self.jobs_failed;
        if total_processed == 0 {
            100.0
        } else {
            (self.jobs_completed as f64 / total_processed as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_metrics() {
        let metrics = LiveMetrics::new();

        metrics.increment_jobs_enqueued("send_follow_up");
        metrics.increment_jobs_retried("send_follow_up");
        metrics.increment_jobs_completed("send_follow_up");

        assert_eq!(metrics.jobs_enqueued(), 1);
        assert_eq!(metrics.jobs_completed(), 1);

        let job_metrics = metrics.job_type_metrics("send_follow_up").unwrap();
        assert_eq!(job_metrics.retried, 1);
        assert_eq!(job_metrics.completed, 1);
        assert!(metrics.job_type_metrics("generate_daily_report").is_none());
    }

    #[test]
    fn test_global_metrics() {
        let global = GlobalMetrics {
            jobs_enqueued: 100,
            jobs_completed: 80,
            jobs_failed: 10,
            jobs_retried: 5,
        };

        assert_eq!(global.success_rate(), 88.88888888888889); // 80/(80+10) * 100
    }

    #[test]
    fn snapshot_copies_counters() {
        let metrics = LiveMetrics::new();
        metrics.increment_jobs_enqueued("generate_daily_report");
        metrics.increment_jobs_failed("generate_daily_report");

        let at = Utc::now();
        let snapshot = metrics.snapshot(at);
        assert_eq!(snapshot.timestamp, at);
        assert_eq!(snapshot.global.jobs_failed, 1);
        assert_eq!(snapshot.global.success_rate(), 0.0);
        assert_eq!(snapshot.job_types["generate_daily_report"].enqueued, 1);
    }
}
