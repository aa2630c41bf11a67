use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::policy::{duration_millis, JobPolicy};
use crate::{QueueError, QueueResult};

/// Delay until `at`, never negative: a time in the past means "as soon as possible".
pub fn clamp_delay(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

/// Per-call options for a one-shot enqueue
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub delay: Option<Duration>,
    /// Overrides the queue's default policy for this job only
    pub policy: Option<JobPolicy>,
}

impl EnqueueOptions {
    pub fn immediate() -> Self {
        Self::default()
    }

    pub fn delayed(delay: Duration) -> Self {
        Self { delay: Some(delay), policy: None }
    }

    pub fn with_policy(mut self, policy: JobPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// Timer of a repeating registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recurrence {
    /// Fires on every multiple of the interval (aligned to the Unix epoch)
    Every(#[serde(with = "duration_millis")] Duration),
    /// Six-field cron expression (`sec min hour day-of-month month day-of-week`), UTC
    Cron(String),
}

impl Recurrence {
    pub fn every(interval: Duration) -> QueueResult<Self> {
        if interval.as_millis() == 0 {
            return Err(QueueError::InvalidSchedule {
                expression: format!("{:?}", interval),
                reason: "interval must be positive".to_string(),
            });
        }
        Ok(Self::Every(interval))
    }

    pub fn every_minutes(minutes: u32) -> QueueResult<Self> {
        Self::every(Duration::from_millis(u64::from(minutes) * 60_000))
    }

    pub fn cron(expression: impl Into<String>) -> QueueResult<Self> {
        let expression = expression.into();
        parse_cron(&expression)?;
        Ok(Self::Cron(expression))
    }

    /// First firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> QueueResult<Option<DateTime<Utc>>> {
        match self {
            Self::Every(interval) => {
                let every_ms = interval.as_millis().max(1) as i64;
                let slot = after.timestamp_millis().div_euclid(every_ms) + 1;
                Ok(Utc.timestamp_millis_opt(slot.saturating_mul(every_ms)).single())
            }
            Self::Cron(expression) => Ok(parse_cron(expression)?.after(&after).next()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Every(interval) => format!("every {}ms", interval.as_millis()),
            Self::Cron(expression) => format!("cron '{}'", expression),
        }
    }
}

fn parse_cron(expression: &str) -> QueueResult<cron::Schedule> {
    cron::Schedule::from_str(expression).map_err(|e| QueueError::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}
