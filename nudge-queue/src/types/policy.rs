use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffKind {
    /// Same delay before every retry
    Fixed,
    /// `base * 2^(attempts_made - 1)`
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    pub kind: BackoffKind,
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
}

impl Backoff {
    pub fn fixed(base_delay: Duration) -> Self {
        Self { kind: BackoffKind::Fixed, base_delay }
    }

    pub fn exponential(base_delay: Duration) -> Self {
        Self { kind: BackoffKind::Exponential, base_delay }
    }

    /// Delay before the next attempt, given how many attempts were already made.
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::Exponential => {
                let exponent = attempts_made.saturating_sub(1).min(31);
                self.base_delay.saturating_mul(1u32 << exponent)
            }
        }
    }
}

/// Default execution policy of a queue, copied onto every job it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Prune the job from the store once it completes
    pub remove_on_complete: bool,
    /// Prune the job from the store once it is exhausted
    pub remove_on_fail: bool,
}

impl JobPolicy {
    /// Follow-up work: 3 attempts, exponential backoff from 1s.
    pub fn deferred_tasks() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::exponential(Duration::from_millis(1000)),
            remove_on_complete: true,
            remove_on_fail: false,
        }
    }

    /// Reports: 2 attempts, fixed 5s backoff.
    pub fn scheduled_reports() -> Self {
        Self {
            max_attempts: 2,
            backoff: Backoff::fixed(Duration::from_millis(5000)),
            remove_on_complete: true,
            remove_on_fail: false,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn retain_on_complete(mut self, retain: bool) -> Self {
        self.remove_on_complete = !retain;
        self
    }

    pub fn retain_on_fail(mut self, retain: bool) -> Self {
        self.remove_on_fail = !retain;
        self
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
