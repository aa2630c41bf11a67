use std::time::Duration;

/// Linear backoff for store reconnects: attempt `n` waits `min(n * step, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub step: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(step: Duration, max_delay: Duration) -> Self {
        Self { step, max_delay }
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(50),
            max_delay: Duration::from_millis(2000),
        }
    }
}
