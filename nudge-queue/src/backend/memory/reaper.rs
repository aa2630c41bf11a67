use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{
    backend::memory::storage::{to_chrono, MemoryBackend},
    dispatcher::WorkerHandle,
    JobId, QueueResult,
};

const LEASE_EXPIRED: &str = "Lease expired";

/// Reclaims jobs whose dispatcher stopped heartbeating (stalled jobs)
pub struct LeaseReaper {
    backend: Arc<MemoryBackend>,
    interval: Duration,
}

impl LeaseReaper {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self {
            backend,
            interval: Duration::from_secs(30),
        }
    }

    pub fn with_interval(backend: Arc<MemoryBackend>, interval: Duration) -> Self {
        Self { backend, interval }
    }

    /// Run the reaper in the background until the returned handle is shut
    /// down. Usually tied to a dispatcher with [`WorkerHandle::alongside`].
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let join_handle = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            info!("Starting lease reaper with interval: {:?}", self.interval);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                }

                match self.reap_expired_leases() {
                    Ok(reclaimed) if reclaimed > 0 => info!("Reclaimed {} expired leases", reclaimed),
                    Ok(_) => debug!("No expired leases found"),
                    Err(e) => warn!("Error during lease reaping: {}", e),
                }
            }

            info!("Lease reaper stopped");
            Ok(())
        });

        WorkerHandle::new(shutdown_tx, join_handle)
    }

    /// Run one reaper cycle. An expired attempt still counts against the
    /// job's budget: with attempts left the job is retried after the
    /// policy's backoff, otherwise it is exhausted.
    pub fn reap_expired_leases(&self) -> QueueResult<usize> {
        let now = self.backend.clock.now();
        let mut guard = self.backend.state.write();
        let state = &mut *guard;

        let expired: Vec<JobId> = state
            .jobs
            .values()
            .filter(|record| record.lease_expired(now))
            .map(|record| record.job_id.clone())
            .collect();

        for job_id in &expired {
            let Some(record) = state.jobs.get_mut(job_id) else {
                continue;
            };
            debug!(job_id = %job_id, attempt = record.attempts_made, "reclaiming expired lease");

            if record.attempts_remaining() == 0 {
                record.exhaust(LEASE_EXPIRED.to_string(), now);
                if record.message.policy.remove_on_fail {
                    state.jobs.remove(job_id);
                }
            } else {
                let delay = record.message.policy.backoff.delay_for(record.attempts_made);
                let retry_at = now + to_chrono(delay)?;
                record.schedule_retry(retry_at, LEASE_EXPIRED.to_string(), now);
                let queue = record.message.queue;
                state.queues.entry(queue).or_default().push_back(job_id.clone());
            }
        }

        Ok(expired.len())
    }
}

impl MemoryBackend {
    /// Run one reaper tick (test helper)
    pub fn run_reaper_tick(&self) -> QueueResult<usize> {
        LeaseReaper::new(Arc::new(self.clone())).reap_expired_leases()
    }
}
