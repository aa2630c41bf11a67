//! # nudge-queue: durable background jobs
//!
//! Two named queues (deferred tasks and scheduled reports), each with a
//! default retry policy, a lease-based dispatcher per queue, and a scheduler
//! facade for one-shot, interval and cron work.
//!
//! - **Store contract**: [`QueueBackend`] is the single source of truth for
//!   job state; [`MemoryBackend`] implements it in process.
//! - **Typed dispatch**: each queue runs a closed [`Job`] enum
//!   ([`DeferredTask`], [`ReportTask`]); unknown tags fail without retry.
//! - **Leases**: a running job's lease is renewed by heartbeat, stalled
//!   jobs are reclaimed by the [`LeaseReaper`].
//! - **Recurring jobs** are keyed by logical name, so re-registering at
//!   every start never duplicates them.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nudge_queue::prelude::*;
//!
//! # async fn run(follow_ups: Arc<dyn FollowUpOperations>) -> QueueResult<()> {
//! let store = Arc::new(MemoryBackend::new());
//! let deferred = JobQueue::deferred_tasks(store.clone());
//! let reports = JobQueue::scheduled_reports(store.clone());
//!
//! let scheduler = Scheduler::new(deferred.clone(), reports);
//! scheduler.initialize_scheduled_jobs().await?;
//!
//! let worker = Dispatcher::<DeferredTask, _>::new(deferred, follow_ups, DispatcherConfig::default())?
//!     .start()
//!     .alongside(LeaseReaper::new(store).spawn());
//! // ...
//! worker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod observability;
pub mod queue;
pub mod reconnect;
pub mod scheduler;
pub mod services;
pub mod types;

pub use backend::QueueBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{Dispatcher, DispatcherConfig, WorkerHandle};
pub use error::{JobError, QueueError, QueueResult};
pub use job::{DeferredTask, Job, ReportTask, ReportType};
pub use observability::{LiveMetrics, ObservabilityLayer};
pub use queue::JobQueue;
pub use reconnect::ReconnectPolicy;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use services::{FollowUpOperations, ReportOperations, ReportRequest};
pub use types::{
    clamp_delay, Backoff, BackoffKind, EnqueueOptions, FailOutcome, JobCounts, JobEvent, JobId,
    JobMessage, JobPolicy, JobRecord, JobStatus, LeasedJob, QueueName, Recurrence,
    RepeatRegistration,
};

#[cfg(feature = "memory")]
pub use backend::memory::{LeaseReaper, MemoryBackend};

#[cfg(feature = "tracing-basic")]
pub use observability::init_tracing;

pub mod prelude {
    pub use crate::{
        Dispatcher, DispatcherConfig, JobQueue, QueueBackend, Scheduler, SchedulerConfig,
        WorkerHandle,
    };

    pub use crate::{
        DeferredTask, EnqueueOptions, Job, JobError, JobId, JobPolicy, JobStatus, QueueError,
        QueueName, QueueResult, Recurrence, ReportTask, ReportType,
    };

    pub use crate::{FollowUpOperations, ReportOperations, ReportRequest};

    pub use crate::{JobEvent, LiveMetrics, ObservabilityLayer};

    #[cfg(feature = "memory")]
    pub use crate::{LeaseReaper, MemoryBackend};

    pub use async_trait::async_trait;
}
