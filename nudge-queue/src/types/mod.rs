pub mod ids;
pub mod queue;
pub mod policy;
pub mod schedule;
pub mod message;
pub mod record;
pub mod repeat;
pub mod events;

pub use ids::{JobId, LeaseToken};
pub use queue::QueueName;
pub use policy::{Backoff, BackoffKind, JobPolicy};
pub use schedule::{clamp_delay, EnqueueOptions, Recurrence};
pub use message::JobMessage;
pub use record::{FailOutcome, JobCounts, JobRecord, JobStatus, LeasedJob};
pub use repeat::RepeatRegistration;
pub use events::JobEvent;
