pub mod deferred;
pub mod reports;

pub use deferred::DeferredTask;
pub use reports::{ReportTask, ReportType};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{JobError, QueueName};

/// The closed set of jobs one queue knows how to run.
///
/// Implementors are enums with one variant per type tag, so dispatch is an
/// exhaustive match. A tag outside the set decodes to
/// [`JobError::UnknownType`].
#[async_trait]
pub trait Job: Sized + Send + 'static {
    /// Collaborators the jobs call into
    type Context: Send + Sync + 'static;

    /// Queue these jobs live on
    const QUEUE: QueueName;

    /// Rebuild a job from its stored type tag and payload
    fn decode(job_type: &str, payload: &Value) -> Result<Self, JobError>;

    /// Type tag stored with the job
    fn job_type(&self) -> &'static str;

    /// Payload stored with the job
    fn payload(&self) -> Value;

    /// Run one attempt. The returned value is recorded as the job result.
    async fn execute(self, ctx: &Self::Context) -> Result<Option<Value>, JobError>;
}

pub(crate) fn unknown_type(queue: QueueName, job_type: &str) -> JobError {
    JobError::UnknownType(format!("{} (queue {})", job_type, queue))
}

/// A payload that does not match its tag can never succeed, so it is permanent
pub(crate) fn decode_payload<T: DeserializeOwned>(job_type: &str, payload: &Value) -> Result<T, JobError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| JobError::permanent(format!("invalid payload for {}: {}", job_type, e)))
}
