use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode_payload, unknown_type, Job};
use crate::{services::FollowUpOperations, JobError, QueueName};

pub const SEND_FOLLOW_UP: &str = "send_follow_up";
pub const PROCESS_PENDING_FOLLOW_UPS: &str = "process_pending_follow_ups";

/// Jobs of the deferred-tasks queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    SendFollowUp { follow_up_id: i64 },
    ProcessPendingFollowUps,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowUpPayload {
    follow_up_id: i64,
}

#[async_trait]
impl Job for DeferredTask {
    type Context = Arc<dyn FollowUpOperations>;

    const QUEUE: QueueName = QueueName::DeferredTasks;

    fn decode(job_type: &str, payload: &Value) -> Result<Self, JobError> {
        match job_type {
            SEND_FOLLOW_UP => {
                let FollowUpPayload { follow_up_id } = decode_payload(job_type, payload)?;
                Ok(Self::SendFollowUp { follow_up_id })
            }
            PROCESS_PENDING_FOLLOW_UPS => Ok(Self::ProcessPendingFollowUps),
            other => Err(unknown_type(Self::QUEUE, other)),
        }
    }

    fn job_type(&self) -> &'static str {
        match self {
            Self::SendFollowUp { .. } => SEND_FOLLOW_UP,
            Self::ProcessPendingFollowUps => PROCESS_PENDING_FOLLOW_UPS,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::SendFollowUp { follow_up_id } => json!({ "followUpId": follow_up_id }),
            Self::ProcessPendingFollowUps => json!({}),
        }
    }

    async fn execute(self, ctx: &Self::Context) -> Result<Option<Value>, JobError> {
        match self {
            Self::SendFollowUp { follow_up_id } => ctx.send_follow_up(follow_up_id).await?,
            Self::ProcessPendingFollowUps => ctx.process_pending_follow_ups().await?,
        }
        Ok(None)
    }
}
