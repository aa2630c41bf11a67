//! Collaborator interfaces the dispatcher calls into. The business logic
//! behind them (follow-up delivery, report generation) lives elsewhere.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Follow-up delivery. Both operations must be safe to retry.
#[async_trait]
pub trait FollowUpOperations: Send + Sync {
    async fn send_follow_up(&self, follow_up_id: i64) -> anyhow::Result<()>;

    async fn process_pending_follow_ups(&self) -> anyhow::Result<()>;
}

/// Report generation
#[async_trait]
pub trait ReportOperations: Send + Sync {
    /// Returns whatever the generator wants recorded as the job result
    async fn generate_report(&self, request: ReportRequest) -> anyhow::Result<Value>;
}

/// `{ reportType, ...extra }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub report_type: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReportRequest {
    pub fn new(report_type: impl Into<String>) -> Self {
        Self {
            report_type: report_type.into(),
            extra: Map::new(),
        }
    }

    /// Build a request from a free-form custom payload. A payload without a
    /// `reportType` is reported as `custom`.
    pub fn from_payload(payload: &Value) -> Self {
        let mut extra = payload.as_object().cloned().unwrap_or_default();
        let report_type = match extra.remove("reportType") {
            Some(Value::String(report_type)) => report_type,
            _ => "custom".to_string(),
        };
        Self { report_type, extra }
    }
}
