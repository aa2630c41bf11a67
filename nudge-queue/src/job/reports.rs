use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{unknown_type, Job};
use crate::{
    services::{ReportOperations, ReportRequest},
    JobError, QueueError, QueueName,
};

pub const GENERATE_DAILY_REPORT: &str = "generate_daily_report";
pub const GENERATE_WEEKLY_REPORT: &str = "generate_weekly_report";
pub const GENERATE_MONTHLY_REPORT: &str = "generate_monthly_report";
pub const GENERATE_CUSTOM_REPORT: &str = "generate_custom_report";

/// Periodic report kinds, each on a fixed UTC cron schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Daily,
    Weekly,
    Monthly,
}

impl ReportType {
    pub fn all() -> [ReportType; 3] {
        [ReportType::Daily, ReportType::Weekly, ReportType::Monthly]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Daily => "daily",
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
        }
    }

    /// sec min hour day-of-month month day-of-week
    pub fn cron_expression(&self) -> &'static str {
        match self {
            // 01:00 every day
            ReportType::Daily => "0 0 1 * * *",
            // 02:00 every Monday
            ReportType::Weekly => "0 0 2 * * Mon",
            // 03:00 on the 1st
            ReportType::Monthly => "0 0 3 1 * *",
        }
    }

    /// Logical name of the recurring registration
    pub fn schedule_key(&self) -> &'static str {
        match self {
            ReportType::Daily => "daily-report",
            ReportType::Weekly => "weekly-report",
            ReportType::Monthly => "monthly-report",
        }
    }

    pub fn task(&self) -> ReportTask {
        match self {
            ReportType::Daily => ReportTask::Daily,
            ReportType::Weekly => ReportTask::Weekly,
            ReportType::Monthly => ReportTask::Monthly,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ReportType::Daily),
            "weekly" => Ok(ReportType::Weekly),
            "monthly" => Ok(ReportType::Monthly),
            other => Err(QueueError::InvalidArgument(format!(
                "Invalid report type: {} (expected daily, weekly or monthly)",
                other
            ))),
        }
    }
}

/// Jobs of the scheduled-reports queue
#[derive(Debug, Clone, PartialEq)]
pub enum ReportTask {
    Daily,
    Weekly,
    Monthly,
    /// Free-form payload handed to the generator as is
    Custom(Value),
}

impl ReportTask {
    fn report_type(&self) -> Option<ReportType> {
        match self {
            Self::Daily => Some(ReportType::Daily),
            Self::Weekly => Some(ReportType::Weekly),
            Self::Monthly => Some(ReportType::Monthly),
            Self::Custom(_) => None,
        }
    }
}

#[async_trait]
impl Job for ReportTask {
    type Context = Arc<dyn ReportOperations>;

    const QUEUE: QueueName = QueueName::ScheduledReports;

    fn decode(job_type: &str, payload: &Value) -> Result<Self, JobError> {
        match job_type {
            GENERATE_DAILY_REPORT => Ok(Self::Daily),
            GENERATE_WEEKLY_REPORT => Ok(Self::Weekly),
            GENERATE_MONTHLY_REPORT => Ok(Self::Monthly),
            GENERATE_CUSTOM_REPORT => Ok(Self::Custom(payload.clone())),
            other => Err(unknown_type(Self::QUEUE, other)),
        }
    }

    fn job_type(&self) -> &'static str {
        match self {
            Self::Daily => GENERATE_DAILY_REPORT,
            Self::Weekly => GENERATE_WEEKLY_REPORT,
            Self::Monthly => GENERATE_MONTHLY_REPORT,
            Self::Custom(_) => GENERATE_CUSTOM_REPORT,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Custom(payload) => payload.clone(),
            periodic => json!({ "reportType": periodic.report_type().map(|t| t.as_str()) }),
        }
    }

    async fn execute(self, ctx: &Self::Context) -> Result<Option<Value>, JobError> {
        let request = match &self {
            Self::Custom(payload) => ReportRequest::from_payload(payload),
            periodic => ReportRequest::new(periodic.report_type().map(|t| t.as_str()).unwrap_or("custom")),
        };
        let result = ctx.generate_report(request).await?;
        Ok(Some(result))
    }
}
