pub mod analytics;
pub mod metrics;

#[cfg(feature = "tracing-basic")]
pub mod tracing;

pub use analytics::ObservabilityLayer;
pub use metrics::{GlobalMetrics, JobTypeMetrics, LiveMetrics, MetricsSnapshot};

#[cfg(feature = "tracing-basic")]
pub use self::tracing::init_tracing;
