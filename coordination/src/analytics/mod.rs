//! Process-wide pipeline metrics, fed by message passing.

pub mod error;
pub mod metrics;

pub use error::{AnalyticsError, AnalyticsResult};
pub use metrics::{
    AgentMetrics, MetricsAggregator, MetricsEvent, MetricsHandle, MetricsSnapshot, TicketMetrics,
};
