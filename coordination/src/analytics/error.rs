//! Structured error types for the analytics module.

/// Errors talking to the metrics aggregator task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyticsError {
    /// The aggregator task has stopped; events can no longer be recorded.
    #[error("Metrics aggregator is not running")]
    AggregatorStopped,

    /// The aggregator dropped a snapshot request without answering.
    #[error("Metrics aggregator dropped the snapshot request")]
    SnapshotDropped,
}

/// Result type alias for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
