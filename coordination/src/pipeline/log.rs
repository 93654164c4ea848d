//! Step records and the per-ticket processing log.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeResult;
use crate::resilience::ResultSource;
use crate::router::ClassificationResult;
use crate::ticket::AgentName;

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Primary path produced the result.
    Success,
    /// The component's backend failed and its fallback answered.
    Fallback,
    /// The step raised; the error is in the payload.
    Failed,
}

impl StepOutcome {
    /// Outcome for a component result tagged with its source.
    pub fn from_source(source: ResultSource) -> Self {
        match source {
            ResultSource::Primary => Self::Success,
            ResultSource::Fallback => Self::Fallback,
        }
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Fallback => write!(f, "fallback"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What a step produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StepPayload {
    Classification(ClassificationResult),
    Knowledge(KnowledgeResult),
    Agent(serde_json::Value),
    Error { message: String },
}

impl StepPayload {
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Classification(c) => Some(c),
            _ => None,
        }
    }
}

/// One agent invocation. Immutable once appended to a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub agent: AgentName,
    pub duration_secs: f64,
    pub outcome: StepOutcome,
    pub payload: StepPayload,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(
        agent: AgentName,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        outcome: StepOutcome,
        payload: StepPayload,
    ) -> Self {
        let finished_at = started_at
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            agent,
            duration_secs: elapsed.as_secs_f64(),
            outcome,
            payload,
            started_at,
            finished_at,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == StepOutcome::Failed
    }

    pub fn summary(&self) -> StepSummary {
        StepSummary {
            agent: self.agent,
            outcome: self.outcome,
            duration_secs: self.duration_secs,
        }
    }
}

/// Compact view of a finished step, handed to later steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub agent: AgentName,
    pub outcome: StepOutcome,
    pub duration_secs: f64,
}

/// Lifecycle of a ticket's processing log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Append-only audit record of one ticket's pipeline run.
///
/// Steps can only be appended while the status is `Processing`. Closing the
/// log (`complete` or `fail`) recomputes `total_duration_secs` as the sum of
/// step durations and freezes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLog {
    ticket_id: String,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
    steps: Vec<StepRecord>,
    total_duration_secs: f64,
    status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    resolution_target_secs: f64,
    within_target: bool,
}

impl ProcessingLog {
    pub fn new(ticket_id: impl Into<String>, resolution_target: Duration) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            total_duration_secs: 0.0,
            status: TicketStatus::Processing,
            error: None,
            resolution_target_secs: resolution_target.as_secs_f64(),
            within_target: false,
        }
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.total_duration_secs
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn resolution_target_secs(&self) -> f64 {
        self.resolution_target_secs
    }

    /// Whether the total stayed within the resolution target. Only
    /// meaningful once the log is closed.
    pub fn within_target(&self) -> bool {
        self.within_target
    }

    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Processing
    }

    /// Sum of step durations so far.
    pub fn elapsed_secs(&self) -> f64 {
        self.steps.iter().map(|s| s.duration_secs).sum()
    }

    pub fn summaries(&self) -> Vec<StepSummary> {
        self.steps.iter().map(StepRecord::summary).collect()
    }

    /// Append a step. Returns `false` (and drops the record) once the log
    /// is closed.
    pub fn append(&mut self, record: StepRecord) -> bool {
        if !self.is_open() {
            return false;
        }
        self.steps.push(record);
        self.total_duration_secs = self.elapsed_secs();
        true
    }

    /// Close as completed. No-op if already closed.
    pub fn complete(&mut self) {
        if self.is_open() {
            self.close(TicketStatus::Completed);
        }
    }

    /// Close as failed with `error`. No-op if already closed.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_open() {
            self.error = Some(error.into());
            self.close(TicketStatus::Failed);
        }
    }

    fn close(&mut self, status: TicketStatus) {
        self.total_duration_secs = self.elapsed_secs();
        self.within_target = self.total_duration_secs <= self.resolution_target_secs;
        self.finished_at = Some(Utc::now());
        self.status = status;
    }
}
