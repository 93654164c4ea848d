//! Metrics aggregator task.
//!
//! One aggregator runs per process. Producers hold a cloneable
//! [`MetricsHandle`] and `record` events into an mpsc channel; the task owns
//! all counters, so there is no shared mutable state. Snapshots are
//! requested over the same channel and answered on a oneshot.
//!
//! ```text
//! Coordinator ──record(Step/Ticket/Backend)──► mpsc ──► MetricsAggregator
//! HTTP /metrics ──snapshot()──► mpsc ──► MetricsAggregator ──oneshot──► MetricsSnapshot
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::{AnalyticsError, AnalyticsResult};
use crate::pipeline::{StepOutcome, StepRecord, TicketStatus};
use crate::resilience::BackendHealth;

/// Something worth counting.
#[derive(Debug, Clone)]
pub enum MetricsEvent {
    /// A step finished.
    Step(StepRecord),
    /// A ticket's log was closed.
    Ticket {
        ticket_id: String,
        status: TicketStatus,
        total_duration_secs: f64,
        within_target: bool,
    },
    /// Latest health of a backend.
    Backend(BackendHealth),
}

enum Command {
    Record(MetricsEvent),
    Snapshot(oneshot::Sender<MetricsSnapshot>),
}

/// Per-agent counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub fallbacks: u64,
    pub failures: u64,
    pub total_duration_secs: f64,
    pub average_duration_secs: f64,
}

impl AgentMetrics {
    fn record(&mut self, step: &StepRecord) {
        self.invocations += 1;
        match step.outcome {
            StepOutcome::Success => self.successes += 1,
            StepOutcome::Fallback => self.fallbacks += 1,
            StepOutcome::Failed => self.failures += 1,
        }
        self.total_duration_secs += step.duration_secs;
        self.average_duration_secs = self.total_duration_secs / self.invocations as f64;
    }
}

/// Per-ticket counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketMetrics {
    pub processed: u64,
    pub completed: u64,
    pub failed: u64,
    pub within_target: u64,
    pub average_resolution_secs: f64,
    #[serde(skip)]
    total_resolution_secs: f64,
}

impl TicketMetrics {
    fn record(&mut self, status: TicketStatus, total_duration_secs: f64, within_target: bool) {
        self.processed += 1;
        match status {
            TicketStatus::Completed => self.completed += 1,
            TicketStatus::Failed => self.failed += 1,
            TicketStatus::Processing => {}
        }
        if within_target {
            self.within_target += 1;
        }
        self.total_resolution_secs += total_duration_secs;
        self.average_resolution_secs = self.total_resolution_secs / self.processed as f64;
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Keyed by agent name.
    pub agents: BTreeMap<String, AgentMetrics>,
    pub tickets: TicketMetrics,
    /// Keyed by backend name.
    pub backends: BTreeMap<String, BackendHealth>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// Sender side of the aggregator. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl MetricsHandle {
    /// Record an event. Fails only if the aggregator has stopped.
    pub fn record(&self, event: MetricsEvent) -> AnalyticsResult<()> {
        self.sender
            .send(Command::Record(event))
            .map_err(|_| AnalyticsError::AggregatorStopped)
    }

    /// Current counters. Events recorded before this call are included.
    pub async fn snapshot(&self) -> AnalyticsResult<MetricsSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Snapshot(reply))
            .map_err(|_| AnalyticsError::AggregatorStopped)?;
        rx.await.map_err(|_| AnalyticsError::SnapshotDropped)
    }
}

/// Owns the counters; runs until every handle is dropped.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    snapshot: MetricsSnapshot,
}

impl MetricsAggregator {
    /// Start the aggregator task.
    pub fn spawn() -> (MetricsHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::default().run(receiver));
        (MetricsHandle { sender }, task)
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Record(event) => self.apply(event),
                Command::Snapshot(reply) => {
                    let mut snapshot = self.snapshot.clone();
                    snapshot.generated_at = Some(Utc::now());
                    // Requester may have gone away.
                    let _ = reply.send(snapshot);
                }
            }
        }
        debug!("Metrics aggregator stopped");
    }

    fn apply(&mut self, event: MetricsEvent) {
        match event {
            MetricsEvent::Step(step) => self
                .snapshot
                .agents
                .entry(step.agent.to_string())
                .or_default()
                .record(&step),
            MetricsEvent::Ticket {
                ticket_id,
                status,
                total_duration_secs,
                within_target,
            } => {
                debug!(ticket_id = %ticket_id, %status, "Ticket recorded");
                self.snapshot
                    .tickets
                    .record(status, total_duration_secs, within_target);
            }
            MetricsEvent::Backend(health) => {
                self.snapshot.backends.insert(health.backend.clone(), health);
            }
        }
    }
}
