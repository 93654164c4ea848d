//! Per-ticket coordinator.
//!
//! Walks a fixed step plan for each ticket and owns the resulting
//! [`ProcessingLog`]:
//!
//! ```text
//! Received ─triage─► Classified ─route─► Routed ─agent─► StepRunning ─analytics─► Aggregated
//!                                                                                  ├─ no Failed step ─► Completed
//!                                                                                  └─ any Failed step ─► Failed (log still returned)
//! ```
//!
//! Cancellation is checked at every step boundary. A cancelled run stops
//! appending immediately and closes as Failed with error "cancelled".

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::executor::StepExecutor;
use super::log::{ProcessingLog, StepRecord};
use crate::agents::StepContext;
use crate::analytics::{MetricsEvent, MetricsHandle};
use crate::error::AgentError;
use crate::resilience::BackendHealth;
use crate::router::ClassificationResult;
use crate::ticket::{AgentKind, AgentName, Ticket};

/// One entry of the step plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedStep {
    /// Classification. Always first.
    Triage,
    /// Whichever agent the classification assigned.
    Routed,
    /// A fixed agent that runs regardless of earlier outcomes.
    Always(AgentName),
}

/// Steps run for every ticket, in order.
pub const STEP_PLAN: &[PlannedStep] = &[
    PlannedStep::Triage,
    PlannedStep::Routed,
    PlannedStep::Always(AgentName::Analytics),
];

/// Shared reference to a Coordinator
pub type SharedCoordinator = Arc<Coordinator>;

pub struct Coordinator {
    executor: Arc<StepExecutor>,
    resolution_target: Duration,
    metrics: Option<MetricsHandle>,
}

impl Coordinator {
    pub fn new(executor: Arc<StepExecutor>, resolution_target: Duration) -> Self {
        Self {
            executor,
            resolution_target,
            metrics: None,
        }
    }

    /// Report steps and tickets to a metrics aggregator.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn shared(self) -> SharedCoordinator {
        Arc::new(self)
    }

    pub fn resolution_target(&self) -> Duration {
        self.resolution_target
    }

    pub fn backend_health(&self) -> Vec<BackendHealth> {
        self.executor.backend_health()
    }

    /// Process one ticket to a closed log.
    pub async fn process(&self, ticket: &Ticket) -> ProcessingLog {
        self.process_with_cancel(ticket, &CancellationToken::new())
            .await
    }

    /// Process one ticket, stopping at the next step boundary once `cancel`
    /// fires.
    #[instrument(skip(self, ticket, cancel), fields(ticket_id = %ticket.id))]
    pub async fn process_with_cancel(
        &self,
        ticket: &Ticket,
        cancel: &CancellationToken,
    ) -> ProcessingLog {
        let mut log = ProcessingLog::new(ticket.id.clone(), self.resolution_target);
        let mut classification: Option<ClassificationResult> = None;
        let mut first_error: Option<String> = None;

        for planned in STEP_PLAN {
            if cancel.is_cancelled() {
                warn!(steps = log.steps().len(), "Ticket processing cancelled");
                log.fail(AgentError::Cancelled.to_string());
                self.report_ticket(&log);
                return log;
            }

            let agent = match planned {
                PlannedStep::Triage => AgentName::Triage,
                PlannedStep::Routed => route(classification.as_ref()),
                PlannedStep::Always(agent) => *agent,
            };

            let ctx = StepContext {
                classification: classification.clone(),
                completed_steps: log.summaries(),
                resolution_target_secs: self.resolution_target.as_secs_f64(),
            };
            let record = self.executor.run(agent, ticket, &ctx).await;

            if *planned == PlannedStep::Triage {
                classification = record.payload.classification().cloned();
            }
            if record.is_failed() && first_error.is_none() {
                first_error = Some(
                    record
                        .payload
                        .error_message()
                        .unwrap_or("step failed")
                        .to_string(),
                );
            }
            self.report_step(&record);
            log.append(record);
        }

        match first_error {
            Some(error) => log.fail(error),
            None => log.complete(),
        }

        if !log.within_target() {
            warn!(
                total_duration_secs = log.total_duration_secs(),
                target_secs = log.resolution_target_secs(),
                "Resolution exceeded target"
            );
        }
        info!(
            status = %log.status(),
            steps = log.steps().len(),
            total_duration_secs = log.total_duration_secs(),
            "Ticket processed"
        );
        self.report_ticket(&log);
        log
    }

    /// Process many tickets, at most `max_concurrent` at a time. Logs come
    /// back in completion order.
    pub async fn process_batch(
        &self,
        tickets: Vec<Ticket>,
        max_concurrent: usize,
    ) -> Vec<ProcessingLog> {
        let this = self;
        stream::iter(tickets)
            .map(move |ticket| async move { this.process(&ticket).await })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await
    }

    fn report_step(&self, record: &StepRecord) {
        if let Some(metrics) = &self.metrics {
            if let Err(e) = metrics.record(MetricsEvent::Step(record.clone())) {
                warn!("Failed to record step metrics: {}", e);
            }
        }
    }

    fn report_ticket(&self, log: &ProcessingLog) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let mut events = vec![MetricsEvent::Ticket {
            ticket_id: log.ticket_id().to_string(),
            status: log.status(),
            total_duration_secs: log.total_duration_secs(),
            within_target: log.within_target(),
        }];
        events.extend(self.backend_health().into_iter().map(MetricsEvent::Backend));

        for event in events {
            if let Err(e) = metrics.record(event) {
                warn!("Failed to record ticket metrics: {}", e);
                return;
            }
        }
    }
}

/// Agent for the routed step. Missing classification goes to Escalation.
fn route(classification: Option<&ClassificationResult>) -> AgentName {
    classification
        .map(|c| c.assigned_agent)
        .unwrap_or(AgentKind::Escalation)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackRuleEngine;

    #[test]
    fn test_plan_order() {
        assert_eq!(STEP_PLAN.first(), Some(&PlannedStep::Triage));
        assert_eq!(STEP_PLAN.get(1), Some(&PlannedStep::Routed));
        assert_eq!(
            STEP_PLAN.last(),
            Some(&PlannedStep::Always(AgentName::Analytics))
        );
    }

    #[test]
    fn test_route_without_classification_escalates() {
        assert_eq!(route(None), AgentName::Escalation);
    }

    #[test]
    fn test_route_follows_assigned_agent() {
        let ticket = Ticket::new("T-1", "Monthly report", "dashboard empty");
        let classification = FallbackRuleEngine::new().classify(&ticket);
        assert_eq!(route(Some(&classification)), AgentName::Analytics);
    }
}
