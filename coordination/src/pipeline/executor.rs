//! Runs a single named step and turns whatever happens into a StepRecord.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::log::{StepOutcome, StepPayload, StepRecord};
use crate::agents::{AgentRegistry, StepContext};
use crate::error::{AgentError, AgentResult};
use crate::knowledge::KnowledgeRetriever;
use crate::resilience::BackendHealth;
use crate::router::Classifier;
use crate::ticket::{AgentName, Ticket};

/// Dispatches steps: triage to the Classifier, knowledge to the
/// KnowledgeRetriever, everything else to a registered handler.
pub struct StepExecutor {
    classifier: Arc<Classifier>,
    retriever: Arc<KnowledgeRetriever>,
    agents: AgentRegistry,
    step_timeout: Duration,
}

impl StepExecutor {
    pub fn new(
        classifier: Arc<Classifier>,
        retriever: Arc<KnowledgeRetriever>,
        agents: AgentRegistry,
        step_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            retriever,
            agents,
            step_timeout,
        }
    }

    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Health of the completion and search backends, in that order.
    pub fn backend_health(&self) -> Vec<BackendHealth> {
        vec![self.classifier.health(), self.retriever.health()]
    }

    /// Run one step. Never fails: errors become a `Failed` record whose
    /// duration runs up to the failure.
    pub async fn run(&self, agent: AgentName, ticket: &Ticket, ctx: &StepContext) -> StepRecord {
        let started_at = Utc::now();
        let start = Instant::now();

        let (outcome, payload) = match agent {
            AgentName::Triage => {
                let result = self.classifier.classify(ticket).await;
                (
                    StepOutcome::from_source(result.source),
                    StepPayload::Classification(result),
                )
            }
            AgentName::Knowledge => {
                let result = self.retriever.retrieve(ticket).await;
                (
                    StepOutcome::from_source(result.source),
                    StepPayload::Knowledge(result),
                )
            }
            other => match self.run_handler(other, ticket, ctx).await {
                Ok(value) => (StepOutcome::Success, StepPayload::Agent(value)),
                Err(e) => {
                    warn!(ticket_id = %ticket.id, agent = %other, "Step failed: {}", e);
                    (
                        StepOutcome::Failed,
                        StepPayload::Error {
                            message: e.to_string(),
                        },
                    )
                }
            },
        };

        let record = StepRecord::new(agent, started_at, start.elapsed(), outcome, payload);
        debug!(
            ticket_id = %ticket.id,
            agent = %agent,
            outcome = %record.outcome,
            duration_secs = record.duration_secs,
            "Step finished"
        );
        record
    }

    async fn run_handler(
        &self,
        agent: AgentName,
        ticket: &Ticket,
        ctx: &StepContext,
    ) -> AgentResult<serde_json::Value> {
        let handler = self
            .agents
            .get(agent)
            .ok_or_else(|| AgentError::UnknownAgent(agent.to_string()))?;

        match tokio::time::timeout(self.step_timeout, handler.process(ticket, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout {
                agent: agent.to_string(),
                timeout: self.step_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::agents::{AgentHandler, AutomationAgent};
    use crate::backend::UnavailableBackend;
    use crate::knowledge::RetrieverSettings;
    use crate::router::ClassifierSettings;

    struct SleepyAgent;

    #[async_trait]
    impl AgentHandler for SleepyAgent {
        fn name(&self) -> AgentName {
            AgentName::Automation
        }

        async fn process(&self, _t: &Ticket, _c: &StepContext) -> AgentResult<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(serde_json::Value::Null)
        }
    }

    fn executor(agents: AgentRegistry) -> StepExecutor {
        let offline = Arc::new(UnavailableBackend);
        StepExecutor::new(
            Arc::new(Classifier::new(offline.clone(), ClassifierSettings::default())),
            Arc::new(KnowledgeRetriever::new(offline, RetrieverSettings::default())),
            agents,
            Duration::from_secs(5),
        )
    }

    fn ctx() -> StepContext {
        StepContext::new(Duration::from_secs(120))
    }

    #[tokio::test]
    async fn test_triage_offline_is_fallback() {
        let record = executor(AgentRegistry::new())
            .run(AgentName::Triage, &Ticket::new("T-1", "How to", "guide"), &ctx())
            .await;
        assert_eq!(record.outcome, StepOutcome::Fallback);
        assert!(record.payload.classification().is_some());
        assert!(record.duration_secs >= 0.0);
    }

    #[tokio::test]
    async fn test_unregistered_agent_fails_step() {
        let record = executor(AgentRegistry::new())
            .run(AgentName::Analytics, &Ticket::new("T-2", "x", "y"), &ctx())
            .await;
        assert_eq!(record.outcome, StepOutcome::Failed);
        assert_eq!(
            record.payload.error_message(),
            Some("No handler registered for agent 'analytics'")
        );
    }

    #[tokio::test]
    async fn test_handler_success() {
        let registry = AgentRegistry::new().with(Arc::new(AutomationAgent));
        let record = executor(registry)
            .run(AgentName::Automation, &Ticket::new("T-3", "x", "y"), &ctx())
            .await;
        assert_eq!(record.outcome, StepOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout_records_elapsed() {
        let registry = AgentRegistry::new().with(Arc::new(SleepyAgent));
        let record = executor(registry)
            .run(AgentName::Automation, &Ticket::new("T-4", "x", "y"), &ctx())
            .await;
        assert_eq!(record.outcome, StepOutcome::Failed);
        assert!(record.duration_secs >= 5.0 && record.duration_secs < 5.1);
        assert_eq!(
            record.payload.error_message(),
            Some("Agent 'automation' timed out after 5s")
        );
    }
}
