//! Agent served by an out-of-process worker over a work queue.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::{AgentHandler, StepContext};
use crate::error::{AgentError, AgentResult};
use crate::queue::{MessageEnvelope, WorkQueue};
use crate::ticket::{AgentName, Ticket};

#[derive(Serialize)]
struct QueuedWork<'a> {
    ticket: &'a Ticket,
    context: &'a StepContext,
}

/// Forwards tickets to `<agent>-queue`. The step succeeds once the message
/// is enqueued; the worker's own result arrives out of band.
pub struct QueuedAgent {
    agent: AgentName,
    queue: Arc<dyn WorkQueue>,
}

impl QueuedAgent {
    pub fn new(agent: AgentName, queue: Arc<dyn WorkQueue>) -> Self {
        Self { agent, queue }
    }
}

#[async_trait]
impl AgentHandler for QueuedAgent {
    fn name(&self) -> AgentName {
        self.agent
    }

    async fn process(&self, ticket: &Ticket, ctx: &StepContext) -> AgentResult<serde_json::Value> {
        let target_queue = self.agent.queue_name();
        let envelope = MessageEnvelope::from_payload(
            AgentName::Triage,
            target_queue.clone(),
            &QueuedWork {
                ticket,
                context: ctx,
            },
        )
        .map_err(|e| AgentError::failed(self.agent.as_str(), e.to_string()))?;
        let message_id = envelope.id.clone();

        self.queue
            .send(envelope)
            .await
            .map_err(|e| AgentError::failed(self.agent.as_str(), e.to_string()))?;

        debug!(ticket_id = %ticket.id, queue = %target_queue, message_id = %message_id, "Ticket queued");
        Ok(json!({
            "queued": true,
            "message_id": message_id,
            "target_queue": target_queue,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::queue::{InMemoryWorkQueue, QueueSettings};

    #[tokio::test]
    async fn test_ticket_lands_on_agent_queue() {
        let queue = Arc::new(InMemoryWorkQueue::with_agent_queues(QueueSettings::default()));
        let agent = QueuedAgent::new(AgentName::Escalation, queue.clone());
        let ticket = Ticket::new("T-1", "Outage", "everything is down");

        let out = agent
            .process(&ticket, &StepContext::new(Duration::from_secs(120)))
            .await
            .unwrap();
        assert_eq!(out["target_queue"], "escalation-queue");

        let received = queue.receive("escalation-queue").await.unwrap().unwrap();
        assert_eq!(received.envelope.id, out["message_id"].as_str().unwrap());
        assert_eq!(received.envelope.source_agent, "triage");
        assert_eq!(received.envelope.payload["ticket"]["id"], "T-1");
    }

    #[tokio::test]
    async fn test_missing_queue_fails_step() {
        let queue = Arc::new(InMemoryWorkQueue::new(QueueSettings::default(), ["triage-queue"]));
        let agent = QueuedAgent::new(AgentName::Learning, queue);
        let err = agent
            .process(
                &Ticket::new("T-2", "x", "y"),
                &StepContext::new(Duration::from_secs(120)),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AgentError::failed("learning", "Unknown queue 'learning-queue'")
        );
    }
}
