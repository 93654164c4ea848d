//! Downstream agents invoked by the step executor.
//!
//! Triage and knowledge steps are served by the Classifier and
//! KnowledgeRetriever. Every other step is an [`AgentHandler`] looked up in
//! the [`AgentRegistry`]: either one of the local built-ins or a
//! [`QueuedAgent`] that hands the ticket to an out-of-process worker.

pub mod builtin;
pub mod queued;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentResult;
use crate::pipeline::StepSummary;
use crate::router::ClassificationResult;
use crate::ticket::{AgentName, Ticket};

pub use builtin::{
    AnalyticsAgent, AutomationAgent, EscalationAgent, Feedback, FeedbackReceipt, LearningAgent,
    LearningPerformance,
};
pub use queued::QueuedAgent;

/// What an agent knows about the run so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    pub classification: Option<ClassificationResult>,
    pub completed_steps: Vec<StepSummary>,
    pub resolution_target_secs: f64,
}

impl StepContext {
    pub fn new(resolution_target: Duration) -> Self {
        Self {
            classification: None,
            completed_steps: Vec::new(),
            resolution_target_secs: resolution_target.as_secs_f64(),
        }
    }

    /// Sum of completed step durations.
    pub fn elapsed_secs(&self) -> f64 {
        self.completed_steps.iter().map(|s| s.duration_secs).sum()
    }

    pub fn category(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.category.as_str())
    }
}

/// A downstream processing role.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    fn name(&self) -> AgentName;

    /// Handle one ticket. Errors become a `Failed` step record.
    async fn process(&self, ticket: &Ticket, ctx: &StepContext) -> AgentResult<serde_json::Value>;
}

/// Handlers by agent name.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    handlers: HashMap<AgentName, Arc<dyn AgentHandler>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local handlers for automation, escalation, learning and analytics.
    pub fn builtin(learning: Arc<LearningAgent>) -> Self {
        Self::new()
            .with(Arc::new(AutomationAgent))
            .with(Arc::new(EscalationAgent))
            .with(learning)
            .with(Arc::new(AnalyticsAgent))
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn AgentHandler>) {
        self.handlers.insert(handler.name(), handler);
    }

    pub fn with(mut self, handler: Arc<dyn AgentHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, name: AgentName) -> Option<Arc<dyn AgentHandler>> {
        self.handlers.get(&name).cloned()
    }

    pub fn names(&self) -> Vec<AgentName> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
