//! Auto-Resolve Coordination Library
//!
//! This library provides the ticket pipeline behind the resolve service:
//! - Two-tier ticket classification (completion backend, then keyword rules)
//! - Two-tier knowledge lookup (search backend, then canned articles)
//! - Step execution and per-ticket coordination with an auditable log
//! - Process-wide metrics fed by message passing
//! - Work queues for agents that run out of process
//!
//! # Pipeline
//!
//! ```text
//! Ticket ─► triage (Classifier) ─► routed agent ─► analytics ─► ProcessingLog
//!                                   │
//!                                   ├─ knowledge  (KnowledgeRetriever)
//!                                   ├─ automation ┐
//!                                   ├─ escalation ├─ AgentHandler (built-in or queued)
//!                                   └─ learning   ┘
//! ```
//!
//! Backend failures never escape a component: the Classifier and the
//! KnowledgeRetriever always answer, tagging results with
//! [`ResultSource::Fallback`] when the deterministic tier was used. Agent
//! failures become `Failed` step records and a `Failed` log, which is still
//! returned in full.

#![allow(clippy::uninlined_format_args)]

pub mod agents;
pub mod analytics;
pub mod backend;
pub mod config;
pub mod error;
pub mod fallback;
pub mod knowledge;
pub mod pipeline;
pub mod queue;
pub mod resilience;
pub mod router;
pub mod secrets;
pub mod ticket;

// Re-export ticket types
pub use ticket::{AgentKind, AgentName, InvalidTicket, Priority, Ticket};

// Re-export error types
pub use error::{
    AgentError, AgentResult, BackendError, BackendResult, ConfigError, ConfigResult, QueueError,
    QueueResult,
};

// Re-export backend types
pub use backend::{
    CompletionBackend, CompletionRequest, CompletionResponse, HttpSearchBackend,
    OpenAiCompletionBackend, SearchBackend, SearchHit, SearchMode, SearchRequest, TokenUsage,
    UnavailableBackend,
};

// Re-export classification types
pub use fallback::FallbackRuleEngine;
pub use router::{ClassificationResult, Classifier, ClassifierSettings};

// Re-export knowledge types
pub use knowledge::{KnowledgeMatch, KnowledgeResult, KnowledgeRetriever, RetrieverSettings};

// Re-export agent types
pub use agents::{
    AgentHandler, AgentRegistry, Feedback, FeedbackReceipt, LearningAgent, LearningPerformance,
    QueuedAgent, StepContext,
};

// Re-export pipeline types
pub use pipeline::{
    Coordinator, ProcessingLog, SharedCoordinator, StepExecutor, StepOutcome, StepPayload,
    StepRecord, TicketStatus,
};

// Re-export analytics types
pub use analytics::{MetricsAggregator, MetricsEvent, MetricsHandle, MetricsSnapshot};

// Re-export queue types
pub use queue::{InMemoryWorkQueue, MessageEnvelope, QueueSettings, WorkQueue};

// Re-export resilience types
pub use resilience::{BackendHealth, DegradationLevel, ResultSource};

// Re-export configuration types
pub use config::ResolveConfig;
pub use secrets::{EnvSecretStore, SecretStore, StaticSecretStore};
