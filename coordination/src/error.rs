//! Error taxonomy for the ticket pipeline.
//!
//! Backend errors are always recovered inside the component that raised
//! them (Classifier, KnowledgeRetriever). Agent errors become a `Failed`
//! step record. Configuration errors are fatal at startup and never occur
//! per ticket.

use std::path::PathBuf;
use std::time::Duration;

/// Failure talking to a completion or search backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// Network, auth or transport failure.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The call exceeded its timeout budget.
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered, but nothing usable could be parsed from it.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// Non-success HTTP status.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl BackendError {
    /// Short machine-readable label used in logs and health tracking.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Status { .. } => "status",
        }
    }
}

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Failure inside an agent step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("Agent '{agent}' failed: {message}")]
    Failed { agent: String, message: String },

    #[error("Agent '{agent}' timed out after {timeout:?}")]
    Timeout { agent: String, timeout: Duration },

    #[error("No handler registered for agent '{0}'")]
    UnknownAgent(String),

    #[error("cancelled")]
    Cancelled,
}

impl AgentError {
    /// Convenience constructor for handler failures.
    pub fn failed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            agent: agent.into(),
            message: message.into(),
        }
    }
}

/// Result type for agent handlers
pub type AgentResult<T> = Result<T, AgentError>;

/// Missing or invalid initialization data. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Secret '{name}' could not be resolved: {reason}")]
    Secret { name: String, reason: String },
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Work queue failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    #[error("Unknown queue '{0}'")]
    UnknownQueue(String),

    #[error("No locked message with token {0}")]
    UnknownMessage(String),

    #[error("Lock {0} expired before settlement")]
    LockExpired(String),

    #[error("Failed to serialize message payload: {0}")]
    Serialize(String),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
