//! Per-agent work queues for agents that run out of process.
//!
//! Delivery is at-least-once. A received message is locked for a window;
//! if it is neither completed nor abandoned before the lock expires it
//! becomes receivable again. A message delivered `max_delivery_count`
//! times without completion is dead-lettered. Unconsumed messages older
//! than the time-to-live are discarded.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::ticket::AgentName;

pub use memory::InMemoryWorkQueue;

/// Queue names, one per pipeline step.
pub const AGENT_QUEUES: &[&str] = &[
    "triage-queue",
    "knowledge-queue",
    "automation-queue",
    "escalation-queue",
    "learning-queue",
    "analytics-queue",
];

/// Message carried on a work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source_agent: String,
    pub target_queue: String,
    pub payload: serde_json::Value,
}

impl MessageEnvelope {
    pub fn new(
        source_agent: AgentName,
        target_queue: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source_agent: source_agent.to_string(),
            target_queue: target_queue.into(),
            payload,
        }
    }

    /// Build an envelope from any serializable payload.
    pub fn from_payload<T: Serialize>(
        source_agent: AgentName,
        target_queue: impl Into<String>,
        payload: &T,
    ) -> QueueResult<Self> {
        let payload =
            serde_json::to_value(payload).map_err(|e| QueueError::Serialize(e.to_string()))?;
        Ok(Self::new(source_agent, target_queue, payload))
    }
}

/// Queue delivery parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Visibility window after a receive.
    pub lock_duration: Duration,
    /// Deliveries allowed before dead-lettering.
    pub max_delivery_count: u32,
    /// Retention bound for unconsumed messages.
    pub time_to_live: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            lock_duration: Duration::from_secs(5 * 60),
            max_delivery_count: 10,
            time_to_live: Duration::from_secs(14 * 24 * 60 * 60),
        }
    }
}

/// A locked message handed to a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub envelope: MessageEnvelope,
    /// Token to settle the message with.
    pub lock_token: Uuid,
    /// 1 on first delivery.
    pub delivery_count: u32,
}

/// A message removed from circulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub envelope: MessageEnvelope,
    pub reason: String,
    pub delivery_count: u32,
}

/// Message transport between the coordinator and out-of-process agents.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue on `envelope.target_queue`.
    async fn send(&self, envelope: MessageEnvelope) -> QueueResult<()>;

    /// Lock and return the next available message, if any.
    async fn receive(&self, queue: &str) -> QueueResult<Option<ReceivedMessage>>;

    /// Acknowledge and remove a locked message.
    async fn complete(&self, queue: &str, lock_token: Uuid) -> QueueResult<()>;

    /// Release a locked message for redelivery.
    async fn abandon(&self, queue: &str, lock_token: Uuid) -> QueueResult<()>;

    async fn dead_letters(&self, queue: &str) -> QueueResult<Vec<DeadLetter>>;
}
