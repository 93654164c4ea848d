//! In-process [`WorkQueue`] with lock windows, delivery limits and TTL.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{DeadLetter, MessageEnvelope, QueueSettings, ReceivedMessage, WorkQueue, AGENT_QUEUES};
use crate::error::{QueueError, QueueResult};

const MAX_DELIVERY_REASON: &str = "MaxDeliveryCountExceeded";

#[derive(Debug)]
struct Lock {
    token: Uuid,
    until: Instant,
}

#[derive(Debug)]
struct Entry {
    envelope: MessageEnvelope,
    enqueued_at: Instant,
    delivery_count: u32,
    lock: Option<Lock>,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<Entry>,
    dead: Vec<DeadLetter>,
}

impl QueueState {
    /// Discard expired messages. Locked messages are left to their consumer.
    fn purge_expired(&mut self, now: Instant, settings: &QueueSettings, queue: &str) {
        let before = self.entries.len();
        self.entries.retain(|e| {
            e.lock.is_some() || now.duration_since(e.enqueued_at) < settings.time_to_live
        });
        let expired = before - self.entries.len();
        if expired > 0 {
            warn!(queue, expired, "Discarded messages past their time-to-live");
        }
    }

    fn dead_letter(&mut self, index: usize, reason: &str) {
        if let Some(entry) = self.entries.remove(index) {
            warn!(
                message_id = %entry.envelope.id,
                queue = %entry.envelope.target_queue,
                delivery_count = entry.delivery_count,
                reason,
                "Message dead-lettered"
            );
            self.dead.push(DeadLetter {
                envelope: entry.envelope,
                reason: reason.to_string(),
                delivery_count: entry.delivery_count,
            });
        }
    }

    fn position_of(&self, token: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.lock.as_ref().is_some_and(|l| l.token == token))
    }
}

/// Named queues held in memory, shared through an `Arc`.
pub struct InMemoryWorkQueue {
    settings: QueueSettings,
    queues: Mutex<HashMap<String, QueueState>>,
}

impl InMemoryWorkQueue {
    pub fn new<I, S>(settings: QueueSettings, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queues = names
            .into_iter()
            .map(|n| (n.into(), QueueState::default()))
            .collect();
        Self {
            settings,
            queues: Mutex::new(queues),
        }
    }

    /// One queue per pipeline agent.
    pub fn with_agent_queues(settings: QueueSettings) -> Self {
        Self::new(settings, AGENT_QUEUES.iter().copied())
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Messages waiting or in flight on `queue`.
    pub async fn depth(&self, queue: &str) -> QueueResult<usize> {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|q| q.entries.len())
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn send(&self, envelope: MessageEnvelope) -> QueueResult<()> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(&envelope.target_queue)
            .ok_or_else(|| QueueError::UnknownQueue(envelope.target_queue.clone()))?;

        debug!(message_id = %envelope.id, queue = %envelope.target_queue, "Message enqueued");
        state.entries.push_back(Entry {
            envelope,
            enqueued_at: Instant::now(),
            delivery_count: 0,
            lock: None,
        });
        Ok(())
    }

    async fn receive(&self, queue: &str) -> QueueResult<Option<ReceivedMessage>> {
        let now = Instant::now();
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;

        // Expired locks make their messages available again.
        for entry in state.entries.iter_mut() {
            if entry.lock.as_ref().is_some_and(|l| l.until <= now) {
                entry.lock = None;
            }
        }
        state.purge_expired(now, &self.settings, queue);

        loop {
            let Some(index) = state.entries.iter().position(|e| e.lock.is_none()) else {
                return Ok(None);
            };

            if state.entries[index].delivery_count >= self.settings.max_delivery_count {
                state.dead_letter(index, MAX_DELIVERY_REASON);
                continue;
            }

            let entry = &mut state.entries[index];
            let token = Uuid::new_v4();
            entry.delivery_count += 1;
            entry.lock = Some(Lock {
                token,
                until: now + self.settings.lock_duration,
            });
            return Ok(Some(ReceivedMessage {
                envelope: entry.envelope.clone(),
                lock_token: token,
                delivery_count: entry.delivery_count,
            }));
        }
    }

    async fn complete(&self, queue: &str, lock_token: Uuid) -> QueueResult<()> {
        let now = Instant::now();
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;

        let index = state
            .position_of(lock_token)
            .ok_or_else(|| QueueError::UnknownMessage(lock_token.to_string()))?;

        let expired = state.entries[index]
            .lock
            .as_ref()
            .is_some_and(|l| l.until <= now);
        if expired {
            state.entries[index].lock = None;
            return Err(QueueError::LockExpired(lock_token.to_string()));
        }

        if let Some(entry) = state.entries.remove(index) {
            debug!(message_id = %entry.envelope.id, queue, "Message completed");
        }
        Ok(())
    }

    async fn abandon(&self, queue: &str, lock_token: Uuid) -> QueueResult<()> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;

        let index = state
            .position_of(lock_token)
            .ok_or_else(|| QueueError::UnknownMessage(lock_token.to_string()))?;

        state.entries[index].lock = None;
        if state.entries[index].delivery_count >= self.settings.max_delivery_count {
            state.dead_letter(index, MAX_DELIVERY_REASON);
        }
        Ok(())
    }

    async fn dead_letters(&self, queue: &str) -> QueueResult<Vec<DeadLetter>> {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|q| q.dead.clone())
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ticket::AgentName;

    fn envelope(queue: &str, n: u32) -> MessageEnvelope {
        MessageEnvelope::new(AgentName::Triage, queue, serde_json::json!({ "n": n }))
    }

    fn settings(max_delivery_count: u32) -> QueueSettings {
        QueueSettings {
            lock_duration: Duration::from_secs(60),
            max_delivery_count,
            time_to_live: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_unknown_queue_is_rejected() {
        let queue = InMemoryWorkQueue::with_agent_queues(QueueSettings::default());
        let err = queue.send(envelope("billing-queue", 1)).await.unwrap_err();
        assert_eq!(err, QueueError::UnknownQueue("billing-queue".into()));
    }

    #[tokio::test]
    async fn test_fifo_receive_and_complete() {
        let queue = InMemoryWorkQueue::with_agent_queues(QueueSettings::default());
        queue.send(envelope("knowledge-queue", 1)).await.unwrap();
        queue.send(envelope("knowledge-queue", 2)).await.unwrap();

        let first = queue.receive("knowledge-queue").await.unwrap().unwrap();
        assert_eq!(first.envelope.payload["n"], 1);
        assert_eq!(first.delivery_count, 1);

        let second = queue.receive("knowledge-queue").await.unwrap().unwrap();
        assert_eq!(second.envelope.payload["n"], 2);

        queue.complete("knowledge-queue", first.lock_token).await.unwrap();
        assert_eq!(queue.depth("knowledge-queue").await.unwrap(), 1);

        let err = queue
            .complete("knowledge-queue", first.lock_token)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownMessage(_)));
    }

    #[tokio::test]
    async fn test_locked_message_is_not_redelivered() {
        let queue = InMemoryWorkQueue::with_agent_queues(QueueSettings::default());
        queue.send(envelope("learning-queue", 1)).await.unwrap();
        assert!(queue.receive("learning-queue").await.unwrap().is_some());
        assert!(queue.receive("learning-queue").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_expiry_makes_message_redeliverable() {
        let queue = InMemoryWorkQueue::new(settings(10), ["analytics-queue"]);
        queue.send(envelope("analytics-queue", 1)).await.unwrap();

        let first = queue.receive("analytics-queue").await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let err = queue
            .complete("analytics-queue", first.lock_token)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::LockExpired(_)));

        let again = queue.receive("analytics-queue").await.unwrap().unwrap();
        assert_eq!(again.envelope.id, first.envelope.id);
        assert_eq!(again.delivery_count, 2);
    }

    #[tokio::test]
    async fn test_abandon_past_max_delivery_dead_letters() {
        let queue = InMemoryWorkQueue::new(settings(2), ["automation-queue"]);
        queue.send(envelope("automation-queue", 1)).await.unwrap();

        let first = queue.receive("automation-queue").await.unwrap().unwrap();
        queue.abandon("automation-queue", first.lock_token).await.unwrap();
        let second = queue.receive("automation-queue").await.unwrap().unwrap();
        assert_eq!(second.delivery_count, 2);
        queue.abandon("automation-queue", second.lock_token).await.unwrap();

        assert!(queue.receive("automation-queue").await.unwrap().is_none());
        let dead = queue.dead_letters("automation-queue").await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, MAX_DELIVERY_REASON);
        assert_eq!(dead[0].delivery_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lock_at_max_delivery_dead_letters_on_receive() {
        let queue = InMemoryWorkQueue::new(settings(1), ["escalation-queue"]);
        queue.send(envelope("escalation-queue", 1)).await.unwrap();
        queue.receive("escalation-queue").await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(queue.receive("escalation-queue").await.unwrap().is_none());
        assert_eq!(queue.dead_letters("escalation-queue").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_discards_unconsumed_messages() {
        let queue = InMemoryWorkQueue::new(settings(10), ["triage-queue"]);
        queue.send(envelope("triage-queue", 1)).await.unwrap();

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(queue.receive("triage-queue").await.unwrap().is_none());
        assert_eq!(queue.depth("triage-queue").await.unwrap(), 0);
        assert!(queue.dead_letters("triage-queue").await.unwrap().is_empty());
    }
}
