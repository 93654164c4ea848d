//! Two-tier ticket classifier.
//!
//! The primary tier asks a completion backend for a JSON decision and
//! validates it at the parse boundary. Any failure (transport, timeout,
//! no JSON object, invalid JSON) switches to [`FallbackRuleEngine`]. The
//! classifier itself never fails.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompts::{build_classification_prompt, CLASSIFIER_SYSTEM_INSTRUCTION};
use crate::backend::{CompletionBackend, CompletionRequest, TokenUsage};
use crate::error::{BackendError, BackendResult};
use crate::fallback::{FallbackRuleEngine, DEFAULT_CATEGORY};
use crate::resilience::{call_with_timeout, BackendHealth, ResultSource};
use crate::ticket::{AgentKind, Priority, Ticket};

/// Confidence assumed when the backend omits or garbles it.
pub const DEFAULT_PRIMARY_CONFIDENCE: f64 = 0.8;

/// Resolution estimate assumed when the backend omits or garbles it.
pub const DEFAULT_RESOLUTION_SECS: u64 = 120;

/// Closed classification outcome. Every field has a concrete value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub assigned_agent: AgentKind,
    pub category: String,
    pub priority: Priority,
    /// In [0, 1].
    pub confidence: f64,
    pub estimated_resolution_secs: u64,
    pub reasoning: String,
    pub source: ResultSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// Request parameters for the completion backend.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Budget for the single backend attempt.
    pub timeout: Duration,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model_id: "gpt-4.1-mini".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Loosely-typed answer as the model wrote it. Converted into a
/// [`ClassificationResult`] immediately; never leaves this module.
#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    #[serde(default)]
    agent: Option<serde_json::Value>,
    #[serde(default)]
    category: Option<serde_json::Value>,
    #[serde(default)]
    priority: Option<serde_json::Value>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
    #[serde(default)]
    resolution_time: Option<serde_json::Value>,
    #[serde(default)]
    reasoning: Option<serde_json::Value>,
}

impl RawClassification {
    fn into_result(self, ticket: &Ticket, usage: Option<TokenUsage>) -> ClassificationResult {
        let assigned_agent = match self.agent.as_ref().and_then(json_str) {
            Some(label) => AgentKind::from_label(label).unwrap_or_else(|| {
                warn!(ticket_id = %ticket.id, label, "Unknown agent in classification, using Escalation");
                AgentKind::Escalation
            }),
            None => AgentKind::Escalation,
        };

        let category = self
            .category
            .as_ref()
            .and_then(json_str)
            .map(str::to_string)
            .filter(|c| !c.trim().is_empty())
            .or_else(|| ticket.category.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let priority = self
            .priority
            .as_ref()
            .and_then(json_str)
            .and_then(Priority::parse_loose)
            .or(ticket.priority)
            .unwrap_or_default();

        let confidence = self
            .confidence
            .as_ref()
            .and_then(json_f64)
            .unwrap_or(DEFAULT_PRIMARY_CONFIDENCE)
            .clamp(0.0, 1.0);

        let estimated_resolution_secs = self
            .resolution_time
            .as_ref()
            .and_then(parse_resolution_secs)
            .unwrap_or(DEFAULT_RESOLUTION_SECS);

        ClassificationResult {
            assigned_agent,
            category,
            priority,
            confidence,
            estimated_resolution_secs,
            reasoning: self
                .reasoning
                .as_ref()
                .and_then(json_str)
                .unwrap_or_default()
                .to_string(),
            source: ResultSource::Primary,
            token_usage: usage,
        }
    }
}

/// Non-string values are treated as absent.
fn json_str(value: &serde_json::Value) -> Option<&str> {
    value.as_str()
}

fn json_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Accepts `30`, `"30"`, `"30s"`, `"30 sec"`, `"30 seconds"`.
fn parse_resolution_secs(value: &serde_json::Value) -> Option<u64> {
    let secs = match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim().to_ascii_lowercase();
            let number = trimmed
                .trim_end_matches("seconds")
                .trim_end_matches("sec")
                .trim_end_matches('s')
                .trim();
            number.parse::<f64>().ok()?
        }
        other => json_f64(other)?,
    };
    (secs.is_finite() && secs >= 0.0).then(|| secs.round() as u64)
}

/// Return the first balanced `{...}` span in `text`, honouring JSON string
/// literals so braces inside strings do not count.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Model-backed classifier with a rule-based fallback.
pub struct Classifier {
    backend: Arc<dyn CompletionBackend>,
    fallback: FallbackRuleEngine,
    settings: ClassifierSettings,
    health: Mutex<BackendHealth>,
}

impl Classifier {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: ClassifierSettings) -> Self {
        let health = Mutex::new(BackendHealth::new(backend.name()));
        Self {
            backend,
            fallback: FallbackRuleEngine::new(),
            settings,
            health,
        }
    }

    /// Classify a ticket. Always returns a result, tagged by source.
    pub async fn classify(&self, ticket: &Ticket) -> ClassificationResult {
        let outcome = self.classify_primary(ticket).await;
        self.record_health(&outcome);

        match outcome {
            Ok(result) => {
                debug!(
                    ticket_id = %ticket.id,
                    agent = %result.assigned_agent,
                    confidence = result.confidence,
                    "Primary classification"
                );
                result
            }
            Err(e) => {
                warn!(
                    ticket_id = %ticket.id,
                    backend = self.backend.name(),
                    error_kind = e.kind(),
                    "Classification backend failed, using rule-based fallback: {}",
                    e
                );
                self.fallback.classify(ticket)
            }
        }
    }

    /// Single attempt against the completion backend.
    pub async fn classify_primary(&self, ticket: &Ticket) -> BackendResult<ClassificationResult> {
        let request = CompletionRequest {
            system_instruction: CLASSIFIER_SYSTEM_INSTRUCTION.to_string(),
            user_prompt: build_classification_prompt(ticket),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            model_id: self.settings.model_id.clone(),
        };

        let response =
            call_with_timeout(self.settings.timeout, self.backend.complete(&request)).await?;

        let raw = extract_json_object(&response.text).ok_or_else(|| {
            BackendError::MalformedResponse("no JSON object in completion text".into())
        })?;
        let parsed: RawClassification = serde_json::from_str(raw)
            .map_err(|e| BackendError::MalformedResponse(format!("invalid classification JSON: {e}")))?;

        Ok(parsed.into_result(ticket, response.usage))
    }

    /// Snapshot of the completion backend's health.
    pub fn health(&self) -> BackendHealth {
        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record_health(&self, outcome: &BackendResult<ClassificationResult>) {
        let mut health = self
            .health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match outcome {
            Ok(_) => health.record_success(),
            Err(e) => health.record_failure(e),
        }
    }
}
