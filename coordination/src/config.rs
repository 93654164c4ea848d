//! Pipeline configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (e.g. `RESOLVE_COMPLETION_MODEL`)
//! 2. Values in the TOML file
//! 3. Built-in defaults
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Endpoints have no default; they are only required when the pipeline
//! runs against live backends.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::SearchMode;
use crate::error::{ConfigError, ConfigResult};
use crate::knowledge::RetrieverSettings;
use crate::queue::QueueSettings;
use crate::router::ClassifierSettings;
use crate::ticket::AgentName;

const ENV_COMPLETION_URL: &str = "RESOLVE_COMPLETION_URL";
const ENV_COMPLETION_MODEL: &str = "RESOLVE_COMPLETION_MODEL";
const ENV_SEARCH_URL: &str = "RESOLVE_SEARCH_URL";
const ENV_SEARCH_INDEX: &str = "RESOLVE_SEARCH_INDEX";
const ENV_STEP_TIMEOUT_SECS: &str = "RESOLVE_STEP_TIMEOUT_SECS";
const ENV_MAX_CONCURRENT: &str = "RESOLVE_MAX_CONCURRENT";
const ENV_RESOLUTION_TARGET_SECS: &str = "RESOLVE_RESOLUTION_TARGET_SECS";

/// Completion backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Full chat-completions URL.
    pub endpoint: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4.1-mini".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

/// Search backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search service base URL.
    pub endpoint: Option<String>,
    pub index: String,
    pub api_version: String,
    pub top_k: usize,
    pub mode: SearchMode,
    pub search_fields: Vec<String>,
    pub select_fields: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let retriever = RetrieverSettings::default();
        Self {
            endpoint: None,
            index: "knowledge-base".to_string(),
            api_version: "2023-11-01".to_string(),
            top_k: retriever.top_k,
            mode: retriever.mode,
            search_fields: retriever.search_fields,
            select_fields: retriever.select_fields,
            timeout_secs: 30,
        }
    }
}

/// Coordinator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub step_timeout_secs: u64,
    pub max_concurrent: usize,
    /// Resolution-time contract ("< 2min target").
    pub resolution_target_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: 30,
            max_concurrent: 8,
            resolution_target_secs: 120,
        }
    }
}

/// Work queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuesConfig {
    /// Agents served by out-of-process workers through their queue.
    pub remote_agents: Vec<AgentName>,
    pub lock_duration_secs: u64,
    pub max_delivery_count: u32,
    pub time_to_live_secs: u64,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        let settings = QueueSettings::default();
        Self {
            remote_agents: Vec::new(),
            lock_duration_secs: settings.lock_duration.as_secs(),
            max_delivery_count: settings.max_delivery_count,
            time_to_live_secs: settings.time_to_live.as_secs(),
        }
    }
}

/// Names of secrets looked up at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub completion_api_key: String,
    pub search_admin_key: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            completion_api_key: "completion-api-key".to_string(),
            search_admin_key: "search-admin-key".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub completion: CompletionConfig,
    pub search: SearchConfig,
    pub pipeline: PipelineConfig,
    pub queues: QueuesConfig,
    pub secrets: SecretsConfig,
}

impl ResolveConfig {
    /// Load from an optional TOML file, apply environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from `lookup` (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_COMPLETION_URL) {
            self.completion.endpoint = Some(url);
        }
        if let Some(model) = lookup(ENV_COMPLETION_MODEL) {
            self.completion.model = model;
        }
        if let Some(url) = lookup(ENV_SEARCH_URL) {
            self.search.endpoint = Some(url);
        }
        if let Some(index) = lookup(ENV_SEARCH_INDEX) {
            self.search.index = index;
        }
        if let Some(raw) = lookup(ENV_STEP_TIMEOUT_SECS) {
            self.pipeline.step_timeout_secs = parse_number(ENV_STEP_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT) {
            self.pipeline.max_concurrent = parse_number(ENV_MAX_CONCURRENT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RESOLUTION_TARGET_SECS) {
            self.pipeline.resolution_target_secs =
                parse_number(ENV_RESOLUTION_TARGET_SECS, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::Invalid(format!(
                "completion.temperature must be within [0, 2], got {}",
                self.completion.temperature
            )));
        }
        let positive = [
            ("completion.max_tokens", u64::from(self.completion.max_tokens)),
            ("completion.timeout_secs", self.completion.timeout_secs),
            ("search.top_k", self.search.top_k as u64),
            ("search.timeout_secs", self.search.timeout_secs),
            ("pipeline.step_timeout_secs", self.pipeline.step_timeout_secs),
            ("pipeline.max_concurrent", self.pipeline.max_concurrent as u64),
            ("pipeline.resolution_target_secs", self.pipeline.resolution_target_secs),
            ("queues.lock_duration_secs", self.queues.lock_duration_secs),
            ("queues.max_delivery_count", u64::from(self.queues.max_delivery_count)),
            ("queues.time_to_live_secs", self.queues.time_to_live_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
        if self.search.search_fields.is_empty() {
            return Err(ConfigError::Invalid(
                "search.search_fields must not be empty".into(),
            ));
        }
        if let Some(agent) = self
            .queues
            .remote_agents
            .iter()
            .find(|a| matches!(a, AgentName::Triage | AgentName::Knowledge))
        {
            return Err(ConfigError::Invalid(format!(
                "queues.remote_agents cannot include '{agent}'"
            )));
        }
        Ok(())
    }

    /// Endpoints needed to run against live backends.
    pub fn require_endpoints(&self) -> ConfigResult<(&str, &str)> {
        let completion = self
            .completion
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("completion.endpoint".into()))?;
        let search = self
            .search
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("search.endpoint".into()))?;
        Ok((completion, search))
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            model_id: self.completion.model.clone(),
            max_tokens: self.completion.max_tokens,
            temperature: self.completion.temperature,
            timeout: self.bounded_by_step(self.completion.timeout_secs),
        }
    }

    pub fn retriever_settings(&self) -> RetrieverSettings {
        RetrieverSettings {
            top_k: self.search.top_k,
            search_fields: self.search.search_fields.clone(),
            select_fields: self.search.select_fields.clone(),
            mode: self.search.mode,
            timeout: self.bounded_by_step(self.search.timeout_secs),
        }
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            lock_duration: Duration::from_secs(self.queues.lock_duration_secs),
            max_delivery_count: self.queues.max_delivery_count,
            time_to_live: Duration::from_secs(self.queues.time_to_live_secs),
        }
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.step_timeout_secs)
    }

    /// Backend call timeout, never longer than the step timeout.
    fn bounded_by_step(&self, backend_secs: u64) -> Duration {
        Duration::from_secs(backend_secs.min(self.pipeline.step_timeout_secs))
    }

    pub fn resolution_target(&self) -> Duration {
        Duration::from_secs(self.pipeline.resolution_target_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> ConfigResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be a number, got '{raw}'")))
}
