//! External backends consumed by the pipeline.
//!
//! - [`CompletionBackend`]: any text-completion service (used by the Classifier)
//! - [`SearchBackend`]: any ranked-document search service (used by the
//!   KnowledgeRetriever)
//!
//! Each call is a single attempt. Retries, if wanted, belong to the caller.

pub mod openai;
pub mod search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

pub use openai::OpenAiCompletionBackend;
pub use search::HttpSearchBackend;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub model_id: String,
}

/// Token accounting reported by the completion service. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Raw completion text plus optional usage metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Text-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Identifier used in logs and health tracking.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse>;
}

/// Search mode: match any term or all terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Any,
    #[default]
    All,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::All => write!(f, "all"),
        }
    }
}

/// A ranked search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_text: String,
    pub search_fields: Vec<String>,
    pub select_fields: Vec<String>,
    pub top_k: usize,
    pub mode: SearchMode,
}

/// One document returned by the search service, in backend order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub score: f64,
}

/// Ranked-document search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Identifier used in logs and health tracking.
    fn name(&self) -> &str;

    /// Returns hits in the backend's own ranking order. An empty vector
    /// means "no results", which is not an error.
    async fn search(&self, request: &SearchRequest) -> BackendResult<Vec<SearchHit>>;
}

/// Backend that is never reachable. Used for offline operation, where
/// every ticket is served by the deterministic fallback tier.
#[derive(Debug, Clone, Default)]
pub struct UnavailableBackend;

#[async_trait]
impl CompletionBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "offline-completion"
    }

    async fn complete(&self, _request: &CompletionRequest) -> BackendResult<CompletionResponse> {
        Err(BackendError::Unavailable("offline mode".into()))
    }
}

#[async_trait]
impl SearchBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "offline-search"
    }

    async fn search(&self, _request: &SearchRequest) -> BackendResult<Vec<SearchHit>> {
        Err(BackendError::Unavailable("offline mode".into()))
    }
}

/// Map a reqwest transport error onto the backend taxonomy.
pub(crate) fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_decode() {
        BackendError::MalformedResponse(err.to_string())
    } else {
        BackendError::Unavailable(err.to_string())
    }
}
