//! Two-tier knowledge retriever.
//!
//! "No results" and "lookup failed" are different outcomes here. A search
//! backend that answers with zero hits yields an empty primary result; only
//! a backend error (or a response with nothing usable in it) falls back to
//! the canned articles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use super::query::build_query;
use super::{KnowledgeMatch, KnowledgeResult};
use crate::backend::{SearchBackend, SearchHit, SearchMode, SearchRequest};
use crate::error::{BackendError, BackendResult};
use crate::fallback::FallbackRuleEngine;
use crate::resilience::{call_with_timeout, BackendHealth, ResultSource};
use crate::ticket::Ticket;

/// Search parameters.
#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub top_k: usize,
    pub search_fields: Vec<String>,
    pub select_fields: Vec<String>,
    pub mode: SearchMode,
    pub timeout: Duration,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            search_fields: vec!["title".into(), "content".into(), "category".into()],
            select_fields: vec![
                "id".into(),
                "title".into(),
                "content".into(),
                "category".into(),
            ],
            mode: SearchMode::All,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A hit is usable when it has a finite score and some text to show.
fn is_usable(hit: &SearchHit) -> bool {
    hit.score.is_finite() && !(hit.title.is_empty() && hit.content.is_empty())
}

pub struct KnowledgeRetriever {
    backend: Arc<dyn SearchBackend>,
    fallback: FallbackRuleEngine,
    settings: RetrieverSettings,
    health: Mutex<BackendHealth>,
}

impl KnowledgeRetriever {
    pub fn new(backend: Arc<dyn SearchBackend>, settings: RetrieverSettings) -> Self {
        let health = Mutex::new(BackendHealth::new(backend.name()));
        Self {
            backend,
            fallback: FallbackRuleEngine::new(),
            settings,
            health,
        }
    }

    /// Look up knowledge for a ticket. Never fails.
    pub async fn retrieve(&self, ticket: &Ticket) -> KnowledgeResult {
        let query = build_query(ticket);
        let outcome = self.retrieve_primary(&query).await;
        self.record_health(&outcome);

        match outcome {
            Ok(matches) => {
                debug!(
                    ticket_id = %ticket.id,
                    query = %query,
                    matches = matches.len(),
                    "Primary knowledge lookup"
                );
                KnowledgeResult::new(query, matches, ResultSource::Primary)
            }
            Err(e) => {
                warn!(
                    ticket_id = %ticket.id,
                    backend = self.backend.name(),
                    error_kind = e.kind(),
                    "Search backend failed, using canned knowledge: {}",
                    e
                );
                self.fallback.retrieve(ticket)
            }
        }
    }

    /// Single attempt against the search backend, keeping backend order.
    pub async fn retrieve_primary(&self, query: &str) -> BackendResult<Vec<KnowledgeMatch>> {
        let request = SearchRequest {
            query_text: query.to_string(),
            search_fields: self.settings.search_fields.clone(),
            select_fields: self.settings.select_fields.clone(),
            top_k: self.settings.top_k,
            mode: self.settings.mode,
        };

        let hits = call_with_timeout(self.settings.timeout, self.backend.search(&request)).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let returned = hits.len();
        let matches: Vec<KnowledgeMatch> = hits
            .into_iter()
            .filter(is_usable)
            .take(self.settings.top_k)
            .map(KnowledgeMatch::from)
            .collect();

        if matches.is_empty() {
            return Err(BackendError::MalformedResponse(format!(
                "none of {returned} search hits were usable"
            )));
        }
        Ok(matches)
    }

    pub fn health(&self) -> BackendHealth {
        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record_health<T>(&self, outcome: &BackendResult<T>) {
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
