//! Knowledge lookup: query extraction, ranked search, canned fallback.

pub mod query;
pub mod retriever;

use serde::{Deserialize, Serialize};

use crate::backend::SearchHit;
use crate::resilience::ResultSource;

pub use query::{build_query, extract_key_terms, TECHNICAL_VOCABULARY};
pub use retriever::{KnowledgeRetriever, RetrieverSettings};

/// One knowledge article matched for a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub relevance_score: f64,
}

impl From<SearchHit> for KnowledgeMatch {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            title: hit.title,
            content: hit.content,
            category: hit.category,
            relevance_score: hit.score,
        }
    }
}

/// Result of a knowledge lookup. `matches` keeps the backend's ranking;
/// `best_match` is always the first match, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeResult {
    pub query: String,
    pub matches: Vec<KnowledgeMatch>,
    pub best_match: Option<KnowledgeMatch>,
    pub source: ResultSource,
}

impl KnowledgeResult {
    pub fn new(query: String, matches: Vec<KnowledgeMatch>, source: ResultSource) -> Self {
        let best_match = matches.first().cloned();
        Self {
            query,
            matches,
            best_match,
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
