//! Deterministic, offline classification and retrieval.
//!
//! Both operations are total: no I/O, no side effects, same output for the
//! same ticket. This is the tier that answers whenever a networked backend
//! raises, times out, or returns something unusable.

use crate::knowledge::{KnowledgeMatch, KnowledgeResult};
use crate::resilience::ResultSource;
use crate::router::ClassificationResult;
use crate::ticket::{AgentKind, Ticket};

/// Fixed confidence for rule-based decisions.
pub const FALLBACK_CONFIDENCE: f64 = 0.85;

/// Fixed relevance for canned knowledge articles.
pub const FALLBACK_RELEVANCE: f64 = 0.85;

/// Category used when the ticket carries none.
pub const DEFAULT_CATEGORY: &str = "General";

const FALLBACK_REASONING: &str = "Fallback rule-based classification";

/// Keyword sets in priority order. First set with any substring hit wins.
const CLASSIFICATION_RULES: &[(&[&str], AgentKind, u64)] = &[
    (
        &["how", "guide", "documentation", "configure"],
        AgentKind::Knowledge,
        30,
    ),
    (
        &["deploy", "automation", "workflow", "pipeline"],
        AgentKind::Automation,
        60,
    ),
    (
        &["security", "vulnerability", "critical", "urgent"],
        AgentKind::Escalation,
        90,
    ),
    (
        &["report", "analytics", "dashboard", "metrics"],
        AgentKind::Analytics,
        45,
    ),
];

/// Agent and resolution estimate when no rule matches.
const DEFAULT_ROUTE: (AgentKind, u64) = (AgentKind::Escalation, 120);

/// A canned knowledge article keyed by topic keyword.
struct CannedArticle {
    key: &'static str,
    title: &'static str,
    content: &'static str,
    category: &'static str,
}

/// Topic keyword → article, checked in order.
const CANNED_ARTICLES: &[CannedArticle] = &[
    CannedArticle {
        key: "ssl",
        title: "SSL Certificate Configuration Guide",
        content: "Step-by-step guide for configuring SSL certificates with Key Vault integration.",
        category: "Security",
    },
    CannedArticle {
        key: "deployment",
        title: "Deployment Troubleshooting Guide",
        content: "Common deployment issues and solutions for container apps.",
        category: "Technical",
    },
    CannedArticle {
        key: "database",
        title: "Database Performance Optimization",
        content: "Best practices for optimizing database connections and query performance.",
        category: "Performance",
    },
];

const GENERAL_ARTICLE: CannedArticle = CannedArticle {
    key: "general",
    title: "General Support Guide",
    content: "General troubleshooting steps and support resources.",
    category: "General",
};

/// Keyword rule engine. Stateless; cheap to copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRuleEngine;

impl FallbackRuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Classify by keyword. Never fails.
    pub fn classify(&self, ticket: &Ticket) -> ClassificationResult {
        let text = ticket.searchable_text();

        let (agent, resolution_secs) = CLASSIFICATION_RULES
            .iter()
            .find(|(keywords, _, _)| keywords.iter().any(|k| text.contains(k)))
            .map(|(_, agent, secs)| (*agent, *secs))
            .unwrap_or(DEFAULT_ROUTE);

        ClassificationResult {
            assigned_agent: agent,
            category: ticket
                .category
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            priority: ticket.priority.unwrap_or_default(),
            confidence: FALLBACK_CONFIDENCE,
            estimated_resolution_secs: resolution_secs,
            reasoning: FALLBACK_REASONING.to_string(),
            source: ResultSource::Fallback,
            token_usage: None,
        }
    }

    /// Return the first canned article whose key appears in the ticket, or
    /// the general article. Never fails.
    pub fn retrieve(&self, ticket: &Ticket) -> KnowledgeResult {
        let text = ticket.searchable_text();

        let article = CANNED_ARTICLES
            .iter()
            .find(|a| text.contains(a.key))
            .unwrap_or(&GENERAL_ARTICLE);

        let best = KnowledgeMatch {
            id: format!("fallback-{}", article.key),
            title: article.title.to_string(),
            content: article.content.to_string(),
            category: article.category.to_string(),
            relevance_score: FALLBACK_RELEVANCE,
        };

        KnowledgeResult::new(ticket.title.clone(), vec![best], ResultSource::Fallback)
    }
}
