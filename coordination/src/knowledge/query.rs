//! Search query construction.

use crate::ticket::Ticket;

/// Fixed vocabulary of technical terms, in extraction order.
pub const TECHNICAL_VOCABULARY: &[&str] = &[
    "ssl",
    "https",
    "certificate",
    "deployment",
    "configuration",
    "database",
    "api",
    "authentication",
    "caching",
    "redis",
    "performance",
    "timeout",
    "error",
    "security",
    "vulnerability",
];

const MAX_KEY_TERMS: usize = 5;

/// Vocabulary terms found (case-insensitive substring) in `text`, in
/// vocabulary order, at most five.
pub fn extract_key_terms(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    TECHNICAL_VOCABULARY
        .iter()
        .copied()
        .filter(|term| lowered.contains(term))
        .take(MAX_KEY_TERMS)
        .collect()
}

/// Ticket title followed by the key terms of its description.
pub fn build_query(ticket: &Ticket) -> String {
    let terms = extract_key_terms(&ticket.description);
    if terms.is_empty() {
        return ticket.title.clone();
    }
    format!("{} {}", ticket.title, terms.join(" "))
}
