//! Classification prompt construction.

use crate::ticket::{AgentKind, Priority, Ticket};

/// System instruction sent with every classification request.
pub const CLASSIFIER_SYSTEM_INSTRUCTION: &str =
    "You are an expert IT support ticket classifier. Respond only with valid JSON.";

/// Build the user prompt for a ticket: title, description, current
/// priority, the fixed agent roster, and the required JSON answer shape.
pub fn build_classification_prompt(ticket: &Ticket) -> String {
    let priority = ticket.priority.unwrap_or(Priority::Medium);

    let roster = AgentKind::ALL
        .iter()
        .map(|agent| format!("- {}: {}", agent, agent.responsibility()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Classify this IT support ticket and assign to the appropriate agent:

Title: {title}
Description: {description}
Current Priority: {priority}

Available Agents:
{roster}

Respond ONLY with valid JSON in this exact format:
{{
    "agent": "agent_name",
    "category": "category_name",
    "priority": "Low|Medium|High|Critical",
    "confidence": 0.95,
    "resolution_time": "30s",
    "reasoning": "brief explanation"
}}
"#,
        title = ticket.title,
        description = ticket.description,
    )
}
