//! Ticket input types and the closed set of agent names.

use serde::{Deserialize, Serialize};

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Case-insensitive parse used at the backend parse boundary.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// A support ticket. Read-only for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, alias = "user_id", alias = "requesterId")]
    pub requester_id: String,
}

/// Rejected ticket input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid ticket: {0}")]
pub struct InvalidTicket(pub String);

impl Ticket {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            category: None,
            priority: None,
            requester_id: String::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = requester_id.into();
        self
    }

    /// Lower-cased title and description joined by a space, for keyword scans.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }

    /// Reject tickets the pipeline cannot meaningfully route.
    pub fn validate(&self) -> Result<(), InvalidTicket> {
        if self.id.trim().is_empty() {
            return Err(InvalidTicket("id must not be empty".into()));
        }
        if self.title.trim().is_empty() && self.description.trim().is_empty() {
            return Err(InvalidTicket(
                "title and description must not both be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Downstream agent a ticket can be routed to after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Knowledge,
    Automation,
    Escalation,
    Learning,
    Analytics,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Knowledge,
        AgentKind::Automation,
        AgentKind::Escalation,
        AgentKind::Learning,
        AgentKind::Analytics,
    ];

    /// Validate free text against the fixed set. Case and surrounding
    /// whitespace are ignored; anything else is rejected.
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "knowledge" => Some(Self::Knowledge),
            "automation" => Some(Self::Automation),
            "escalation" => Some(Self::Escalation),
            "learning" => Some(Self::Learning),
            "analytics" => Some(Self::Analytics),
            _ => None,
        }
    }

    /// Responsibility line shown to the completion model.
    pub fn responsibility(&self) -> &'static str {
        match self {
            Self::Knowledge => "Information requests, documentation, how-to guides",
            Self::Automation => "Technical issues, deployments, configurations, workflows",
            Self::Escalation => "Critical issues, security, account problems, complex issues",
            Self::Learning => "Model training, AI/ML issues, feedback processing",
            Self::Analytics => "Reports, dashboards, data analysis, metrics",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Knowledge => write!(f, "Knowledge"),
            Self::Automation => write!(f, "Automation"),
            Self::Escalation => write!(f, "Escalation"),
            Self::Learning => write!(f, "Learning"),
            Self::Analytics => write!(f, "Analytics"),
        }
    }
}

/// Name of a pipeline step. `Triage` is the classification step; the rest
/// mirror [`AgentKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    Triage,
    Knowledge,
    Automation,
    Escalation,
    Learning,
    Analytics,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Knowledge => "knowledge",
            Self::Automation => "automation",
            Self::Escalation => "escalation",
            Self::Learning => "learning",
            Self::Analytics => "analytics",
        }
    }

    /// Work queue that serves this agent when it runs out of process.
    pub fn queue_name(&self) -> String {
        format!("{}-queue", self.as_str())
    }
}

impl From<AgentKind> for AgentName {
    fn from(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Knowledge => Self::Knowledge,
            AgentKind::Automation => Self::Automation,
            AgentKind::Escalation => Self::Escalation,
            AgentKind::Learning => Self::Learning,
            AgentKind::Analytics => Self::Analytics,
        }
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
