//! Local agent handlers, used when an agent has no remote worker.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{AgentHandler, StepContext};
use crate::error::AgentResult;
use crate::ticket::{AgentName, Ticket};

fn automation_solution(category: &str) -> &'static str {
    match category {
        "Authentication" => "Password reset link sent, MFA token generated",
        "Software" => "Installation script created and scheduled for deployment",
        "Hardware" => "Diagnostic script generated, driver update initiated",
        "Access" => "Access request form auto-filled and submitted for approval",
        _ => "General troubleshooting steps provided",
    }
}

fn escalation_team(category: &str) -> &'static str {
    match category {
        "Network" => "Network Operations Team",
        "Hardware" => "Hardware Support Team",
        "Access" => "Security and Compliance Team",
        "Authentication" => "Identity Management Team",
        _ => "General IT Support",
    }
}

/// Category from the classification, else the ticket's own, else "General".
fn effective_category<'a>(ticket: &'a Ticket, ctx: &'a StepContext) -> &'a str {
    ctx.category()
        .or(ticket.category.as_deref())
        .unwrap_or("General")
}

/// Triggers a remediation workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomationAgent;

#[async_trait]
impl AgentHandler for AutomationAgent {
    fn name(&self) -> AgentName {
        AgentName::Automation
    }

    async fn process(&self, ticket: &Ticket, ctx: &StepContext) -> AgentResult<serde_json::Value> {
        let category = effective_category(ticket, ctx);
        let workflow_id = format!("wf-{}", ticket.id);
        info!(ticket_id = %ticket.id, workflow_id = %workflow_id, "Automation workflow triggered");

        Ok(json!({
            "automation_triggered": true,
            "workflow_id": workflow_id,
            "category": category,
            "solution": automation_solution(category),
        }))
    }
}

/// Hands the ticket to a human team.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationAgent;

#[async_trait]
impl AgentHandler for EscalationAgent {
    fn name(&self) -> AgentName {
        AgentName::Escalation
    }

    async fn process(&self, ticket: &Ticket, ctx: &StepContext) -> AgentResult<serde_json::Value> {
        let team = escalation_team(effective_category(ticket, ctx));
        let priority = ctx
            .classification
            .as_ref()
            .map(|c| c.priority)
            .or(ticket.priority)
            .unwrap_or_default();
        info!(ticket_id = %ticket.id, team, %priority, "Ticket escalated");

        Ok(json!({
            "escalated": true,
            "escalated_to": team,
            "notification_sent": true,
            "priority": priority,
        }))
    }
}

/// Resolution feedback from a requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub ticket_id: String,
    /// 1 (worst) to 5 (best).
    pub user_satisfaction: u8,
    pub resolution_successful: bool,
    #[serde(default)]
    pub comments: String,
}

/// Running totals; individual submissions are not retained.
#[derive(Debug, Clone, Copy, Default)]
struct FeedbackTally {
    total: usize,
    successful: usize,
    satisfaction_sum: u64,
}

/// Reply to a feedback submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub feedback_id: String,
    pub processed: bool,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Running view of resolution quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPerformance {
    pub total_feedback: usize,
    pub successful_resolutions: usize,
    /// Fraction in [0, 1]; 0 with no feedback.
    pub success_rate: f64,
    /// Mean satisfaction rounded to two places; 0 with no feedback.
    pub average_satisfaction: f64,
    pub recommendations: Vec<String>,
}

const LOW_SATISFACTION: f64 = 3.0;
const LOW_SUCCESS_RATE: f64 = 0.8;

/// Collects feedback and reports how well resolutions are landing.
#[derive(Debug, Default)]
pub struct LearningAgent {
    tally: Mutex<FeedbackTally>,
}

impl LearningAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_feedback(&self, feedback: Feedback) -> FeedbackReceipt {
        let count = {
            let mut tally = self
                .tally
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            tally.total += 1;
            if feedback.resolution_successful {
                tally.successful += 1;
            }
            tally.satisfaction_sum += u64::from(feedback.user_satisfaction);
            tally.total
        };
        info!(ticket_id = %feedback.ticket_id, count, "Feedback recorded");

        FeedbackReceipt {
            feedback_id: format!("FB-{count}"),
            processed: true,
            recommendations: self.performance().recommendations,
            timestamp: Utc::now(),
        }
    }

    pub fn performance(&self) -> LearningPerformance {
        let FeedbackTally {
            total,
            successful,
            satisfaction_sum,
        } = *self
            .tally
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let (success_rate, average_satisfaction) = if total == 0 {
            (0.0, 0.0)
        } else {
            let avg = satisfaction_sum as f64 / total as f64;
            (
                successful as f64 / total as f64,
                (avg * 100.0).round() / 100.0,
            )
        };

        let mut recommendations = Vec::new();
        if average_satisfaction < LOW_SATISFACTION {
            recommendations.push("Improve response quality and accuracy".to_string());
        }
        if total > 0 && success_rate < LOW_SUCCESS_RATE {
            recommendations.push("Enhance knowledge base with more solutions".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("System performing well, continue monitoring".to_string());
        }

        LearningPerformance {
            total_feedback: total,
            successful_resolutions: successful,
            success_rate,
            average_satisfaction,
            recommendations,
        }
    }
}

#[async_trait]
impl AgentHandler for LearningAgent {
    fn name(&self) -> AgentName {
        AgentName::Learning
    }

    async fn process(&self, ticket: &Ticket, _ctx: &StepContext) -> AgentResult<serde_json::Value> {
        let performance = self.performance();
        Ok(json!({
            "ticket_id": ticket.id,
            "model_updated": false,
            "performance": performance,
        }))
    }
}

/// Observes every run; always the last step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticsAgent;

#[async_trait]
impl AgentHandler for AnalyticsAgent {
    fn name(&self) -> AgentName {
        AgentName::Analytics
    }

    async fn process(&self, ticket: &Ticket, ctx: &StepContext) -> AgentResult<serde_json::Value> {
        let elapsed = ctx.elapsed_secs();
        Ok(json!({
            "metrics_updated": true,
            "category_trend": effective_category(ticket, ctx),
            "steps_observed": ctx.completed_steps.len(),
            "elapsed_secs": elapsed,
            "within_target": elapsed <= ctx.resolution_target_secs,
            "trend_analysis": "normal",
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ctx() -> StepContext {
        StepContext::new(Duration::from_secs(120))
    }

    fn feedback(satisfaction: u8, successful: bool) -> Feedback {
        Feedback {
            ticket_id: "T-1".into(),
            user_satisfaction: satisfaction,
            resolution_successful: successful,
            comments: String::new(),
        }
    }

    #[tokio::test]
    async fn test_automation_uses_category_solution() {
        let ticket = Ticket::new("T-9", "Locked out", "cannot log in").with_category("Authentication");
        let out = AutomationAgent.process(&ticket, &ctx()).await.unwrap();
        assert_eq!(out["workflow_id"], "wf-T-9");
        assert_eq!(out["solution"], "Password reset link sent, MFA token generated");
    }

    #[tokio::test]
    async fn test_escalation_default_team() {
        let ticket = Ticket::new("T-10", "Odd noise", "server hums");
        let out = EscalationAgent.process(&ticket, &ctx()).await.unwrap();
        assert_eq!(out["escalated_to"], "General IT Support");
        assert_eq!(out["priority"], "Medium");
        assert_eq!(out["notification_sent"], true);
    }

    #[test]
    fn test_learning_empty_recommends_quality() {
        let perf = LearningAgent::new().performance();
        assert_eq!(perf.total_feedback, 0);
        assert_eq!(
            perf.recommendations,
            vec!["Improve response quality and accuracy".to_string()]
        );
    }

    #[test]
    fn test_learning_tracks_rates() {
        let agent = LearningAgent::new();
        agent.record_feedback(feedback(5, true));
        agent.record_feedback(feedback(4, true));
        let receipt = agent.record_feedback(feedback(4, false));

        assert_eq!(receipt.feedback_id, "FB-3");
        let perf = agent.performance();
        assert_eq!(perf.successful_resolutions, 2);
        assert_eq!(perf.average_satisfaction, 4.33);
        assert!((perf.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            perf.recommendations,
            vec!["Enhance knowledge base with more solutions".to_string()]
        );
    }

    #[test]
    fn test_learning_totals_over_many_submissions() {
        let agent = LearningAgent::new();
        for i in 0..10_000u32 {
            agent.record_feedback(feedback(if i % 2 == 0 { 5 } else { 2 }, i % 4 != 0));
        }

        let perf = agent.performance();
        assert_eq!(perf.total_feedback, 10_000);
        assert_eq!(perf.successful_resolutions, 7_500);
        assert_eq!(perf.average_satisfaction, 3.5);
        assert_eq!(perf.success_rate, 0.75);
    }

    #[test]
    fn test_learning_healthy() {
        let agent = LearningAgent::new();
        agent.record_feedback(feedback(5, true));
        assert_eq!(
            agent.performance().recommendations,
            vec!["System performing well, continue monitoring".to_string()]
        );
    }

    #[tokio::test]
    async fn test_analytics_reports_target() {
        let mut context = ctx();
        context.resolution_target_secs = 1.0;
        context.completed_steps.push(crate::pipeline::StepSummary {
            agent: AgentName::Triage,
            outcome: crate::pipeline::StepOutcome::Success,
            duration_secs: 2.0,
        });
        let out = AnalyticsAgent
            .process(&Ticket::new("T-11", "x", "y"), &context)
            .await
            .unwrap();
        assert_eq!(out["within_target"], false);
        assert_eq!(out["steps_observed"], 1);
        assert_eq!(out["trend_analysis"], "normal");
    }
}
