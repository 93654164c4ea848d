//! Integration tests for the ticket pipeline
//!
//! Drives the Coordinator end to end with hand-written mock backends and
//! agents, covering the fallback paths, step ordering, failure handling,
//! cancellation, batching and metrics.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coordination::agents::{AgentHandler, AgentRegistry, LearningAgent, QueuedAgent, StepContext};
use coordination::analytics::MetricsAggregator;
use coordination::backend::{
    CompletionBackend, CompletionRequest, CompletionResponse, SearchBackend, SearchHit,
    SearchRequest,
};
use coordination::error::{AgentError, AgentResult, BackendError, BackendResult};
use coordination::knowledge::{KnowledgeRetriever, RetrieverSettings};
use coordination::pipeline::{
    Coordinator, ProcessingLog, StepExecutor, StepOutcome, StepPayload, TicketStatus,
};
use coordination::queue::{InMemoryWorkQueue, QueueSettings, WorkQueue};
use coordination::resilience::ResultSource;
use coordination::router::{Classifier, ClassifierSettings};
use coordination::ticket::{AgentKind, AgentName, Ticket};
use tokio_util::sync::CancellationToken;

/// Completion backend that replays a fixed reply and records prompts.
struct MockCompletion {
    reply: BackendResult<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    fn failing() -> Arc<Self> {
        Self::with_reply(Err(BackendError::Unavailable("connection refused".into())))
    }

    fn with_reply(reply: BackendResult<String>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.user_prompt.clone());
        self.reply.clone().map(|text| CompletionResponse { text, usage: None })
    }
}

/// Search backend that replays fixed hits and records queries.
struct MockSearch {
    reply: BackendResult<Vec<SearchHit>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    fn with_reply(reply: BackendResult<Vec<SearchHit>>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            queries: Mutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for MockSearch {
    fn name(&self) -> &str {
        "mock-search"
    }

    async fn search(&self, request: &SearchRequest) -> BackendResult<Vec<SearchHit>> {
        self.queries
            .lock()
            .unwrap()
            .push(request.query_text.clone());
        self.reply.clone()
    }
}

/// Agent that always raises.
struct RaisingAgent(AgentName);

#[async_trait]
impl AgentHandler for RaisingAgent {
    fn name(&self) -> AgentName {
        self.0
    }

    async fn process(&self, _ticket: &Ticket, _ctx: &StepContext) -> AgentResult<serde_json::Value> {
        Err(AgentError::failed(self.0.as_str(), "workflow engine crashed"))
    }
}

/// Agent that cancels the run it is part of, then succeeds.
struct CancellingAgent {
    name: AgentName,
    token: CancellationToken,
}

#[async_trait]
impl AgentHandler for CancellingAgent {
    fn name(&self) -> AgentName {
        self.name
    }

    async fn process(&self, _ticket: &Ticket, _ctx: &StepContext) -> AgentResult<serde_json::Value> {
        self.token.cancel();
        Ok(serde_json::json!({ "done": true }))
    }
}

fn builtin_agents() -> AgentRegistry {
    AgentRegistry::builtin(Arc::new(LearningAgent::new()))
}

fn coordinator(
    completion: Arc<MockCompletion>,
    search: Arc<MockSearch>,
    agents: AgentRegistry,
) -> Coordinator {
    let executor = StepExecutor::new(
        Arc::new(Classifier::new(completion, ClassifierSettings::default())),
        Arc::new(KnowledgeRetriever::new(search, RetrieverSettings::default())),
        agents,
        Duration::from_secs(5),
    );
    Coordinator::new(Arc::new(executor), Duration::from_secs(120))
}

fn agents_of(log: &ProcessingLog) -> Vec<AgentName> {
    log.steps().iter().map(|s| s.agent).collect()
}

fn assert_total_is_sum(log: &ProcessingLog) {
    let sum: f64 = log.steps().iter().map(|s| s.duration_secs).sum();
    assert_eq!(log.total_duration_secs(), sum);
}

fn article(id: &str, score: f64) -> SearchHit {
    SearchHit {
        id: id.into(),
        title: format!("Article {id}"),
        content: "Renew the certificate in the vault".into(),
        category: "Security".into(),
        score,
    }
}

/// Test: knowledge keywords route to the knowledge step when the model is down
#[tokio::test]
async fn test_scenario_a_fallback_routes_to_knowledge() {
    let completion = MockCompletion::failing();
    let search = MockSearch::with_reply(Ok(vec![article("kb-1", 9.1), article("kb-2", 4.0)]));
    let pipeline = coordinator(completion.clone(), search.clone(), builtin_agents());

    let ticket = Ticket::new(
        "T-A",
        "How do I configure SSL?",
        "need documentation for certificate setup",
    );
    let log = pipeline.process(&ticket).await;

    assert_eq!(completion.calls(), 1);
    assert_eq!(
        agents_of(&log),
        vec![AgentName::Triage, AgentName::Knowledge, AgentName::Analytics]
    );

    let triage = &log.steps()[0];
    assert_eq!(triage.outcome, StepOutcome::Fallback);
    let classification = triage.payload.classification().unwrap();
    assert_eq!(classification.assigned_agent, AgentKind::Knowledge);
    assert_eq!(classification.confidence, 0.85);
    assert_eq!(classification.source, ResultSource::Fallback);

    match &log.steps()[1].payload {
        StepPayload::Knowledge(result) => {
            assert_eq!(result.source, ResultSource::Primary);
            assert_eq!(result.best_match.as_ref().unwrap().id, "kb-1");
        }
        other => panic!("expected knowledge payload, got {other:?}"),
    }
    assert_eq!(
        search.queries(),
        vec!["How do I configure SSL? certificate".to_string()]
    );

    assert_eq!(log.status(), TicketStatus::Completed);
    assert!(log.error().is_none());
    assert!(log.within_target());
    assert_total_is_sum(&log);
}

/// Test: security keywords escalate when the model is down
#[tokio::test]
async fn test_scenario_b_fallback_escalates() {
    let pipeline = coordinator(
        MockCompletion::failing(),
        MockSearch::with_reply(Ok(vec![])),
        builtin_agents(),
    );
    let ticket = Ticket::new(
        "T-B",
        "Production outage",
        "critical security vulnerability, urgent",
    );
    let log = pipeline.process(&ticket).await;

    assert_eq!(
        agents_of(&log),
        vec![AgentName::Triage, AgentName::Escalation, AgentName::Analytics]
    );
    let classification = log.steps()[0].payload.classification().unwrap();
    assert_eq!(classification.assigned_agent, AgentKind::Escalation);
    assert_eq!(log.status(), TicketStatus::Completed);
}

/// Test: no vocabulary terms means a title-only query, and zero hits stay primary
#[tokio::test]
async fn test_scenario_c_title_only_query_and_empty_results() {
    let reply = r#"{"agent": "Knowledge", "category": "Hardware", "confidence": 0.9}"#;
    let search = MockSearch::with_reply(Ok(vec![]));
    let pipeline = coordinator(
        MockCompletion::with_reply(Ok(reply.into())),
        search.clone(),
        builtin_agents(),
    );
    let ticket = Ticket::new("T-C", "Printer keeps jamming", "paper stuck in tray two");
    let log = pipeline.process(&ticket).await;

    assert_eq!(search.queries(), vec!["Printer keeps jamming".to_string()]);

    let knowledge = &log.steps()[1];
    assert_eq!(knowledge.agent, AgentName::Knowledge);
    assert_eq!(knowledge.outcome, StepOutcome::Success);
    match &knowledge.payload {
        StepPayload::Knowledge(result) => {
            assert_eq!(result.source, ResultSource::Primary);
            assert!(result.matches.is_empty());
            assert!(result.best_match.is_none());
        }
        other => panic!("expected knowledge payload, got {other:?}"),
    }
    assert_eq!(log.status(), TicketStatus::Completed);
}

/// Test: a raising agent fails the ticket but analytics still runs
#[tokio::test]
async fn test_scenario_d_failed_agent_still_runs_analytics() {
    let agents = builtin_agents().with(Arc::new(RaisingAgent(AgentName::Automation)));
    let pipeline = coordinator(
        MockCompletion::failing(),
        MockSearch::with_reply(Ok(vec![])),
        agents,
    );
    let ticket = Ticket::new("T-D", "Deploy failed", "the release workflow is stuck");
    let log = pipeline.process(&ticket).await;

    assert_eq!(
        agents_of(&log),
        vec![AgentName::Triage, AgentName::Automation, AgentName::Analytics]
    );
    assert_eq!(log.steps()[1].outcome, StepOutcome::Failed);
    assert_eq!(log.steps()[2].outcome, StepOutcome::Success);
    assert_eq!(log.status(), TicketStatus::Failed);

    let error = log.error().unwrap();
    assert!(!error.is_empty());
    assert!(error.contains("workflow engine crashed"));
    assert_total_is_sum(&log);
}

/// Test: a usable model answer is tagged primary and routes where it says
#[tokio::test]
async fn test_primary_classification_routes_to_learning() {
    let reply = r#"Here you go:
{"agent": "Learning", "category": "Feedback", "priority": "Low",
 "confidence": 0.91, "resolution_time": "45s", "reasoning": "retraining request"}"#;
    let pipeline = coordinator(
        MockCompletion::with_reply(Ok(reply.into())),
        MockSearch::with_reply(Ok(vec![])),
        builtin_agents(),
    );
    let log = pipeline
        .process(&Ticket::new("T-E", "Suggestions were wrong", "please improve"))
        .await;

    assert_eq!(log.steps()[0].outcome, StepOutcome::Success);
    let classification = log.steps()[0].payload.classification().unwrap();
    assert_eq!(classification.source, ResultSource::Primary);
    assert_eq!(classification.estimated_resolution_secs, 45);
    assert_eq!(log.steps()[1].agent, AgentName::Learning);
}

/// Test: an agent label outside the roster is routed to escalation
#[tokio::test]
async fn test_unknown_agent_label_routes_to_escalation() {
    let pipeline = coordinator(
        MockCompletion::with_reply(Ok(r#"{"agent": "Billing"}"#.into())),
        MockSearch::with_reply(Ok(vec![])),
        builtin_agents(),
    );
    let log = pipeline
        .process(&Ticket::new("T-F", "Invoice wrong", "charged twice"))
        .await;
    assert_eq!(log.steps()[1].agent, AgentName::Escalation);
}

/// Test: malformed model output falls back, search errors fall back, ticket still completes
#[tokio::test]
async fn test_degraded_backends_still_complete() {
    let pipeline = coordinator(
        MockCompletion::with_reply(Ok("no json at all".into())),
        MockSearch::with_reply(Err(BackendError::Timeout(Duration::from_secs(30)))),
        builtin_agents(),
    );
    let ticket = Ticket::new("T-G", "How to fix slow database", "see the guide");
    let log = pipeline.process(&ticket).await;

    assert_eq!(log.steps()[0].outcome, StepOutcome::Fallback);
    assert_eq!(log.steps()[1].outcome, StepOutcome::Fallback);
    match &log.steps()[1].payload {
        StepPayload::Knowledge(result) => {
            assert_eq!(
                result.best_match.as_ref().unwrap().title,
                "Database Performance Optimization"
            );
        }
        other => panic!("expected knowledge payload, got {other:?}"),
    }
    assert_eq!(log.status(), TicketStatus::Completed);

    let health = pipeline.backend_health();
    assert_eq!(health.len(), 2);
    assert!(health.iter().all(|h| h.total_failures == 1));
}

/// Test: a token cancelled before start yields an empty failed log
#[tokio::test]
async fn test_cancelled_before_start() {
    let pipeline = coordinator(
        MockCompletion::failing(),
        MockSearch::with_reply(Ok(vec![])),
        builtin_agents(),
    );
    let token = CancellationToken::new();
    token.cancel();

    let log = pipeline
        .process_with_cancel(&Ticket::new("T-H", "x", "y"), &token)
        .await;
    assert!(log.steps().is_empty());
    assert_eq!(log.status(), TicketStatus::Failed);
    assert_eq!(log.error(), Some("cancelled"));
}

/// Test: cancellation mid-run stops at the next step boundary
#[tokio::test]
async fn test_cancelled_mid_run_truncates_log() {
    let token = CancellationToken::new();
    let agents = builtin_agents().with(Arc::new(CancellingAgent {
        name: AgentName::Escalation,
        token: token.clone(),
    }));
    let pipeline = coordinator(
        MockCompletion::failing(),
        MockSearch::with_reply(Ok(vec![])),
        agents,
    );

    let log = pipeline
        .process_with_cancel(&Ticket::new("T-I", "Printer jam", "paper stuck"), &token)
        .await;

    assert_eq!(
        agents_of(&log),
        vec![AgentName::Triage, AgentName::Escalation]
    );
    assert_eq!(log.status(), TicketStatus::Failed);
    assert_eq!(log.error(), Some("cancelled"));
    assert_total_is_sum(&log);
}

/// Test: batches process every ticket, each with its own log
#[tokio::test]
async fn test_batch_processing() {
    let pipeline = coordinator(
        MockCompletion::failing(),
        MockSearch::with_reply(Ok(vec![])),
        builtin_agents(),
    );
    let tickets: Vec<Ticket> = (0..6)
        .map(|i| Ticket::new(format!("T-{i}"), "Monthly report", "numbers look off"))
        .collect();

    let logs = pipeline.process_batch(tickets, 2).await;
    assert_eq!(logs.len(), 6);

    let mut ids: Vec<_> = logs.iter().map(|l| l.ticket_id().to_string()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6);
    for log in &logs {
        assert_eq!(log.status(), TicketStatus::Completed);
        assert_eq!(
            agents_of(log),
            vec![AgentName::Triage, AgentName::Analytics, AgentName::Analytics]
        );
    }
}

/// Test: the coordinator reports steps, tickets and backend health
#[tokio::test]
async fn test_metrics_are_aggregated() {
    let (metrics, _task) = MetricsAggregator::spawn();
    let pipeline = coordinator(
        MockCompletion::failing(),
        MockSearch::with_reply(Ok(vec![])),
        builtin_agents().with(Arc::new(RaisingAgent(AgentName::Automation))),
    )
    .with_metrics(metrics.clone());

    pipeline
        .process(&Ticket::new("T-1", "Deploy failed", "pipeline red"))
        .await;
    pipeline
        .process(&Ticket::new("T-2", "How do I configure VPN", "guide please"))
        .await;

    let snapshot = metrics.snapshot().await.unwrap();
    assert_eq!(snapshot.agents["triage"].invocations, 2);
    assert_eq!(snapshot.agents["triage"].fallbacks, 2);
    assert_eq!(snapshot.agents["automation"].failures, 1);
    assert_eq!(snapshot.agents["analytics"].invocations, 2);
    assert_eq!(snapshot.tickets.processed, 2);
    assert_eq!(snapshot.tickets.failed, 1);
    assert_eq!(snapshot.tickets.completed, 1);
    assert_eq!(
        snapshot.backends["mock-completion"].total_failures,
        2
    );
    assert!(snapshot.backends.contains_key("mock-search"));
}

/// Test: remote agents receive tickets through their work queue
#[tokio::test]
async fn test_remote_agent_is_served_through_queue() {
    let queue = Arc::new(InMemoryWorkQueue::with_agent_queues(QueueSettings::default()));
    let agents = builtin_agents().with(Arc::new(QueuedAgent::new(
        AgentName::Automation,
        queue.clone(),
    )));
    let pipeline = coordinator(
        MockCompletion::failing(),
        MockSearch::with_reply(Ok(vec![])),
        agents,
    );

    let log = pipeline
        .process(&Ticket::new("T-Q", "Deploy failed", "workflow stuck"))
        .await;
    assert_eq!(log.status(), TicketStatus::Completed);

    let message = queue.receive("automation-queue").await.unwrap().unwrap();
    assert_eq!(message.envelope.payload["ticket"]["id"], "T-Q");
    assert_eq!(
        message.envelope.payload["context"]["classification"]["assigned_agent"],
        "Automation"
    );
    queue
        .complete("automation-queue", message.lock_token)
        .await
        .unwrap();
}
