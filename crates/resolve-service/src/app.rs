//! Pipeline wiring: backends, agents, metrics and the coordinator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::agents::{AgentRegistry, LearningAgent, QueuedAgent};
use coordination::analytics::{MetricsAggregator, MetricsHandle};
use coordination::backend::{
    CompletionBackend, HttpSearchBackend, OpenAiCompletionBackend, SearchBackend,
    UnavailableBackend,
};
use coordination::config::ResolveConfig;
use coordination::knowledge::KnowledgeRetriever;
use coordination::pipeline::{Coordinator, ProcessingLog, SharedCoordinator, StepExecutor};
use coordination::queue::InMemoryWorkQueue;
use coordination::router::Classifier;
use coordination::secrets::SecretStore;
use coordination::ticket::Ticket;
use serde::Deserialize;
use tracing::info;

/// Everything a front end needs to serve tickets.
pub struct Pipeline {
    pub coordinator: SharedCoordinator,
    pub learning: Arc<LearningAgent>,
    pub metrics: MetricsHandle,
    /// Present when some agents are served out of process.
    pub queue: Option<Arc<InMemoryWorkQueue>>,
    pub max_concurrent: usize,
}

impl Pipeline {
    pub async fn process(&self, ticket: &Ticket) -> ProcessingLog {
        self.coordinator.process(ticket).await
    }

    pub async fn process_batch(&self, tickets: Vec<Ticket>) -> Vec<ProcessingLog> {
        self.coordinator
            .process_batch(tickets, self.max_concurrent)
            .await
    }
}

/// Build the pipeline. With `offline`, no endpoints or secrets are needed
/// and every ticket is served by the fallback tier.
pub async fn build_pipeline(
    config: &ResolveConfig,
    secrets: &dyn SecretStore,
    offline: bool,
) -> Result<Pipeline> {
    let (completion, search): (Arc<dyn CompletionBackend>, Arc<dyn SearchBackend>) = if offline {
        info!("Offline mode: using rule-based classification and canned knowledge");
        let completion: Arc<dyn CompletionBackend> = Arc::new(UnavailableBackend);
        let search: Arc<dyn SearchBackend> = Arc::new(UnavailableBackend);
        (completion, search)
    } else {
        let (completion_url, search_url) = config.require_endpoints()?;
        let completion_key = secrets
            .get_secret(&config.secrets.completion_api_key)
            .await?;
        let search_key = secrets.get_secret(&config.secrets.search_admin_key).await?;

        let completion = OpenAiCompletionBackend::new(
            completion_url,
            completion_key,
            Duration::from_secs(config.completion.timeout_secs),
        )
        .context("Failed to build completion client")?;
        let search = HttpSearchBackend::new(
            search_url,
            config.search.index.clone(),
            search_key,
            Duration::from_secs(config.search.timeout_secs),
        )
        .context("Failed to build search client")?
        .with_api_version(config.search.api_version.clone());

        info!(
            completion = %completion_url,
            model = %config.completion.model,
            search = %search_url,
            index = %config.search.index,
            "Backends configured"
        );
        let completion: Arc<dyn CompletionBackend> = Arc::new(completion);
        let search: Arc<dyn SearchBackend> = Arc::new(search);
        (completion, search)
    };

    let learning = Arc::new(LearningAgent::new());
    let mut agents = AgentRegistry::builtin(learning.clone());

    let queue = if config.queues.remote_agents.is_empty() {
        None
    } else {
        let queue = Arc::new(InMemoryWorkQueue::with_agent_queues(config.queue_settings()));
        for agent in &config.queues.remote_agents {
            info!(agent = %agent, queue = %agent.queue_name(), "Agent served through work queue");
            agents.register(Arc::new(QueuedAgent::new(*agent, queue.clone())));
        }
        Some(queue)
    };

    let executor = StepExecutor::new(
        Arc::new(Classifier::new(completion, config.classifier_settings())),
        Arc::new(KnowledgeRetriever::new(search, config.retriever_settings())),
        agents,
        config.step_timeout(),
    );

    let (metrics, _task) = MetricsAggregator::spawn();
    let coordinator = Coordinator::new(Arc::new(executor), config.resolution_target())
        .with_metrics(metrics.clone())
        .shared();

    Ok(Pipeline {
        coordinator,
        learning,
        metrics,
        queue,
        max_concurrent: config.pipeline.max_concurrent,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TicketFile {
    List(Vec<Ticket>),
    Wrapped { tickets: Vec<Ticket> },
}

/// Parse a batch: a JSON array of tickets or `{"tickets": [...]}`.
pub fn parse_tickets(raw: &str) -> Result<Vec<Ticket>> {
    let file: TicketFile = serde_json::from_str(raw)
        .context("Expected a JSON array of tickets or an object with a \"tickets\" array")?;
    let tickets = match file {
        TicketFile::List(tickets) | TicketFile::Wrapped { tickets } => tickets,
    };
    for ticket in &tickets {
        ticket.validate()?;
    }
    Ok(tickets)
}

pub fn load_tickets(path: &Path) -> Result<Vec<Ticket>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_tickets(&raw)
}

pub fn load_ticket(path: &Path) -> Result<Ticket> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let ticket: Ticket = serde_json::from_str(&raw).context("Invalid ticket JSON")?;
    ticket.validate()?;
    Ok(ticket)
}
