use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use coordination::config::ResolveConfig;
use coordination::pipeline::{ProcessingLog, TicketStatus};
use coordination::secrets::EnvSecretStore;
use resolve_service::app::{build_pipeline, load_ticket, load_tickets};
use resolve_service::cli::{Cli, Command};
use resolve_service::http;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = ResolveConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    if let Command::Batch {
        max_concurrent: Some(n),
        ..
    } = &cli.command
    {
        config.pipeline.max_concurrent = *n;
        config.validate()?;
    }

    let pipeline = build_pipeline(&config, &EnvSecretStore, cli.offline).await?;

    match cli.command {
        Command::Process { ticket } => {
            let ticket = load_ticket(&ticket)?;
            let log = pipeline.process(&ticket).await;
            print_json(&log)?;
            Ok(exit_code(std::slice::from_ref(&log)))
        }
        Command::Batch { tickets, .. } => {
            let tickets = load_tickets(&tickets)?;
            info!(count = tickets.len(), max_concurrent = pipeline.max_concurrent, "Processing batch");
            let logs = pipeline.process_batch(tickets).await;
            print_json(&logs)?;
            Ok(exit_code(&logs))
        }
        Command::Serve { bind } => {
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            info!(%bind, "Serving resolve API");
            axum::serve(listener, http::router(Arc::new(pipeline)))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("resolve_service=info,coordination=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(logs: &[ProcessingLog]) -> ExitCode {
    let failed = logs
        .iter()
        .filter(|log| log.status() == TicketStatus::Failed)
        .count();
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        warn!(failed, total = logs.len(), "Some tickets failed");
        ExitCode::FAILURE
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
