use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Automated support ticket resolution.
#[derive(Debug, Parser)]
#[command(name = "resolve-service", version)]
pub struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true, env = "RESOLVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip the completion and search backends and serve every ticket from
    /// the rule-based tier.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process a single ticket read from a JSON file.
    Process {
        #[arg(long)]
        ticket: PathBuf,
    },
    /// Process a batch of tickets concurrently.
    Batch {
        /// JSON array of tickets, or an object with a `tickets` array.
        #[arg(long)]
        tickets: PathBuf,
        /// Overrides `pipeline.max_concurrent`.
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },
}
