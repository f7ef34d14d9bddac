mod cli;
mod server;
mod tools;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use capsules::capsule::graph::Direction;
use capsules::capsule::recall::RecallQuery;
use capsules::capsule::store::ListFilter;
use capsules::capsule::types::{CapsuleType, Status};
use capsules::config::CapsulesConfig;

#[derive(Parser)]
#[command(name = "capsules", version, about = "Decision capsule knowledge base and MCP server")]
struct Cli {
    /// Config file (defaults to ~/.capsules/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Transport: stdio or http (overrides config)
        #[arg(long)]
        transport: Option<String>,
    },
    /// Recall capsules relevant to files, tags or text
    Recall {
        /// File paths being worked on
        #[arg(long = "file", short = 'f')]
        files: Vec<String>,
        /// Tag queries
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
        /// Free-text search
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Print a prompt context block within this many tokens
        #[arg(long)]
        budget: Option<usize>,
    },
    /// List capsules
    List {
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        phase: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        file: Option<String>,
        /// active or invalidated
        #[arg(long)]
        status: Option<Status>,
        /// decision or finding
        #[arg(long = "type")]
        kind: Option<CapsuleType>,
        #[arg(long)]
        include_invalidated: bool,
        /// Show every phase revision of a question
        #[arg(long)]
        evolution: bool,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show one capsule in full
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the dependency graph around a capsule
    Graph {
        id: String,
        #[arg(long)]
        depth: Option<usize>,
        /// up, down or both
        #[arg(long, default_value = "both")]
        direction: Direction,
        #[arg(long)]
        json: bool,
    },
    /// List tags with usage counts
    Tags {
        /// Only tags with this prefix (file, table, service, concept, api)
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Invalidate a capsule
    Invalidate {
        id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        learned: Option<String>,
        #[arg(long)]
        superseded_by: Option<String>,
    },
    /// Check a proposed decision for duplicates and contradictions
    Check {
        #[arg(long)]
        question: String,
        #[arg(long)]
        choice: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Attach git commits to a capsule or a whole session
    LinkCommits {
        #[arg(long, conflicts_with = "session")]
        id: Option<String>,
        #[arg(long)]
        session: Option<String>,
        #[arg(required = true)]
        commits: Vec<String>,
    },
    /// Show store statistics
    Stats {
        #[arg(long)]
        session: Option<String>,
    },
    /// Check session files and the repo registry
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = match cli.config {
        Some(ref path) => CapsulesConfig::load_from(path)?,
        None => CapsulesConfig::load()?,
    };

    // Initialize tracing with the configured log level.
    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "http" => server::serve_http(config).await?,
                other => bail!("unknown transport: {other} (expected stdio or http)"),
            }
        }
        Command::Recall {
            files,
            tags,
            text,
            repo,
            limit,
            budget,
        } => {
            let query = RecallQuery {
                files,
                tags,
                text,
                repo,
                limit,
            };
            cli::recall::recall(&config, query, budget)?;
        }
        Command::List {
            session,
            repo,
            phase,
            tag,
            file,
            status,
            kind,
            include_invalidated,
            evolution,
            limit,
            json,
        } => {
            let filter = ListFilter {
                session,
                repo,
                phase,
                tag,
                file_path: file,
                status,
                kind,
                include_invalidated,
                show_evolution: evolution,
            };
            cli::list::list(&config, &filter, limit, json)?;
        }
        Command::Show { id, json } => cli::inspect::inspect(&config, &id, json)?,
        Command::Graph {
            id,
            depth,
            direction,
            json,
        } => cli::graph::graph(&config, &id, depth, direction, json)?,
        Command::Tags { prefix } => cli::tags::tags(&config, prefix.as_deref())?,
        Command::Invalidate {
            id,
            reason,
            learned,
            superseded_by,
        } => cli::invalidate::invalidate(
            &config,
            &id,
            &reason,
            learned.as_deref(),
            superseded_by.as_deref(),
        )?,
        Command::Check {
            question,
            choice,
            session,
        } => cli::check::check(&config, &question, &choice, session)?,
        Command::LinkCommits {
            id,
            session,
            commits,
        } => cli::link_commits::link_commits(&config, id.as_deref(), session.as_deref(), &commits)?,
        Command::Stats { session } => cli::stats::stats(&config, session.as_deref())?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
