use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "foreman")]
#[command(version, about = "Phase-gated multi-agent project tracker")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding the artifact tree and .foreman/ state
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the state directory and start tracking a project
    Init {
        /// Project name (defaults to the configured identity)
        #[arg(long)]
        name: Option<String>,

        /// Project version
        #[arg(long)]
        version: Option<String>,
    },
    /// Show the active project, its agents, and the phase timeline
    Status,
    /// Validate the current phase and move to the target phase
    Advance {
        /// Target phase number (1-6)
        phase: i64,
    },
    /// Record an agent update
    Agent {
        /// Agent name (architect, planner, backend, frontend, qa, devops, docs)
        name: String,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        progress: Option<String>,

        #[arg(long)]
        todos_completed: Option<i64>,

        #[arg(long)]
        todos_total: Option<i64>,
    },
    /// Show recent audit events
    Events {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Write the active project as a snapshot document
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a snapshot document as a new project
    Import {
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "foreman=debug" } else { "foreman=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init { name, version } => {
            cmd::cmd_init(&project_dir, name.as_deref(), version.as_deref())?;
        }
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Advance { phase } => cmd::cmd_advance(&project_dir, *phase)?,
        Commands::Agent { name, status, progress, todos_completed, todos_total } => {
            cmd::cmd_agent(
                &project_dir,
                name,
                status.as_deref(),
                progress.as_deref(),
                *todos_completed,
                *todos_total,
            )?;
        }
        Commands::Events { limit } => cmd::cmd_events(&project_dir, *limit)?,
        Commands::Export { output } => cmd::cmd_export(&project_dir, output.as_deref())?,
        Commands::Import { file } => cmd::cmd_import(&project_dir, file)?,
    }

    Ok(())
}
