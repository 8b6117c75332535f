mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, logs::LogsSubcommand, route::RouteArgs,
    secrets::SecretsSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relay",
    about = "Reconcile runbook execution events and route alert notifications",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .relay/ or .git/)
    #[arg(long, global = true, env = "RELAY_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize relay in the current project
    Init,

    /// Show reconciled executions for a day partition
    Executions {
        /// Partition key YYYYMMDD (default: today, UTC)
        #[arg(long, short = 'p')]
        partition: Option<String>,

        /// Show at most N executions
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Decide which channels each execution notifies
    Route(RouteArgs),

    /// Query or ingest raw log events
    Logs {
        #[command(subcommand)]
        subcommand: LogsSubcommand,
    },

    /// Inspect, validate and replace the routing config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage channel secrets in .relay/secrets.env
    Secrets {
        #[command(subcommand)]
        subcommand: SecretsSubcommand,
    },

    /// Run the HTTP API
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, env = "RELAY_PORT", default_value = "3150")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Executions { partition, limit } => {
            cmd::executions::run(&root, partition.as_deref(), limit, cli.json)
        }
        Commands::Route(args) => cmd::route::run(&root, args, cli.json),
        Commands::Logs { subcommand } => cmd::logs::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Secrets { subcommand } => cmd::secrets::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
