//! TutorFlow - adaptive tutoring engine CLI
//!
//! Administers adaptation rules, recommendations and tutor prompts stored in
//! a local libSQL database, and runs the maintenance jobs.

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{self, EnvFilter};
use tutorflow_core::{error::Result, EngineConfig};

use cli::helpers::{get_db_path, CliContext};

#[derive(Parser)]
#[command(name = "tutorflow")]
#[command(about = "Adaptive tutoring engine: rules, recommendations and tutor prompts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database path (overrides TUTORFLOW_DB_PATH, the config file and the default)
    #[arg(long)]
    db_path: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "TUTORFLOW_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init {
        /// Database path (defaults to the global --db-path resolution)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Manage adaptation rules
    Rule {
        #[command(subcommand)]
        action: cli::rules::RuleAction,
    },

    /// Show which rules apply to a learner
    Evaluate {
        #[arg(short, long)]
        user: String,

        /// Context snapshot JSON (inline or @file)
        #[arg(short, long)]
        context: String,

        /// Print full JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate and answer recommendations
    Recommend {
        #[command(subcommand)]
        action: cli::recommend::RecommendAction,
    },

    /// Manage and render tutor prompts
    Prompt {
        #[command(subcommand)]
        action: cli::prompt::PromptAction,
    },

    /// Run maintenance jobs
    Jobs {
        #[command(subcommand)]
        action: cli::jobs::JobsAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: cli::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let level = level.as_str().to_lowercase();
    let filter = EnvFilter::new(format!("tutorflow={},tutorflow_core={}", level, level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("TutorFlow v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load(cli.config.as_deref())?;
    let ctx = CliContext {
        db_path: get_db_path(cli.db_path, &config),
        config,
    };

    match cli.command {
        Commands::Init { database } => cli::init::handle(database, &ctx).await,
        Commands::Rule { action } => cli::rules::handle(action, &ctx).await,
        Commands::Evaluate {
            user,
            context,
            json,
        } => cli::evaluate::handle(user, context, json, &ctx).await,
        Commands::Recommend { action } => cli::recommend::handle(action, &ctx).await,
        Commands::Prompt { action } => cli::prompt::handle(action, &ctx).await,
        Commands::Jobs { action } => cli::jobs::handle(action, &ctx).await,
        Commands::Config { action } => cli::config::handle(action, &ctx).await,
    }
}
