use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use coursegen::coursegen_config::coursegen_dir;
use coursegen::generation::CourseLevel;
use coursegen::telemetry::{self, LogOptions};

mod cmd;

#[derive(Parser)]
#[command(name = "coursegen")]
#[command(version, about = "Start and follow AI course generation jobs")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a full course and follow its progress
    Generate(GenerateArgs),
    /// Resume following an in-flight generation
    Watch {
        /// Open the course in a browser when it completes
        #[arg(long)]
        open: bool,
    },
    /// Show the tracked generation, if any
    Status {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop tracking the current generation (the server-side job keeps running)
    Reset,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct GenerateArgs {
    /// Course topic (at least 3 characters)
    #[arg(short, long)]
    pub topic: String,

    #[arg(long)]
    pub category: Option<String>,

    /// beginner, intermediate or advanced
    #[arg(long)]
    pub level: Option<CourseLevel>,

    #[arg(long)]
    pub language: Option<String>,

    /// Target course length, e.g. "5 hours"
    #[arg(long)]
    pub duration: Option<String>,

    /// Number of chapters (1-10)
    #[arg(long)]
    pub chapters: Option<u8>,

    /// Extra instructions for the generator
    #[arg(long)]
    pub instructions: Option<String>,

    /// Open the course in a browser when it completes
    #[arg(long)]
    pub open: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default coursegen.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Only job-running commands keep a log file.
    let log_dir = matches!(cli.command, Commands::Generate(_) | Commands::Watch { .. })
        .then(|| coursegen_dir(&project_dir).join("logs"));
    let _log_guard = telemetry::init(&LogOptions {
        verbose: cli.verbose,
        json: cli.log_json,
        log_dir,
    })?;

    match &cli.command {
        Commands::Generate(args) => cmd::cmd_generate(&project_dir, &cli, args).await?,
        Commands::Watch { open } => cmd::cmd_watch(&project_dir, &cli, *open).await?,
        Commands::Status { json } => cmd::cmd_status(&project_dir, *json)?,
        Commands::Reset => cmd::cmd_reset(&project_dir)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
