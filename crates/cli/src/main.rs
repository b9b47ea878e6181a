// taskpool CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Pool sizing flags fall back to TASKPOOL_* environment variables.

mod commands;
mod output;
mod telemetry;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskpool")]
#[command(about = "taskpool CLI - Drain simulated tasks through a fixed-size worker pool")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Log filter (overrides RUST_LOG / LOG_LEVEL)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit simulated tasks to a worker pool, then close it and wait for the drain
    Run(commands::run::RunArgs),

    /// Show the effective pool configuration
    Config {
        #[command(flatten)]
        pool: commands::PoolArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&telemetry::log_filter(cli.log.as_deref()));
    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Run(args) => commands::run::run(args, output_format, cli.quiet).await,
        Commands::Config { pool } => commands::config::run(&pool, output_format),
    }
}
