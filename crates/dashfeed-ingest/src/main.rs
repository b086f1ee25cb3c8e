//! Dashfeed - run one scheduled ingestion task

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dashfeed_common::logging::{init_logging, LogConfig, LogLevel};
use dashfeed_ingest::config::TaskConfig;
use dashfeed_ingest::pipeline::Pipeline;
use dashfeed_ingest::record::RunMetadata;
use dashfeed_ingest::sink::RecordingSink;
use dashfeed_ingest::sources::Task;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "dashfeed")]
#[command(author, version, about = "Dashboard feed ingestion tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a source and replace its table
    Run {
        /// Task to run
        #[arg(value_enum)]
        task: Task,

        /// Configuration file (defaults to config/<task>.toml when present)
        #[arg(short, long, env = "DASHFEED_CONFIG")]
        config: Option<PathBuf>,

        /// Print the SQL instead of executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// List tasks and their destination tables
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("dashfeed")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    if let Err(e) = execute(cli.command).await {
        error!(error = %e, "Task failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute(command: Command) -> Result<()> {
    match command {
        Command::List => {
            for task in Task::ALL {
                let descriptor = task.descriptor();
                println!("{:<20} {}", descriptor.name, descriptor.table());
            }
            Ok(())
        },
        Command::Run {
            task,
            config,
            dry_run,
        } => run(task, config, dry_run).await,
    }
}

async fn run(task: Task, config_path: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let descriptor = task.descriptor();
    let name = descriptor.name;
    let config = TaskConfig::load(name, config_path.as_deref(), descriptor.defaults.clone())
        .with_context(|| format!("Failed to load configuration for {}", name))?;

    let pipeline = Pipeline::new(descriptor, config)?;

    let report = if dry_run {
        let mut sink = RecordingSink::new();
        let report = pipeline
            .run_with(&mut sink, RunMetadata::start(name))
            .await?;
        for statement in sink.statements() {
            println!("{};", statement.sql);
        }
        report
    } else {
        pipeline.run().await?
    };

    info!(
        task = %report.task,
        table = %report.table,
        requests = report.requests,
        records = report.records,
        rows = report.rows_written,
        truncated = report.truncated_values,
        dry_run,
        "Task finished"
    );
    Ok(())
}
