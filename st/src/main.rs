//! st - story effort estimation orchestrator
//!
//! CLI entry point: runs batches of stories through the in-process agents.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use storytwin::cli::{Cli, Command, OutputFormat, get_log_path};
use storytwin::config::Config;
use storytwin::{BatchInput, Runtime, Services, StoryRequest};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to the log file, never stdout/stderr: stdout carries the report
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Some(Command::Run { file, format }) => cmd_run(&config, &file, format).await,
        Some(Command::Check { file }) => cmd_check(&file),
        Some(Command::Config) => cmd_config(&config),
        Some(Command::Logs { lines }) => cmd_logs(lines),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn read_batch(file: &Path) -> Result<BatchInput> {
    let text = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;
    BatchInput::from_json(&text).context(format!("Rejected {}", file.display()))
}

/// Run a batch file end to end and print the report
async fn cmd_run(config: &Config, file: &Path, format: OutputFormat) -> Result<()> {
    let input = read_batch(file)?;
    info!(file = %file.display(), stories = input.len(), "cmd_run: batch accepted");

    let services = Services::from_config(config)?;
    let runtime = Runtime::start(config, services)
        .await
        .context("Failed to start agents")?;

    let report = runtime.coordinator().run(input).await;

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print!("{}", report.render_text()),
    }

    if let Ok(metrics) = runtime.metrics().await {
        info!(?metrics, "cmd_run: transport metrics");
    }
    runtime.shutdown().await.context("Failed to stop agents")?;
    Ok(())
}

/// Validate a batch file without dispatching anything
fn cmd_check(file: &Path) -> Result<()> {
    let input = read_batch(file)?;

    let mut invalid = 0;
    for (index, item) in input.into_items().into_iter().enumerate() {
        match StoryRequest::from_value(item) {
            Ok(story) => println!("{:>3}. {} {} ({})", index + 1, "ok".green(), story.title(), story.id()),
            Err(e) => {
                invalid += 1;
                println!("{:>3}. {} {}", index + 1, "invalid".red(), e);
            }
        }
    }

    if invalid > 0 {
        return Err(eyre::eyre!("{} invalid stories in {}", invalid, file.display()));
    }
    println!("{}", "Batch is valid".bold());
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}

fn cmd_logs(lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }

    Ok(())
}
