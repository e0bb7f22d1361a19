//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// storytwin - story effort estimation orchestrator
#[derive(Parser)]
#[command(
    name = "st",
    about = "Estimate, research and plan user stories in batches",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/storytwin/logs/storytwin.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Estimate and plan every story in a batch file
    Run {
        /// JSON file: a list of stories or a single story
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a batch file without dispatching anything
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,

    /// Show logs
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Output format for reports
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storytwin")
        .join("logs")
        .join("storytwin.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["st"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["st", "run", "stories.json", "--format", "json"]);
        if let Some(Command::Run { file, format }) = cli.command {
            assert_eq!(file, PathBuf::from("stories.json"));
            assert_eq!(format, OutputFormat::Json);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_run_default_format() {
        let cli = Cli::parse_from(["st", "run", "stories.json"]);
        assert!(matches!(
            cli.command,
            Some(Command::Run {
                format: OutputFormat::Text,
                ..
            })
        ));
    }

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::parse_from(["st", "check", "stories.json"]);
        assert!(matches!(cli.command, Some(Command::Check { .. })));
    }

    #[test]
    fn test_cli_parse_logs() {
        let cli = Cli::parse_from(["st", "logs", "-n", "10"]);
        assert!(matches!(cli.command, Some(Command::Logs { lines: 10 })));
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["st", "-c", "/path/to/config.yml", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert!(matches!(cli.command, Some(Command::Config)));
    }
}
