// CLI module for siloq
/// Command execution handlers
pub mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{LogFormat, SiloqConfig};

/// Command-line interface for siloq
#[derive(Parser)]
#[command(name = "siloq")]
#[command(author, version, about = "In-process SQS-style message queue engine", long_about = None)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the engine with its sweeper and metrics server
    Start {
        /// Configuration file (TOML)
        #[arg(long, env = "SILOQ_CONFIG")]
        config: Option<PathBuf>,

        /// Metrics port
        #[arg(long, env = "SILOQ_METRICS_PORT")]
        metrics_port: Option<u16>,

        /// Bind address of the metrics server (use 0.0.0.0 for all interfaces)
        #[arg(long, env = "SILOQ_BIND_ADDRESS")]
        bind_address: Option<String>,

        /// Log level (trace | debug | info | warn | error)
        #[arg(long, env = "SILOQ_LOG_LEVEL")]
        log_level: Option<String>,

        /// Log format (text | json)
        #[arg(long, env = "SILOQ_LOG_FORMAT")]
        log_format: Option<String>,
    },

    /// Show the effective configuration
    Config {
        /// Configuration file (TOML)
        #[arg(long, env = "SILOQ_CONFIG")]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Configuration file values overridden by command-line flags.
    pub fn effective_config(&self) -> anyhow::Result<SiloqConfig> {
        match &self.command {
            Commands::Start {
                config,
                metrics_port,
                bind_address,
                log_level,
                log_format,
            } => {
                let mut effective = load(config.as_ref())?;
                if let Some(port) = metrics_port {
                    effective.metrics.port = *port;
                }
                if let Some(address) = bind_address {
                    effective.metrics.bind_address = address.clone();
                }
                if let Some(level) = log_level {
                    effective.logging.level = level.clone();
                }
                if let Some(format) = log_format {
                    effective.logging.format = format.parse::<LogFormat>()?;
                }
                effective.validate()?;
                Ok(effective)
            }
            Commands::Config { config } => load(config.as_ref()),
        }
    }
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<SiloqConfig> {
    match path {
        Some(path) => SiloqConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(SiloqConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "siloq",
            "start",
            "--metrics-port",
            "9191",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();

        let config = cli.effective_config().unwrap();
        assert_eq!(config.metrics.port, 9191);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let cli = Cli::try_parse_from(["siloq", "start", "--log-format", "xml"]).unwrap();
        assert!(cli.effective_config().is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli = Cli::try_parse_from(["siloq", "config", "--config", "/nonexistent/siloq.toml"])
            .unwrap();
        assert!(cli.effective_config().is_err());
    }
}
