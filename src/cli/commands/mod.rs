// Commands module
/// Start command implementation
pub mod start;

use crate::cli::Commands;
use crate::config::SiloqConfig;

/// Execute a CLI command with the already-resolved configuration
pub async fn execute_command(command: Commands, config: SiloqConfig) -> anyhow::Result<()> {
    match command {
        Commands::Start { .. } => start::execute(config).await,
        Commands::Config { .. } => execute_config(&config),
    }
}

fn execute_config(config: &SiloqConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
