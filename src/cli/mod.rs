//! Docket CLI
//!
//! Commands:
//! - `docket run`    - Run the orchestrator against the simulated collaborators
//! - `docket config` - Inspect and validate configuration

pub mod config;
pub mod output;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::orchestrator::Orchestrator;
use output::OutputMode;

/// Multi-agent case research orchestrator
#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(author, version, about = "Multi-agent orchestration for press-release case research")]
pub struct Cli {
    /// Directory holding default.toml and environment overlays
    #[arg(long, global = true, env = "DOCKET_CONFIG_DIR", default_value = "config")]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one orchestration over the simulated collaborators
    Run(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Maximum number of work items to process
    #[arg(long, default_value = "12")]
    pub max_items: usize,

    /// Override orchestrator.max_rounds
    #[arg(long)]
    pub max_rounds: Option<u64>,

    /// Override simulation.failure_rate
    #[arg(long)]
    pub failure_rate: Option<f64>,

    /// Override simulation.malformed_rate
    #[arg(long)]
    pub malformed_rate: Option<f64>,

    /// Override simulation.seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override simulation.latency_ms
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(v) = self.max_rounds {
            config.orchestrator.max_rounds = v;
        }
        if let Some(v) = self.failure_rate {
            config.simulation.failure_rate = v;
        }
        if let Some(v) = self.malformed_rate {
            config.simulation.malformed_rate = v;
        }
        if let Some(v) = self.seed {
            config.simulation.seed = v;
        }
        if let Some(v) = self.latency_ms {
            config.simulation.latency_ms = v;
        }
    }
}

pub async fn run(args: RunArgs, mut config: AppConfig) -> Result<()> {
    args.apply(&mut config);
    config
        .validate()
        .map_err(|errors| anyhow!("invalid configuration:\n  {}", errors.join("\n  ")))?;

    let mut orchestrator = Orchestrator::simulated(config, args.max_items);
    let handle = orchestrator.handle();
    let report = orchestrator.run(args.max_items).await;

    let status = handle.status().await;
    info!(
        phase = %status.phase,
        strategy = %status.active_strategy,
        rounds = status.rounds_completed,
        messages = status.message_count,
        "final status"
    );

    output::print_report(&report, OutputMode::from_json_flag(args.json))?;
    if !report.success {
        return Err(anyhow!("run {} finished unsuccessfully", report.run_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["docket", "run", "--max-items", "20", "--seed", "9", "--json"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_items, 20);
        assert!(args.json);

        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.simulation.seed, 9);
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::parse_from(["docket", "config", "show", "--section", "controller"]);
        assert!(matches!(
            cli.command,
            Commands::Config(config::ConfigCommands::Show { section: Some(_) })
        ));
    }
}
