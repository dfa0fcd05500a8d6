//! `pla-compose worker`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use pla_compose::config::DEFAULT_COORDINATOR;
use pla_compose::worker::{self, WorkerOutcome};
use pla_compose::WorkerRuntime;

#[derive(Args)]
pub struct WorkerArgs {
    /// TOML config file with a [worker] section
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Coordinator address (overrides the config file)
    #[arg(long, env = "PLA_COMPOSE_COORDINATOR")]
    coordinator: Option<String>,
}

impl WorkerArgs {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(self.config.as_deref())?.worker;
        let address = self
            .coordinator
            .or_else(|| config.map(|c| c.coordinator))
            .unwrap_or_else(|| DEFAULT_COORDINATOR.to_string());

        let connection = worker::connect(address.as_str())
            .await
            .with_context(|| format!("Failed to connect to coordinator at {address}"))?;
        let report = WorkerRuntime::new(connection)
            .run()
            .await
            .context("Worker failed")?;

        match report.outcome {
            WorkerOutcome::Closed => {
                println!("{} No work assigned", style("→").dim());
            },
            WorkerOutcome::Delivered { module } => {
                println!(
                    "{} Delivered result {} after {} instructions",
                    style("✓").green().bold(),
                    style(module).cyan(),
                    report.executed
                );
            },
            WorkerOutcome::Finished => {
                println!(
                    "{} Finished {} instructions",
                    style("✓").green().bold(),
                    report.executed
                );
            },
        }
        for mismatch in &report.mismatches {
            eprintln!(
                "{} expected {} but received {}",
                style("!").yellow().bold(),
                mismatch.expected,
                mismatch.received
            );
        }
        for name in &report.discarded {
            eprintln!(
                "{} dropped inbound {} in favor of the local copy",
                style("!").yellow().bold(),
                name
            );
        }
        Ok(())
    }
}
