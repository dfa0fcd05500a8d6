//! `pla-compose coordinator`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use console::style;
use pla_compose::config::{validate_workers, DEFAULT_BIND};
use pla_compose::coordinator;
use pla_compose::Coordinator;

#[derive(Args)]
pub struct CoordinatorArgs {
    /// TOML config file with a [coordinator] section
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file)
    #[arg(long, env = "PLA_COMPOSE_BIND")]
    bind: Option<String>,

    /// Number of workers to wait for (overrides the config file)
    #[arg(long, short)]
    workers: Option<usize>,

    /// Module map of the job (overrides the config file)
    #[arg(long, short)]
    job: Option<PathBuf>,
}

impl CoordinatorArgs {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(self.config.as_deref())?.coordinator;

        let bind = self
            .bind
            .or_else(|| config.as_ref().map(|c| c.bind.clone()))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let workers = self
            .workers
            .or_else(|| config.as_ref().map(|c| c.workers))
            .context("Number of workers not given; use --workers or a config file")?;
        validate_workers(workers)?;
        let job = self
            .job
            .or_else(|| config.as_ref().map(|c| c.job.clone()))
            .context("No job given; use --job or a config file")?;

        let repo = super::load_job(&job)?;

        let listener = coordinator::bind(bind.as_str())
            .await
            .with_context(|| format!("Failed to bind {bind}"))?;
        println!(
            "{} Waiting for {} worker{} on {}",
            style("→").dim(),
            workers,
            if workers == 1 { "" } else { "s" },
            style(listener.local_addr()?).yellow()
        );
        let connections = listener.accept_workers(workers).await?;

        let mut coordinator = Coordinator::new(connections);
        let lost = coordinator.prune_disconnected();
        if lost > 0 {
            println!(
                "{} {} worker{} disconnected, running on {}",
                style("!").yellow().bold(),
                lost,
                if lost == 1 { "" } else { "s" },
                coordinator.worker_count()
            );
        }
        if coordinator.worker_count() == 0 {
            bail!("Every worker disconnected before the job started");
        }

        let outcome = coordinator
            .run(repo)
            .await
            .context("Job failed")?;

        match outcome.result {
            Some(module) => {
                println!("{} Job {} completed", style("✓").green().bold(), outcome.id);
                println!("{module}");
            },
            None => {
                println!(
                    "{} Job {} completed without a result",
                    style("!").yellow().bold(),
                    outcome.id
                );
            },
        }
        Ok(())
    }
}
