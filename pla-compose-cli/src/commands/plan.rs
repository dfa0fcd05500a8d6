//! `pla-compose plan`: offline scheduling and compilation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use pla_compose::config::validate_workers;
use pla_compose::schedule;

#[derive(Args)]
pub struct PlanArgs {
    /// Module map of the job
    #[arg(long, short)]
    job: PathBuf,

    /// Number of workers to plan for
    #[arg(long, short)]
    workers: usize,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,

    /// Also print every module after scheduling
    #[arg(long)]
    modules: bool,
}

impl PlanArgs {
    pub fn execute(self) -> Result<()> {
        validate_workers(self.workers)?;
        let mut repo = super::load_job(&self.job)?;
        let plan = schedule::plan(&mut repo, self.workers)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
            return Ok(());
        }
        if self.modules {
            for module in repo.iter() {
                println!("{module}");
            }
        }
        print!("{plan}");
        Ok(())
    }
}
