pub mod coordinator;
pub mod merge;
pub mod plan;
pub mod worker;

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use pla_compose::config::Config;
use pla_compose::module::ModuleRepository;
use pla_compose::{JobLoader, LoadReport};

/// Reads the optional config file.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Loads a job and prints any skipped entries.
pub fn load_job(path: &Path) -> Result<ModuleRepository> {
    let (repo, report) = JobLoader::load(path)
        .with_context(|| format!("Failed to load job {}", path.display()))?;
    print_report(&report);
    if repo.is_empty() {
        anyhow::bail!("job {} defines no modules", path.display());
    }
    Ok(repo)
}

fn print_report(report: &LoadReport) {
    if report.is_clean() {
        return;
    }
    eprintln!(
        "{} {} entr{} skipped while loading:",
        style("!").yellow().bold(),
        report.issues.len(),
        if report.issues.len() == 1 { "y" } else { "ies" }
    );
    for issue in &report.issues {
        eprintln!("  {} {}", style("→").dim(), issue);
    }
}
