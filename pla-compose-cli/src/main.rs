//! pla-compose: coordinator, worker and offline tools for distributed PLA
//! composition.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

/// Distributed composition of PLA Boolean functions
#[derive(Parser)]
#[command(name = "pla-compose")]
#[command(about = "Compose PLA function trees across coordinated workers", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job as the coordinator
    ///
    /// Waits for the configured number of workers, distributes the job and
    /// prints the composed root module.
    Coordinator(commands::coordinator::CoordinatorArgs),

    /// Run as a worker
    ///
    /// Connects to the coordinator, executes the received program and exits.
    Worker(commands::worker::WorkerArgs),

    /// Print the per-worker programs for a job without running it
    Plan(commands::plan::PlanArgs),

    /// Substitute one PLA function into an input of another
    Merge(commands::merge::MergeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    pla_compose::logging::init(cli.verbose);
    execute_command(cli.command)
}

fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Coordinator(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(args.execute())?;
        },
        Commands::Worker(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(args.execute())?;
        },
        Commands::Plan(args) => {
            args.execute()?;
        },
        Commands::Merge(args) => {
            args.execute()?;
        },
    }
    Ok(())
}
