//! Work distribution, ordering and instruction compilation.
//!
//! [`plan`] runs the whole pipeline over a loaded repository:
//!
//! 1. [`distribute`] assigns modules to workers round-robin in load order;
//! 2. [`level::repair`] lifts any parent not above its children;
//! 3. [`order`] sorts modules by `(level, load index)`;
//! 4. [`compile`] emits one [`Program`] per worker.

use std::fmt;

use tracing::{debug, info};

use crate::error::JobError;
use crate::module::ModuleRepository;

mod compiler;
mod instruction;
pub mod level;

pub use compiler::compile;
pub use instruction::{Instruction, ParseInstructionError, Program, EMPTY_PROGRAM};
pub use level::LevelRepair;

/// Number of modules assigned to each worker.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Distribution(Vec<usize>);

impl Distribution {
    /// All-zero distribution over `workers` workers.
    pub fn new(workers: usize) -> Self {
        Self(vec![0; workers])
    }

    /// Distribution from explicit per-worker counts.
    pub fn from_counts(counts: Vec<usize>) -> Self {
        Self(counts)
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.0.len()
    }

    /// Modules assigned to `worker`.
    pub fn count(&self, worker: usize) -> usize {
        self.0.get(worker).copied().unwrap_or(0)
    }

    /// Per-worker counts.
    pub fn counts(&self) -> &[usize] {
        &self.0
    }

    /// Total number of assigned modules.
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    fn assign(&mut self, worker: usize) {
        self.0[worker] += 1;
    }

    /// Moves one module from `from` to `to`.
    pub fn relocate(&mut self, from: usize, to: usize) {
        self.0[from] = self.0[from].saturating_sub(1);
        self.0[to] += 1;
    }
}

/// Assigns module `i` (load order) to worker `i mod workers`.
///
/// # Examples
///
/// ```
/// use pla_compose::function::FunctionTable;
/// use pla_compose::module::{Module, ModuleRepository};
/// use pla_compose::schedule::distribute;
///
/// let mut repo: ModuleRepository = ["A", "B", "C", "D", "E"]
///     .into_iter()
///     .map(|name| Module::new(name, FunctionTable::new(1)))
///     .collect();
/// let distribution = distribute(&mut repo, 3).unwrap();
/// assert_eq!(distribution.counts(), &[2, 2, 1]);
/// assert_eq!(repo.get("D").unwrap().assigned_worker(), 0);
/// ```
pub fn distribute(repo: &mut ModuleRepository, workers: usize) -> Result<Distribution, JobError> {
    if workers == 0 {
        return Err(JobError::NoWorkers);
    }
    let mut distribution = Distribution::new(workers);
    for (index, module) in repo.iter_mut().enumerate() {
        let worker = index % workers;
        module.set_assigned_worker(worker);
        distribution.assign(worker);
    }
    Ok(distribution)
}

/// Module names sorted by ascending level, load order among equals.
pub fn order(repo: &ModuleRepository) -> Vec<String> {
    let mut ranked: Vec<(u32, usize, &str)> = repo
        .iter()
        .enumerate()
        .map(|(index, module)| (module.level(), index, module.name()))
        .collect();
    ranked.sort_unstable();
    ranked
        .into_iter()
        .map(|(_, _, name)| name.to_string())
        .collect()
}

/// Output of [`plan`]: one program per worker plus the data behind it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Plan {
    /// Modules in compilation order.
    pub order: Vec<String>,
    /// Per-worker module counts after leaf relocation.
    pub distribution: Distribution,
    /// Program for each worker, indexed by worker id.
    pub programs: Vec<Program>,
    /// Level repairs applied before ordering.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repairs: Vec<LevelRepairSummary>,
}

/// Serializable view of a [`LevelRepair`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LevelRepairSummary {
    /// Module whose level was raised.
    pub parent: String,
    /// Child it had to exceed.
    pub child: String,
    /// New level.
    pub level: u32,
}

impl From<LevelRepair> for LevelRepairSummary {
    fn from(repair: LevelRepair) -> Self {
        Self {
            parent: repair.parent,
            child: repair.child,
            level: repair.to,
        }
    }
}

impl Plan {
    /// Number of workers that received at least one instruction.
    pub fn active_workers(&self) -> usize {
        self.programs.iter().filter(|p| !p.is_empty()).count()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (worker, program) in self.programs.iter().enumerate() {
            let text = program.to_text();
            writeln!(f, "{worker}:")?;
            if text.ends_with('\n') {
                writeln!(f, "{text}")?;
            } else {
                writeln!(f, "{text}\n")?;
            }
        }
        Ok(())
    }
}

/// Distributes, levels, orders and compiles `repo` for `workers` workers.
///
/// Module assignments and levels in `repo` are updated in place.
pub fn plan(repo: &mut ModuleRepository, workers: usize) -> crate::Result<Plan> {
    let mut distribution = distribute(repo, workers)?;
    info!(
        modules = repo.len(),
        workers,
        counts = ?distribution.counts(),
        "distributed modules"
    );

    let repairs = level::repair(repo)?;
    let order = order(repo);
    debug!(order = ?order, "compilation order");

    let programs = compile(repo, &order, &mut distribution)?;
    info!(
        instructions = programs.iter().map(Program::len).sum::<usize>(),
        "compiled worker programs"
    );

    Ok(Plan {
        order,
        distribution,
        programs,
        repairs: repairs.into_iter().map(Into::into).collect(),
    })
}
