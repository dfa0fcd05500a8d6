//! The coordinator: plans a job, dispatches it to workers and relays their
//! traffic until the result arrives.
//!
//! A job runs these phases in order:
//!
//! 1. schedule and compile the module tree ([`schedule::plan`]);
//! 2. send every worker its program text, closing workers with nothing to do;
//! 3. send each remaining worker its module count, then every module to its
//!    assigned worker;
//! 4. run one relay task per worker until each sends a terminal frame;
//! 5. decode the first result delivered, if any.
//!
//! Workers that hang up before the job starts can be dropped with
//! [`Coordinator::prune_disconnected`]. A disconnected worker during dispatch
//! or any relay failure aborts the job. There is no retry.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{JobError, Result};
use crate::module::{Module, ModuleRepository};
use crate::schedule::{self, Plan};
use crate::shared::{
    decode_all, Address, Connection, Payload, PeerStream, Transport, CLOSE_DIRECTIVE,
};

pub mod listener;
pub mod relay;
mod state;

pub use listener::{bind, Listener};
pub use relay::{relay, RelayOutcome, RouteTable};
pub use state::JobState;

/// Largest number of workers one job is planned for.
pub const MAX_WORKERS: usize = 10;

/// Result of a finished job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Job id used in log spans.
    pub id: Uuid,
    /// The plan that was executed.
    pub plan: Plan,
    /// The composed root module, when a worker delivered one.
    pub result: Option<Module>,
}

/// Runs one job over a fixed set of worker connections.
pub struct Coordinator<S> {
    id: Uuid,
    state: Arc<Mutex<JobState>>,
    workers: Vec<Option<Connection<S>>>,
}

impl<S: PeerStream> Coordinator<S> {
    /// Creates a coordinator; worker ids are the indices of `workers`.
    pub fn new(workers: Vec<Connection<S>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(JobState::Idle)),
            workers: workers.into_iter().map(Some).collect(),
        }
    }

    /// Job id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current job state.
    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    /// Shared handle to the job state, readable while [`run`](Self::run) is
    /// in progress.
    pub fn state_handle(&self) -> Arc<Mutex<JobState>> {
        Arc::clone(&self.state)
    }

    /// Number of worker slots.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Drops workers whose peer has already hung up. The survivors keep
    /// their relative order and are renumbered from 0, so the job is planned
    /// for them alone. Returns how many workers were dropped.
    pub fn prune_disconnected(&mut self) -> usize {
        let before = self.workers.len();
        self.workers
            .retain(|slot| slot.as_ref().is_some_and(|conn| conn.is_alive()));
        let lost = before - self.workers.len();
        if lost > 0 {
            warn!(lost, remaining = self.workers.len(), "dropped disconnected workers");
        } else {
            debug!(workers = before, "all workers connected");
        }
        lost
    }

    /// Runs the job to completion. On failure the state becomes
    /// [`JobState::Aborted`] and the error is returned.
    pub async fn run(mut self, repo: ModuleRepository) -> Result<JobOutcome> {
        let span = info_span!("job", id = %self.id);
        let state = Arc::clone(&self.state);
        let result = self.execute(repo).instrument(span.clone()).await;
        if let Err(err) = &result {
            let _entered = span.enter();
            let mut current = state.lock();
            if !current.is_terminal() {
                *current = JobState::Aborted;
            }
            error!(error = %err, "job aborted");
        }
        result
    }

    fn transition(&self, next: JobState) -> Result<()> {
        let mut current = self.state.lock();
        let from = *current;
        from.validate_transition(next)?;
        debug!(%from, to = %next, "job state");
        *current = next;
        Ok(())
    }

    async fn execute(&mut self, mut repo: ModuleRepository) -> Result<JobOutcome> {
        self.transition(JobState::Distributing)?;
        let plan = schedule::plan(&mut repo, self.workers.len())?;

        self.transition(JobState::Dispatching)?;
        self.dispatch_programs(&plan).await?;
        self.dispatch_modules(&plan, &repo).await?;

        self.transition(JobState::Relaying)?;
        let result = self.relay_all().await?;

        self.transition(JobState::Completed)?;
        match &result {
            Some(module) => info!(
                module = %module.name(),
                vars = module.var_count(),
                rows = module.function().len(),
                "job completed"
            ),
            None => warn!("job completed without a result"),
        }
        Ok(JobOutcome {
            id: self.id,
            plan,
            result,
        })
    }

    fn live_worker(&mut self, worker: usize) -> Result<&mut Connection<S>> {
        match self.workers.get_mut(worker) {
            Some(Some(conn)) if conn.is_alive() => Ok(conn),
            _ => Err(JobError::WorkerDisconnected { worker }.into()),
        }
    }

    async fn dispatch_programs(&mut self, plan: &Plan) -> Result<()> {
        for (worker, program) in plan.programs.iter().enumerate() {
            let conn = self.live_worker(worker)?;
            let text = if program.is_empty() {
                CLOSE_DIRECTIVE.to_string()
            } else {
                program.to_text()
            };
            conn.send_payload(Address::Done, &Payload::Text(text)).await?;

            if program.is_empty() {
                info!(worker, "no work, closing worker");
                conn.close().await?;
                self.workers[worker] = None;
            } else {
                debug!(worker, instructions = program.len(), "program sent");
            }
        }
        Ok(())
    }

    async fn dispatch_modules(&mut self, plan: &Plan, repo: &ModuleRepository) -> Result<()> {
        for worker in 0..self.workers.len() {
            if self.workers[worker].is_none() {
                continue;
            }
            let count = plan.distribution.count(worker);
            let conn = self.live_worker(worker)?;
            let count = i32::try_from(count).unwrap_or(i32::MAX);
            conn.send_payload(Address::Worker(worker), &Payload::Int(count))
                .await?;
        }

        for module in repo.iter() {
            let worker = module.assigned_worker();
            let conn = self.live_worker(worker)?;
            conn.send_payload(Address::Worker(worker), &Payload::Module(module.clone()))
                .await?;
            debug!(module = %module.name(), worker, "module sent");
        }
        Ok(())
    }

    async fn relay_all(&mut self) -> Result<Option<Module>> {
        let mut readers = Vec::new();
        let mut writers = Vec::with_capacity(self.workers.len());
        for (worker, slot) in self.workers.drain(..).enumerate() {
            match slot {
                Some(conn) => {
                    let (reader, writer) = conn.into_split();
                    readers.push((worker, reader));
                    writers.push(Some(writer));
                }
                None => writers.push(None),
            }
        }
        let routes = Arc::new(RouteTable::new(writers));

        let mut tasks = JoinSet::new();
        for (worker, reader) in readers {
            let routes = Arc::clone(&routes);
            tasks.spawn(
                async move { (worker, relay(worker, reader, &routes).await) }
                    .instrument(info_span!("relay", worker)),
            );
        }
        info!(relays = tasks.len(), "relaying");

        let mut result: Option<(usize, bytes::Bytes)> = None;
        while let Some(joined) = tasks.join_next().await {
            let (worker, outcome) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    tasks.abort_all();
                    return Err(JobError::TaskJoin {
                        message: err.to_string(),
                    }
                    .into());
                }
            };
            match outcome {
                Ok(RelayOutcome::Done) => {}
                Ok(RelayOutcome::Result(payload)) => match &result {
                    Some((first, _)) => {
                        warn!(first, second = worker, "ignoring extra result");
                    }
                    None => result = Some((worker, payload)),
                },
                Err(err) => {
                    tasks.abort_all();
                    return Err(JobError::Relay {
                        worker,
                        source: Box::new(err),
                    }
                    .into());
                }
            }
        }

        match result {
            Some((_, payload)) => Ok(Some(decode_all::<Module>(payload)?)),
            None => Ok(None),
        }
    }
}
