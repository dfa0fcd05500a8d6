//! Worker runtime.
//!
//! A worker receives its program and modules from the coordinator, then
//! interprets the program one instruction at a time against its local
//! repository. Every worker ends with exactly one terminal frame: the
//! result module addressed to [`Address::Result`] when the program reaches
//! `END`, otherwise an int addressed to [`Address::Done`].

use tracing::{debug, info, warn};

use crate::error::{ProtocolError, Result};
use crate::module::ModuleRepository;
use crate::schedule::{Instruction, Program};
use crate::shared::{Address, Payload, PayloadKind, Transport, CLOSE_DIRECTIVE};

mod connect;

pub use connect::connect;

/// A `RECV` that delivered a different module than the one named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMismatch {
    /// Name in the `RECV` instruction.
    pub expected: String,
    /// Name of the module that arrived.
    pub received: String,
}

/// What the coordinator handed this worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// The worker has no work and was told to disconnect.
    Closed,
    /// A program and its modules were received.
    Ready {
        /// Instructions in the program.
        instructions: usize,
        /// Modules received.
        modules: usize,
    },
}

/// How program execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The worker was closed before running anything.
    Closed,
    /// `END` delivered the named module as the final result.
    Delivered {
        /// Result module name.
        module: String,
    },
    /// The program ran out without `END`.
    Finished,
}

/// Summary of one worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// How the run ended.
    pub outcome: WorkerOutcome,
    /// Instructions executed.
    pub executed: usize,
    /// `RECV` name mismatches seen along the way.
    pub mismatches: Vec<NameMismatch>,
    /// Inbound modules dropped because a local module already had the name.
    pub discarded: Vec<String>,
}

/// Interprets one worker program over a [`Transport`].
#[derive(Debug)]
pub struct WorkerRuntime<T> {
    transport: T,
    program: Program,
    modules: ModuleRepository,
    mismatches: Vec<NameMismatch>,
    discarded: Vec<String>,
}

impl<T: Transport> WorkerRuntime<T> {
    /// Creates a runtime with no program; call
    /// [`receive_assignment`](Self::receive_assignment) next.
    pub fn new(transport: T) -> Self {
        Self::with_assignment(transport, Program::new(), ModuleRepository::new())
    }

    /// Creates a runtime with a program and modules already in place.
    pub fn with_assignment(transport: T, program: Program, modules: ModuleRepository) -> Self {
        Self {
            transport,
            program,
            modules,
            mismatches: Vec::new(),
            discarded: Vec::new(),
        }
    }

    /// The worker's program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The worker's local modules.
    pub fn modules(&self) -> &ModuleRepository {
        &self.modules
    }

    /// Name mismatches recorded so far.
    pub fn mismatches(&self) -> &[NameMismatch] {
        &self.mismatches
    }

    /// Names of inbound modules dropped in favor of a local module.
    pub fn discarded(&self) -> &[String] {
        &self.discarded
    }

    /// Gives the transport back.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Receives the program text, then the module count and that many
    /// modules.
    pub async fn receive_assignment(&mut self) -> Result<Assignment> {
        let text = match self.transport.receive_payload(PayloadKind::Text).await? {
            (_, Payload::Text(text)) => text,
            (_, other) => return Err(unexpected(PayloadKind::Text, &other)),
        };
        if text == CLOSE_DIRECTIVE {
            info!("coordinator has no work for this worker");
            self.transport.close().await?;
            return Ok(Assignment::Closed);
        }
        self.program = Program::parse(&text)?;

        let count = match self.transport.receive_payload(PayloadKind::Int).await? {
            (_, Payload::Int(count)) => count,
            (_, other) => return Err(unexpected(PayloadKind::Int, &other)),
        };
        let count = usize::try_from(count).map_err(|_| ProtocolError::InvalidLength {
            what: "module count",
            value: i64::from(count),
        })?;

        for _ in 0..count {
            match self.transport.receive_payload(PayloadKind::Module).await? {
                (_, Payload::Module(module)) => {
                    debug!(module = %module.name(), vars = module.var_count(), "module received");
                    self.modules.insert(module)?;
                }
                (_, other) => return Err(unexpected(PayloadKind::Module, &other)),
            }
        }

        info!(
            instructions = self.program.len(),
            modules = count,
            "assignment received"
        );
        Ok(Assignment::Ready {
            instructions: self.program.len(),
            modules: count,
        })
    }

    /// Runs the program and sends the terminal frame.
    pub async fn execute(&mut self) -> Result<WorkerReport> {
        let instructions = self.program.instructions().to_vec();
        let mut executed = 0;
        for instruction in instructions {
            debug!(%instruction, "executing");
            executed += 1;
            if let Some(module) = self.step(instruction).await? {
                info!(%module, executed, "result delivered");
                return Ok(self.report(WorkerOutcome::Delivered { module }, executed));
            }
        }

        self.transport
            .send_payload(Address::Done, &Payload::Int(0))
            .await?;
        info!(executed, "program finished without a result");
        Ok(self.report(WorkerOutcome::Finished, executed))
    }

    /// Receives the assignment and runs it.
    pub async fn run(mut self) -> Result<WorkerReport> {
        match self.receive_assignment().await? {
            Assignment::Closed => Ok(self.report(WorkerOutcome::Closed, 0)),
            Assignment::Ready { .. } => self.execute().await,
        }
    }

    /// Executes one instruction. Returns the result module name after `END`.
    async fn step(&mut self, instruction: Instruction) -> Result<Option<String>> {
        match instruction {
            Instruction::Send { module, target } => {
                let payload = Payload::Module(self.modules.get(&module)?.clone());
                self.transport
                    .send_payload(Address::Worker(target), &payload)
                    .await?;
            }
            Instruction::Recv { module } => self.receive_module(&module).await?,
            Instruction::Merge { parent, son } => {
                self.modules.merge_child(&parent, &son)?;
            }
            Instruction::End { module } => {
                let payload = Payload::Module(self.modules.get(&module)?.clone());
                self.transport.send_payload(Address::Result, &payload).await?;
                return Ok(Some(module));
            }
        }
        Ok(None)
    }

    /// Stores inbound modules until `expected` is present locally.
    ///
    /// Senders on different workers race, so a module may arrive ahead of
    /// its `RECV`. It is kept under its own name and the later `RECV` for it
    /// consumes no frame. A module whose name is already held locally is
    /// dropped; the local copy wins.
    async fn receive_module(&mut self, expected: &str) -> Result<()> {
        while !self.modules.contains(expected) {
            let received = match self.transport.receive_payload(PayloadKind::Module).await? {
                (_, Payload::Module(received)) => received,
                (_, other) => return Err(unexpected(PayloadKind::Module, &other)),
            };
            if received.name() != expected {
                warn!(
                    expected,
                    received = %received.name(),
                    "received a different module than expected"
                );
                self.mismatches.push(NameMismatch {
                    expected: expected.to_string(),
                    received: received.name().to_string(),
                });
            }
            if self.modules.contains(received.name()) {
                warn!(module = %received.name(), "dropping module that shadows a local one");
                self.discarded.push(received.name().to_string());
                continue;
            }
            self.modules.insert(received)?;
        }
        Ok(())
    }

    fn report(&self, outcome: WorkerOutcome, executed: usize) -> WorkerReport {
        WorkerReport {
            outcome,
            executed,
            mismatches: self.mismatches.clone(),
            discarded: self.discarded.clone(),
        }
    }
}

fn unexpected(expected: PayloadKind, got: &Payload) -> crate::Error {
    ProtocolError::InvalidString(format!("expected {expected} payload, got {}", got.kind())).into()
}
