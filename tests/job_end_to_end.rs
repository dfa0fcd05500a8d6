//! Whole jobs: a coordinator and real worker runtimes over in-memory
//! streams and loopback TCP.

use std::time::Duration;

use pla_compose::coordinator;
use pla_compose::function::FunctionTable;
use pla_compose::module::{Module, ModuleRepository};
use pla_compose::shared::Connection;
use pla_compose::worker::{self, WorkerOutcome, WorkerReport};
use pla_compose::{Coordinator, JobLoader, JobOutcome, JobState, WorkerRuntime};
use pretty_assertions::assert_eq;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

fn table(var_count: usize, rows: &[(&str, char)]) -> FunctionTable {
    let mut t = FunctionTable::new(var_count);
    for (inputs, output) in rows {
        t.push_parsed(inputs, *output).unwrap();
    }
    t
}

/// R(a, b) = a AND b, B(p, q) = p OR q on input 1, C(x) = NOT x on B's
/// input 0. Composed: a AND (NOT x OR q).
fn three_level_tree() -> ModuleRepository {
    let mut repo = ModuleRepository::new();
    repo.insert(Module::new(
        "R",
        table(2, &[("11", '1'), ("0-", '0'), ("-0", '0')]),
    ))
    .unwrap();
    repo.insert(Module::new(
        "B",
        table(2, &[("1-", '1'), ("-1", '1'), ("00", '0')]),
    ))
    .unwrap();
    repo.insert(Module::new("C", table(1, &[("0", '1'), ("1", '0')])))
        .unwrap();
    repo.attach_child("R", "B", 1).unwrap();
    repo.attach_child("B", "C", 0).unwrap();
    repo
}

const COMPOSED: &str = "-10\t0\n10-\t1\n1-1\t1\n0--\t0\n";

type WorkerTask = JoinHandle<pla_compose::Result<WorkerReport>>;

fn duplex_workers(count: usize) -> (Vec<Connection<DuplexStream>>, Vec<WorkerTask>) {
    let mut connections = Vec::with_capacity(count);
    let mut tasks = Vec::with_capacity(count);
    for _ in 0..count {
        let (coordinator_side, worker_side) = tokio::io::duplex(64 * 1024);
        connections.push(Connection::new(coordinator_side));
        tasks.push(tokio::spawn(
            WorkerRuntime::new(Connection::new(worker_side)).run(),
        ));
    }
    (connections, tasks)
}

async fn run_over_duplex(
    repo: ModuleRepository,
    workers: usize,
) -> (JobOutcome, Vec<WorkerReport>) {
    let (connections, tasks) = duplex_workers(workers);
    let coordinator = Coordinator::new(connections);
    let state = coordinator.state_handle();

    let outcome = tokio::time::timeout(Duration::from_secs(10), coordinator.run(repo))
        .await
        .expect("job timed out")
        .unwrap();
    assert_eq!(*state.lock(), JobState::Completed);

    let mut reports = Vec::with_capacity(tasks.len());
    for task in tasks {
        reports.push(task.await.unwrap().unwrap());
    }
    (outcome, reports)
}

// ─── In-memory streams ────────────────────────────────────────────────────

#[tokio::test]
async fn single_module_comes_back_unchanged() {
    let mut repo = ModuleRepository::new();
    let function = table(2, &[("1-", '1'), ("01", '0')]);
    repo.insert(Module::new("R", function.clone())).unwrap();

    let (outcome, reports) = run_over_duplex(repo, 1).await;

    let result = outcome.result.unwrap();
    assert_eq!(result.name(), "R");
    assert_eq!(result.function(), &function);
    assert_eq!(
        reports[0].outcome,
        WorkerOutcome::Delivered {
            module: "R".to_string()
        }
    );
}

#[tokio::test]
async fn cross_worker_tree_is_composed() {
    let (outcome, reports) = run_over_duplex(three_level_tree(), 2).await;

    let result = outcome.result.unwrap();
    assert_eq!(result.name(), "R");
    assert_eq!(result.var_count(), 3);
    assert_eq!(result.function().to_string(), COMPOSED);

    assert_eq!(
        reports[0].outcome,
        WorkerOutcome::Delivered {
            module: "R".to_string()
        }
    );
    assert_eq!(reports[1].outcome, WorkerOutcome::Finished);
    assert_eq!(reports[1].executed, 2);
    assert!(reports.iter().all(|r| r.mismatches.is_empty()));
}

#[tokio::test]
async fn extra_root_result_is_ignored() {
    // Nothing attaches B, so both modules are roots and both workers end.
    let mut repo = ModuleRepository::new();
    let a = table(2, &[("11", '1'), ("0-", '0')]);
    let b = table(1, &[("0", '1'), ("1", '0')]);
    repo.insert(Module::new("A", a.clone())).unwrap();
    repo.insert(Module::new("B", b.clone())).unwrap();

    let (outcome, reports) = run_over_duplex(repo, 2).await;

    let result = outcome.result.unwrap();
    let expected = if result.name() == "A" { &a } else { &b };
    assert_eq!(result.function(), expected);
    let delivered = reports
        .iter()
        .filter(|r| matches!(r.outcome, WorkerOutcome::Delivered { .. }))
        .count();
    assert_eq!(delivered, 2);
}

#[tokio::test]
async fn idle_workers_are_closed() {
    let (outcome, reports) = run_over_duplex(three_level_tree(), 5).await;

    assert_eq!(outcome.result.unwrap().function().to_string(), COMPOSED);
    assert_eq!(outcome.plan.active_workers(), 2);
    let closed = reports
        .iter()
        .filter(|r| r.outcome == WorkerOutcome::Closed)
        .count();
    assert_eq!(closed, 3);
}

#[tokio::test]
async fn wide_tree_over_many_workers() {
    // R has four inputs, each fed by an identity module with its own child.
    // Worker 0 receives from two other workers, in no fixed order.
    let identity = || table(1, &[("1", '1'), ("0", '0')]);
    let mut repo = ModuleRepository::new();
    repo.insert(Module::new(
        "R",
        table(4, &[("1111", '1'), ("0---", '0'), ("-0--", '0')]),
    ))
    .unwrap();
    for i in 0..4 {
        repo.insert(Module::new(format!("I{i}"), identity())).unwrap();
        repo.insert(Module::new(format!("L{i}"), identity())).unwrap();
    }
    for i in 0..4 {
        repo.attach_child("R", &format!("I{i}"), i).unwrap();
        repo.attach_child(&format!("I{i}"), &format!("L{i}"), 0)
            .unwrap();
    }

    let (outcome, reports) = run_over_duplex(repo, 3).await;

    let result = outcome.result.unwrap();
    assert_eq!(result.var_count(), 4);
    // Rows are regrouped by each substitution but not rewritten.
    assert_eq!(result.function().to_string(), "1111\t1\n-0--\t0\n0---\t0\n");
    let delivered = reports
        .iter()
        .filter(|r| matches!(r.outcome, WorkerOutcome::Delivered { .. }))
        .count();
    assert_eq!(delivered, 1);
}

// ─── Loopback TCP ─────────────────────────────────────────────────────────

#[tokio::test]
async fn job_over_tcp() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("and.pla"), ".i 2\n.o 1\n11 1\n0- 0\n-0 0\n.e\n").unwrap();
    std::fs::write(dir.path().join("or.pla"), ".i 2\n.o 1\n1- 1\n-1 1\n00 0\n.e\n").unwrap();
    std::fs::write(dir.path().join("not.pla"), ".i 1\n.o 1\n0 1\n1 0\n.e\n").unwrap();
    let job = dir.path().join("job.map");
    std::fs::write(
        &job,
        "M1 and.pla\nM2 or.pla\nM3 not.pla\nM1 aM2\nM2 M3b\n",
    )
    .unwrap();
    let (repo, report) = JobLoader::load(&job).unwrap();
    assert!(report.is_clean(), "{:?}", report.issues);

    let listener = coordinator::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let workers: Vec<WorkerTask> = (0..2)
        .map(|_| {
            tokio::spawn(async move {
                let connection = worker::connect(addr).await?;
                WorkerRuntime::new(connection).run().await
            })
        })
        .collect();
    let connections = listener.accept_workers(2).await.unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        Coordinator::new(connections).run(repo),
    )
    .await
    .expect("job timed out")
    .unwrap();

    let result = outcome.result.unwrap();
    assert_eq!(result.name(), "M1");
    assert_eq!(result.function().to_string(), COMPOSED);
    for task in workers {
        task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn worker_lost_before_the_run_is_dropped() {
    let listener = coordinator::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dropper = tokio::spawn(async move {
        let connection = worker::connect(addr).await.unwrap();
        drop(connection);
    });
    dropper.await.unwrap();
    let workers: Vec<WorkerTask> = (0..2)
        .map(|_| {
            tokio::spawn(async move {
                let connection = worker::connect(addr).await?;
                WorkerRuntime::new(connection).run().await
            })
        })
        .collect();
    let connections = listener.accept_workers(3).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut coordinator = Coordinator::new(connections);
    assert_eq!(coordinator.prune_disconnected(), 1);
    assert_eq!(coordinator.worker_count(), 2);

    let outcome = tokio::time::timeout(Duration::from_secs(10), coordinator.run(three_level_tree()))
        .await
        .expect("job timed out")
        .unwrap();

    assert_eq!(outcome.plan.programs.len(), 2);
    assert_eq!(outcome.result.unwrap().function().to_string(), COMPOSED);
    for task in workers {
        task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn disconnected_worker_aborts_the_job() {
    let listener = coordinator::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dropper = tokio::spawn(async move {
        let connection = worker::connect(addr).await.unwrap();
        drop(connection);
    });
    let connections = listener.accept_workers(1).await.unwrap();
    dropper.await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let coordinator = Coordinator::new(connections);
    let state = coordinator.state_handle();
    let result = tokio::time::timeout(Duration::from_secs(10), coordinator.run(three_level_tree()))
        .await
        .expect("job timed out");

    assert!(result.is_err());
    assert_eq!(*state.lock(), JobState::Aborted);
}
