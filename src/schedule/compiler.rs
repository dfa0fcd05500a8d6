//! Lowers the leveled tree into per-worker programs.

use tracing::debug;

use crate::error::ModuleError;
use crate::module::ModuleRepository;

use super::instruction::{Instruction, Program};
use super::Distribution;

/// Emits the instructions for every module in `order`.
///
/// For a root, `END root` goes to its worker. For any other module `m` with
/// parent `p`:
///
/// - a leaf `m` first moves to `p`'s worker (the distribution follows);
/// - collocated `m` and `p` yield `MERG p m` on that worker;
/// - otherwise `m`'s worker gets `SEND m <p's worker>` and `p`'s worker gets
///   `RECV m` then `MERG p m`.
///
/// `order` must list children before their parents.
pub fn compile(
    repo: &mut ModuleRepository,
    order: &[String],
    distribution: &mut Distribution,
) -> Result<Vec<Program>, ModuleError> {
    let mut programs = vec![Program::new(); distribution.worker_count()];

    for name in order {
        let module = repo.get(name)?;
        let Some(parent_name) = module.parent().map(str::to_string) else {
            let worker = module.assigned_worker();
            debug!(module = %name, worker, "END");
            programs[worker].push(Instruction::End {
                module: name.clone(),
            });
            continue;
        };

        let parent_worker = repo.get(&parent_name)?.assigned_worker();
        if module.is_leaf() {
            let from = module.assigned_worker();
            if from != parent_worker {
                debug!(module = %name, from, to = parent_worker, "relocating leaf");
            }
            distribution.relocate(from, parent_worker);
            repo.get_mut(name)?.set_assigned_worker(parent_worker);
        }

        let worker = repo.get(name)?.assigned_worker();
        let merge = Instruction::Merge {
            parent: parent_name,
            son: name.clone(),
        };
        if worker == parent_worker {
            programs[worker].push(merge);
        } else {
            programs[worker].push(Instruction::Send {
                module: name.clone(),
                target: parent_worker,
            });
            programs[parent_worker].push(Instruction::Recv {
                module: name.clone(),
            });
            programs[parent_worker].push(merge);
        }
    }

    Ok(programs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionTable;
    use crate::module::Module;
    use pretty_assertions::assert_eq;

    fn repo(names: &[&str]) -> ModuleRepository {
        names
            .iter()
            .map(|name| Module::new(*name, FunctionTable::new(2)))
            .collect()
    }

    #[test]
    fn leaf_follows_its_parent() {
        let mut repo = repo(&["R", "A"]);
        repo.attach_child("R", "A", 0).unwrap();
        repo.get_mut("A").unwrap().set_assigned_worker(1);
        let mut distribution = Distribution::from_counts(vec![1, 1]);

        let programs = compile(
            &mut repo,
            &["A".to_string(), "R".to_string()],
            &mut distribution,
        )
        .unwrap();

        assert_eq!(programs[0].to_text(), "MERG R A\nEND R\n");
        assert!(programs[1].is_empty());
        assert_eq!(distribution.counts(), &[2, 0]);
        assert_eq!(repo.get("A").unwrap().assigned_worker(), 0);
    }

    #[test]
    fn inner_node_ships_across_workers() {
        let mut repo = repo(&["R", "B", "C"]);
        repo.attach_child("R", "B", 0).unwrap();
        repo.attach_child("B", "C", 0).unwrap();
        repo.get_mut("B").unwrap().set_assigned_worker(1);
        repo.get_mut("C").unwrap().set_assigned_worker(0);
        let mut distribution = Distribution::from_counts(vec![2, 1]);

        let order = ["C", "B", "R"].map(String::from);
        let programs = compile(&mut repo, &order, &mut distribution).unwrap();

        assert_eq!(programs[1].to_text(), "MERG B C\nSEND B 0\n");
        assert_eq!(programs[0].to_text(), "RECV B\nMERG R B\nEND R\n");
        assert_eq!(distribution.counts(), &[1, 2]);
    }

    #[test]
    fn unknown_module_in_order_fails() {
        let mut repo = repo(&["R"]);
        let mut distribution = Distribution::from_counts(vec![1]);
        assert_eq!(
            compile(&mut repo, &["Z".to_string()], &mut distribution).unwrap_err(),
            ModuleError::NotFound("Z".into())
        );
    }
}
