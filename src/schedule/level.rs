//! Tree leveling.
//!
//! Levels are maintained incrementally while the tree is built: attaching a
//! child calls [`propagate`] on the parent with the child's level. The rule
//! only bumps a node whose level equals the incoming one, so a subtree that
//! was completed before being attached can leave its new parent at or below
//! its own level. [`repair`] detects those pairs and lifts the parents so the
//! ascending-level order is a valid bottom-up order.

use tracing::warn;

use crate::error::ModuleError;
use crate::module::ModuleRepository;

/// Raises `start` to `incoming + 1` when its level equals `incoming`, then
/// continues with its parent and the new level.
pub fn propagate(
    repo: &mut ModuleRepository,
    start: &str,
    incoming: u32,
) -> Result<(), ModuleError> {
    let mut current = start.to_string();
    let mut incoming = incoming;
    loop {
        let module = repo.get_mut(&current)?;
        if module.level() != incoming {
            return Ok(());
        }
        module.set_level(incoming + 1);
        match module.parent() {
            Some(parent) => {
                incoming = module.level();
                current = parent.to_string();
            }
            None => return Ok(()),
        }
    }
}

/// A parent whose level had to be raised above a child's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRepair {
    /// Module whose level was raised.
    pub parent: String,
    /// Child that was at or above the parent's level.
    pub child: String,
    /// Parent level before the repair.
    pub from: u32,
    /// Parent level after the repair.
    pub to: u32,
}

/// Lists every `(parent, child)` pair where the parent's level does not
/// exceed the child's.
pub fn violations(repo: &ModuleRepository) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for module in repo.iter() {
        for link in module.children() {
            if let Ok(child) = repo.get(&link.name) {
                if module.level() <= child.level() {
                    found.push((module.name().to_string(), link.name.clone()));
                }
            }
        }
    }
    found
}

/// Lifts parents above their children until no violation remains.
///
/// Each repair is logged as a warning and returned. Trees that are already
/// ordered come back untouched with an empty list.
pub fn repair(repo: &mut ModuleRepository) -> Result<Vec<LevelRepair>, ModuleError> {
    let mut repairs = Vec::new();
    // Every pass settles at least one more tree layer.
    for _ in 0..=repo.len() {
        let pending = violations(repo);
        if pending.is_empty() {
            return Ok(repairs);
        }
        for (parent, child) in pending {
            let child_level = repo.get(&child)?.level();
            let parent_module = repo.get_mut(&parent)?;
            let from = parent_module.level();
            if from > child_level {
                continue;
            }
            let to = child_level + 1;
            warn!(
                parent = %parent,
                child = %child,
                from,
                to,
                "parent level does not exceed child level, raising parent"
            );
            parent_module.set_level(to);
            repairs.push(LevelRepair {
                parent,
                child,
                from,
                to,
            });
        }
    }
    Ok(repairs)
}
