//! Name-keyed module storage.

use indexmap::IndexMap;

use crate::error::ModuleError;
use crate::function::merge;
use crate::schedule::level;

use super::entity::{ChildLink, Module};

/// Owns every module of a job, keyed by name, in load order.
///
/// Parent and child relations are names resolved through this map, so the
/// tree holds no reference cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRepository {
    modules: IndexMap<String, Module>,
}

impl ModuleRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module. Names must be unique.
    pub fn insert(&mut self, module: Module) -> Result<(), ModuleError> {
        if self.modules.contains_key(module.name()) {
            return Err(ModuleError::Duplicate(module.name().to_string()));
        }
        self.modules.insert(module.name().to_string(), module);
        Ok(())
    }

    /// Adds or replaces a module, keeping the original load position when a
    /// module with the same name is replaced.
    pub fn upsert(&mut self, module: Module) -> Option<Module> {
        self.modules.insert(module.name().to_string(), module)
    }

    /// Looks a module up by name.
    pub fn get(&self, name: &str) -> Result<&Module, ModuleError> {
        self.modules
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    /// Looks a module up by name for mutation.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Module, ModuleError> {
        self.modules
            .get_mut(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    /// Whether a module with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Load position of a module.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.modules.get_index_of(name)
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Mutable modules in load order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.values_mut()
    }

    /// Module names in load order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Modules without a parent, in load order.
    pub fn roots(&self) -> impl Iterator<Item = &Module> {
        self.iter().filter(|m| m.is_root())
    }

    /// Links `child` under `parent` at input `position` and propagates the
    /// child's level up the parent chain.
    ///
    /// # Examples
    ///
    /// ```
    /// use pla_compose::function::FunctionTable;
    /// use pla_compose::module::{Module, ModuleRepository};
    ///
    /// let mut repo = ModuleRepository::new();
    /// repo.insert(Module::new("R", FunctionTable::new(2))).unwrap();
    /// repo.insert(Module::new("A", FunctionTable::new(1))).unwrap();
    /// repo.attach_child("R", "A", 1).unwrap();
    ///
    /// assert_eq!(repo.get("A").unwrap().parent(), Some("R"));
    /// assert_eq!(repo.get("R").unwrap().child_position("A"), Some(1));
    /// assert_eq!(repo.get("R").unwrap().level(), 1);
    /// ```
    pub fn attach_child(
        &mut self,
        parent: &str,
        child: &str,
        position: usize,
    ) -> Result<(), ModuleError> {
        self.get(parent)?;
        let child_module = self.get(child)?;
        if let Some(existing) = child_module.parent() {
            return Err(ModuleError::AlreadyAttached {
                child: child.to_string(),
                parent: existing.to_string(),
            });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(ModuleError::Cycle {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        let incoming = child_module.level();
        self.get_mut(parent)?
            .push_child(ChildLink::new(child, position));
        self.get_mut(child)?.set_parent(parent);
        level::propagate(self, parent, incoming)
    }

    /// Walks up from `start`; `true` when `candidate` is reached.
    fn is_ancestor_or_self(&self, candidate: &str, start: &str) -> bool {
        let mut current = Some(start);
        let mut steps = 0;
        while let Some(name) = current {
            if name == candidate {
                return true;
            }
            steps += 1;
            if steps > self.modules.len() {
                return true;
            }
            current = self.modules.get(name).and_then(Module::parent);
        }
        false
    }

    /// Shifts the positions of `parent`'s children after `merged_child`.
    pub fn adjust_positions(
        &mut self,
        parent: &str,
        merged_child: &str,
        son_var_count: usize,
    ) -> Result<(), ModuleError> {
        self.get_mut(parent)?
            .adjust_positions(merged_child, son_var_count)
    }

    /// Substitutes `son` into `parent` at the son's recorded position, then
    /// shifts the positions of the remaining children.
    ///
    /// The son stays in the repository and keeps its link in the parent.
    pub fn merge_child(&mut self, parent: &str, son: &str) -> crate::Result<()> {
        let parent_module = self.get(parent)?;
        let son_module = self.get(son)?;
        let position =
            parent_module
                .child_position(son)
                .ok_or_else(|| ModuleError::UnknownChild {
                    parent: parent.to_string(),
                    child: son.to_string(),
                })?;
        let merged = merge(parent_module.function(), son_module.function(), position)?;
        let son_var_count = son_module.var_count();

        let parent_module = self.get_mut(parent)?;
        parent_module.set_function(merged);
        parent_module.adjust_positions(son, son_var_count)?;
        Ok(())
    }

    /// Checks the tree invariants: every child exists and points back to its
    /// parent, and every child position lies inside the parent's variables.
    pub fn validate(&self) -> Result<(), ModuleError> {
        for module in self.iter() {
            for link in module.children() {
                let child = self.get(&link.name)?;
                if child.parent() != Some(module.name()) {
                    return Err(ModuleError::InconsistentLink {
                        parent: module.name().to_string(),
                        child: link.name.clone(),
                        actual: child.parent().map(str::to_string),
                    });
                }
                if link.position >= module.var_count() {
                    return Err(ModuleError::PositionOutOfRange {
                        parent: module.name().to_string(),
                        child: link.name.clone(),
                        position: link.position,
                        var_count: module.var_count(),
                    });
                }
            }
            if let Some(parent) = module.parent() {
                let parent_module = self.get(parent)?;
                if parent_module.child_position(module.name()).is_none() {
                    return Err(ModuleError::UnknownChild {
                        parent: parent.to_string(),
                        child: module.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<Module> for ModuleRepository {
    /// Collects modules; a later module replaces an earlier one of the same
    /// name.
    fn from_iter<I: IntoIterator<Item = Module>>(iter: I) -> Self {
        let mut repo = Self::new();
        for module in iter {
            repo.upsert(module);
        }
        repo
    }
}

impl IntoIterator for ModuleRepository {
    type Item = Module;
    type IntoIter = indexmap::map::IntoValues<String, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.into_values()
    }
}
