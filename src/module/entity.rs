//! The module entity: one node of the composition tree.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ModuleError;
use crate::function::FunctionTable;

/// Records which input variable of a parent a child's output occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildLink {
    /// Child module name.
    pub name: String,
    /// Input position in the parent's function.
    pub position: usize,
}

impl ChildLink {
    /// Creates a link.
    pub fn new(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// A named sub-function of the composition tree.
///
/// Parent and children are referenced by name; the owning map is
/// [`ModuleRepository`](super::ModuleRepository).
///
/// # Examples
///
/// ```
/// use pla_compose::function::FunctionTable;
/// use pla_compose::module::Module;
///
/// let module = Module::new("M1", FunctionTable::new(3));
/// assert_eq!(module.name(), "M1");
/// assert!(module.is_root());
/// assert!(module.is_leaf());
/// assert_eq!(module.level(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: String,
    function: FunctionTable,
    parent: Option<String>,
    children: Vec<ChildLink>,
    assigned_worker: usize,
    level: u32,
    source: Option<PathBuf>,
}

impl Module {
    /// Creates a detached module at level 0 assigned to worker 0.
    pub fn new(name: impl Into<String>, function: FunctionTable) -> Self {
        Self {
            name: name.into(),
            function,
            parent: None,
            children: Vec::new(),
            assigned_worker: 0,
            level: 0,
            source: None,
        }
    }

    /// Rebuilds a module received over the wire. Parent, worker and level
    /// take their defaults; they are not part of the encoding.
    pub fn from_parts(
        name: impl Into<String>,
        function: FunctionTable,
        children: Vec<ChildLink>,
    ) -> Self {
        Self {
            children,
            ..Self::new(name, function)
        }
    }

    /// Records the PLA file the function came from.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module's function.
    pub fn function(&self) -> &FunctionTable {
        &self.function
    }

    /// Replaces the module's function.
    pub fn set_function(&mut self, function: FunctionTable) {
        self.function = function;
    }

    /// Number of input variables of the module's function.
    pub fn var_count(&self) -> usize {
        self.function.var_count()
    }

    /// Parent module name, if attached.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub(crate) fn set_parent(&mut self, parent: impl Into<String>) {
        self.parent = Some(parent.into());
    }

    /// Child links in attachment order.
    pub fn children(&self) -> &[ChildLink] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, link: ChildLink) {
        self.children.push(link);
    }

    /// Input position recorded for the named child.
    pub fn child_position(&self, child: &str) -> Option<usize> {
        self.children
            .iter()
            .find(|link| link.name == child)
            .map(|link| link.position)
    }

    /// Worker the module is assigned to.
    pub fn assigned_worker(&self) -> usize {
        self.assigned_worker
    }

    /// Assigns the module to a worker.
    pub fn set_assigned_worker(&mut self, worker: usize) {
        self.assigned_worker = worker;
    }

    /// Scheduling level; children are compiled before parents.
    pub fn level(&self) -> u32 {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    /// PLA source path, when loaded from a file.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// `true` when the module has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `true` when the module has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Shifts child positions after `merged_child` was substituted in.
    ///
    /// Every child whose position lies after the merged child's position
    /// moves by `son_var_count - 1`: the merged child's single slot became
    /// `son_var_count` slots.
    ///
    /// # Examples
    ///
    /// ```
    /// use pla_compose::function::FunctionTable;
    /// use pla_compose::module::{ChildLink, Module};
    ///
    /// let mut parent = Module::from_parts(
    ///     "P",
    ///     FunctionTable::new(4),
    ///     vec![ChildLink::new("A", 1), ChildLink::new("B", 3), ChildLink::new("C", 0)],
    /// );
    /// parent.adjust_positions("A", 3).unwrap();
    /// assert_eq!(parent.child_position("A"), Some(1));
    /// assert_eq!(parent.child_position("B"), Some(5));
    /// assert_eq!(parent.child_position("C"), Some(0));
    /// ```
    pub fn adjust_positions(
        &mut self,
        merged_child: &str,
        son_var_count: usize,
    ) -> Result<(), ModuleError> {
        let anchor = self
            .child_position(merged_child)
            .ok_or_else(|| ModuleError::UnknownChild {
                parent: self.name.clone(),
                child: merged_child.to_string(),
            })?;
        for link in &mut self.children {
            if link.position > anchor {
                link.position = link.position + son_var_count - 1;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        if let Some(source) = &self.source {
            writeln!(f, "Source: {}", source.display())?;
        }
        if let Some(parent) = &self.parent {
            writeln!(f, "Parent: {parent}")?;
        }
        writeln!(f, "Assigned worker: {}", self.assigned_worker)?;
        writeln!(f, "Level: {}", self.level)?;
        if !self.children.is_empty() {
            writeln!(f, "Children:")?;
            for link in &self.children {
                writeln!(f, "\t{} at position {}", link.name, link.position)?;
            }
        }
        writeln!(f, "Function ({} variables):", self.function.var_count())?;
        write!(f, "{}", self.function)
    }
}
