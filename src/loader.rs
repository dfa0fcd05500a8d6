//! Job loading: module map plus PLA sources.
//!
//! A module map lists modules first, one `NAME path.pla` per line, then the
//! tree, one `NAME mapping` per line:
//!
//! ```text
//! # modules
//! M1 plas/root.pla
//! M2 plas/left.pla
//! M3 plas/right.pla
//! # tree
//! M1 aM2bM3
//! ```
//!
//! A mapping spells out the parent's inputs slot by slot. `M` followed by
//! digits names a child occupying one slot; any other character is a plain
//! input. Above, `M2` feeds input 1 of `M1` and `M3` input 3. The first
//! non-comment line without `.pla` starts the tree section.
//!
//! Problems with single entries are logged and skipped so the rest of the
//! job still loads; [`LoadReport`] lists them.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::function::{pla, FunctionTable};
use crate::module::{Module, ModuleRepository};

/// An entry the loader skipped or could only partly load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIssue {
    /// 1-based line in the module map; 0 for whole-job checks.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// Issues collected while loading a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Skipped or partly loaded entries, in file order.
    pub issues: Vec<LoadIssue>,
}

impl LoadReport {
    /// `true` when everything loaded.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn skip(&mut self, line: usize, message: String) {
        warn!(line, "{message}");
        self.issues.push(LoadIssue { line, message });
    }
}

/// Reads module maps and the PLA files they name.
#[derive(Debug, Clone, Default)]
pub struct JobLoader {
    base_dir: PathBuf,
}

impl JobLoader {
    /// Loader resolving relative PLA paths against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Reads a module map file. Relative PLA paths resolve against the
    /// map's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<(ModuleRepository, LoadReport), ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let loaded = Self::new(base_dir).parse(&text);
        info!(
            path = %path.display(),
            modules = loaded.0.len(),
            issues = loaded.1.issues.len(),
            "job loaded"
        );
        Ok(loaded)
    }

    /// Parses module map text.
    pub fn parse(&self, text: &str) -> (ModuleRepository, LoadReport) {
        let mut repo = ModuleRepository::new();
        let mut report = LoadReport::default();
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .peekable();

        while let Some((line_no, line)) = lines.next_if(|(_, line)| line.contains(".pla")) {
            self.load_module(line_no, line, &mut repo, &mut report);
        }
        for (line_no, line) in lines {
            link_children(line_no, line, &mut repo, &mut report);
        }

        if let Err(err) = repo.validate() {
            report.skip(0, format!("module tree is inconsistent: {err}"));
        }
        (repo, report)
    }

    fn load_module(
        &self,
        line_no: usize,
        line: &str,
        repo: &mut ModuleRepository,
        report: &mut LoadReport,
    ) {
        let Some((name, rest)) = line.split_once(char::is_whitespace) else {
            report.skip(line_no, format!("module line has no path: {line:?}"));
            return;
        };
        let rest = rest.trim();
        let Some(end) = rest.find(".pla") else {
            report.skip(line_no, format!("module line has no path: {line:?}"));
            return;
        };
        let source = self.base_dir.join(&rest[..end + ".pla".len()]);

        let function = match pla::load(&source) {
            Ok(function) => function,
            Err(err) => {
                report.skip(
                    line_no,
                    format!("module {name} keeps an empty function: {err}"),
                );
                FunctionTable::default()
            }
        };
        if let Err(err) = repo.insert(Module::new(name, function).with_source(source)) {
            report.skip(line_no, err.to_string());
        }
    }
}

/// Child references of a mapping as `(name, slot)` pairs.
///
/// # Examples
///
/// ```
/// use pla_compose::loader::mapping_children;
///
/// assert_eq!(
///     mapping_children("aM12bM3"),
///     vec![("M12".to_string(), 1), ("M3".to_string(), 3)]
/// );
/// ```
pub fn mapping_children(mapping: &str) -> Vec<(String, usize)> {
    let mut children = Vec::new();
    let mut chars = mapping.chars().peekable();
    let mut slot = 0;
    while let Some(c) = chars.next() {
        if c == 'M' {
            let mut name = String::from('M');
            while let Some(digit) = chars.next_if(char::is_ascii_digit) {
                name.push(digit);
            }
            children.push((name, slot));
        }
        slot += 1;
    }
    children
}

fn link_children(line_no: usize, line: &str, repo: &mut ModuleRepository, report: &mut LoadReport) {
    let mut words = line.split_whitespace();
    let (Some(parent), Some(mapping), None) = (words.next(), words.next(), words.next()) else {
        report.skip(line_no, format!("expected `NAME mapping`, got {line:?}"));
        return;
    };
    if !repo.contains(parent) {
        report.skip(line_no, format!("mapping for unknown module {parent}"));
        return;
    }
    for (child, position) in mapping_children(mapping) {
        if let Err(err) = repo.attach_child(parent, &child, position) {
            report.skip(line_no, format!("cannot attach {child} to {parent}: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) {
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn slots_count_child_tokens_once() {
        assert_eq!(
            mapping_children("M1M22x"),
            vec![("M1".to_string(), 0), ("M22".to_string(), 1)]
        );
        assert!(mapping_children("abc").is_empty());
    }

    #[test]
    fn loads_modules_and_links_children() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "r.pla", ".i 3\n.o 1\n1-1 1\n.e\n");
        write(dir.path(), "a.pla", ".i 2\n.o 1\n11 1\n.e\n");
        write(
            dir.path(),
            "job.conf",
            "# job\nR r.pla\nA a.pla\n\nR xM1x\n",
        );
        // M1 is not a module of this job: the link is skipped.
        let (repo, report) = JobLoader::load(dir.path().join("job.conf")).unwrap();
        assert_eq!(repo.names().collect::<Vec<_>>(), vec!["R", "A"]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].line, 5);
    }

    #[test]
    fn attaches_children_at_their_slots() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "r.pla", ".i 3\n.o 1\n1-1 1\n.e\n");
        write(dir.path(), "c.pla", ".i 1\n.o 1\n1 1\n.e\n");
        let loader = JobLoader::new(dir.path());
        let (repo, report) = loader.parse("M1 r.pla\nM2 c.pla\nM3 c.pla\nM1 M2xM3\n");

        assert!(report.is_clean(), "{:?}", report.issues);
        let root = repo.get("M1").unwrap();
        assert_eq!(root.child_position("M2"), Some(0));
        assert_eq!(root.child_position("M3"), Some(2));
        assert_eq!(root.level(), 1);
        assert_eq!(repo.get("M2").unwrap().parent(), Some("M1"));
        assert_eq!(
            repo.get("M2").unwrap().source(),
            Some(dir.path().join("c.pla").as_path())
        );
    }

    #[test]
    fn unreadable_pla_leaves_an_empty_function() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, report) = JobLoader::new(dir.path()).parse("M1 missing.pla\n");
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get("M1").unwrap().var_count(), 0);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("M1"));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.pla", ".i 1\n.o 1\n1 1\n");
        let (repo, report) =
            JobLoader::new(dir.path()).parse("M1 a.pla\nM1 a.pla\nM9 M1\nM1\n");
        assert_eq!(repo.len(), 1);
        let lines: Vec<usize> = report.issues.iter().map(|i| i.line).collect();
        // duplicate module, unknown parent, missing mapping
        assert_eq!(lines, vec![2, 3, 4]);
    }

    #[test]
    fn missing_map_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            JobLoader::load(dir.path().join("nope.conf")),
            Err(ConfigError::Io { .. })
        ));
    }
}
