//! PLA source text reader.
//!
//! Accepts the single-output subset of the Berkeley PLA format used by module
//! sources:
//!
//! ```text
//! # comment
//! .i 3
//! .o 1
//! .p 2
//! 1-0 1
//! 011 0
//! .e
//! ```

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::ConfigError;

use super::table::{FunctionTable, Row};

/// Upper bound on rows reserved up front from a `.p` header.
const MAX_PREALLOCATED_ROWS: usize = 4096;

/// Parses PLA text. `path` is only used in error messages.
///
/// # Examples
///
/// ```
/// use pla_compose::function::pla;
///
/// let text = ".i 2\n.o 1\n.p 1\n1- 1\n.e\n";
/// let table = pla::parse(text, "inline.pla").unwrap();
/// assert_eq!(table.var_count(), 2);
/// assert_eq!(table.ones(), 1);
/// ```
pub fn parse(text: &str, path: impl AsRef<Path>) -> Result<FunctionTable, ConfigError> {
    let path = path.as_ref();
    let err = |line: usize, message: String| ConfigError::Pla {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut inputs: Option<usize> = None;
    let mut outputs: Option<usize> = None;
    let mut declared_rows: Option<usize> = None;
    let mut table: Option<FunctionTable> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(directive) = line.strip_prefix('.') {
            let mut parts = directive.split_whitespace();
            let key = parts.next().unwrap_or_default();
            if key == "e" {
                break;
            }
            if table.is_some() {
                return Err(err(line_no, format!("header .{key} after the first row")));
            }
            let value = parts
                .next()
                .ok_or_else(|| err(line_no, format!(".{key} needs a value")))?
                .parse::<usize>()
                .map_err(|e| err(line_no, format!(".{key}: {e}")))?;
            match key {
                "i" => inputs = Some(value),
                "o" => outputs = Some(value),
                "p" => declared_rows = Some(value),
                other => warn!(path = %path.display(), line = line_no, "ignoring PLA directive .{other}"),
            }
            continue;
        }

        if table.is_none() {
            let var_count =
                inputs.ok_or_else(|| err(line_no, "row before .i header".to_string()))?;
            if let Some(o) = outputs.filter(|&o| o != 1) {
                return Err(err(
                    line_no,
                    format!("only single-output tables are supported, .o is {o}"),
                ));
            }
            // `.p` is only a hint; it is checked against the rows read below.
            table = Some(FunctionTable::with_capacity(
                var_count,
                declared_rows.unwrap_or(0).min(MAX_PREALLOCATED_ROWS),
            ));
        }

        let mut fields = line.split_whitespace();
        let (Some(cube), Some(output), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(err(line_no, format!("expected `<inputs> <output>`, got {line:?}")));
        };
        let mut output_chars = output.chars();
        let (Some(bit), None) = (output_chars.next(), output_chars.next()) else {
            return Err(err(line_no, format!("output must be a single bit, got {output:?}")));
        };
        let row = Row::parse(cube, bit).map_err(|e| err(line_no, e.to_string()))?;
        if let Some(table) = table.as_mut() {
            table.push(row).map_err(|e| err(line_no, e.to_string()))?;
        }
    }

    let table = match table {
        Some(table) => table,
        None => {
            let var_count = inputs.ok_or_else(|| err(0, "missing .i header".to_string()))?;
            FunctionTable::new(var_count)
        }
    };

    if let Some(declared) = declared_rows.filter(|&p| p != table.len()) {
        warn!(
            path = %path.display(),
            declared,
            actual = table.len(),
            "PLA .p count disagrees with the rows read"
        );
    }
    Ok(table)
}

/// Reads and parses a PLA file.
pub fn load(path: impl AsRef<Path>) -> Result<FunctionTable, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: PathBuf::from(path),
    })?;
    parse(&text, path)
}
