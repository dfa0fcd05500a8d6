//! Sum-of-products function tables.

use std::fmt;

use crate::error::FunctionError;

/// One input position of a row: `0`, `1` or don't-care (`-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    /// Variable must be 0.
    Zero,
    /// Variable must be 1.
    One,
    /// Variable does not affect the row.
    DontCare,
}

impl Literal {
    /// The character used in PLA text and on the wire.
    pub fn as_char(self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
            Self::DontCare => '-',
        }
    }

    /// The ASCII byte used on the wire.
    pub fn as_byte(self) -> u8 {
        self.as_char() as u8
    }
}

impl TryFrom<char> for Literal {
    type Error = FunctionError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '0' => Ok(Self::Zero),
            '1' => Ok(Self::One),
            '-' => Ok(Self::DontCare),
            other => Err(FunctionError::InvalidLiteral(other)),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Parses a ternary string such as `"01-"` into literals.
///
/// # Examples
///
/// ```
/// use pla_compose::function::{parse_literals, Literal};
///
/// let lits = parse_literals("1-0").unwrap();
/// assert_eq!(lits, vec![Literal::One, Literal::DontCare, Literal::Zero]);
/// assert!(parse_literals("10x").is_err());
/// ```
pub fn parse_literals(text: &str) -> Result<Vec<Literal>, FunctionError> {
    text.chars().map(Literal::try_from).collect()
}

/// Parses an output bit character.
pub fn parse_output(c: char) -> Result<bool, FunctionError> {
    match c {
        '0' => Ok(false),
        '1' => Ok(true),
        other => Err(FunctionError::InvalidOutput(other)),
    }
}

/// A single row: an input cube and its output bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    /// Input literals, one per variable.
    pub inputs: Vec<Literal>,
    /// Output bit.
    pub output: bool,
}

impl Row {
    /// Creates a row from literals and an output bit.
    pub fn new(inputs: Vec<Literal>, output: bool) -> Self {
        Self { inputs, output }
    }

    /// Parses a row from its ternary string and output bit.
    pub fn parse(inputs: &str, output: char) -> Result<Self, FunctionError> {
        Ok(Self {
            inputs: parse_literals(inputs)?,
            output: parse_output(output)?,
        })
    }

    /// The input cube rendered as text.
    pub fn inputs_text(&self) -> String {
        self.inputs.iter().map(|l| l.as_char()).collect()
    }
}

/// A PLA-style Boolean function: rows over a fixed number of variables, with
/// running tallies of rows per output bit.
///
/// # Examples
///
/// ```
/// use pla_compose::function::FunctionTable;
///
/// let mut table = FunctionTable::new(2);
/// table.push_parsed("1-", '1').unwrap();
/// table.push_parsed("00", '0').unwrap();
///
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.ones(), 1);
/// assert_eq!(table.zeros(), 1);
/// assert!(table.push_parsed("1", '1').is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionTable {
    var_count: usize,
    rows: Vec<Row>,
    counts: [usize; 2],
}

impl FunctionTable {
    /// Creates an empty table over `var_count` variables.
    pub fn new(var_count: usize) -> Self {
        Self {
            var_count,
            rows: Vec::new(),
            counts: [0, 0],
        }
    }

    /// Creates an empty table with room for `rows` rows.
    pub fn with_capacity(var_count: usize, rows: usize) -> Self {
        Self {
            var_count,
            rows: Vec::with_capacity(rows),
            counts: [0, 0],
        }
    }

    /// Builds a table from rows, validating every row's width.
    pub fn from_rows(
        var_count: usize,
        rows: impl IntoIterator<Item = Row>,
    ) -> Result<Self, FunctionError> {
        let mut table = Self::new(var_count);
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// Appends a row, keeping the output tallies current.
    pub fn push(&mut self, row: Row) -> Result<(), FunctionError> {
        if row.inputs.len() != self.var_count {
            return Err(FunctionError::RowWidth {
                expected: self.var_count,
                actual: row.inputs.len(),
            });
        }
        self.counts[usize::from(row.output)] += 1;
        self.rows.push(row);
        Ok(())
    }

    /// Parses and appends a row.
    pub fn push_parsed(&mut self, inputs: &str, output: char) -> Result<(), FunctionError> {
        self.push(Row::parse(inputs, output)?)
    }

    /// Number of input variables.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose output is 0.
    pub fn zeros(&self) -> usize {
        self.counts[0]
    }

    /// Rows whose output is 1.
    pub fn ones(&self) -> usize {
        self.counts[1]
    }

    /// Output of the first row whose inputs equal `inputs` exactly.
    ///
    /// Don't-care positions are compared literally, not expanded. Returns
    /// `false` when no row matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use pla_compose::function::{parse_literals, FunctionTable};
    ///
    /// let mut table = FunctionTable::new(2);
    /// table.push_parsed("1-", '1').unwrap();
    ///
    /// assert!(table.value_of(&parse_literals("1-").unwrap()));
    /// // "10" is covered by "1-" but the lookup is an exact match.
    /// assert!(!table.value_of(&parse_literals("10").unwrap()));
    /// ```
    pub fn value_of(&self, inputs: &[Literal]) -> bool {
        self.rows
            .iter()
            .find(|row| row.inputs == inputs)
            .is_some_and(|row| row.output)
    }

    /// Iterator over rows with the given output bit, in table order.
    pub fn rows_with_output(&self, output: bool) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(move |row| row.output == output)
    }
}

impl fmt::Display for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}\t{}", row.inputs_text(), u8::from(row.output))?;
        }
        Ok(())
    }
}
