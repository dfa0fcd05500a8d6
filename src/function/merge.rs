//! Substitution of one function into an input of another.

use crate::error::FunctionError;

use super::table::{FunctionTable, Literal, Row};

/// Substitutes `son` for the variable at `position` of `parent`.
///
/// The result ranges over `parent.var_count() - 1 + son.var_count()`
/// variables: the parent's variables before `position`, then the son's
/// variables, then the parent's remaining variables. Parent rows are bucketed
/// by their literal at `position`:
///
/// - `0` rows pair with every son row whose output is 0,
/// - `1` rows pair with every son row whose output is 1,
/// - `-` rows get an all-don't-care block and no pairing.
///
/// Each produced row keeps the parent row's output bit. Rows are emitted in
/// bucket order (`0`, `1`, `-`), parent order within a bucket and son order
/// within a pairing. Nothing is deduplicated or minimized.
///
/// # Examples
///
/// ```
/// use pla_compose::function::{merge, FunctionTable};
///
/// // f(a, b) = a AND b
/// let mut parent = FunctionTable::new(2);
/// parent.push_parsed("11", '1').unwrap();
/// parent.push_parsed("0-", '0').unwrap();
///
/// // g(x, y) = x OR y, substituted for `a`
/// let mut son = FunctionTable::new(2);
/// son.push_parsed("1-", '1').unwrap();
/// son.push_parsed("-1", '1').unwrap();
/// son.push_parsed("00", '0').unwrap();
///
/// let merged = merge(&parent, &son, 0).unwrap();
/// assert_eq!(merged.var_count(), 3);
/// // one 0-row x one 0-son-row + one 1-row x two 1-son-rows
/// assert_eq!(merged.len(), 3);
/// assert_eq!(merged.to_string(), "00-\t0\n1-1\t1\n-11\t1\n");
/// ```
pub fn merge(
    parent: &FunctionTable,
    son: &FunctionTable,
    position: usize,
) -> Result<FunctionTable, FunctionError> {
    let var_count = parent.var_count();
    if position >= var_count {
        return Err(FunctionError::PositionOutOfRange {
            position,
            var_count,
        });
    }

    let buckets = Buckets::split(parent, position);
    let son_zero: Vec<&Row> = son.rows_with_output(false).collect();
    let son_one: Vec<&Row> = son.rows_with_output(true).collect();
    let dont_care = vec![Literal::DontCare; son.var_count()];

    let row_count = buckets.zero.len() * son_zero.len()
        + buckets.one.len() * son_one.len()
        + buckets.dont_care.len();
    let mut merged = FunctionTable::with_capacity(var_count - 1 + son.var_count(), row_count);

    for (bucket, partners) in [(&buckets.zero, &son_zero), (&buckets.one, &son_one)] {
        for row in bucket {
            for partner in partners {
                merged.push(splice(row, position, &partner.inputs))?;
            }
        }
    }
    for row in &buckets.dont_care {
        merged.push(splice(row, position, &dont_care))?;
    }

    debug_assert_eq!(merged.len(), row_count);
    Ok(merged)
}

/// Replaces the literal at `position` of `row` with `block`.
fn splice(row: &Row, position: usize, block: &[Literal]) -> Row {
    let mut inputs = Vec::with_capacity(row.inputs.len() - 1 + block.len());
    inputs.extend_from_slice(&row.inputs[..position]);
    inputs.extend_from_slice(block);
    inputs.extend_from_slice(&row.inputs[position + 1..]);
    Row::new(inputs, row.output)
}

/// Parent rows partitioned by their literal at the substitution position.
struct Buckets<'a> {
    zero: Vec<&'a Row>,
    one: Vec<&'a Row>,
    dont_care: Vec<&'a Row>,
}

impl<'a> Buckets<'a> {
    fn split(table: &'a FunctionTable, position: usize) -> Self {
        let mut buckets = Self {
            zero: Vec::new(),
            one: Vec::new(),
            dont_care: Vec::new(),
        };
        for row in table.rows() {
            match row.inputs[position] {
                Literal::Zero => buckets.zero.push(row),
                Literal::One => buckets.one.push(row),
                Literal::DontCare => buckets.dont_care.push(row),
            }
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(var_count: usize, rows: &[(&str, char)]) -> FunctionTable {
        let mut t = FunctionTable::new(var_count);
        for (inputs, output) in rows {
            t.push_parsed(inputs, *output).unwrap();
        }
        t
    }

    #[test]
    fn splices_in_the_middle() {
        let parent = table(3, &[("010", '1')]);
        let son = table(2, &[("11", '1'), ("0-", '0')]);
        let merged = merge(&parent, &son, 1).unwrap();
        assert_eq!(merged.to_string(), "0110\t1\n");
    }

    #[test]
    fn splices_at_the_end() {
        let parent = table(2, &[("00", '0'), ("-1", '1')]);
        let son = table(1, &[("0", '1'), ("1", '0')]);
        let merged = merge(&parent, &son, 1).unwrap();
        assert_eq!(merged.to_string(), "01\t0\n-0\t1\n");
    }

    #[test]
    fn dont_care_rows_are_not_multiplied() {
        let parent = table(2, &[("-1", '1'), ("-0", '0')]);
        let son = table(3, &[("111", '1'), ("000", '0'), ("1-0", '1')]);
        let merged = merge(&parent, &son, 0).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.to_string(), "---1\t1\n---0\t0\n");
    }

    #[test]
    fn keeps_parent_output_bits() {
        // Parent maps a=1 to 0: the inverted son rows must carry 0.
        let parent = table(1, &[("1", '0'), ("0", '1')]);
        let son = table(1, &[("1", '1'), ("0", '0')]);
        let merged = merge(&parent, &son, 0).unwrap();
        assert_eq!(merged.to_string(), "0\t1\n1\t0\n");
        assert_eq!((merged.zeros(), merged.ones()), (1, 1));
    }

    #[test]
    fn zero_variable_son_removes_the_slot() {
        let parent = table(2, &[("10", '1'), ("0-", '0')]);
        let son = table(0, &[("", '1')]);
        let merged = merge(&parent, &son, 0).unwrap();
        assert_eq!(merged.var_count(), 1);
        assert_eq!(merged.to_string(), "0\t1\n");
    }

    #[test]
    fn rejects_position_past_the_end() {
        let parent = table(2, &[("10", '1')]);
        let son = table(1, &[("1", '1')]);
        assert_eq!(
            merge(&parent, &son, 2).unwrap_err(),
            FunctionError::PositionOutOfRange {
                position: 2,
                var_count: 2
            }
        );
    }
}
