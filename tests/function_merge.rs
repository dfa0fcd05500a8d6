//! Merge kernel behavior on whole tables.

use pla_compose::error::FunctionError;
use pla_compose::function::{merge, pla, FunctionTable, Literal, Row};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn table(var_count: usize, rows: &[(&str, char)]) -> FunctionTable {
    let mut t = FunctionTable::new(var_count);
    for (inputs, output) in rows {
        t.push_parsed(inputs, *output).unwrap();
    }
    t
}

#[test]
fn identity_son_keeps_the_parent() {
    let parent = table(3, &[("1-0", '1'), ("011", '0'), ("--1", '1')]);
    let identity = table(1, &[("1", '1'), ("0", '0')]);

    for position in 0..3 {
        let merged = merge(&parent, &identity, position).unwrap();
        assert_eq!(merged.var_count(), 3);
        let mut expected: Vec<&Row> = parent.rows().iter().collect();
        let mut actual: Vec<&Row> = merged.rows().iter().collect();
        expected.sort_by_key(|r| (r.inputs.clone(), r.output));
        actual.sort_by_key(|r| (r.inputs.clone(), r.output));
        assert_eq!(actual, expected, "position {position}");
    }
}

#[test]
fn identity_parent_yields_the_son() {
    let identity = table(1, &[("0", '0'), ("1", '1')]);
    let son = table(2, &[("1-", '1'), ("00", '0'), ("01", '1')]);

    let merged = merge(&identity, &son, 0).unwrap();
    assert_eq!(merged.var_count(), 2);
    assert_eq!(merged.to_string(), "00\t0\n1-\t1\n01\t1\n");
}

#[test]
fn and_of_not() {
    // f(a, b) = a AND b, g(x) = NOT x, substituted for a.
    let and = table(2, &[("11", '1'), ("0-", '0'), ("-0", '0')]);
    let not = table(1, &[("0", '1'), ("1", '0')]);

    let merged = merge(&and, &not, 0).unwrap();

    assert_eq!(merged.to_string(), "1-\t0\n01\t1\n-0\t0\n");
    assert_eq!((merged.zeros(), merged.ones()), (2, 1));
}

#[test]
fn son_without_variables_drops_the_input() {
    let parent = table(2, &[("1-", '1'), ("0-", '0'), ("-1", '1')]);
    let constant_one = table(0, &[("", '1')]);

    let merged = merge(&parent, &constant_one, 0).unwrap();

    assert_eq!(merged.var_count(), 1);
    assert_eq!(merged.to_string(), "-\t1\n1\t1\n");
}

#[test]
fn position_past_the_inputs_is_rejected() {
    let parent = table(2, &[("11", '1')]);
    let son = table(1, &[("1", '1')]);

    assert!(matches!(
        merge(&parent, &son, 2),
        Err(FunctionError::PositionOutOfRange {
            position: 2,
            var_count: 2
        })
    ));
}

#[test]
fn merged_pla_files() {
    let dir = tempfile::tempdir().unwrap();
    let parent_path = dir.path().join("parent.pla");
    let son_path = dir.path().join("son.pla");
    std::fs::write(&parent_path, ".i 2\n.o 1\n.p 2\n11 1\n0- 0\n.e\n").unwrap();
    std::fs::write(&son_path, "# or\n.i 2\n.o 1\n1- 1\n-1 1\n00 0\n").unwrap();

    let parent = pla::load(&parent_path).unwrap();
    let son = pla::load(&son_path).unwrap();
    let merged = merge(&parent, &son, 1).unwrap();

    assert_eq!(merged.var_count(), 3);
    assert_eq!(merged.to_string(), "11-\t1\n1-1\t1\n0--\t0\n");
}

// ─── Properties ───────────────────────────────────────────────────────────

fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        Just(Literal::Zero),
        Just(Literal::One),
        Just(Literal::DontCare)
    ]
}

fn table_strategy(max_vars: usize) -> impl Strategy<Value = FunctionTable> {
    (1..=max_vars).prop_flat_map(|vars| {
        prop::collection::vec(
            (prop::collection::vec(literal(), vars), any::<bool>()),
            0..8,
        )
        .prop_map(move |rows| {
            let mut table = FunctionTable::new(vars);
            for (inputs, output) in rows {
                table.push(Row::new(inputs, output)).unwrap();
            }
            table
        })
    })
}

proptest! {
    #[test]
    fn row_count_law(
        parent in table_strategy(4),
        son in table_strategy(3),
        position in 0usize..4,
    ) {
        prop_assume!(position < parent.var_count());
        let merged = merge(&parent, &son, position).unwrap();

        let at = |literal| parent.rows().iter().filter(|r| r.inputs[position] == literal).count();
        let expected = at(Literal::Zero) * son.zeros()
            + at(Literal::One) * son.ones()
            + at(Literal::DontCare);

        prop_assert_eq!(merged.len(), expected);
        prop_assert_eq!(merged.var_count(), parent.var_count() - 1 + son.var_count());
        prop_assert_eq!(merged.zeros() + merged.ones(), merged.len());
    }

    #[test]
    fn untouched_inputs_survive(
        parent in table_strategy(4),
        son in table_strategy(3),
        position in 0usize..4,
    ) {
        prop_assume!(position < parent.var_count());
        let merged = merge(&parent, &son, position).unwrap();
        let width = son.var_count();

        for row in merged.rows() {
            let prefix = &row.inputs[..position];
            let suffix = &row.inputs[position + width..];
            let found = parent.rows().iter().any(|p| {
                p.output == row.output
                    && &p.inputs[..position] == prefix
                    && &p.inputs[position + 1..] == suffix
            });
            prop_assert!(found);
        }
    }

    #[test]
    fn identity_parent_keeps_every_son_row(son in table_strategy(4)) {
        let identity = table(1, &[("0", '0'), ("1", '1')]);
        let merged = merge(&identity, &son, 0).unwrap();

        prop_assert_eq!(merged.var_count(), son.var_count());
        prop_assert_eq!(merged.len(), son.len());
        let mut expected: Vec<&Row> = son.rows().iter().collect();
        let mut actual: Vec<&Row> = merged.rows().iter().collect();
        expected.sort_by_key(|r| (r.inputs.clone(), r.output));
        actual.sort_by_key(|r| (r.inputs.clone(), r.output));
        prop_assert_eq!(actual, expected);
    }
}
