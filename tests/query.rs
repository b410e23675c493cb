use npn_oracle::enumerate::{EnumerateOptions, Enumerator};
use npn_oracle::query::{Op, QueryError, Table, Tree};
use npn_oracle::{raw, Func};
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicBool;

fn build(vars: usize, xor: bool) -> (Enumerator, Table) {
    let mut e = Enumerator::new(EnumerateOptions {
        vars,
        xor,
        ..EnumerateOptions::default()
    })
    .expect("valid options");
    e.run(None, &AtomicBool::new(false)).expect("run");
    let table = Table::from_savepoint(vars, &e.savepoint()).expect("consistent table");
    (e, table)
}

#[test]
fn test_trees_rebuild_every_function() {
    for (vars, xor) in [(2, false), (2, true), (3, false), (3, true)] {
        let (e, table) = build(vars, xor);
        let u = *table.universe();
        for f in 0..u.func_count() {
            let f = Func(f as u32);
            let answer = table.lookup(f).expect("every function is in the table");
            assert_eq!(answer.tree.eval(&u), f, "{f} with {vars} variables");
            assert_eq!(answer.tree.complexity(), answer.size as usize);
            assert_eq!(Some(answer.size), e.size_of(f));
            assert_eq!(table.min_size(f), Ok(answer.size));
        }
    }
}

#[test]
#[ignore]
fn test_trees_rebuild_every_four_variable_function() {
    let (e, table) = build(4, false);
    let u = *table.universe();
    for f in 0..u.func_count() {
        let f = Func(f as u32);
        let answer = table.lookup(f).expect("every function is in the table");
        assert_eq!(answer.tree.eval(&u), f);
        assert_eq!(Some(answer.size), e.size_of(f));
    }
}

#[test]
fn test_two_variable_expressions() {
    let (_, table) = build(2, false);
    let u = *table.universe();
    let (a, b) = (u.literal(0), u.literal(1));

    assert_eq!(
        table.find_tree(u.complement(b)),
        Ok(Tree::Lit {
            var: 1,
            negated: true
        })
    );
    assert_eq!(table.find_tree(a).map(|t| t.to_string()), Ok("a".to_string()));

    let and = table.find_tree(a & b).expect("tree");
    assert!(matches!(and, Tree::Node { op: Op::And, .. }));
    assert!(["a & b", "b & a"].contains(&and.to_string().as_str()));

    let or = table.find_tree(a | u.complement(b)).expect("tree");
    assert!(["a | !b", "!b | a"].contains(&or.to_string().as_str()));

    let xor = table.lookup(a ^ b).expect("answer");
    assert_eq!(xor.size, 3);
    assert_eq!(xor.canon, Func(0x6));
}

#[test]
fn test_xor_gates_appear_when_enabled() {
    let (_, table) = build(3, true);
    let u = *table.universe();
    let parity = u.tabulate(|x| x.iter().filter(|&&v| v).count() % 2 == 1);
    let answer = table.lookup(parity).expect("answer");
    assert_eq!(answer.size, 2);
    assert!(matches!(answer.tree, Tree::Node { op: Op::Xor, .. }));
}

#[test]
fn test_out_of_range_values_are_rejected() {
    let (_, table) = build(2, false);
    assert_eq!(
        table.lookup(Func(0x10)).map(|a| a.size),
        Err(QueryError::OutOfRange(Func(0x10)))
    );
}

#[test]
fn test_raw_table_answers_like_the_savepoint() {
    let (e, table) = build(3, false);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("npn.3.raw");
    let mut file = std::fs::File::create(&path).expect("create");
    raw::write_raw(&mut file, &e.savepoint()).expect("write");
    drop(file);

    let loaded = Table::load_raw(3, &path).expect("load");
    assert_eq!(loaded.len(), 14);
    for f in 0..256 {
        assert_eq!(loaded.min_size(Func(f)), table.min_size(Func(f)));
    }

    let mut listing = Vec::new();
    loaded.dump(&mut listing).expect("dump");
    let listing = String::from_utf8(listing).expect("utf-8");
    assert!(listing.starts_with("# size 0: 1 classes\n0xf = literal (size 0)\n"));
    assert_eq!(listing.lines().filter(|l| !l.starts_with('#')).count(), 14);
    assert!(listing.contains("# size 9: 1 classes"));
}

#[test]
fn test_duplicate_records_are_rejected() {
    let (e, _) = build(2, false);
    let mut sp = e.savepoint();
    sp.howto[2] = sp.howto[1];
    sp.by_size[1][1] = sp.by_size[1][0];
    assert!(Table::from_savepoint(2, &sp).is_err());
}
