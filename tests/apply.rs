mod common;

use test_log::test;

use extdd::bool_op::{And, BinaryOperator, Diff, FnOp, Imp, InvImp, Less, Nand, Nor, Or, Xnor, Xor};
use extdd::manager::Manager;

use common::*;

fn check_operator<O: BinaryOperator>(mgr: &Manager, name: &str, op: &O, rng: &mut Rng) {
    for _ in 0..4 {
        let ta = random_table(rng);
        let tb = random_table(rng);
        let a = bdd_from_table(mgr, &ta);
        let b = bdd_from_table(mgr, &tb);

        let res = mgr.apply(&a, &b, op).unwrap();
        assert!(res.dd().file().is_canonical(), "{} result is not canonical", name);

        let expected: Vec<bool> = ta.iter().zip(&tb).map(|(&x, &y)| op.eval(x, y)).collect();
        assert_eq!(table_of(mgr, &res), expected, "{} disagrees with its truth table", name);
    }
}

#[test]
fn test_all_operators_match_truth_tables() {
    let mut rng = Rng::new(42);
    for (mode, mgr) in managers() {
        log::info!("mode = {}", mode);
        check_operator(&mgr, "and", &And, &mut rng);
        check_operator(&mgr, "nand", &Nand, &mut rng);
        check_operator(&mgr, "or", &Or, &mut rng);
        check_operator(&mgr, "nor", &Nor, &mut rng);
        check_operator(&mgr, "xor", &Xor, &mut rng);
        check_operator(&mgr, "xnor", &Xnor, &mut rng);
        check_operator(&mgr, "imp", &Imp, &mut rng);
        check_operator(&mgr, "invimp", &InvImp, &mut rng);
        check_operator(&mgr, "diff", &Diff, &mut rng);
        check_operator(&mgr, "less", &Less, &mut rng);
    }
}

#[test]
fn test_closure_operator() {
    let mut rng = Rng::new(7);
    let mgr = Manager::default();
    let op = FnOp::new(|a, b| a && !b);
    check_operator(&mgr, "closure", &op, &mut rng);
}

#[test]
fn test_negated_operands() {
    let mut rng = Rng::new(1234);
    for (_, mgr) in managers() {
        for _ in 0..4 {
            let ta = random_table(&mut rng);
            let tb = random_table(&mut rng);
            let a = mgr.apply_not(&bdd_from_table(&mgr, &ta));
            let b = bdd_from_table(&mgr, &tb);

            let res = mgr.apply_xor(&a, &b).unwrap();
            let expected: Vec<bool> = ta.iter().zip(&tb).map(|(&x, &y)| !x ^ y).collect();
            assert_eq!(table_of(&mgr, &res), expected);

            let res = mgr.apply_and(&a, &mgr.apply_not(&b)).unwrap();
            let expected: Vec<bool> = ta.iter().zip(&tb).map(|(&x, &y)| !x && !y).collect();
            assert_eq!(table_of(&mgr, &res), expected);
        }
    }
}

#[test]
fn test_terminal_operands() {
    let mut rng = Rng::new(99);
    let mgr = Manager::default();
    let zero = mgr.zero().unwrap();
    let one = mgr.one().unwrap();
    let t = random_table(&mut rng);
    let f = bdd_from_table(&mgr, &t);

    assert!(mgr.apply_and(&f, &zero).unwrap().is_zero());
    assert!(mgr.apply_or(&one, &f).unwrap().is_one());
    assert_eq!(table_of(&mgr, &mgr.apply_and(&one, &f).unwrap()), t);
    assert_eq!(table_of(&mgr, &mgr.apply_or(&f, &zero).unwrap()), t);

    let negated: Vec<bool> = t.iter().map(|&x| !x).collect();
    assert_eq!(table_of(&mgr, &mgr.apply_xor(&f, &one).unwrap()), negated);
    assert_eq!(table_of(&mgr, &mgr.apply_nand(&one, &f).unwrap()), negated);

    assert!(mgr.apply_and(&zero, &one).unwrap().is_zero());
    assert!(mgr.apply_imply(&zero, &zero).unwrap().is_one());
}

#[test]
fn test_same_function_gives_same_file() {
    let mgr = Manager::default();
    let f = mgr.mk_or(&[0, 2, 3]).unwrap();
    let g = mgr
        .apply_or_many(&[mgr.mk_var(3).unwrap(), mgr.mk_var(0).unwrap(), mgr.mk_var(2).unwrap()])
        .unwrap();
    assert_eq!(f.size(), g.size());
    assert!(mgr.apply_xor(&f, &g).unwrap().is_zero());
    assert!(mgr.apply_eq(&f, &g).unwrap().is_one());
}

#[test]
fn test_many_operands() {
    let mgr = Manager::default();
    let xs: Vec<_> = (0..4).map(|v| mgr.mk_var(v).unwrap()).collect();
    let all = mgr.apply_and_many(&xs).unwrap();
    assert_eq!(all.size(), 4);
    assert_eq!(mgr.sat_count(&all, 4).unwrap(), 1u32.into());

    let any = mgr.apply_or_many(&xs).unwrap();
    assert_eq!(mgr.sat_count(&any, 4).unwrap(), 15u32.into());
    assert_eq!(mgr.sat_count(&any, 6).unwrap(), 60u32.into());
    assert_eq!(mgr.sat_count_support(&any).unwrap(), 15u32.into());
    assert_eq!(mgr.path_count(&any).unwrap(), 4u32.into());
}

#[test]
fn test_absorbing_constant_is_returned_as_is() {
    for (_, mgr) in managers() {
        let x = mgr.mk_var(2).unwrap();
        let zero = mgr.zero().unwrap();
        let one = mgr.one().unwrap();

        let res = mgr.apply_and(&x, &zero).unwrap();
        assert!(res.is_zero());
        assert!(res.dd().same_as(zero.dd()));

        let res = mgr.apply_or(&one, &x).unwrap();
        assert!(res.is_one());
        assert!(res.dd().same_as(one.dd()));

        // A negated constant is reused with its flag.
        let not_one = mgr.apply_not(&one);
        let res = mgr.apply_and(&not_one, &x).unwrap();
        assert!(res.dd().same_as(not_one.dd()));

        let empty = mgr.zdd_empty().unwrap();
        let family = mgr.zdd_powerset(&[0, 1]).unwrap();
        let res = mgr.zdd_intersect(&family, &empty).unwrap();
        assert!(res.dd().same_as(empty.dd()));
    }
}
