mod common;

use test_log::test;

use num_bigint::BigUint;

use extdd::bdd::Bdd;
use extdd::config::{Config, MemoryMode};
use extdd::manager::Manager;
use extdd::ptr::Label;

fn label(n: usize, i: usize, j: usize) -> Label {
    (i * n + j) as Label
}

fn place(mgr: &Manager, n: usize, i: usize, j: usize) -> Bdd {
    let mut literals = vec![];
    for r in 0..n {
        for c in 0..n {
            if r == i && c == j {
                literals.push((label(n, r, c), true));
            } else if r == i
                || c == j
                || (r as isize - c as isize) == (i as isize - j as isize)
                || r + c == i + j
            {
                literals.push((label(n, r, c), false));
            }
        }
    }
    mgr.cube(&literals).unwrap()
}

fn queens(mgr: &Manager, n: usize) -> BigUint {
    let mut board = mgr.one().unwrap();
    for i in 0..n {
        let row: Vec<Bdd> = (0..n).map(|j| place(mgr, n, i, j)).collect();
        let row = mgr.apply_or_many(&row).unwrap();
        board = mgr.apply_and(&board, &row).unwrap();
    }
    mgr.sat_count(&board, (n * n) as u64).unwrap()
}

#[test]
fn test_small_boards() {
    for (mode, mgr) in common::managers() {
        log::info!("mode = {}", mode);
        let expected = [1u32, 0, 0, 2, 10];
        for (n, &count) in (1..=5).zip(&expected) {
            assert_eq!(queens(&mgr, n), BigUint::from(count), "{}-queens ({})", n, mode);
        }
    }
}

#[test]
fn test_eight_queens() {
    let mgr = Manager::default();
    assert_eq!(queens(&mgr, 8), BigUint::from(92u32));
}

#[test]
fn test_eight_queens_external() {
    let config = Config::default()
        .with_memory_mode(MemoryMode::External)
        .with_memory_limit(0)
        .with_block_records(16);
    let mgr = Manager::new(config);
    assert_eq!(queens(&mgr, 8), BigUint::from(92u32));
}
