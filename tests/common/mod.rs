//! Brute-force helpers shared by the integration tests.
#![allow(dead_code)]

use extdd::bdd::Bdd;
use extdd::config::{Config, MemoryMode};
use extdd::manager::Manager;
use extdd::ptr::Label;
use extdd::zdd::Zdd;

/// Number of variables of the brute-forced functions and families.
pub const VARS: u32 = 4;

/// One manager per priority-queue tier. The external one spills after a handful of elements.
pub fn managers() -> Vec<(&'static str, Manager)> {
    vec![
        (
            "internal",
            Manager::new(Config::default().with_memory_mode(MemoryMode::Internal)),
        ),
        (
            "external",
            Manager::new(
                Config::default()
                    .with_memory_mode(MemoryMode::External)
                    .with_memory_limit(0)
                    .with_block_records(2),
            ),
        ),
    ]
}

/// A small xorshift generator, so the tests are deterministic.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn next_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }
}

/// Whether variable `v` is set in the assignment (or set) encoded by `bits`.
pub fn bit(bits: u32, v: Label) -> bool {
    (bits >> v) & 1 == 1
}

pub fn random_table(rng: &mut Rng) -> Vec<bool> {
    (0..1u32 << VARS).map(|_| rng.next_bool()).collect()
}

/// The BDD of a truth table, as the disjunction of its minterms.
pub fn bdd_from_table(mgr: &Manager, table: &[bool]) -> Bdd {
    let mut res = mgr.zero().unwrap();
    for (bits, _) in table.iter().enumerate().filter(|(_, v)| **v) {
        let literals: Vec<(Label, bool)> = (0..VARS).map(|v| (v, bit(bits as u32, v))).collect();
        let minterm = mgr.cube(&literals).unwrap();
        res = mgr.apply_or(&res, &minterm).unwrap();
    }
    res
}

pub fn table_of(mgr: &Manager, f: &Bdd) -> Vec<bool> {
    (0..1u32 << VARS)
        .map(|bits| mgr.eval(f, |v| v < VARS && bit(bits, v)).unwrap())
        .collect()
}

/// A family of subsets of `0..VARS`, as bit masks.
pub fn random_family(rng: &mut Rng) -> Vec<u32> {
    (0..1u32 << VARS).filter(|_| rng.next_bool()).collect()
}

pub fn labels_of(bits: u32) -> Vec<Label> {
    (0..32).filter(|&v| bit(bits, v)).collect()
}

pub fn zdd_from_family(mgr: &Manager, family: &[u32]) -> Zdd {
    let mut res = mgr.zdd_empty().unwrap();
    for &set in family {
        let single = mgr.zdd_single(&labels_of(set)).unwrap();
        res = mgr.zdd_union(&res, &single).unwrap();
    }
    res
}

/// The members of `f` among the subsets of `0..vars`.
pub fn family_of(mgr: &Manager, f: &Zdd, vars: u32) -> Vec<u32> {
    (0..1u32 << vars)
        .filter(|&set| mgr.zdd_contains(f, &labels_of(set)).unwrap())
        .collect()
}
