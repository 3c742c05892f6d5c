//! Counting paths and satisfying assignments.
//!
//! Counting is a single top-down sweep: every node receives the sum of the counts of its incoming
//! arcs and hands it on to its children. The counts are arbitrary-precision integers, so a count
//! travels through the levelized priority queue as one record per non-zero 64-bit limb. A node
//! sums the limbs of all its requests once the sweep reaches it.

use std::cmp::Ordering;

use log::debug;
use num_bigint::BigUint;

use crate::config::Config;
use crate::dd::Dd;
use crate::error::{Error, Result};
use crate::lpq::{LevelMerger, LevelOrder, LevelizedPq};
use crate::ptr::{Label, Ptr};
use crate::record::{read_ptr, read_u32, read_u64, write_ptr, write_u32, write_u64, Record};
use crate::sorter::Order;

/// The `limb`-th 64-bit digit of a count that reaches `target`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct CountRequest {
    target: Ptr,
    limb: u32,
    value: u64,
}

impl Record for CountRequest {
    const SIZE: usize = 20;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, self.target);
        write_u32(buf, 8, self.limb);
        write_u64(buf, 12, self.value);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            target: read_ptr(buf, 0),
            limb: read_u32(buf, 8),
            value: read_u64(buf, 12),
        }
    }
}

struct ByTarget;

impl Order<CountRequest> for ByTarget {
    fn cmp(a: &CountRequest, b: &CountRequest) -> Ordering {
        (a.target, a.limb, a.value).cmp(&(b.target, b.limb, b.value))
    }
}

impl LevelOrder<CountRequest> for ByTarget {
    const DESCENDING: bool = false;

    fn level(req: &CountRequest) -> Label {
        req.target.label()
    }
}

/// Sends `count` on to `target`; counts reaching `⊤` are added to `result` right away.
fn forward(
    pq: &mut LevelizedPq<CountRequest, ByTarget>,
    result: &mut BigUint,
    target: Ptr,
    count: &BigUint,
) -> Result<()> {
    if target.is_terminal() {
        if target.value() {
            *result += count;
        }
        return Ok(());
    }
    for (limb, value) in count.iter_u64_digits().enumerate() {
        if value != 0 {
            pq.push(CountRequest {
                target,
                limb: limb as u32,
                value,
            })?;
        }
    }
    Ok(())
}

/// Sums the counts that reach `⊤`, with `weight` scaling the count of every arc.
fn sweep(config: &Config, dd: &Dd, weight: impl Fn(Ptr, Ptr) -> u64) -> Result<BigUint> {
    if dd.is_terminal() {
        return Ok(if dd.value() { BigUint::from(1u32) } else { BigUint::ZERO });
    }

    let mut nodes = dd.nodes()?;
    let root = nodes.peek().uid;

    // A count over `k` levels needs at most `k / 64 + 1` limbs.
    let limbs = dd.varcount() / 64 + 1;
    let bound = dd.file.max_2level_cut().saturating_add(2).saturating_mul(limbs);
    let levels = LevelMerger::new(false).add_nodes(&dd.file)?;
    let mut pq = LevelizedPq::<CountRequest, ByTarget>::new(config, levels, config.memory_available(), bound)?;

    let mut result = BigUint::ZERO;
    forward(&mut pq, &mut result, root, &BigUint::from(1u32))?;

    while !pq.is_empty() {
        pq.setup_next_level(None)?;
        while pq.can_pull() {
            let target = pq.top().target;
            let mut count = BigUint::ZERO;
            while pq.can_pull() && pq.top().target == target {
                let req = pq.pull()?;
                count += BigUint::from(req.value) << (64 * req.limb as u64);
            }

            let n = nodes.seek(target)?;
            for child in n.children() {
                let c = &count << weight(n.uid, child);
                forward(&mut pq, &mut result, child, &c)?;
            }
        }
    }
    Ok(result)
}

/// Number of paths from the root to `⊤`.
pub fn pathcount(config: &Config, dd: &Dd) -> Result<BigUint> {
    debug!("pathcount: {} nodes", dd.nodecount());
    sweep(config, dd, |_, _| 0)
}

/// Number of assignments to `varcount` variables that satisfy the BDD `dd`.
///
/// Every level skipped by an arc doubles the count along it. Fails with
/// [`Error::VarcountTooSmall`] if `varcount` is smaller than the number of levels of `dd`.
pub fn satcount(config: &Config, dd: &Dd, varcount: u64) -> Result<BigUint> {
    let labels = dd.labels()?;
    let levels = labels.len() as u64;
    if varcount < levels {
        return Err(Error::VarcountTooSmall { varcount, levels });
    }
    debug!("satcount: {} nodes over {} variables", dd.nodecount(), varcount);

    let index = |p: Ptr| -> u64 {
        if p.is_node() {
            labels.partition_point(|&l: &Label| l < p.label()) as u64
        } else {
            levels
        }
    };
    let paths = sweep(config, dd, |source, target| index(target) - index(source) - 1)?;
    // The root sits on the topmost level; the variables outside the diagram are free.
    Ok(paths << (varcount - levels))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build;
    use crate::config::MemoryMode;

    #[test]
    fn test_terminals() {
        let config = Config::default();
        let t = Dd::terminal(&config, true).unwrap();
        let f = Dd::terminal(&config, false).unwrap();
        assert_eq!(pathcount(&config, &t).unwrap(), BigUint::from(1u32));
        assert_eq!(pathcount(&config, &f).unwrap(), BigUint::ZERO);
        assert_eq!(satcount(&config, &t, 3).unwrap(), BigUint::from(8u32));
        assert_eq!(satcount(&config, &f, 3).unwrap(), BigUint::ZERO);
    }

    #[test]
    fn test_cube_and_clause() {
        let config = Config::default();
        let cube = build::bdd_and(&config, &[1, 2]).unwrap();
        assert_eq!(satcount(&config, &cube, 2).unwrap(), BigUint::from(1u32));
        assert_eq!(satcount(&config, &cube, 5).unwrap(), BigUint::from(8u32));
        assert_eq!(pathcount(&config, &cube).unwrap(), BigUint::from(1u32));

        let clause = build::bdd_or(&config, &[1, 2, 4]).unwrap();
        assert_eq!(satcount(&config, &clause, 3).unwrap(), BigUint::from(7u32));
        assert_eq!(satcount(&config, &clause, 4).unwrap(), BigUint::from(14u32));
        assert_eq!(pathcount(&config, &clause).unwrap(), BigUint::from(3u32));
    }

    #[test]
    fn test_negated_handle() {
        let config = Config::default();
        let cube = build::bdd_and(&config, &[0, 1]).unwrap();
        let not_cube = Dd::with_negation(cube.file.clone(), true);
        assert_eq!(satcount(&config, &not_cube, 2).unwrap(), BigUint::from(3u32));
    }

    #[test]
    fn test_zdd_family_size() {
        let config = Config::default();
        let powerset = build::zdd_powerset(&config, &[0, 2, 5]).unwrap();
        assert_eq!(pathcount(&config, &powerset).unwrap(), BigUint::from(8u32));
        let nonempty = build::zdd_nonempty_subsets(&config, &[0, 2, 5]).unwrap();
        assert_eq!(pathcount(&config, &nonempty).unwrap(), BigUint::from(7u32));
    }

    #[test]
    fn test_varcount_too_small() {
        let config = Config::default();
        let cube = build::bdd_and(&config, &[1, 2]).unwrap();
        let err = satcount(&config, &cube, 1).unwrap_err();
        assert!(
            matches!(err, Error::VarcountTooSmall { varcount: 1, levels: 2 }),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_counts_beyond_one_limb() {
        let config = Config::default()
            .with_memory_mode(MemoryMode::External)
            .with_memory_limit(0)
            .with_block_records(2);
        let labels: Vec<Label> = (0..70).collect();
        let powerset = build::zdd_powerset(&config, &labels).unwrap();
        assert_eq!(pathcount(&config, &powerset).unwrap(), BigUint::from(1u32) << 70u32);

        let x = build::bdd_ithvar(&config, 3).unwrap();
        assert_eq!(satcount(&config, &x, 130).unwrap(), BigUint::from(1u32) << 129u32);
    }

    #[test]
    fn test_limb_record_layout() {
        let req = CountRequest {
            target: Ptr::node(2, 5),
            limb: 3,
            value: u64::MAX,
        };
        let mut buf = [0u8; CountRequest::SIZE];
        req.write_le(&mut buf);
        assert_eq!(CountRequest::read_le(&buf), req);
    }
}
