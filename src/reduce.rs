//! Bottom-up reduction of an unreduced arc file into a canonical node file.
//!
//! The arcs are processed one level at a time, from the deepest level up. For each level:
//!
//! 1. the nodes are reassembled from their (high, low) arcs, merging the terminal arcs with the
//!    arcs forwarded from below;
//! 2. nodes that the policy eliminates are remapped to their child (*rule 1*);
//! 3. the remaining nodes are sorted by their children, and duplicates are merged (*rule 2*). The
//!    survivors get ids counting down from [`MAX_ID`], so the output is canonical;
//! 4. the remappings are forwarded to the parents through a levelized priority queue.

use std::cmp::Ordering;

use log::{debug, trace};

use crate::arc::{node_of, Arc};
use crate::config::Config;
use crate::error::Result;
use crate::file::{ArcFile, ArcStream, NodeFile, NodeWriter, RawReader, RawWriter};
use crate::lpq::{LevelMerger, LevelOrder, LevelizedPq};
use crate::node::Node;
use crate::policy::DdPolicy;
use crate::ptr::{Label, Ptr, MAX_ID};
use crate::record::{read_ptr, write_ptr, Record};
use crate::sorter::{Order, Sorter};

/// Where a node of the current level went.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Mapping {
    old: Ptr,
    new: Ptr,
}

impl Record for Mapping {
    const SIZE: usize = 16;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, self.old);
        write_ptr(buf, 8, self.new);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            old: read_ptr(buf, 0),
            new: read_ptr(buf, 8),
        }
    }
}

/// Forwarded arcs, by source descending.
struct BySourceDesc;

impl Order<Arc> for BySourceDesc {
    fn cmp(a: &Arc, b: &Arc) -> Ordering {
        b.source.cmp(&a.source)
    }
}

impl LevelOrder<Arc> for BySourceDesc {
    const DESCENDING: bool = true;

    fn level(arc: &Arc) -> Label {
        arc.source.label()
    }
}

/// Nodes by `(high, low)` descending, so that duplicates become neighbours.
struct ByChildrenDesc;

impl Order<Node> for ByChildrenDesc {
    fn cmp(a: &Node, b: &Node) -> Ordering {
        (b.high, b.low, b.uid).cmp(&(a.high, a.low, a.uid))
    }
}

struct ByOldUidDesc;

impl Order<Mapping> for ByOldUidDesc {
    fn cmp(a: &Mapping, b: &Mapping) -> Ordering {
        b.old.cmp(&a.old)
    }
}

/// Reduces `input` according to the policy `P`.
pub fn reduce<P: DdPolicy>(config: &Config, input: &ArcFile) -> Result<NodeFile> {
    reduce_with_map::<P>(config, input, |label| label)
}

/// Reduces `input`, relabelling every level with `map_level`.
///
/// `map_level` must be strictly monotone on the labels of `input`.
pub fn reduce_with_map<P: DdPolicy>(
    config: &Config,
    input: &ArcFile,
    map_level: impl Fn(Label) -> Label,
) -> Result<NodeFile> {
    debug!(
        "reduce<{}>: {} internal arcs, {} terminal arcs, {} levels",
        P::NAME,
        input.internal_arcs(),
        input.terminal_arcs(),
        input.levels()
    );
    let mut arcs = input.arcs()?;
    let mut out = NodeWriter::new(config)?;

    if !arcs.can_pull_internal() {
        let high = arcs.pull_terminal()?;
        let low = arcs.pull_terminal()?;
        let n = node_of(low, high);
        match P::reduction_rule(n.low, n.high) {
            Some(t) => out.push(Node::terminal(t.value()))?,
            None => out.push(Node::with_label(map_level(n.label()), MAX_ID, n.low, n.high))?,
        }
        return out.finish();
    }

    let memory = config.memory_available();
    let pq_memory = (memory as f64 * config.reduce_pq_share) as usize;
    let sorters_memory = memory.saturating_sub(pq_memory);

    let merger = LevelMerger::new(true).add_ascending(input)?;
    let mut pq = LevelizedPq::<Arc, BySourceDesc>::new(
        config,
        merger,
        pq_memory,
        input.max_1level_cut(),
    )?;

    let mut level = ReduceLevel {
        config,
        arcs: &mut arcs,
        pq: &mut pq,
        out: &mut out,
        sorters_memory,
    };
    let mut levels = input.level_infos(true)?;
    while levels.can_pull() {
        let info = levels.pull()?;
        debug_assert!(
            !level.pq.has_current_level() || level.pq.current_level() == info.label,
            "levels and priority queue are out of sync"
        );
        level.run::<P>(info.label, map_level(info.label))?;
    }

    let res = out.finish()?;
    debug!(
        "reduce<{}>: {} nodes on {} levels",
        P::NAME,
        res.nodecount(),
        res.levels()
    );
    Ok(res)
}

/// The state carried from one level to the next.
struct ReduceLevel<'a> {
    config: &'a Config,
    arcs: &'a mut ArcStream,
    pq: &'a mut LevelizedPq<Arc, BySourceDesc>,
    out: &'a mut NodeWriter,
    sorters_memory: usize,
}

impl ReduceLevel<'_> {
    /// The next arc of the current level, from either the terminal arcs or the queue.
    fn next_arc(&mut self) -> Result<Arc> {
        let take_terminal = !self.pq.can_pull()
            || (self.arcs.can_pull_terminal()
                && self.arcs.peek_terminal().source > self.pq.top().source);
        if take_terminal {
            self.arcs.pull_terminal()
        } else {
            self.pq.pull()
        }
    }

    fn has_arcs_on(&self, label: Label) -> bool {
        (self.arcs.can_pull_terminal() && self.arcs.peek_terminal().source.label() == label)
            || self.pq.can_pull()
    }

    fn run<P: DdPolicy>(&mut self, in_label: Label, out_label: Label) -> Result<()> {
        let config = self.config;
        let mut red1: Option<RawWriter<Mapping>> = None;
        let mut children = Sorter::<Node, ByChildrenDesc>::new(config, self.sorters_memory / 2);
        let mut red2 = Sorter::<Mapping, ByOldUidDesc>::new(config, self.sorters_memory / 2);

        // Rule 1
        let mut removed_rule1 = 0u64;
        while self.has_arcs_on(in_label) {
            let high = self.next_arc()?;
            let low = self.next_arc()?;
            let n = node_of(low, high);
            debug_assert_eq!(n.label(), in_label);

            match P::reduction_rule(n.low, n.high) {
                Some(target) => {
                    if red1.is_none() {
                        red1 = Some(RawWriter::new(config)?);
                    }
                    if let Some(w) = red1.as_mut() {
                        w.push(&Mapping {
                            old: n.uid,
                            new: target,
                        })?;
                    }
                    removed_rule1 += 1;
                }
                None => children.push(n)?,
            }
        }

        // Rule 2
        let mut width = 0;
        let mut removed_rule2 = 0u64;
        let mut latest: Option<Node> = None;
        let mut sorted = children.sort()?;
        while sorted.can_pull() {
            let n = sorted.pull()?;
            let new_uid = match latest {
                Some(prev) if prev.low == n.low && prev.high == n.high => {
                    removed_rule2 += 1;
                    prev.uid
                }
                _ => {
                    let node = Node::with_label(out_label, MAX_ID - width, n.low, n.high);
                    self.out.push(node)?;
                    width += 1;
                    latest = Some(node);
                    node.uid
                }
            };
            red2.push(Mapping {
                old: n.uid,
                new: new_uid,
            })?;
        }
        trace!(
            "reduce level {}: width {}, {} removed by rule 1, {} by rule 2",
            in_label,
            width,
            removed_rule1,
            removed_rule2
        );

        // Forward the new uids to the parents. Both mappings and internal arcs are sorted by the
        // old uid descending.
        let red1 = red1.map(|w| w.finish()).transpose()?;
        let mut red1: Option<RawReader<Mapping>> = match &red1 {
            Some(f) => Some(f.reader(config.block_records, false)?),
            None => None,
        };
        let mut red2 = red2.sort()?;
        let mut last_red1 = None;
        loop {
            let red1_head = red1.as_ref().and_then(|r| r.head());
            let take_red1 = match (red1_head, red2.head()) {
                (Some(a), Some(b)) => a.old > b.old,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let m = match (take_red1, red1.as_mut()) {
                (true, Some(r)) => {
                    let m = r.pull()?;
                    last_red1 = Some(m.new);
                    m
                }
                _ => red2.pull()?,
            };

            while self.arcs.can_pull_internal() && self.arcs.peek_internal().target == m.old {
                let source = self.arcs.pull_internal()?.source;
                self.pq.push(Arc::new(source, m.new))?;
            }
        }

        if !self.pq.is_empty() {
            let stop = self
                .arcs
                .can_pull_terminal()
                .then(|| self.arcs.peek_terminal().source.label());
            self.pq.setup_next_level(stop)?;
        } else if !self.out.has_pushed() {
            debug_assert!(!self.arcs.can_pull_internal() && !self.arcs.can_pull_terminal());
            let value = last_red1.map_or(false, |p| p.is_terminal() && p.value());
            self.out.push(Node::terminal(value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use std::collections::BTreeMap;

    use super::*;
    use crate::arc::LevelInfo;
    use crate::config::MemoryMode;
    use crate::file::ArcWriter;
    use crate::policy::{BddPolicy, ZddPolicy};

    fn arc_file(
        config: &Config,
        mut internal: Vec<(Ptr, Ptr)>,
        terminal: &[(Ptr, Ptr)],
        levels: &[(Label, u64)],
    ) -> ArcFile {
        let mut aw = ArcWriter::new(config).unwrap();
        internal.sort_by_key(|&(s, t)| (t, s));
        for (s, t) in internal {
            aw.push_internal(Arc::new(s, t)).unwrap();
        }
        for &(s, t) in terminal {
            aw.push_terminal(Arc::new(s, t)).unwrap();
        }
        for &(l, w) in levels {
            aw.push_level(LevelInfo::new(l, w)).unwrap();
        }
        aw.finish().unwrap()
    }

    fn nodes(f: &NodeFile) -> Vec<Node> {
        let mut ns = f.nodes(false).unwrap();
        let mut res = vec![];
        while ns.can_pull() {
            res.push(ns.pull().unwrap());
        }
        res
    }

    fn configs() -> Vec<Config> {
        vec![
            Config::default().with_memory_mode(MemoryMode::Internal),
            Config::default()
                .with_memory_mode(MemoryMode::External)
                .with_memory_limit(0)
                .with_block_records(2),
        ]
    }

    #[test]
    fn test_rule2_then_rule1() {
        // Two identical children at level 1 merge, which makes the root redundant.
        for config in configs() {
            let r = Ptr::node(0, 0);
            let (a, b) = (Ptr::node(1, 0), Ptr::node(1, 1));
            let f = arc_file(
                &config,
                vec![(r, a), (r.flag(), b)],
                &[
                    (a, Ptr::FALSE),
                    (a.flag(), Ptr::TRUE),
                    (b, Ptr::FALSE),
                    (b.flag(), Ptr::TRUE),
                ],
                &[(0, 1), (1, 2)],
            );
            let res = reduce::<BddPolicy>(&config, &f).unwrap();
            assert_eq!(
                nodes(&res),
                vec![Node::with_label(1, MAX_ID, Ptr::FALSE, Ptr::TRUE)]
            );
            assert!(res.is_canonical());
            assert_eq!(res.levels(), 1);
        }
    }

    #[test]
    fn test_rule2_keeps_distinct() {
        for config in configs() {
            let r = Ptr::node(0, 0);
            let (a, b) = (Ptr::node(1, 0), Ptr::node(1, 1));
            let f = arc_file(
                &config,
                vec![(r, a), (r.flag(), b)],
                &[
                    (a, Ptr::FALSE),
                    (a.flag(), Ptr::TRUE),
                    (b, Ptr::TRUE),
                    (b.flag(), Ptr::FALSE),
                ],
                &[(0, 1), (1, 2)],
            );
            let res = reduce::<BddPolicy>(&config, &f).unwrap();
            let x = Node::with_label(1, MAX_ID, Ptr::FALSE, Ptr::TRUE);
            let y = Node::with_label(1, MAX_ID - 1, Ptr::TRUE, Ptr::FALSE);
            let root = Node::with_label(0, MAX_ID, x.uid, y.uid);
            assert_eq!(nodes(&res), vec![root, y, x]);
            assert!(res.is_canonical());
            assert_eq!(res.width(), 2);
        }
    }

    #[test]
    fn test_collapse_to_terminal() {
        for config in configs() {
            let r = Ptr::node(0, 0);
            let (a, b) = (Ptr::node(2, 0), Ptr::node(2, 1));
            let f = arc_file(
                &config,
                vec![(r, a), (r.flag(), b)],
                &[
                    (a, Ptr::TRUE),
                    (a.flag(), Ptr::TRUE),
                    (b, Ptr::TRUE),
                    (b.flag(), Ptr::TRUE),
                ],
                &[(0, 1), (2, 2)],
            );
            let res = reduce::<BddPolicy>(&config, &f).unwrap();
            assert!(res.is_true());
        }
    }

    #[test]
    fn test_single_node() {
        let config = Config::default();
        let r = Ptr::node(4, 0);

        let f = arc_file(
            &config,
            vec![],
            &[(r, Ptr::TRUE), (r.flag(), Ptr::FALSE)],
            &[(4, 1)],
        );
        assert!(reduce::<ZddPolicy>(&config, &f).unwrap().is_true());

        let res = reduce::<BddPolicy>(&config, &f).unwrap();
        assert_eq!(
            nodes(&res),
            vec![Node::with_label(4, MAX_ID, Ptr::TRUE, Ptr::FALSE)]
        );

        let res = reduce_with_map::<BddPolicy>(&config, &f, |l| l + 3).unwrap();
        assert_eq!(res.min_label(), Some(7));
    }

    #[test]
    fn test_terminal_arcs_above_forwarded_arcs() {
        // x0 ? (x2 ? T : F) : T, where the root's high arc to T is read before level 2 is done.
        for config in configs() {
            let r = Ptr::node(0, 0);
            let m = Ptr::node(1, 0);
            let a = Ptr::node(2, 0);
            let f = arc_file(
                &config,
                vec![(r, m), (m, a), (m.flag(), a)],
                &[(r.flag(), Ptr::TRUE), (a, Ptr::FALSE), (a.flag(), Ptr::TRUE)],
                &[(0, 1), (1, 1), (2, 1)],
            );
            let res = reduce::<BddPolicy>(&config, &f).unwrap();
            let x = Node::with_label(2, MAX_ID, Ptr::FALSE, Ptr::TRUE);
            let root = Node::with_label(0, MAX_ID, x.uid, Ptr::TRUE);
            assert_eq!(nodes(&res), vec![root, x]);
            assert_eq!(res.number_of_terminals(true), 2);
        }
    }

    #[test]
    fn test_idempotent() {
        let config = Config::default();
        let r = Ptr::node(0, 0);
        let (a, b) = (Ptr::node(1, 0), Ptr::node(1, 1));
        let f = arc_file(
            &config,
            vec![(r, a), (r.flag(), b)],
            &[
                (a, Ptr::FALSE),
                (a.flag(), Ptr::TRUE),
                (b, Ptr::TRUE),
                (b.flag(), Ptr::FALSE),
            ],
            &[(0, 1), (1, 2)],
        );
        let once = reduce::<BddPolicy>(&config, &f).unwrap();

        // Turn the reduced nodes back into arcs and reduce again.
        let mut internal = vec![];
        let mut terminal = vec![];
        for n in nodes(&once) {
            for arc in [Arc::low_of(&n), Arc::high_of(&n)] {
                if arc.target.is_node() {
                    internal.push((arc.source, arc.target));
                } else {
                    terminal.push((arc.source, arc.target));
                }
            }
        }
        let levels: Vec<(Label, u64)> = {
            let mut ls = once.level_infos(true).unwrap();
            let mut res = vec![];
            while ls.can_pull() {
                let info = ls.pull().unwrap();
                res.push((info.label, info.width));
            }
            res
        };
        let again = arc_file(&config, internal, &terminal, &levels);
        let twice = reduce::<BddPolicy>(&config, &again).unwrap();
        assert_eq!(nodes(&once), nodes(&twice));
    }

    const DEPTH: Label = 5;

    fn xorshift(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    /// A random unreduced diagram over labels `0..DEPTH`, rooted at `Ptr::node(0, 0)`, with only
    /// the nodes the root reaches.
    fn random_dag(seed: u64) -> Vec<Node> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let mut below = vec![Ptr::FALSE, Ptr::TRUE];
        let mut all = BTreeMap::new();
        for label in (0..DEPTH).rev() {
            let width = if label == 0 { 1 } else { 1 + xorshift(&mut state) % 3 };
            let mut level = vec![];
            for id in 0..width {
                let low = below[(xorshift(&mut state) % below.len() as u64) as usize];
                let high = below[(xorshift(&mut state) % below.len() as u64) as usize];
                level.push(Node::with_label(label, id, low, high));
            }
            below.extend(level.iter().map(|n| n.uid));
            all.extend(level.into_iter().map(|n| (n.uid, n)));
        }

        let mut reached = BTreeMap::new();
        let mut todo = vec![Ptr::node(0, 0)];
        while let Some(p) = todo.pop() {
            if p.is_node() && !reached.contains_key(&p) {
                let n = all[&p];
                todo.extend(n.children());
                reached.insert(p, n);
            }
        }

        // Renumber the ids of each level densely.
        let mut renamed = BTreeMap::new();
        let mut next_id: BTreeMap<Label, u64> = BTreeMap::new();
        for &p in reached.keys() {
            let id = next_id.entry(p.label()).or_insert(0);
            renamed.insert(p, Ptr::node(p.label(), *id));
            *id += 1;
        }
        let rename = |p: Ptr| if p.is_node() { renamed[&p] } else { p };
        reached
            .values()
            .map(|n| Node::new(rename(n.uid), rename(n.low), rename(n.high)))
            .collect()
    }

    /// The complete decision tree of `f` over labels `0..DEPTH`.
    fn decision_tree(f: impl Fn(u64) -> bool) -> Vec<Node> {
        let mut res = vec![];
        for label in 0..DEPTH {
            for id in 0..1u64 << label {
                let child = |bit: u64| {
                    let path = 2 * id + bit;
                    if label + 1 == DEPTH {
                        // The path spells the assignment with variable 0 as its most significant bit.
                        let bits = (0..DEPTH).fold(0, |acc, v| acc | ((path >> (DEPTH - 1 - v)) & 1) << v);
                        Ptr::terminal(f(bits))
                    } else {
                        Ptr::node(label + 1, path)
                    }
                };
                res.push(Node::with_label(label, id, child(0), child(1)));
            }
        }
        res
    }

    /// Value of the diagram on the assignment `bits`, read as a BDD or as a ZDD.
    fn eval_nodes(nodes: &[Node], bits: u64, zdd: bool) -> bool {
        let by_uid: BTreeMap<Ptr, Node> = nodes.iter().map(|n| (n.uid, *n)).collect();
        let mut p = nodes[0].uid;
        for v in 0..DEPTH {
            let set = (bits >> v) & 1 == 1;
            if p.is_node() && p.label() == v {
                let n = by_uid[&p];
                p = if set { n.high } else { n.low };
            } else if zdd && set {
                return false;
            }
        }
        p.value()
    }

    fn arcs_of(config: &Config, nodes: &[Node]) -> ArcFile {
        let mut internal = vec![];
        let mut terminal = vec![];
        let mut widths: BTreeMap<Label, u64> = BTreeMap::new();
        for n in nodes {
            *widths.entry(n.label()).or_insert(0) += 1;
            for arc in [Arc::low_of(n), Arc::high_of(n)] {
                if arc.target.is_node() {
                    internal.push((arc.source, arc.target));
                } else {
                    terminal.push((arc.source, arc.target));
                }
            }
        }
        let levels: Vec<(Label, u64)> = widths.into_iter().collect();
        arc_file(config, internal, &terminal, &levels)
    }

    fn check_random_dags<P: DdPolicy>(zdd: bool) {
        for config in configs() {
            for seed in 0..25 {
                let dag = random_dag(seed);
                let res = reduce::<P>(&config, &arcs_of(&config, &dag)).unwrap();
                assert!(res.is_canonical(), "seed {}", seed);

                let reduced = nodes(&res);
                for bits in 0..1u64 << DEPTH {
                    assert_eq!(
                        eval_nodes(&reduced, bits, zdd),
                        eval_nodes(&dag, bits, zdd),
                        "seed {}, assignment {:05b}",
                        seed,
                        bits
                    );
                }

                // Any diagram of the same function reduces to the same nodes.
                let tree = decision_tree(|bits| eval_nodes(&dag, bits, zdd));
                let from_tree = reduce::<P>(&config, &arcs_of(&config, &tree)).unwrap();
                assert_eq!(nodes(&from_tree), reduced, "seed {}", seed);

                if !res.is_terminal() {
                    let twice = reduce::<P>(&config, &arcs_of(&config, &reduced)).unwrap();
                    assert_eq!(nodes(&twice), reduced, "seed {}", seed);
                }
            }
        }
    }

    #[test]
    fn test_random_bdds_are_canonical() {
        check_random_dags::<BddPolicy>(false);
    }

    #[test]
    fn test_random_zdds_are_canonical() {
        check_random_dags::<ZddPolicy>(true);
    }
}
