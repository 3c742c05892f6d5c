//! Selection: bridging over the nodes of some levels.
//!
//! A single diagram is streamed top-down. For every requested node the policy either keeps a
//! (possibly changed) node or replaces it by one of its children, in which case all its parents are
//! redirected. This covers BDD restriction and the ZDD subset operations.

use std::cmp::Ordering;

use log::debug;

use crate::arc::{Arc, LevelInfo};
use crate::config::Config;
use crate::dd::{Dd, Unreduced};
use crate::error::Result;
use crate::file::ArcWriter;
use crate::lpq::{LevelMerger, LevelOrder, LevelizedPq};
use crate::node::Node;
use crate::policy::{BddPolicy, DdPolicy, ZddPolicy};
use crate::ptr::{Label, Ptr};
use crate::sorter::Order;

use super::Rec;

/// Requests of a selection are plain arcs, ordered by their target.
struct ByTarget;

impl Order<Arc> for ByTarget {
    fn cmp(a: &Arc, b: &Arc) -> Ordering {
        (a.target, a.source).cmp(&(b.target, b.source))
    }
}

impl LevelOrder<Arc> for ByTarget {
    const DESCENDING: bool = false;

    fn level(arc: &Arc) -> Label {
        arc.target.label()
    }
}

/// What a selection does to each node.
pub trait SelectPolicy {
    type Dd: DdPolicy;

    /// Called once before the nodes of `level` are processed.
    fn setup_level(&mut self, level: Label);

    /// Keeps `n` (possibly with other children) or bridges over it.
    fn process(&mut self, n: &Node) -> Rec<Ptr>;

    /// Resolves a constant input without a sweep.
    fn on_terminal_input(&self, config: &Config, dd: &Dd) -> Result<Dd> {
        let _ = config;
        Ok(dd.clone())
    }
}

/// Cursor over an ascending list of labels, advanced level by level.
#[derive(Debug, Clone)]
struct LabelCursor {
    labels: Vec<Label>,
    idx: usize,
}

impl LabelCursor {
    fn new(labels: Vec<Label>) -> Self {
        debug_assert!(labels.windows(2).all(|w| w[0] < w[1]));
        Self { labels, idx: 0 }
    }

    fn seek(&mut self, level: Label) {
        while self.idx < self.labels.len() && self.labels[self.idx] < level {
            self.idx += 1;
        }
    }

    fn hits(&self, level: Label) -> bool {
        self.labels.get(self.idx) == Some(&level)
    }

    /// Whether some label lies strictly between `level` and the level of `target`.
    fn crossed(&self, level: Label, target: Ptr) -> bool {
        let next = self.labels.partition_point(|&l| l <= level);
        self.labels
            .get(next)
            .is_some_and(|&l| (l as u64) < target.level())
    }
}

/// BDD restriction by a partial assignment.
pub struct Restrict {
    assignment: Vec<(Label, bool)>,
    idx: usize,
}

impl Restrict {
    /// `assignment` must be sorted by label, without duplicates.
    pub fn new(assignment: Vec<(Label, bool)>) -> Self {
        debug_assert!(assignment.windows(2).all(|w| w[0].0 < w[1].0));
        Self { assignment, idx: 0 }
    }
}

impl SelectPolicy for Restrict {
    type Dd = BddPolicy;

    fn setup_level(&mut self, level: Label) {
        while self.idx < self.assignment.len() && self.assignment[self.idx].0 < level {
            self.idx += 1;
        }
    }

    fn process(&mut self, n: &Node) -> Rec<Ptr> {
        match self.assignment.get(self.idx) {
            Some(&(label, value)) if label == n.label() => Rec::SkipTo(if value { n.high } else { n.low }),
            _ => Rec::Output {
                low: n.low,
                high: n.high,
            },
        }
    }
}

/// ZDD subfamily of the sets that contain none of the labels.
pub struct Offset(LabelCursor);

impl Offset {
    pub fn new(labels: Vec<Label>) -> Self {
        Self(LabelCursor::new(labels))
    }
}

impl SelectPolicy for Offset {
    type Dd = ZddPolicy;

    fn setup_level(&mut self, level: Label) {
        self.0.seek(level);
    }

    fn process(&mut self, n: &Node) -> Rec<Ptr> {
        if self.0.hits(n.label()) {
            Rec::SkipTo(n.low)
        } else {
            Rec::Output {
                low: n.low,
                high: n.high,
            }
        }
    }
}

/// ZDD subfamily of the sets that contain all of the labels.
pub struct Onset(LabelCursor);

impl Onset {
    pub fn new(labels: Vec<Label>) -> Self {
        Self(LabelCursor::new(labels))
    }
}

impl SelectPolicy for Onset {
    type Dd = ZddPolicy;

    fn setup_level(&mut self, level: Label) {
        self.0.seek(level);
    }

    fn process(&mut self, n: &Node) -> Rec<Ptr> {
        let label = n.label();
        // An arc jumping over a required label leads to sets without it.
        let keep = |child: Ptr| {
            if self.0.crossed(label, child) {
                Ptr::FALSE
            } else {
                child
            }
        };
        let high = keep(n.high);
        if self.0.hits(label) {
            if high.is_false() {
                Rec::SkipTo(Ptr::FALSE)
            } else {
                Rec::Output {
                    low: Ptr::FALSE,
                    high,
                }
            }
        } else {
            Rec::Output { low: keep(n.low), high }
        }
    }

    fn on_terminal_input(&self, config: &Config, dd: &Dd) -> Result<Dd> {
        if self.0.labels.is_empty() {
            Ok(dd.clone())
        } else {
            Dd::terminal(config, false)
        }
    }
}

impl Onset {
    /// Whether a required label lies above the root, so that no set can qualify.
    fn misses_root(&self, root: Ptr) -> bool {
        self.0.labels.first().is_some_and(|&l| (l as u64) < root.level())
    }
}

fn recurse_out(pq: &mut LevelizedPq<Arc, ByTarget>, aw: &mut ArcWriter, source: Ptr, target: Ptr) -> Result<()> {
    if target.is_terminal() {
        aw.push_terminal(Arc::new(source, target))
    } else {
        pq.push(Arc::new(source, target))
    }
}

/// Runs the selection `policy` over `dd`.
pub fn select<S: SelectPolicy>(config: &Config, dd: &Dd, policy: &mut S) -> Result<Unreduced> {
    if dd.is_terminal() {
        return Ok(policy.on_terminal_input(config, dd)?.into());
    }
    debug!("select<{}>: {} nodes", <S::Dd as DdPolicy>::NAME, dd.nodecount());

    let mut nodes = dd.nodes()?;
    let root = nodes.peek().uid;

    let bound = dd.file.max_2level_cut().saturating_add(2);
    let levels = LevelMerger::new(false).add_nodes(&dd.file)?;
    let mut pq = LevelizedPq::<Arc, ByTarget>::new(config, levels, config.memory_available(), bound)?;
    pq.push(Arc::new(Ptr::NIL, root))?;

    let mut aw = ArcWriter::new(config)?;
    let mut changed = false;
    let mut max_cut = 0;

    while !pq.is_empty() {
        pq.setup_next_level(None)?;
        let level = pq.current_level();
        let mut width = 0;
        policy.setup_level(level);
        max_cut = max_cut.max(pq.size() as u64);

        while pq.can_pull() {
            let n = nodes.seek(pq.top().target)?;
            debug_assert_eq!(n.uid, pq.top().target);

            match policy.process(&n) {
                Rec::Output { low, high } => {
                    changed |= low != n.low || high != n.high;
                    recurse_out(&mut pq, &mut aw, n.uid, low)?;
                    recurse_out(&mut pq, &mut aw, n.uid.flag(), high)?;
                    while pq.can_pull() && pq.top().target == n.uid {
                        let parent = pq.pull()?;
                        if !parent.source.is_nil() {
                            aw.push_internal(parent)?;
                        }
                    }
                    width += 1;
                }
                Rec::SkipTo(target) => {
                    changed = true;
                    while pq.can_pull() && pq.top().target == n.uid {
                        let source = pq.pull()?.source;
                        if target.is_terminal() && source.is_nil() {
                            return Ok(Dd::terminal(config, target.value())?.into());
                        }
                        recurse_out(&mut pq, &mut aw, source, target)?;
                    }
                }
            }
        }

        if width > 0 {
            aw.push_level(LevelInfo::new(level, width))?;
        }
    }

    if !changed {
        return Ok(dd.clone().into());
    }
    aw.set_max_1level_cut(max_cut);
    Ok(Unreduced::Arcs(aw.finish()?))
}

/// BDD restriction: fixes the labels of `assignment` to their values.
pub fn restrict(config: &Config, dd: &Dd, assignment: &[(Label, bool)]) -> Result<Unreduced> {
    if assignment.is_empty() {
        return Ok(dd.clone().into());
    }
    let mut assignment = assignment.to_vec();
    assignment.sort_unstable();
    assignment.dedup_by_key(|a| a.0);
    select(config, dd, &mut Restrict::new(assignment))
}

/// ZDD offset: the sets of `dd` that contain none of `labels`.
pub fn offset(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Unreduced> {
    let labels = sorted(labels);
    if labels.is_empty() {
        return Ok(dd.clone().into());
    }
    select(config, dd, &mut Offset::new(labels))
}

/// ZDD onset: the sets of `dd` that contain all of `labels`.
pub fn onset(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Unreduced> {
    let labels = sorted(labels);
    if labels.is_empty() {
        return Ok(dd.clone().into());
    }
    let mut policy = Onset::new(labels);
    if !dd.is_terminal() && policy.misses_root(dd.root()?) {
        return Ok(Dd::terminal(config, false)?.into());
    }
    select(config, dd, &mut policy)
}

fn sorted(labels: &[Label]) -> Vec<Label> {
    let mut labels = labels.to_vec();
    labels.sort_unstable();
    labels.dedup();
    labels
}
