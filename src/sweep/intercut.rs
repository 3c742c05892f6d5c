//! Intercut: inserting nodes on the arcs that cross given levels.
//!
//! Every arc that jumps over one of the cut labels is split in two by a new node on that level,
//! whose shape the policy decides. Existing nodes on a cut level may be changed, too. A request
//! therefore carries the level it is to be resolved on: either the level of its target (the target
//! is an existing node) or an earlier cut level.

use std::cmp::Ordering;

use log::debug;

use crate::arc::{Arc, LevelInfo};
use crate::build;
use crate::config::Config;
use crate::dd::{Dd, Unreduced};
use crate::error::Result;
use crate::file::ArcWriter;
use crate::lpq::{LevelMerger, LevelOrder, LevelizedPq};
use crate::node::Node;
use crate::policy::{BddPolicy, DdPolicy, ZddPolicy};
use crate::ptr::{Label, Ptr, MAX_LABEL};
use crate::record::{read_ptr, read_u32, write_ptr, write_u32, Record};
use crate::sorter::Order;

use super::Rec;

/// An arc `source -> target` to be resolved on `level`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IntercutRequest {
    pub source: Ptr,
    pub target: Ptr,
    pub level: Label,
}

impl Record for IntercutRequest {
    const SIZE: usize = 20;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, self.source);
        write_ptr(buf, 8, self.target);
        write_u32(buf, 16, self.level);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            source: read_ptr(buf, 0),
            target: read_ptr(buf, 8),
            level: read_u32(buf, 16),
        }
    }
}

struct ByLevelTarget;

impl Order<IntercutRequest> for ByLevelTarget {
    fn cmp(a: &IntercutRequest, b: &IntercutRequest) -> Ordering {
        (a.level, a.target, a.source).cmp(&(b.level, b.target, b.source))
    }
}

impl LevelOrder<IntercutRequest> for ByLevelTarget {
    const DESCENDING: bool = false;

    fn level(req: &IntercutRequest) -> Label {
        req.level
    }
}

/// What an intercut does on the cut levels.
pub trait IntercutPolicy {
    type Dd: DdPolicy;

    /// Whether [`IntercutPolicy::hit_existing`] may return [`Rec::SkipTo`].
    const MAY_SKIP: bool = true;
    /// Whether arcs to `⊥` are cut, too.
    const CUT_FALSE_TERMINAL: bool = false;
    /// Whether arcs to `⊤` are cut, too.
    const CUT_TRUE_TERMINAL: bool = true;

    /// An existing node on a cut level.
    fn hit_existing(n: &Node) -> Rec<Ptr>;

    /// An existing node on any other level.
    fn miss_existing(n: &Node) -> Rec<Ptr> {
        Rec::Output {
            low: n.low,
            high: n.high,
        }
    }

    /// A new node on a cut level, inserted on an arc to `target`.
    fn hit_cut(target: Ptr) -> (Ptr, Ptr);

    /// The result for an empty list of cut labels.
    fn on_empty_labels(config: &Config, dd: &Dd) -> Result<Dd> {
        let _ = config;
        Ok(dd.clone())
    }

    /// The result for a constant input.
    fn on_terminal_input(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Dd>;
}

/// Whether an arc from `level` to the terminal `value` is to be cut at `cut`.
fn cut_terminal<I: IntercutPolicy>(level: Label, cut: Label, value: bool) -> bool {
    level < cut
        && cut <= MAX_LABEL
        && if value {
            I::CUT_TRUE_TERMINAL
        } else {
            I::CUT_FALSE_TERMINAL
        }
}

/// Sends `source -> target` on from `level`, with `next_cut` the next cut label after it.
fn forward<I: IntercutPolicy>(
    pq: &mut LevelizedPq<IntercutRequest, ByLevelTarget>,
    aw: &mut ArcWriter,
    source: Ptr,
    target: Ptr,
    level: Label,
    next_cut: Label,
) -> Result<()> {
    if target.is_terminal() && !cut_terminal::<I>(level, next_cut, target.value()) {
        return aw.push_terminal(Arc::new(source, target));
    }
    let resolve_on = target.level().min(next_cut as u64) as Label;
    pq.push(IntercutRequest {
        source,
        target,
        level: resolve_on,
    })
}

/// Runs the intercut `I` of `dd` on `labels`.
pub fn intercut<I: IntercutPolicy>(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Unreduced> {
    let mut labels = labels.to_vec();
    labels.sort_unstable();
    labels.dedup();
    build::check_labels(&labels)?;

    if labels.is_empty() {
        return Ok(I::on_empty_labels(config, dd)?.into());
    }
    if dd.is_terminal() {
        return Ok(I::on_terminal_input(config, dd, &labels)?.into());
    }
    debug!(
        "intercut<{}>: {} nodes, {} labels",
        <I::Dd as DdPolicy>::NAME,
        dd.nodecount(),
        labels.len()
    );

    let mut nodes = dd.nodes()?;
    let root = nodes.peek().uid;
    let mut cuts = labels.iter().copied().peekable();
    let mut next_cut = labels[0];

    let bound = dd.file.max_2level_cut().saturating_mul(3) / 2 + 2;
    let levels = LevelMerger::new(false)
        .add_nodes(&dd.file)?
        .add_labels(labels.iter().copied());
    let mut pq =
        LevelizedPq::<IntercutRequest, ByLevelTarget>::new(config, levels, config.memory_available(), bound)?;
    pq.push(IntercutRequest {
        source: Ptr::NIL,
        target: root,
        level: next_cut.min(root.label()),
    })?;

    let mut aw = ArcWriter::new(config)?;
    let mut max_cut = 0;

    while !pq.is_empty() {
        pq.setup_next_level(None)?;
        let out_label = pq.current_level();
        let mut out_id = 0;

        let hit_level = out_label == next_cut;
        while cuts.peek().is_some_and(|&l| l <= out_label) {
            cuts.next();
        }
        next_cut = cuts.peek().copied().unwrap_or(MAX_LABEL + 1);
        max_cut = max_cut.max(pq.size() as u64);

        // Requests for existing nodes of this level come first.
        while pq.can_pull() && pq.top().target.on_level(out_label) {
            let n = nodes.seek(pq.top().target)?;
            debug_assert_eq!(n.uid, pq.top().target);

            let rec = if hit_level {
                I::hit_existing(&n)
            } else {
                I::miss_existing(&n)
            };
            match rec {
                Rec::SkipTo(target) => {
                    debug_assert!(I::MAY_SKIP);
                    if target.is_terminal()
                        && pq.top().source.is_nil()
                        && !cut_terminal::<I>(out_label, next_cut, target.value())
                    {
                        return Ok(Dd::terminal(config, target.value())?.into());
                    }
                    while pq.can_pull() && pq.top().target == n.uid {
                        let parent = pq.pull()?;
                        forward::<I>(&mut pq, &mut aw, parent.source, target, out_label, next_cut)?;
                    }
                }
                Rec::Output { low, high } => {
                    let out_uid = Ptr::node(out_label, out_id);
                    out_id += 1;
                    forward::<I>(&mut pq, &mut aw, out_uid, low, out_label, next_cut)?;
                    forward::<I>(&mut pq, &mut aw, out_uid.flag(), high, out_label, next_cut)?;
                    while pq.can_pull() && pq.top().target == n.uid {
                        let parent = pq.pull()?;
                        if !parent.source.is_nil() {
                            aw.push_internal(Arc::new(parent.source, out_uid))?;
                        }
                    }
                }
            }
        }

        // The remaining requests jump over this level, which is then a cut level.
        while pq.can_pull() {
            let target = pq.top().target;
            let (low, high) = I::hit_cut(target);
            let out_uid = Ptr::node(out_label, out_id);
            out_id += 1;
            forward::<I>(&mut pq, &mut aw, out_uid, low, out_label, next_cut)?;
            forward::<I>(&mut pq, &mut aw, out_uid.flag(), high, out_label, next_cut)?;
            while pq.can_pull() && pq.top().target == target {
                let parent = pq.pull()?;
                if !parent.source.is_nil() {
                    aw.push_internal(Arc::new(parent.source, out_uid))?;
                }
            }
        }

        if out_id > 0 {
            aw.push_level(LevelInfo::new(out_label, out_id))?;
        }
    }

    aw.set_max_1level_cut(max_cut);
    Ok(Unreduced::Arcs(aw.finish()?))
}

/// ZDD change: toggles the membership of every label in every set.
pub struct Change;

impl IntercutPolicy for Change {
    type Dd = ZddPolicy;

    fn hit_existing(n: &Node) -> Rec<Ptr> {
        if n.low.is_false() {
            Rec::SkipTo(n.high)
        } else {
            Rec::Output {
                low: n.high,
                high: n.low,
            }
        }
    }

    fn hit_cut(target: Ptr) -> (Ptr, Ptr) {
        (Ptr::FALSE, target)
    }

    fn on_terminal_input(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Dd> {
        if dd.value() {
            build::zdd_singleton(config, labels)
        } else {
            Ok(dd.clone())
        }
    }
}

/// ZDD complement with respect to the powerset of the given universe.
///
/// The labels of the diagram must be part of the universe.
pub struct Complement;

impl IntercutPolicy for Complement {
    type Dd = ZddPolicy;

    const MAY_SKIP: bool = false;
    const CUT_FALSE_TERMINAL: bool = true;
    const CUT_TRUE_TERMINAL: bool = true;

    fn hit_existing(n: &Node) -> Rec<Ptr> {
        Rec::Output {
            low: n.low.negate(),
            high: n.high.negate(),
        }
    }

    fn miss_existing(_n: &Node) -> Rec<Ptr> {
        unreachable!("every label of the diagram is part of the universe")
    }

    fn hit_cut(target: Ptr) -> (Ptr, Ptr) {
        if target.is_true() {
            (target, target)
        } else {
            (target, Ptr::TRUE)
        }
    }

    fn on_empty_labels(config: &Config, dd: &Dd) -> Result<Dd> {
        if dd.is_terminal() {
            Dd::terminal(config, !dd.value())
        } else {
            Ok(dd.clone())
        }
    }

    fn on_terminal_input(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Dd> {
        if dd.value() {
            build::zdd_nonempty_subsets(config, labels)
        } else {
            build::zdd_powerset(config, labels)
        }
    }
}

/// ZDD expansion: adds every combination of the given (new) labels to every set.
pub struct Expand;

impl IntercutPolicy for Expand {
    type Dd = ZddPolicy;

    fn hit_existing(_n: &Node) -> Rec<Ptr> {
        unreachable!("expanded labels must not occur in the diagram")
    }

    fn hit_cut(target: Ptr) -> (Ptr, Ptr) {
        (target, target)
    }

    fn on_terminal_input(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Dd> {
        if dd.value() {
            build::zdd_powerset(config, labels)
        } else {
            Ok(dd.clone())
        }
    }
}

/// BDD to ZDD over a domain: a level the BDD skips is a free choice for every set.
///
/// The support of the BDD must lie within the domain.
pub struct BddToZdd;

impl IntercutPolicy for BddToZdd {
    type Dd = ZddPolicy;

    const MAY_SKIP: bool = false;

    fn hit_existing(n: &Node) -> Rec<Ptr> {
        Rec::Output {
            low: n.low,
            high: n.high,
        }
    }

    fn hit_cut(target: Ptr) -> (Ptr, Ptr) {
        (target, target)
    }

    fn on_empty_labels(config: &Config, dd: &Dd) -> Result<Dd> {
        // A ZDD handle carries no negation flag.
        if dd.is_terminal() {
            Dd::terminal(config, dd.value())
        } else {
            Ok(dd.clone())
        }
    }

    fn on_terminal_input(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Dd> {
        if dd.value() {
            build::zdd_powerset(config, labels)
        } else {
            build::zdd_empty(config)
        }
    }
}

/// ZDD to BDD over a domain: a level the ZDD skips must be unset.
///
/// The support of the ZDD must lie within the domain.
pub struct ZddToBdd;

impl IntercutPolicy for ZddToBdd {
    type Dd = BddPolicy;

    const MAY_SKIP: bool = false;

    fn hit_existing(n: &Node) -> Rec<Ptr> {
        Rec::Output {
            low: n.low,
            high: n.high,
        }
    }

    fn hit_cut(target: Ptr) -> (Ptr, Ptr) {
        (target, Ptr::FALSE)
    }

    fn on_terminal_input(config: &Config, dd: &Dd, labels: &[Label]) -> Result<Dd> {
        if dd.value() {
            let literals: Vec<(Label, bool)> = labels.iter().map(|&l| (l, false)).collect();
            build::bdd_cube(config, &literals)
        } else {
            build::bdd_terminal(config, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::Error;
    use crate::ptr::MAX_ID;

    #[test]
    fn test_cut_terminal_flags() {
        assert!(cut_terminal::<Change>(1, 3, true));
        assert!(!cut_terminal::<Change>(1, 3, false));
        assert!(!cut_terminal::<Change>(3, 3, true));
        assert!(!cut_terminal::<Change>(1, MAX_LABEL + 1, true));
        assert!(cut_terminal::<Complement>(1, 3, false));
    }

    #[test]
    fn test_change_skips_on_false_low() {
        let n = Node::with_label(2, MAX_ID, Ptr::FALSE, Ptr::TRUE);
        assert_eq!(Change::hit_existing(&n), Rec::SkipTo(Ptr::TRUE));
        let m = Node::with_label(2, MAX_ID, Ptr::TRUE, Ptr::node(3, MAX_ID));
        assert_eq!(
            Change::hit_existing(&m),
            Rec::Output {
                low: Ptr::node(3, MAX_ID),
                high: Ptr::TRUE
            }
        );
    }

    #[test]
    fn test_labels_out_of_range() {
        let config = Config::default();
        let too_large = [1, MAX_LABEL + 1];

        let single = build::zdd_singleton(&config, &[0, 2]).unwrap();
        let res = intercut::<Change>(&config, &single, &too_large);
        assert!(matches!(res, Err(Error::LabelOutOfRange(_))));

        let null = build::zdd_null(&config).unwrap();
        let res = intercut::<Expand>(&config, &null, &too_large);
        assert!(matches!(res, Err(Error::LabelOutOfRange(_))));
    }

    fn nodes_of(dd: &Dd) -> Vec<Node> {
        let mut ns = dd.nodes().unwrap();
        let mut res = vec![];
        while ns.can_pull() {
            res.push(ns.pull().unwrap());
        }
        res
    }

    #[test]
    fn test_bdd_to_zdd_fills_skipped_levels() {
        // x1 over the domain {0, 1, 2}: levels 0 and 2 are free.
        let config = Config::default();
        let x1 = build::bdd_ithvar(&config, 1).unwrap();
        let res = intercut::<BddToZdd>(&config, &x1, &[0, 1, 2]).unwrap();
        let zdd = res.reduce::<ZddPolicy>(&config).unwrap();

        let labels: Vec<Label> = nodes_of(&zdd).iter().map(|n| n.label()).collect();
        assert_eq!(labels, vec![0, 1, 2]);
        assert_eq!(crate::count::pathcount(&config, &zdd).unwrap(), 4u32.into());
    }

    #[test]
    fn test_zdd_to_bdd_of_terminals() {
        let config = Config::default();
        let null = build::zdd_null(&config).unwrap();
        let res = intercut::<ZddToBdd>(&config, &null, &[0, 3]).unwrap();
        let bdd = res.reduce::<BddPolicy>(&config).unwrap();
        let expected = build::bdd_cube(&config, &[(0, false), (3, false)]).unwrap();
        assert_eq!(nodes_of(&bdd), nodes_of(&expected));

        let empty = build::zdd_empty(&config).unwrap();
        let res = intercut::<ZddToBdd>(&config, &empty, &[0, 3]).unwrap();
        assert!(res.reduce::<BddPolicy>(&config).unwrap().is_false());
    }

    #[test]
    fn test_request_order() {
        let a = IntercutRequest {
            source: Ptr::NIL,
            target: Ptr::node(2, 0),
            level: 2,
        };
        let b = IntercutRequest {
            source: Ptr::NIL,
            target: Ptr::TRUE,
            level: 2,
        };
        assert_eq!(ByLevelTarget::cmp(&a, &b), Ordering::Less);
    }
}
