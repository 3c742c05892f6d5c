//! Quantification of a single BDD variable.
//!
//! A request targets one node, or an (ordered) pair of nodes of the same diagram whose functions
//! are to be combined with the quantification operator. Pairs are born at the quantified level,
//! where a node is replaced by `op(low, high)`, and are resolved like a product construction of
//! the diagram with itself.

use log::debug;

use crate::arc::{Arc, LevelInfo};
use crate::bool_op::BinaryOperator;
use crate::config::Config;
use crate::dd::{Dd, Unreduced};
use crate::error::Result;
use crate::file::ArcWriter;
use crate::lpq::{LevelMerger, LevelizedPq};
use crate::policy::{BddPolicy, DdPolicy};
use crate::ptr::{Label, Ptr};
use crate::sorter::Pq;

use super::{split_memory, ByFirst, BySecond, CarryRequest, PairRequest, Rec};

/// A single target, or an ordered pair of distinct targets.
fn pair(a: Ptr, b: Ptr) -> [Ptr; 2] {
    if a == b {
        [a, Ptr::NIL]
    } else {
        [a.min(b), a.max(b)]
    }
}

/// Simplifies a target pair, e.g. `x ∨ ⊤` to `⊤` and `x ∨ ⊥` to `x`.
fn resolve<O: BinaryOperator>(op: &O, t: [Ptr; 2]) -> [Ptr; 2] {
    let [x, y] = t;
    if y.is_nil() {
        return t;
    }
    if x.is_terminal() {
        return [op.apply(x, y), Ptr::NIL];
    }
    if y.is_terminal() {
        if op.can_right_shortcut(y.value()) {
            return [Ptr::terminal(op.eval(false, y.value())), Ptr::NIL];
        }
        if op.is_right_idempotent(y.value()) {
            return [x, Ptr::NIL];
        }
    }
    t
}

fn recurse_out(
    pq: &mut LevelizedPq<PairRequest, ByFirst>,
    aw: &mut ArcWriter,
    source: Ptr,
    target: [Ptr; 2],
) -> Result<()> {
    if target[0].is_terminal() {
        debug_assert!(target[1].is_nil());
        aw.push_terminal(Arc::new(source, target[0]))
    } else {
        pq.push(PairRequest::new(target, source))
    }
}

fn parents_of(
    pq1: &mut LevelizedPq<PairRequest, ByFirst>,
    pq2: &mut Pq<CarryRequest, BySecond>,
    target: [Ptr; 2],
) -> Result<Vec<Ptr>> {
    let mut res = Vec::new();
    while pq1.can_pull() && pq1.top().target == target {
        res.push(pq1.pull()?.source);
    }
    while !pq2.is_empty() && pq2.top().target == target {
        res.push(pq2.pull()?.source);
    }
    Ok(res)
}

/// Quantifies the variable `label` of `dd` with `op`: `Or` for ∃, `And` for ∀.
pub fn quantify<O: BinaryOperator>(config: &Config, dd: &Dd, label: Label, op: &O) -> Result<Unreduced> {
    if dd.is_terminal() || !dd.labels()?.contains(&label) {
        return Ok(dd.clone().into());
    }
    debug!("quantify: x{} of {} nodes", label, dd.nodecount());

    let mut nodes = dd.nodes()?;
    let mut v = nodes.pull()?;

    let (pq1_memory, pq2_memory) = split_memory(config.memory_available());
    let cut = dd.file.max_2level_cut();
    let size = dd.file.size() + 2;
    let bound = cut.saturating_mul(cut).saturating_add(2).min(size.saturating_mul(size));
    let levels = LevelMerger::new(false).add_nodes(&dd.file)?;
    let mut pq1 = LevelizedPq::<PairRequest, ByFirst>::new(config, levels, pq1_memory, bound)?;
    let mut pq2 = Pq::<CarryRequest, BySecond>::new(config, pq2_memory);
    pq1.push(PairRequest::new([v.uid, Ptr::NIL], Ptr::NIL))?;

    let mut aw = ArcWriter::new(config)?;
    let mut out_label = v.label();
    let mut out_id = 0;
    let mut max_cut = 0;

    while !pq1.is_empty() || !pq2.is_empty() {
        if pq1.empty_level() && pq2.is_empty() {
            if out_id > 0 {
                aw.push_level(LevelInfo::new(out_label, out_id))?;
            }
            pq1.setup_next_level(None)?;
            out_label = pq1.current_level();
            out_id = 0;
            max_cut = max_cut.max(pq1.size() as u64);
        }

        let req = if pq1.can_pull() && (pq2.is_empty() || pq1.top().first() < pq2.top().second()) {
            CarryRequest::from(*pq1.top())
        } else {
            *pq2.top()
        };
        let [t0, t1] = req.target;
        let single = t1.is_nil();

        let seek = if req.has_carry() { t1 } else { t0 };
        while v.uid < seek && nodes.can_pull() {
            v = nodes.pull()?;
        }
        debug_assert_eq!(v.uid, seek);

        if !single && !req.has_carry() && t1.is_node() && t0.label() == t1.label() {
            let carry = v.children();
            while pq1.can_pull() && pq1.top().target == req.target {
                let parent = pq1.pull()?;
                pq2.push(CarryRequest {
                    target: req.target,
                    carry,
                    source: parent.source,
                })?;
            }
            continue;
        }

        let rec = if single && v.label() == label {
            Rec::SkipTo(resolve(op, pair(v.low, v.high)))
        } else if single {
            Rec::Output {
                low: [v.low, Ptr::NIL],
                high: [v.high, Ptr::NIL],
            }
        } else {
            let (c0, c1) = if req.has_carry() {
                (req.carry, v.children())
            } else {
                (v.children(), BddPolicy::reduction_rule_inv(t1))
            };
            Rec::Output {
                low: resolve(op, pair(c0[0], c1[0])),
                high: resolve(op, pair(c0[1], c1[1])),
            }
        };

        match rec {
            Rec::Output { low, high } => {
                let out_uid = Ptr::node(out_label, out_id);
                out_id += 1;
                recurse_out(&mut pq1, &mut aw, out_uid, low)?;
                recurse_out(&mut pq1, &mut aw, out_uid.flag(), high)?;
                for source in parents_of(&mut pq1, &mut pq2, req.target)? {
                    if !source.is_nil() {
                        aw.push_internal(Arc::new(source, out_uid))?;
                    }
                }
            }
            Rec::SkipTo([t, _]) if t.is_terminal() => {
                if req.source.is_nil() {
                    return Ok(Dd::terminal(config, t.value())?.into());
                }
                for source in parents_of(&mut pq1, &mut pq2, req.target)? {
                    aw.push_terminal(Arc::new(source, t))?;
                }
            }
            Rec::SkipTo(r) => {
                for source in parents_of(&mut pq1, &mut pq2, req.target)? {
                    pq1.push(PairRequest::new(r, source))?;
                }
            }
        }
    }

    if out_id > 0 {
        aw.push_level(LevelInfo::new(out_label, out_id))?;
    }
    aw.set_max_1level_cut(max_cut);
    Ok(Unreduced::Arcs(aw.finish()?))
}
