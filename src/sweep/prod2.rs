//! Product construction of two diagrams under a binary operator.
//!
//! Both inputs are streamed top-down in lockstep. A request `(t0, t1)` is handled once the sweep
//! reaches the earlier of the two nodes. If both nodes sit on the same level but only one has been
//! found so far, the request moves into a second queue, carrying the found node's children, until
//! the stream reaches the other one.

use log::debug;

use crate::arc::{Arc, LevelInfo};
use crate::bool_op::BinaryOperator;
use crate::config::Config;
use crate::dd::{Dd, Unreduced};
use crate::error::Result;
use crate::file::ArcWriter;
use crate::lpq::{LevelMerger, LevelizedPq};
use crate::node::Node;
use crate::policy::{BddPolicy, DdPolicy, ZddPolicy};
use crate::ptr::{first, Ptr};
use crate::sorter::Pq;

use super::{split_memory, ByFirst, BySecond, CarryRequest, PairRequest, Rec};

/// How a product construction treats its diagram family.
pub trait Prod2Policy {
    type Dd: DdPolicy;

    /// Both operands are the same file (possibly with different negation).
    fn resolve_same_file<O: BinaryOperator>(config: &Config, a: &Dd, b: &Dd, op: &O) -> Result<Unreduced>;

    /// At least one operand is a constant. Returns `None` if a sweep is still needed.
    fn resolve_terminal_root<O: BinaryOperator>(
        config: &Config,
        a: &Dd,
        b: &Dd,
        op: &O,
    ) -> Result<Option<Unreduced>>;

    /// Decides on the node for a pair, given the pairs of its low and high children.
    fn resolve_request<O: BinaryOperator>(op: &O, low: [Ptr; 2], high: [Ptr; 2]) -> Rec<[Ptr; 2]>;
}

/// The constant `value`, reusing whichever operand already is that constant.
fn constant(config: &Config, value: bool, a: &Dd, b: &Dd) -> Result<Dd> {
    for dd in [a, b] {
        if dd.is_terminal() && dd.value() == value {
            return Ok(dd.clone());
        }
    }
    Dd::terminal(config, value)
}

/// Product construction of BDDs.
pub struct BddProd2;

impl BddProd2 {
    /// Replaces a pair by a cheaper one if a terminal decides the outcome on its own.
    fn shortcut<O: BinaryOperator>(op: &O, r: [Ptr; 2]) -> [Ptr; 2] {
        if r[0].is_terminal() && op.can_left_shortcut(r[0].value()) {
            [r[0], Ptr::TRUE]
        } else if r[1].is_terminal() && op.can_right_shortcut(r[1].value()) {
            [Ptr::TRUE, r[1]]
        } else {
            r
        }
    }
}

impl Prod2Policy for BddProd2 {
    type Dd = BddPolicy;

    fn resolve_same_file<O: BinaryOperator>(config: &Config, a: &Dd, b: &Dd, op: &O) -> Result<Unreduced> {
        // With f the shared function: a = f ^ a.negate and b = f ^ b.negate.
        let when_false = op.eval(a.negate, b.negate);
        let when_true = op.eval(!a.negate, !b.negate);
        if when_false == when_true {
            return Ok(Dd::terminal(config, when_false)?.into());
        }
        Ok(Dd::with_negation(a.file.clone(), when_false).into())
    }

    fn resolve_terminal_root<O: BinaryOperator>(
        config: &Config,
        a: &Dd,
        b: &Dd,
        op: &O,
    ) -> Result<Option<Unreduced>> {
        let negated = |dd: &Dd| Dd::with_negation(dd.file.clone(), !dd.negate);
        let res = match (a.is_terminal(), b.is_terminal()) {
            (true, true) => constant(config, op.eval(a.value(), b.value()), a, b)?,
            (true, false) => {
                let t = a.value();
                if op.can_left_shortcut(t) {
                    constant(config, op.eval(t, false), a, b)?
                } else if op.is_left_idempotent(t) {
                    b.clone()
                } else if op.is_left_negating(t) {
                    negated(b)
                } else {
                    return Ok(None);
                }
            }
            (false, true) => {
                let t = b.value();
                if op.can_right_shortcut(t) {
                    constant(config, op.eval(false, t), a, b)?
                } else if op.is_right_idempotent(t) {
                    a.clone()
                } else if op.is_right_negating(t) {
                    negated(a)
                } else {
                    return Ok(None);
                }
            }
            (false, false) => return Ok(None),
        };
        Ok(Some(res.into()))
    }

    fn resolve_request<O: BinaryOperator>(op: &O, low: [Ptr; 2], high: [Ptr; 2]) -> Rec<[Ptr; 2]> {
        Rec::Output {
            low: Self::shortcut(op, low),
            high: Self::shortcut(op, high),
        }
    }
}

/// Product construction of ZDDs.
///
/// A set-family operator never produces sets from nothing, so `op(∅, ∅)` must be `∅`.
pub struct ZddProd2;

impl ZddProd2 {
    /// Whether `op(t, x)` is `∅` for every `x`, also once the left side has run out.
    fn can_left_shortcut<O: BinaryOperator>(op: &O, t: bool) -> bool {
        !op.eval(t, false) && !op.eval(t, true) && !op.eval(false, false) && !op.eval(false, true)
    }

    fn can_right_shortcut<O: BinaryOperator>(op: &O, t: bool) -> bool {
        !op.eval(false, t) && !op.eval(true, t) && !op.eval(false, false) && !op.eval(true, false)
    }

    /// Whether the high pair certainly yields `∅`, so no node is needed.
    fn skippable<O: BinaryOperator>(op: &O, high: [Ptr; 2]) -> bool {
        (high[0].is_terminal() && high[1].is_terminal() && !op.apply(high[0], high[1]).value())
            || (high[0].is_terminal() && Self::can_left_shortcut(op, high[0].value()))
            || (high[1].is_terminal() && Self::can_right_shortcut(op, high[1].value()))
    }

    fn shortcut<O: BinaryOperator>(op: &O, r: [Ptr; 2]) -> [Ptr; 2] {
        if r[0].is_terminal() && Self::can_left_shortcut(op, r[0].value()) {
            [r[0], Ptr::TRUE]
        } else if r[1].is_terminal() && Self::can_right_shortcut(op, r[1].value()) {
            [Ptr::TRUE, r[1]]
        } else {
            r
        }
    }
}

impl Prod2Policy for ZddProd2 {
    type Dd = ZddPolicy;

    fn resolve_same_file<O: BinaryOperator>(config: &Config, a: &Dd, _b: &Dd, op: &O) -> Result<Unreduced> {
        let when_false = op.eval(false, false);
        let when_true = op.eval(true, true);
        if when_false == when_true {
            return Ok(Dd::terminal(config, when_false)?.into());
        }
        Ok(a.clone().into())
    }

    fn resolve_terminal_root<O: BinaryOperator>(
        config: &Config,
        a: &Dd,
        b: &Dd,
        op: &O,
    ) -> Result<Option<Unreduced>> {
        let res = match (a.is_terminal(), b.is_terminal()) {
            (true, true) => constant(config, op.eval(a.value(), b.value()), a, b)?,
            (true, false) => {
                let t = a.value();
                if Self::can_left_shortcut(op, t) {
                    constant(config, false, a, b)?
                } else if op.is_left_idempotent(t) && op.is_left_idempotent(false) {
                    b.clone()
                } else {
                    return Ok(None);
                }
            }
            (false, true) => {
                let t = b.value();
                if Self::can_right_shortcut(op, t) {
                    constant(config, false, a, b)?
                } else if op.is_right_idempotent(t) && op.is_right_idempotent(false) {
                    a.clone()
                } else {
                    return Ok(None);
                }
            }
            (false, false) => return Ok(None),
        };
        Ok(Some(res.into()))
    }

    fn resolve_request<O: BinaryOperator>(op: &O, low: [Ptr; 2], high: [Ptr; 2]) -> Rec<[Ptr; 2]> {
        if Self::skippable(op, high) {
            return Rec::SkipTo(low);
        }
        Rec::Output {
            low: Self::shortcut(op, low),
            high: Self::shortcut(op, high),
        }
    }
}

/// Sends the arc `source -> target` on: to the output if the pair is decided, else to the queue.
fn recurse_out<O: BinaryOperator>(
    pq: &mut LevelizedPq<PairRequest, ByFirst>,
    aw: &mut ArcWriter,
    op: &O,
    source: Ptr,
    target: [Ptr; 2],
) -> Result<()> {
    if target[0].is_terminal() && target[1].is_terminal() {
        aw.push_terminal(Arc::new(source, op.apply(target[0], target[1])))
    } else {
        debug_assert!(source.label() < first(target[0], target[1]).label());
        pq.push(PairRequest::new(target, source))
    }
}

/// Pulls every parent of `target` from both queues.
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

/// Children of both targets of `req`, once the streams have been moved to `seek`.
fn merge_children<P: DdPolicy>(req: &CarryRequest, seek: Ptr, v0: &Node, v1: &Node) -> [[Ptr; 2]; 2] {
    let [t0, t1] = req.target;
    let same_level = t0.is_node() && t1.is_node() && t0.label() == t1.label();
    if same_level {
        let c0 = if t0 < seek { req.carry } else { v0.children() };
        let c1 = if t1 < seek { req.carry } else { v1.children() };
        [c0, c1]
    } else {
        debug_assert_ne!(t0, t1);
        let c0 = if t0 < t1 { v0.children() } else { P::reduction_rule_inv(t0) };
        let c1 = if t1 < t0 { v1.children() } else { P::reduction_rule_inv(t1) };
        [c0, c1]
    }
}

/// The product of `a` and `b` under `op`.
pub fn prod2<Q: Prod2Policy, O: BinaryOperator>(
    config: &Config,
    a: &Dd,
    b: &Dd,
    op: &O,
) -> Result<Unreduced> {
    if std::sync::Arc::ptr_eq(&a.file, &b.file) {
        return Q::resolve_same_file(config, a, b, op);
    }
    if a.is_terminal() || b.is_terminal() {
        if let Some(res) = Q::resolve_terminal_root(config, a, b, op)? {
            return Ok(res);
        }
    }
    debug!(
        "prod2<{}>: {} x {} nodes",
        <Q::Dd as DdPolicy>::NAME,
        a.nodecount(),
        b.nodecount()
    );

    let mut in0 = a.nodes()?;
    let mut in1 = b.nodes()?;
    let mut v0 = in0.pull()?;
    let mut v1 = in1.pull()?;

    let (pq1_memory, pq2_memory) = split_memory(config.memory_available());
    let bound = {
        let cuts = a.file.max_2level_cut().saturating_mul(b.file.max_2level_cut());
        let sizes = (a.file.size() + 2).saturating_mul(b.file.size() + 2);
        cuts.saturating_add(2).min(sizes)
    };
    let levels = LevelMerger::new(false)
        .add_nodes(&a.file)?
        .add_nodes(&b.file)?;
    let mut pq1 = LevelizedPq::<PairRequest, ByFirst>::new(config, levels, pq1_memory, bound)?;
    let mut pq2 = Pq::<CarryRequest, BySecond>::new(config, pq2_memory);
    pq1.push(PairRequest::new([v0.uid, v1.uid], Ptr::NIL))?;

    let mut aw = ArcWriter::new(config)?;
    let mut out_label = first(v0.uid, v1.uid).label();
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

        let seek = if req.has_carry() { req.second() } else { req.first() };
        while v0.uid < seek && in0.can_pull() {
            v0 = in0.pull()?;
        }
        while v1.uid < seek && in1.can_pull() {
            v1 = in1.pull()?;
        }

        let [t0, t1] = req.target;
        if !req.has_carry()
            && t0.is_node()
            && t1.is_node()
            && t0.label() == t1.label()
            && (v0.uid != t0 || v1.uid != t1)
        {
            let carry = if v0.uid == t0 { v0.children() } else { v1.children() };
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

        let [c0, c1] = merge_children::<Q::Dd>(&req, seek, &v0, &v1);
        match Q::resolve_request(op, [c0[0], c1[0]], [c0[1], c1[1]]) {
            Rec::Output { low, high } => {
                let out_uid = Ptr::node(out_label, out_id);
                out_id += 1;
                recurse_out(&mut pq1, &mut aw, op, out_uid, low)?;
                recurse_out(&mut pq1, &mut aw, op, out_uid.flag(), high)?;
                for source in parents_of(&mut pq1, &mut pq2, req.target)? {
                    if !source.is_nil() {
                        aw.push_internal(Arc::new(source, out_uid))?;
                    }
                }
            }
            Rec::SkipTo(r) if r[0].is_terminal() && r[1].is_terminal() => {
                let value = op.apply(r[0], r[1]);
                if req.source.is_nil() {
                    return Ok(Dd::terminal(config, value.value())?.into());
                }
                for source in parents_of(&mut pq1, &mut pq2, req.target)? {
                    aw.push_terminal(Arc::new(source, value))?;
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
