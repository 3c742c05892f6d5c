//! If-then-else of three BDDs in a single sweep.
//!
//! A request names one node in each of the three diagrams. It is handled once the sweep has seen
//! every one of its targets on the current level; until then it waits in a second queue, ordered
//! by the next target still missing, carrying the children found so far.

use std::cmp::Ordering;

use log::debug;

use crate::arc::{Arc, LevelInfo};
use crate::bool_op::{And, Imp, Or};
use crate::config::Config;
use crate::dd::{Dd, Unreduced};
use crate::error::Result;
use crate::file::ArcWriter;
use crate::lpq::{LevelMerger, LevelOrder, LevelizedPq};
use crate::node::Node;
use crate::policy::{BddPolicy, DdPolicy};
use crate::ptr::{Label, Ptr};
use crate::record::{read_ptr, write_ptr, Record};
use crate::sorter::{Order, Pq};

use super::prod2::{prod2, BddProd2};
use super::split_memory;

/// A request for the triple `(if, then, else)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TripleRequest {
    pub target: [Ptr; 3],
    pub source: Ptr,
}

impl TripleRequest {
    pub fn first(&self) -> Ptr {
        self.target[0].min(self.target[1]).min(self.target[2])
    }
}

impl Record for TripleRequest {
    const SIZE: usize = 32;

    fn write_le(&self, buf: &mut [u8]) {
        for (i, t) in self.target.iter().enumerate() {
            write_ptr(buf, 8 * i, *t);
        }
        write_ptr(buf, 24, self.source);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            target: [read_ptr(buf, 0), read_ptr(buf, 8), read_ptr(buf, 16)],
            source: read_ptr(buf, 24),
        }
    }
}

/// A triple request with the children of the targets found so far.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TripleCarry {
    pub target: [Ptr; 3],
    pub carry: [[Ptr; 2]; 3],
    pub source: Ptr,
}

impl TripleCarry {
    fn level(&self) -> Label {
        TripleRequest::from(*self).first().label()
    }

    /// Whether target `i` is a node of the current level.
    fn on_level(&self, i: usize) -> bool {
        self.target[i].on_level(self.level())
    }

    /// The smallest target of the current level whose children are still missing.
    pub fn next(&self) -> Ptr {
        (0..3)
            .filter(|&i| self.on_level(i) && self.carry[i][0].is_nil())
            .map(|i| self.target[i])
            .min()
            .unwrap_or(Ptr::NIL)
    }

    fn is_complete(&self) -> bool {
        self.next().is_nil()
    }

    /// Low and high triples of the request.
    fn children(&self) -> [[Ptr; 3]; 2] {
        let mut low = [Ptr::NIL; 3];
        let mut high = [Ptr::NIL; 3];
        for i in 0..3 {
            let [l, h] = if self.on_level(i) {
                self.carry[i]
            } else {
                BddPolicy::reduction_rule_inv(self.target[i])
            };
            low[i] = l;
            high[i] = h;
        }
        [low, high]
    }
}

impl From<TripleRequest> for TripleCarry {
    fn from(req: TripleRequest) -> Self {
        Self {
            target: req.target,
            carry: [[Ptr::NIL; 2]; 3],
            source: req.source,
        }
    }
}

impl From<TripleCarry> for TripleRequest {
    fn from(req: TripleCarry) -> Self {
        Self {
            target: req.target,
            source: req.source,
        }
    }
}

impl Record for TripleCarry {
    const SIZE: usize = 80;

    fn write_le(&self, buf: &mut [u8]) {
        for i in 0..3 {
            write_ptr(buf, 8 * i, self.target[i]);
            write_ptr(buf, 24 + 16 * i, self.carry[i][0]);
            write_ptr(buf, 32 + 16 * i, self.carry[i][1]);
        }
        write_ptr(buf, 72, self.source);
    }

    fn read_le(buf: &[u8]) -> Self {
        let mut res = Self {
            target: [Ptr::NIL; 3],
            carry: [[Ptr::NIL; 2]; 3],
            source: read_ptr(buf, 72),
        };
        for i in 0..3 {
            res.target[i] = read_ptr(buf, 8 * i);
            res.carry[i] = [read_ptr(buf, 24 + 16 * i), read_ptr(buf, 32 + 16 * i)];
        }
        res
    }
}

struct ByFirst;

impl Order<TripleRequest> for ByFirst {
    fn cmp(a: &TripleRequest, b: &TripleRequest) -> Ordering {
        (a.first(), a.target, a.source).cmp(&(b.first(), b.target, b.source))
    }
}

impl LevelOrder<TripleRequest> for ByFirst {
    const DESCENDING: bool = false;

    fn level(req: &TripleRequest) -> Label {
        req.first().label()
    }
}

struct ByNext;

impl Order<TripleCarry> for ByNext {
    fn cmp(a: &TripleCarry, b: &TripleCarry) -> Ordering {
        (a.next(), a.target, a.source).cmp(&(b.next(), b.target, b.source))
    }
}

/// The terminal a triple is decided to, if any.
fn decided(t: [Ptr; 3]) -> Option<Ptr> {
    if t[0].is_terminal() {
        let chosen = if t[0].value() { t[1] } else { t[2] };
        return chosen.is_terminal().then_some(chosen);
    }
    (t[1].is_terminal() && t[1] == t[2]).then_some(t[1])
}

/// Drops the branch a constant condition does not take.
fn normalize(t: [Ptr; 3]) -> [Ptr; 3] {
    match t[0] {
        c if c.is_true() => [c, t[1], Ptr::FALSE],
        c if c.is_false() => [c, Ptr::FALSE, t[2]],
        _ => t,
    }
}

fn recurse_out(
    pq: &mut LevelizedPq<TripleRequest, ByFirst>,
    aw: &mut ArcWriter,
    source: Ptr,
    target: [Ptr; 3],
) -> Result<()> {
    let target = normalize(target);
    match decided(target) {
        Some(value) => aw.push_terminal(Arc::new(source, value)),
        None => pq.push(TripleRequest { target, source }),
    }
}

/// Resolves the cases that need no three-way sweep.
fn resolve_without_sweep(config: &Config, f: &Dd, g: &Dd, h: &Dd) -> Result<Option<Unreduced>> {
    if f.is_terminal() {
        let chosen = if f.value() { g } else { h };
        return Ok(Some(chosen.clone().into()));
    }
    if g.same_as(h) {
        return Ok(Some(g.clone().into()));
    }
    if g.is_terminal() && h.is_terminal() {
        let res = match (g.value(), h.value()) {
            (true, false) => f.clone(),
            (false, true) => Dd::with_negation(f.file.clone(), !f.negate),
            _ => g.clone(),
        };
        return Ok(Some(res.into()));
    }
    // A constant branch turns the if-then-else into a binary product.
    let not_f = Dd::with_negation(f.file.clone(), !f.negate);
    let res = match (g.is_terminal(), h.is_terminal()) {
        (true, _) if g.value() => prod2::<BddProd2, _>(config, f, h, &Or)?,
        (true, _) => prod2::<BddProd2, _>(config, &not_f, h, &And)?,
        (_, true) if h.value() => prod2::<BddProd2, _>(config, f, g, &Imp)?,
        (_, true) => prod2::<BddProd2, _>(config, f, g, &And)?,
        _ => return Ok(None),
    };
    Ok(Some(res))
}

/// `if f then g else h`, i.e. `(f ∧ g) ∨ (¬f ∧ h)`.
pub fn ite(config: &Config, f: &Dd, g: &Dd, h: &Dd) -> Result<Unreduced> {
    if let Some(res) = resolve_without_sweep(config, f, g, h)? {
        return Ok(res);
    }
    debug!(
        "prod3<{}>: {} x {} x {} nodes",
        BddPolicy::NAME,
        f.nodecount(),
        g.nodecount(),
        h.nodecount()
    );

    let mut ins = [f.nodes()?, g.nodes()?, h.nodes()?];
    let mut vs: Vec<Node> = Vec::with_capacity(3);
    for input in ins.iter_mut() {
        vs.push(input.pull()?);
    }

    let (pq1_memory, pq2_memory) = split_memory(config.memory_available());
    let bound = {
        let cuts = f
            .file
            .max_2level_cut()
            .saturating_mul(g.file.max_2level_cut())
            .saturating_mul(h.file.max_2level_cut());
        let sizes = (f.file.size() + 2)
            .saturating_mul(g.file.size() + 2)
            .saturating_mul(h.file.size() + 2);
        cuts.saturating_add(2).min(sizes)
    };
    let levels = LevelMerger::new(false)
        .add_nodes(&f.file)?
        .add_nodes(&g.file)?
        .add_nodes(&h.file)?;
    let mut pq1 = LevelizedPq::<TripleRequest, ByFirst>::new(config, levels, pq1_memory, bound)?;
    let mut pq2 = Pq::<TripleCarry, ByNext>::new(config, pq2_memory);
    let root = TripleRequest {
        target: [vs[0].uid, vs[1].uid, vs[2].uid],
        source: Ptr::NIL,
    };
    let mut out_label = root.first().label();
    pq1.push(root)?;

    let mut aw = ArcWriter::new(config)?;
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

        let from_pq1 = pq1.can_pull() && (pq2.is_empty() || pq1.top().first() < pq2.top().next());
        let mut req = if from_pq1 {
            TripleCarry::from(*pq1.top())
        } else {
            *pq2.top()
        };

        let seek = req.next();
        for i in 0..3 {
            while vs[i].uid < seek && ins[i].can_pull() {
                vs[i] = ins[i].pull()?;
            }
            if req.on_level(i) && req.carry[i][0].is_nil() && vs[i].uid == req.target[i] {
                req.carry[i] = vs[i].children();
            }
        }

        let mut parents = Vec::new();
        if from_pq1 {
            while pq1.can_pull() && pq1.top().target == req.target {
                parents.push(pq1.pull()?.source);
            }
        } else {
            while !pq2.is_empty() && pq2.top().target == req.target {
                parents.push(pq2.pull()?.source);
            }
        }

        if !req.is_complete() {
            for source in parents {
                pq2.push(TripleCarry { source, ..req })?;
            }
            continue;
        }

        let [low, high] = req.children();
        let out_uid = Ptr::node(out_label, out_id);
        out_id += 1;
        recurse_out(&mut pq1, &mut aw, out_uid, low)?;
        recurse_out(&mut pq1, &mut aw, out_uid.flag(), high)?;
        for source in parents {
            if !source.is_nil() {
                aw.push_internal(Arc::new(source, out_uid))?;
            }
        }
    }

    if out_id > 0 {
        aw.push_level(LevelInfo::new(out_label, out_id))?;
    }
    aw.set_max_1level_cut(max_cut);
    Ok(Unreduced::Arcs(aw.finish()?))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build;

    #[test]
    fn test_carry_waits_for_later_targets() {
        let t = [Ptr::node(2, 0), Ptr::node(2, 3), Ptr::node(4, 1)];
        let mut req = TripleCarry::from(TripleRequest {
            target: t,
            source: Ptr::NIL,
        });
        assert_eq!(req.level(), 2);
        assert_eq!(req.next(), t[0]);

        req.carry[0] = [Ptr::FALSE, Ptr::TRUE];
        assert_eq!(req.next(), t[1]);
        req.carry[1] = [Ptr::TRUE, Ptr::node(3, 0)];
        assert!(req.is_complete());

        let [low, high] = req.children();
        assert_eq!(low, [Ptr::FALSE, Ptr::TRUE, t[2]]);
        assert_eq!(high, [Ptr::TRUE, Ptr::node(3, 0), t[2]]);
    }

    #[test]
    fn test_decided_triples() {
        let n = Ptr::node(1, 0);
        assert_eq!(decided([Ptr::TRUE, Ptr::FALSE, n]), Some(Ptr::FALSE));
        assert_eq!(decided([Ptr::FALSE, Ptr::FALSE, n]), None);
        assert_eq!(decided([n, Ptr::TRUE, Ptr::TRUE]), Some(Ptr::TRUE));
        assert_eq!(decided([n, Ptr::TRUE, Ptr::FALSE]), None);
        assert_eq!(normalize([Ptr::FALSE, n, n]), [Ptr::FALSE, Ptr::FALSE, n]);
    }

    #[test]
    fn test_carry_layout() {
        let req = TripleCarry {
            target: [Ptr::node(0, 1), Ptr::node(1, 2), Ptr::TRUE],
            carry: [[Ptr::FALSE, Ptr::node(5, 5)], [Ptr::NIL; 2], [Ptr::NIL; 2]],
            source: Ptr::node(0, 7).flag(),
        };
        let mut buf = [0u8; TripleCarry::SIZE];
        req.write_le(&mut buf);
        assert_eq!(TripleCarry::read_le(&buf), req);
    }

    #[test]
    fn test_multiplexer() {
        // if x0 then x1 else x2, for all assignments.
        let config = Config::default();
        let f = build::bdd_ithvar(&config, 0).unwrap();
        let g = build::bdd_ithvar(&config, 1).unwrap();
        let h = build::bdd_ithvar(&config, 2).unwrap();
        let res = ite(&config, &f, &g, &h).unwrap().reduce::<BddPolicy>(&config).unwrap();
        assert_eq!(res.nodecount(), 3);
        for bits in 0..8u32 {
            let x = |v: Label| (bits >> v) & 1 == 1;
            let expected = if x(0) { x(1) } else { x(2) };
            assert_eq!(crate::eval::eval(&res, x).unwrap(), expected, "{:03b}", bits);
        }
    }
}
