//! Top-down sweeps.
//!
//! Every operation besides [`reduce`][crate::reduce] is a single top-down sweep over its input(s)
//! that writes an unreduced arc file. Recursion is replaced by requests in a levelized priority
//! queue: a request names the node(s) to visit and the (flagged) source that asked for it.
//!
//! The sweeps differ in how many diagrams they walk and in what a request resolves to; a policy
//! decides the latter by returning a [`Rec`].

pub mod intercut;
pub mod prod2;
pub mod prod3;
pub mod quantify;
pub mod select;

use std::cmp::Ordering;

use crate::lpq::LevelOrder;
use crate::ptr::{first, second, Label, Ptr};
use crate::record::{read_ptr, write_ptr, Record};
use crate::sorter::Order;

/// What a request resolves to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Rec<T> {
    /// Create a node with these children.
    Output { low: T, high: T },
    /// Create no node; the parents point to this target instead.
    SkipTo(T),
}

/// A request to visit a pair of nodes, one in each of two diagrams.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PairRequest {
    pub target: [Ptr; 2],
    pub source: Ptr,
}

impl PairRequest {
    pub fn new(target: [Ptr; 2], source: Ptr) -> Self {
        Self { target, source }
    }

    pub fn first(&self) -> Ptr {
        first(self.target[0], self.target[1])
    }

    pub fn second(&self) -> Ptr {
        second(self.target[0], self.target[1])
    }
}

impl Record for PairRequest {
    const SIZE: usize = 24;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, self.target[0]);
        write_ptr(buf, 8, self.target[1]);
        write_ptr(buf, 16, self.source);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            target: [read_ptr(buf, 0), read_ptr(buf, 8)],
            source: read_ptr(buf, 16),
        }
    }
}

/// A pair request whose earlier node has been found already; its children are carried along
/// until the later node of the same level is reached.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CarryRequest {
    pub target: [Ptr; 2],
    pub carry: [Ptr; 2],
    pub source: Ptr,
}

impl CarryRequest {
    pub fn first(&self) -> Ptr {
        first(self.target[0], self.target[1])
    }

    pub fn second(&self) -> Ptr {
        second(self.target[0], self.target[1])
    }

    pub fn has_carry(&self) -> bool {
        !self.carry[0].is_nil()
    }
}

impl From<PairRequest> for CarryRequest {
    fn from(req: PairRequest) -> Self {
        Self {
            target: req.target,
            carry: [Ptr::NIL, Ptr::NIL],
            source: req.source,
        }
    }
}

impl Record for CarryRequest {
    const SIZE: usize = 40;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, self.target[0]);
        write_ptr(buf, 8, self.target[1]);
        write_ptr(buf, 16, self.carry[0]);
        write_ptr(buf, 24, self.carry[1]);
        write_ptr(buf, 32, self.source);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            target: [read_ptr(buf, 0), read_ptr(buf, 8)],
            carry: [read_ptr(buf, 16), read_ptr(buf, 24)],
            source: read_ptr(buf, 32),
        }
    }
}

/// Pair requests by their first target, then their second.
pub struct ByFirst;

impl Order<PairRequest> for ByFirst {
    fn cmp(a: &PairRequest, b: &PairRequest) -> Ordering {
        (a.first(), a.second(), a.target[0], a.source).cmp(&(
            b.first(),
            b.second(),
            b.target[0],
            b.source,
        ))
    }
}

impl LevelOrder<PairRequest> for ByFirst {
    const DESCENDING: bool = false;

    fn level(req: &PairRequest) -> Label {
        req.first().label()
    }
}

/// Carry requests by their second target.
pub struct BySecond;

impl Order<CarryRequest> for BySecond {
    fn cmp(a: &CarryRequest, b: &CarryRequest) -> Ordering {
        (a.second(), a.first(), a.target[0], a.source).cmp(&(
            b.second(),
            b.first(),
            b.target[0],
            b.source,
        ))
    }
}

/// Memory for the primary and the secondary queue of a two-queue sweep.
pub(crate) fn split_memory(memory: usize) -> (usize, usize) {
    let primary = memory / 2;
    (primary, memory - primary)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_pair_order_is_by_first_target() {
        let a = PairRequest::new([Ptr::node(3, 0), Ptr::node(1, 0)], Ptr::NIL);
        let b = PairRequest::new([Ptr::node(2, 0), Ptr::node(2, 1)], Ptr::NIL);
        assert_eq!(ByFirst::level(&a), 1);
        assert_eq!(ByFirst::cmp(&a, &b), Ordering::Less);

        let c = CarryRequest::from(a);
        assert!(!c.has_carry());
        assert_eq!(c.second(), Ptr::node(3, 0));
    }
}
