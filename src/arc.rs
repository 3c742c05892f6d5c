use std::fmt;

use crate::node::Node;
use crate::ptr::{Label, Ptr};
use crate::record::{read_ptr, read_u32, read_u64, write_ptr, write_u32, write_u64, Record};

/// An edge of an unreduced diagram.
///
/// The source carries the flag iff the arc is the high-arc of its source.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Arc {
    pub source: Ptr,
    pub target: Ptr,
}

impl Arc {
    pub fn new(source: Ptr, target: Ptr) -> Self {
        Self { source, target }
    }

    pub fn is_high(&self) -> bool {
        self.source.is_flagged()
    }

    /// The low-arc of `n`.
    pub fn low_of(n: &Node) -> Self {
        Self::new(n.uid, n.low)
    }

    /// The high-arc of `n`.
    pub fn high_of(n: &Node) -> Self {
        Self::new(n.uid.flag(), n.high)
    }
}

/// Reassembles a node from its two outgoing arcs.
pub fn node_of(low: Arc, high: Arc) -> Node {
    debug_assert!(!low.is_high() && high.is_high());
    debug_assert_eq!(low.source, high.source.unflag());
    Node {
        uid: low.source,
        low: low.target,
        high: high.target,
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

impl Record for Arc {
    const SIZE: usize = 16;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, self.source);
        write_ptr(buf, 8, self.target);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            source: read_ptr(buf, 0),
            target: read_ptr(buf, 8),
        }
    }
}

/// Summary of one level: its label and the number of nodes (or arc sources) on it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LevelInfo {
    pub label: Label,
    pub width: u64,
}

impl LevelInfo {
    pub fn new(label: Label, width: u64) -> Self {
        Self { label, width }
    }
}

impl Record for LevelInfo {
    const SIZE: usize = 12;

    fn write_le(&self, buf: &mut [u8]) {
        write_u32(buf, 0, self.label);
        write_u64(buf, 4, self.width);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            label: read_u32(buf, 0),
            width: read_u64(buf, 4),
        }
    }
}
