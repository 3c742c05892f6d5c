use std::fmt;

use crate::ptr::{Id, Label, Ptr};
use crate::record::{read_ptr, write_ptr, Record};

/// A decision node `(uid, low, high)`.
///
/// A diagram that is a single constant is stored as one *terminal node*: its `uid` is the terminal
/// pointer and both children are NIL.
///
/// # Invariants
///
/// - `low` and `high` are terminals or nodes with a label strictly greater than `uid.label()`
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Node {
    pub uid: Ptr,
    pub low: Ptr,
    pub high: Ptr,
}

impl Node {
    pub fn new(uid: Ptr, low: Ptr, high: Ptr) -> Self {
        debug_assert!(uid.is_node() && !uid.is_flagged());
        debug_assert!(!low.is_nil() && !high.is_nil());
        debug_assert!(
            low.is_terminal() || low.label() > uid.label(),
            "low child {} must be below {}",
            low,
            uid
        );
        debug_assert!(
            high.is_terminal() || high.label() > uid.label(),
            "high child {} must be below {}",
            high,
            uid
        );
        Self { uid, low, high }
    }

    /// Shorthand for `Node::new(Ptr::node(label, id), low, high)`.
    pub fn with_label(label: Label, id: Id, low: Ptr, high: Ptr) -> Self {
        Self::new(Ptr::node(label, id), low, high)
    }

    pub fn terminal(value: bool) -> Self {
        Self {
            uid: Ptr::terminal(value),
            low: Ptr::NIL,
            high: Ptr::NIL,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.uid.is_terminal()
    }

    pub fn value(&self) -> bool {
        self.uid.value()
    }

    pub fn label(&self) -> Label {
        self.uid.label()
    }

    pub fn id(&self) -> Id {
        self.uid.id()
    }

    /// `[low, high]`, indexable by the branch value.
    pub fn children(&self) -> [Ptr; 2] {
        [self.low, self.high]
    }

    /// Returns the node with all terminal values flipped (uid included for a terminal node).
    pub fn negate(self) -> Self {
        Self {
            uid: self.uid.negate(),
            low: self.low.negate(),
            high: self.high.negate(),
        }
    }

    pub fn negate_if(self, negate: bool) -> Self {
        if negate {
            self.negate()
        } else {
            self
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "Node({})", self.uid)
        } else {
            write!(f, "Node({}, low = {}, high = {})", self.uid, self.low, self.high)
        }
    }
}

impl Record for Node {
    const SIZE: usize = 24;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, self.uid);
        write_ptr(buf, 8, self.low);
        write_ptr(buf, 16, self.high);
    }

    fn read_le(buf: &[u8]) -> Self {
        Self {
            uid: read_ptr(buf, 0),
            low: read_ptr(buf, 8),
            high: read_ptr(buf, 16),
        }
    }
}
