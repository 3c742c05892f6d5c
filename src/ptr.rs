//! Bit-packed pointers to nodes and terminals.
//!
//! Every reference in a decision diagram is a single `u64`:
//!
//! | Kind     | Bits                                   |
//! |----------|----------------------------------------|
//! | node     | `[0][label:24][id:38][flag:1]`         |
//! | terminal | `[1][0 ... 0][value:1][flag:1]`        |
//! | nil      | `[1][1 ... 1][1][flag:1]`              |
//!
//! The layout is chosen such that plain integer comparison is the structural order:
//! nodes (by label, then by id) come before terminals (`false` before `true`), which come before
//! NIL. The lowest bit is a *flag* that marks the high-arc of a source; a flagged pointer sorts
//! right after its unflagged twin. All streaming merges in this crate compare pointers as integers.

use std::fmt;

/// A variable label (level in the fixed variable order).
pub type Label = u32;

/// A per-level node identifier.
pub type Id = u64;

const LABEL_BITS: u32 = 24;
const ID_BITS: u32 = 38;
const FLAG_BITS: u32 = 1;

const TERMINAL_BIT: u64 = 1 << 63;
const FLAG_MASK: u64 = 1;
const VALUE_MASK: u64 = 2;

/// The largest label a node may carry.
pub const MAX_LABEL: Label = (1 << LABEL_BITS) - 1;

/// The largest id a node may carry.
pub const MAX_ID: Id = (1 << ID_BITS) - 1;

/// Pointer to a node, to a terminal, or NIL.
///
/// # Invariants
///
/// - `Ptr::node(l1, i1) < Ptr::node(l2, i2)` iff `l1 < l2 || (l1 == l2 && i1 < i2)`
/// - every node pointer is smaller than every terminal pointer
/// - every terminal pointer is smaller than [`Ptr::NIL`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ptr(u64);

impl Ptr {
    /// The "no pointer" sentinel, e.g. the parent of a root.
    pub const NIL: Ptr = Ptr(u64::MAX ^ FLAG_MASK);

    pub const FALSE: Ptr = Ptr::terminal(false);
    pub const TRUE: Ptr = Ptr::terminal(true);

    /// Creates the (unflagged) pointer to node `(label, id)`.
    pub const fn node(label: Label, id: Id) -> Self {
        debug_assert!(label <= MAX_LABEL);
        debug_assert!(id <= MAX_ID);
        Self(((label as u64) << (ID_BITS + FLAG_BITS)) | (id << FLAG_BITS))
    }

    /// Creates the (unflagged) pointer to the terminal with the given value.
    pub const fn terminal(value: bool) -> Self {
        Self(TERMINAL_BIT | ((value as u64) << FLAG_BITS))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_nil(self) -> bool {
        self.0 >= Self::NIL.0
    }

    pub const fn is_node(self) -> bool {
        self.0 <= !TERMINAL_BIT
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_nil() && self.0 >= TERMINAL_BIT
    }

    pub const fn is_false(self) -> bool {
        self.is_terminal() && !self.value()
    }

    pub const fn is_true(self) -> bool {
        self.is_terminal() && self.value()
    }

    pub const fn is_flagged(self) -> bool {
        self.0 & FLAG_MASK != 0
    }

    pub const fn flag(self) -> Self {
        Self(self.0 | FLAG_MASK)
    }

    pub const fn unflag(self) -> Self {
        Self(self.0 & !FLAG_MASK)
    }

    /// Returns `self` flagged iff `flag` is set.
    pub const fn with_flag(self, flag: bool) -> Self {
        if flag {
            self.flag()
        } else {
            self.unflag()
        }
    }

    /// Label of a node pointer.
    pub const fn label(self) -> Label {
        debug_assert!(self.is_node());
        (self.0 >> (ID_BITS + FLAG_BITS)) as Label
    }

    /// Id of a node pointer.
    pub const fn id(self) -> Id {
        debug_assert!(self.is_node());
        (self.0 >> FLAG_BITS) & MAX_ID
    }

    /// Value of a terminal pointer.
    pub const fn value(self) -> bool {
        debug_assert!(self.is_terminal());
        self.0 & VALUE_MASK != 0
    }

    /// Level used for ordering: the label of a node, or one past [`MAX_LABEL`] otherwise.
    pub const fn level(self) -> u64 {
        if self.is_node() {
            self.label() as u64
        } else {
            MAX_LABEL as u64 + 1
        }
    }

    /// Whether this is a node on the given level.
    pub const fn on_level(self, label: Label) -> bool {
        self.is_node() && self.label() == label
    }

    /// Flips the value of a terminal; nodes are returned unchanged.
    pub const fn negate(self) -> Self {
        if self.is_terminal() {
            Self(self.0 ^ VALUE_MASK)
        } else {
            self
        }
    }

    /// Negates a terminal iff `negate` is set.
    pub const fn negate_if(self, negate: bool) -> Self {
        if negate {
            self.negate()
        } else {
            self
        }
    }
}

impl fmt::Display for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else if self.is_terminal() {
            write!(f, "{}", if self.value() { "T" } else { "F" })?;
            if self.is_flagged() {
                write!(f, "'")?;
            }
            Ok(())
        } else {
            write!(f, "({}:{})", self.label(), self.id())?;
            if self.is_flagged() {
                write!(f, "'")?;
            }
            Ok(())
        }
    }
}

impl fmt::Debug for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<bool> for Ptr {
    fn from(value: bool) -> Self {
        Ptr::terminal(value)
    }
}

/// The smaller of two pointers.
pub fn first(a: Ptr, b: Ptr) -> Ptr {
    a.min(b)
}

/// The larger of two pointers.
pub fn second(a: Ptr, b: Ptr) -> Ptr {
    a.max(b)
}
