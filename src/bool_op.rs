//! Binary Boolean operators and their algebraic properties.
//!
//! Sweeps query these properties to stop recursing early: e.g. `and` with a `false` operand is
//! `false` no matter the other side (a *shortcut*), and `and` with a `true` operand returns the
//! other side unchanged (it is *idempotent*).

use crate::ptr::Ptr;

/// A binary Boolean operator.
pub trait BinaryOperator {
    fn eval(&self, a: bool, b: bool) -> bool;

    /// Applies the operator to two terminals (flags are ignored).
    fn apply(&self, a: Ptr, b: Ptr) -> Ptr {
        debug_assert!(a.is_terminal() && b.is_terminal());
        Ptr::terminal(self.eval(a.value(), b.value()))
    }

    fn commutative(&self) -> bool {
        self.eval(true, false) == self.eval(false, true)
    }

    /// Whether `op(t, x)` does not depend on `x`.
    fn can_left_shortcut(&self, t: bool) -> bool {
        self.eval(t, false) == self.eval(t, true)
    }

    /// Whether `op(x, t)` does not depend on `x`.
    fn can_right_shortcut(&self, t: bool) -> bool {
        self.eval(false, t) == self.eval(true, t)
    }

    /// Whether `op(t, x) == x`.
    fn is_left_idempotent(&self, t: bool) -> bool {
        !self.eval(t, false) && self.eval(t, true)
    }

    /// Whether `op(x, t) == x`.
    fn is_right_idempotent(&self, t: bool) -> bool {
        !self.eval(false, t) && self.eval(true, t)
    }

    /// Whether `op(t, x) == !x`.
    fn is_left_negating(&self, t: bool) -> bool {
        self.eval(t, false) && !self.eval(t, true)
    }

    /// Whether `op(x, t) == !x`.
    fn is_right_negating(&self, t: bool) -> bool {
        self.eval(false, t) && !self.eval(true, t)
    }

    /// The operator with its operands swapped.
    fn flip(self) -> Flip<Self>
    where
        Self: Sized,
    {
        Flip(self)
    }
}

impl<O: BinaryOperator + ?Sized> BinaryOperator for &O {
    fn eval(&self, a: bool, b: bool) -> bool {
        (**self).eval(a, b)
    }
}

/// `op(b, a)` for an operator `op`.
#[derive(Debug, Clone, Copy)]
pub struct Flip<O>(pub O);

impl<O: BinaryOperator> BinaryOperator for Flip<O> {
    fn eval(&self, a: bool, b: bool) -> bool {
        self.0.eval(b, a)
    }
}

macro_rules! operators {
    ($($(#[$doc:meta])* $name:ident => |$a:ident, $b:ident| $body:expr;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
            pub struct $name;

            impl BinaryOperator for $name {
                fn eval(&self, $a: bool, $b: bool) -> bool {
                    $body
                }
            }
        )*
    };
}

operators! {
    /// `a ∧ b`
    And => |a, b| a && b;
    /// `¬(a ∧ b)`
    Nand => |a, b| !(a && b);
    /// `a ∨ b`
    Or => |a, b| a || b;
    /// `¬(a ∨ b)`
    Nor => |a, b| !(a || b);
    /// `a ⊕ b`
    Xor => |a, b| a ^ b;
    /// `a ↔ b`
    Xnor => |a, b| a == b;
    /// `a → b`
    Imp => |a, b| !a || b;
    /// `b → a`
    InvImp => |a, b| a || !b;
    /// `a ∧ ¬b`
    Diff => |a, b| a && !b;
    /// `¬a ∧ b`
    Less => |a, b| !a && b;
}

/// An operator given by an arbitrary predicate, dispatched dynamically.
pub struct FnOp(Box<dyn Fn(bool, bool) -> bool + Send + Sync>);

impl FnOp {
    pub fn new(f: impl Fn(bool, bool) -> bool + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }
}

impl BinaryOperator for FnOp {
    fn eval(&self, a: bool, b: bool) -> bool {
        (self.0)(a, b)
    }
}

impl std::fmt::Debug for FnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnOp")
    }
}
