//! The reduction rules that distinguish BDDs from ZDDs.

use crate::ptr::Ptr;

/// A family of decision diagrams, defined by its node-elimination rule.
pub trait DdPolicy {
    const NAME: &'static str;

    /// The pointer a node with the given children collapses to, or `None` if it must be kept.
    fn reduction_rule(low: Ptr, high: Ptr) -> Option<Ptr>;

    /// The children of an eliminated node that collapsed to `child`.
    ///
    /// Used when one operand skips a level that the other operand has.
    fn reduction_rule_inv(child: Ptr) -> [Ptr; 2];
}

/// Binary Decision Diagrams: a node with equal children is redundant.
#[derive(Debug, Clone, Copy, Default)]
pub struct BddPolicy;

impl DdPolicy for BddPolicy {
    const NAME: &'static str = "BDD";

    fn reduction_rule(low: Ptr, high: Ptr) -> Option<Ptr> {
        (low.unflag() == high.unflag()).then(|| low.unflag())
    }

    fn reduction_rule_inv(child: Ptr) -> [Ptr; 2] {
        [child, child]
    }
}

/// Zero-suppressed Decision Diagrams: a node whose high child is `false` is redundant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZddPolicy;

impl DdPolicy for ZddPolicy {
    const NAME: &'static str = "ZDD";

    fn reduction_rule(low: Ptr, high: Ptr) -> Option<Ptr> {
        high.unflag().is_false().then(|| low.unflag())
    }

    fn reduction_rule_inv(child: Ptr) -> [Ptr; 2] {
        [child, Ptr::FALSE]
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_bdd_rule() {
        let n = Ptr::node(3, 0);
        assert_eq!(BddPolicy::reduction_rule(n, n), Some(n));
        assert_eq!(BddPolicy::reduction_rule(Ptr::TRUE, Ptr::TRUE), Some(Ptr::TRUE));
        assert_eq!(BddPolicy::reduction_rule(Ptr::FALSE, Ptr::TRUE), None);
        assert_eq!(BddPolicy::reduction_rule_inv(n), [n, n]);
    }

    #[test]
    fn test_zdd_rule() {
        let n = Ptr::node(3, 0);
        assert_eq!(ZddPolicy::reduction_rule(n, Ptr::FALSE), Some(n));
        assert_eq!(ZddPolicy::reduction_rule(Ptr::FALSE, Ptr::FALSE), Some(Ptr::FALSE));
        assert_eq!(ZddPolicy::reduction_rule(n, n), None);
        assert_eq!(ZddPolicy::reduction_rule_inv(Ptr::TRUE), [Ptr::TRUE, Ptr::FALSE]);
    }
}
