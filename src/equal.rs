//! Equality of reduced diagrams.
//!
//! Two reduced diagrams of the same function are isomorphic, so most comparisons are settled by the
//! file statistics alone. If both files are canonical, the node sequences must be identical, which
//! one linear scan decides. Otherwise the symmetric difference is computed and checked for `⊥`.

use log::debug;

use crate::bool_op::Xor;
use crate::config::Config;
use crate::dd::Dd;
use crate::error::Result;
use crate::policy::DdPolicy;
use crate::sweep::prod2::{prod2, Prod2Policy};

/// Number of arcs to `⊤` as seen through the negation flag of `dd`.
fn true_arcs(dd: &Dd) -> u64 {
    dd.file.number_of_terminals(!dd.negate)
}

/// Whether the statistics of `a` and `b` already tell them apart.
fn differ_in_stats(a: &Dd, b: &Dd) -> Result<bool> {
    if a.is_terminal() || b.is_terminal() {
        return Ok(!(a.is_terminal() && b.is_terminal()) || a.value() != b.value());
    }
    Ok(a.nodecount() != b.nodecount()
        || a.varcount() != b.varcount()
        || a.file.width() != b.file.width()
        || true_arcs(a) != true_arcs(b)
        || a.levels()? != b.levels()?)
}

/// Whether the node sequences of `a` and `b` are the same.
fn same_nodes(a: &Dd, b: &Dd) -> Result<bool> {
    let mut na = a.nodes()?;
    let mut nb = b.nodes()?;
    while na.can_pull() && nb.can_pull() {
        if na.pull()? != nb.pull()? {
            return Ok(false);
        }
    }
    Ok(!na.can_pull() && !nb.can_pull())
}

/// Whether `a` and `b` represent the same function (or family).
pub fn is_equal<Q: Prod2Policy>(config: &Config, a: &Dd, b: &Dd) -> Result<bool> {
    if a.same_as(b) {
        return Ok(true);
    }
    if std::sync::Arc::ptr_eq(&a.file, &b.file) {
        // A function differs from its own negation.
        return Ok(false);
    }
    if differ_in_stats(a, b)? {
        return Ok(false);
    }
    if a.file.is_canonical() && b.file.is_canonical() && a.negate == b.negate {
        return same_nodes(a, b);
    }

    debug!(
        "is_equal<{}>: falling back to the symmetric difference of {} and {} nodes",
        <Q::Dd as DdPolicy>::NAME,
        a.nodecount(),
        b.nodecount()
    );
    let diff = prod2::<Q, _>(config, a, b, &Xor)?.reduce::<Q::Dd>(config)?;
    Ok(diff.is_false())
}
