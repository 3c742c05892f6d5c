//! Evaluation by following a single path.
//!
//! The nodes of a path have ascending uids, so one forward pass with [`NodeStream::seek`] finds
//! all of them.
//!
//! [`NodeStream::seek`]: crate::file::NodeStream::seek

use crate::dd::Dd;
use crate::error::Result;
use crate::ptr::{Label, Ptr};

/// Value of the BDD `dd` under `assignment`.
pub fn eval(dd: &Dd, assignment: impl Fn(Label) -> bool) -> Result<bool> {
    if dd.is_terminal() {
        return Ok(dd.value());
    }
    let mut nodes = dd.nodes()?;
    let mut current = nodes.peek().uid;
    while current.is_node() {
        let n = nodes.seek(current)?;
        current = if assignment(n.label()) { n.high } else { n.low };
    }
    Ok(current.value())
}

/// Whether the ZDD `dd` contains the set `labels`.
pub fn contains(dd: &Dd, labels: &[Label]) -> Result<bool> {
    let mut set = labels.to_vec();
    set.sort_unstable();
    set.dedup();

    if dd.is_terminal() {
        return Ok(dd.value() && set.is_empty());
    }
    let mut nodes = dd.nodes()?;
    let mut current = nodes.peek().uid;
    let mut remaining = set.iter().copied().peekable();
    while current.is_node() {
        let n = nodes.seek(current)?;
        // A member above this level has been skipped, i.e. its node is suppressed.
        if remaining.peek().is_some_and(|&l| l < n.label()) {
            return Ok(false);
        }
        current = if remaining.next_if_eq(&n.label()).is_some() {
            n.high
        } else {
            n.low
        };
    }
    Ok(current == Ptr::TRUE && remaining.next().is_none())
}
