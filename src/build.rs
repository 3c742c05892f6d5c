//! Builders for basic diagrams.
//!
//! Each builder writes its node file directly, bottom-up, so the result is already reduced and no
//! sweep is involved. Label lists must be strictly ascending.

use crate::config::Config;
use crate::dd::Dd;
use crate::error::{Error, Result};
use crate::file::NodeWriter;
use crate::node::Node;
use crate::ptr::{Label, Ptr, MAX_ID, MAX_LABEL};

pub(crate) fn check_label(label: Label) -> Result<()> {
    if label > MAX_LABEL {
        return Err(Error::LabelOutOfRange(label as u64));
    }
    Ok(())
}

pub(crate) fn check_labels(labels: &[Label]) -> Result<()> {
    for &l in labels {
        check_label(l)?;
    }
    for w in labels.windows(2) {
        if w[0] >= w[1] {
            return Err(Error::UnorderedLabels { prev: w[0], next: w[1] });
        }
    }
    Ok(())
}

/// A chain with one node per label: `low`/`high` of each node are picked from the terminal
/// `bottom` and the node below.
fn chain(
    config: &Config,
    labels: &[Label],
    bottom: [Ptr; 2],
    step: impl Fn(Ptr) -> (Ptr, Ptr),
) -> Result<Dd> {
    check_labels(labels)?;
    let Some((&last, rest)) = labels.split_last() else {
        unreachable!("chains are built over at least one label")
    };

    let mut nw = NodeWriter::new(config)?;
    let n = Node::with_label(last, MAX_ID, bottom[0], bottom[1]);
    nw.push(n)?;
    let mut below = n.uid;
    for &l in rest.iter().rev() {
        let (low, high) = step(below);
        let n = Node::with_label(l, MAX_ID, low, high);
        nw.push(n)?;
        below = n.uid;
    }
    Ok(Dd::new(nw.finish()?))
}

pub fn bdd_terminal(config: &Config, value: bool) -> Result<Dd> {
    Dd::terminal(config, value)
}

/// The function `x_label`.
pub fn bdd_ithvar(config: &Config, label: Label) -> Result<Dd> {
    bdd_cube(config, &[(label, true)])
}

/// The function `¬x_label`.
pub fn bdd_nithvar(config: &Config, label: Label) -> Result<Dd> {
    bdd_cube(config, &[(label, false)])
}

/// The conjunction of the given literals, i.e. a single path to `⊤`.
pub fn bdd_cube(config: &Config, literals: &[(Label, bool)]) -> Result<Dd> {
    if literals.is_empty() {
        return Dd::terminal(config, true);
    }
    let labels: Vec<Label> = literals.iter().map(|l| l.0).collect();
    check_labels(&labels)?;

    let mut nw = NodeWriter::new(config)?;
    let mut below = Ptr::TRUE;
    for &(label, value) in literals.iter().rev() {
        let (low, high) = if value {
            (Ptr::FALSE, below)
        } else {
            (below, Ptr::FALSE)
        };
        let n = Node::with_label(label, MAX_ID, low, high);
        nw.push(n)?;
        below = n.uid;
    }
    Ok(Dd::new(nw.finish()?))
}

/// The conjunction `x_1 ∧ … ∧ x_k` of the given labels.
pub fn bdd_and(config: &Config, labels: &[Label]) -> Result<Dd> {
    let literals: Vec<(Label, bool)> = labels.iter().map(|&l| (l, true)).collect();
    bdd_cube(config, &literals)
}

/// The disjunction `x_1 ∨ … ∨ x_k` of the given labels.
pub fn bdd_or(config: &Config, labels: &[Label]) -> Result<Dd> {
    if labels.is_empty() {
        return Dd::terminal(config, false);
    }
    chain(config, labels, [Ptr::FALSE, Ptr::TRUE], |below| (below, Ptr::TRUE))
}

/// The empty family `∅`.
pub fn zdd_empty(config: &Config) -> Result<Dd> {
    Dd::terminal(config, false)
}

/// The family `{∅}`.
pub fn zdd_null(config: &Config) -> Result<Dd> {
    Dd::terminal(config, true)
}

/// All subsets of `domain ∪ {label}` that contain `label`.
pub fn zdd_ithvar(config: &Config, label: Label, domain: &[Label]) -> Result<Dd> {
    check_label(label)?;
    check_labels(domain)?;
    let mut labels = domain.to_vec();
    if let Err(idx) = labels.binary_search(&label) {
        labels.insert(idx, label);
    }

    let mut nw = NodeWriter::new(config)?;
    let mut below = Ptr::TRUE;
    for &l in labels.iter().rev() {
        let n = if l == label {
            Node::with_label(l, MAX_ID, Ptr::FALSE, below)
        } else {
            Node::with_label(l, MAX_ID, below, below)
        };
        nw.push(n)?;
        below = n.uid;
    }
    Ok(Dd::new(nw.finish()?))
}

/// The family `{labels}` with a single set.
pub fn zdd_singleton(config: &Config, labels: &[Label]) -> Result<Dd> {
    if labels.is_empty() {
        return zdd_null(config);
    }
    chain(config, labels, [Ptr::FALSE, Ptr::TRUE], |below| (Ptr::FALSE, below))
}

/// All subsets of `labels`.
pub fn zdd_powerset(config: &Config, labels: &[Label]) -> Result<Dd> {
    if labels.is_empty() {
        return zdd_null(config);
    }
    chain(config, labels, [Ptr::TRUE, Ptr::TRUE], |below| (below, below))
}

/// All non-empty subsets of `labels`.
pub fn zdd_nonempty_subsets(config: &Config, labels: &[Label]) -> Result<Dd> {
    if labels.is_empty() {
        return zdd_empty(config);
    }
    check_labels(labels)?;

    let mut nw = NodeWriter::new(config)?;
    // Pointers to "all subsets" and "all non-empty subsets" of the labels below.
    let (mut all, mut nonempty) = (Ptr::TRUE, Ptr::FALSE);
    for (i, &l) in labels.iter().enumerate().rev() {
        let id = if i > 0 { MAX_ID - 1 } else { MAX_ID };
        let n = Node::with_label(l, id, nonempty, all);
        if i > 0 {
            let p = Node::with_label(l, MAX_ID, all, all);
            nw.push(p)?;
            all = p.uid;
        }
        nw.push(n)?;
        nonempty = n.uid;
    }
    Ok(Dd::new(nw.finish()?))
}
