//! Relabelling of variables.

use log::debug;

use crate::config::Config;
use crate::dd::Dd;
use crate::error::{Error, Result};
use crate::file::{NodeStream, NodeWriter};
use crate::node::Node;
use crate::ptr::{Label, Ptr, MAX_LABEL};

fn map_ptr(p: Ptr, map: &impl Fn(Label) -> Label) -> Ptr {
    if p.is_node() {
        Ptr::node(map(p.label()), p.id())
    } else {
        p
    }
}

/// Renames every label `l` of `dd` to `map(l)`.
///
/// The map must be strictly increasing on the labels of `dd`, so the relabelled nodes stay in
/// order and a single pass over the file suffices.
pub fn replace(config: &Config, dd: &Dd, map: impl Fn(Label) -> Label) -> Result<Dd> {
    let labels = dd.labels()?;
    let mapped: Vec<Label> = labels.iter().map(|&l| map(l)).collect();

    if let Some(&l) = mapped.iter().find(|&&l| l > MAX_LABEL) {
        return Err(Error::LabelOutOfRange(l as u64));
    }
    if let Some(i) = (1..mapped.len()).find(|&i| mapped[i - 1] >= mapped[i]) {
        return Err(Error::UnsupportedMap(format!(
            "x{} -> x{} and x{} -> x{} are not in ascending order",
            labels[i - 1],
            mapped[i - 1],
            labels[i],
            mapped[i]
        )));
    }
    if labels == mapped {
        return Ok(dd.clone());
    }
    debug!("replace: {} nodes on {} levels", dd.nodecount(), labels.len());

    let mut ns = NodeStream::bottom_up(&dd.file, dd.negate)?;
    let mut nw = NodeWriter::new(config)?;
    while ns.can_pull() {
        let n = ns.pull()?;
        nw.push(Node::new(
            map_ptr(n.uid, &map),
            map_ptr(n.low, &map),
            map_ptr(n.high, &map),
        ))?;
    }
    Ok(Dd::new(nw.finish()?))
}
