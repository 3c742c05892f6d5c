//! Diagram handles shared by the BDD and ZDD front ends.

use log::trace;

use crate::arc::LevelInfo;
use crate::config::Config;
use crate::error::Result;
use crate::file::{ArcFile, NodeFile, NodeStream, NodeWriter};
use crate::node::Node;
use crate::policy::DdPolicy;
use crate::ptr::{Label, Ptr};
use crate::reduce::reduce;

/// A reduced diagram: a node file, read with all terminals optionally negated.
#[derive(Clone)]
pub struct Dd {
    pub(crate) file: NodeFile,
    pub(crate) negate: bool,
}

impl Dd {
    pub(crate) fn new(file: NodeFile) -> Self {
        Self { file, negate: false }
    }

    pub(crate) fn with_negation(file: NodeFile, negate: bool) -> Self {
        Self { file, negate }
    }

    /// The diagram for a constant.
    pub(crate) fn terminal(config: &Config, value: bool) -> Result<Self> {
        let mut nw = NodeWriter::new(config)?;
        nw.push(Node::terminal(value))?;
        Ok(Self::new(nw.finish()?))
    }

    pub fn file(&self) -> &NodeFile {
        &self.file
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn is_terminal(&self) -> bool {
        self.file.is_terminal()
    }

    /// Value of a constant diagram, negation included.
    pub fn value(&self) -> bool {
        self.file.value() ^ self.negate
    }

    pub fn is_false(&self) -> bool {
        self.is_terminal() && !self.value()
    }

    pub fn is_true(&self) -> bool {
        self.is_terminal() && self.value()
    }

    /// Streams the (possibly negated) nodes top-down.
    pub fn nodes(&self) -> Result<NodeStream> {
        self.file.nodes(self.negate)
    }

    /// Pointer to the root, negation included.
    pub fn root(&self) -> Result<Ptr> {
        Ok(self.nodes()?.peek().uid)
    }

    pub fn nodecount(&self) -> u64 {
        self.file.nodecount()
    }

    pub fn varcount(&self) -> u64 {
        self.file.varcount()
    }

    /// Labels of all levels, ascending.
    pub fn labels(&self) -> Result<Vec<Label>> {
        self.file.labels()
    }

    /// Level infos, top-down.
    pub fn levels(&self) -> Result<Vec<LevelInfo>> {
        let mut res = Vec::with_capacity(self.file.levels() as usize);
        let mut ls = self.file.level_infos(true)?;
        while ls.can_pull() {
            res.push(ls.pull()?);
        }
        Ok(res)
    }

    /// Whether both handles refer to the same file with the same negation.
    pub fn same_as(&self, other: &Dd) -> bool {
        std::sync::Arc::ptr_eq(&self.file, &other.file) && self.negate == other.negate
    }
}

impl std::fmt::Debug for Dd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dd")
            .field("nodes", &self.file.nodecount())
            .field("levels", &self.file.levels())
            .field("negate", &self.negate)
            .finish()
    }
}

/// The outcome of a sweep: either a finished diagram (e.g. when the operation was resolved
/// without a sweep) or an arc file that still needs to be reduced.
pub enum Unreduced {
    Reduced(Dd),
    Arcs(ArcFile),
}

impl Unreduced {
    /// Reduces the arcs (if any) into a canonical diagram according to the policy `P`.
    pub fn reduce<P: DdPolicy>(self, config: &Config) -> Result<Dd> {
        match self {
            Unreduced::Reduced(dd) => Ok(dd),
            Unreduced::Arcs(arcs) => {
                trace!("reducing {} arcs", arcs.size());
                Ok(Dd::new(reduce::<P>(config, &arcs)?))
            }
        }
    }
}

impl From<Dd> for Unreduced {
    fn from(dd: Dd) -> Self {
        Unreduced::Reduced(dd)
    }
}
