//! The entry point for all operations.

use std::fmt::Debug;

use crate::config::Config;
use crate::dd::{Dd, Unreduced};
use crate::error::Result;
use crate::file::{NodeStream, NodeWriter};
use crate::policy::DdPolicy;

/// Runs operations on decision diagrams under one [`Config`].
///
/// Unlike an in-memory BDD package, the manager holds no node table: every diagram is an
/// immutable file, and every operation streams its inputs into a fresh file. The manager only
/// carries the configuration (memory budget, temporary directory, queue tiers) into each of them.
///
/// The BDD operations live in [`bdd`][crate::bdd], the ZDD operations in [`zdd`][crate::zdd].
#[derive(Clone, Default)]
pub struct Manager {
    config: Config,
}

impl Manager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reduces the outcome of a sweep.
    pub(crate) fn reduce<P: DdPolicy>(&self, res: Unreduced) -> Result<Dd> {
        res.reduce::<P>(&self.config)
    }

    /// A copy of `dd` whose file stores the negation, so that the handle carries no negation flag.
    pub(crate) fn materialize(&self, dd: &Dd) -> Result<Dd> {
        if !dd.is_negated() {
            return Ok(dd.clone());
        }
        let mut ns = NodeStream::bottom_up(dd.file(), true)?;
        let mut nw = NodeWriter::new(&self.config)?;
        while ns.can_pull() {
            nw.push(ns.pull()?)?;
        }
        Ok(Dd::new(nw.finish()?))
    }
}

impl Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("memory_limit", &self.config.memory_limit)
            .field("memory_mode", &self.config.memory_mode)
            .field("temp_dir", &self.config.temp_dir)
            .finish()
    }
}
