use crate::arc::LevelInfo;
use crate::config::Config;
use crate::error::Result;
use crate::node::Node;
use crate::ptr::{Ptr, MAX_ID};

use super::{FileStats, LevelizedFile, NodeFile, RawWriter};

/// Writer of a node file.
///
/// Nodes must be pushed bottom-up: labels descending, and within a level uids descending. A
/// terminal node may only be pushed into an otherwise empty file. Level infos, terminal counts,
/// cut bounds, and the canonical flag are derived from the pushed nodes.
pub struct NodeWriter {
    nodes: RawWriter<Node>,
    levels: RawWriter<LevelInfo>,
    stats: FileStats,
    block_records: usize,

    latest: Option<Node>,
    level_size: u64,

    terminals_at_bottom: [u64; 2],
    max_short_internal: u64,
    curr_short_internal: u64,
    long_internal_ptr: Ptr,
    long_internal: u64,
}

impl NodeWriter {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            nodes: RawWriter::new(config)?,
            levels: RawWriter::new(config)?,
            stats: FileStats {
                canonical: true,
                ..FileStats::default()
            },
            block_records: config.block_records,
            latest: None,
            level_size: 0,
            terminals_at_bottom: [0, 0],
            max_short_internal: 0,
            curr_short_internal: 0,
            long_internal_ptr: Ptr::NIL,
            long_internal: 0,
        })
    }

    pub fn has_pushed(&self) -> bool {
        self.latest.is_some()
    }

    pub fn size(&self) -> u64 {
        self.nodes.len()
    }

    fn push_level(&mut self, info: LevelInfo) -> Result<()> {
        self.stats.width = self.stats.width.max(info.width);
        self.stats.include_label(info.label);
        self.levels.push(&info)
    }

    pub fn push(&mut self, n: Node) -> Result<()> {
        if let Some(latest) = self.latest {
            debug_assert!(!latest.is_terminal(), "Cannot push after having pushed a terminal");
            debug_assert!(!n.is_terminal(), "A terminal can only be pushed into an empty file");
            debug_assert!(n.uid < latest.uid, "Nodes must be pushed bottom-up");
        }

        if n.is_terminal() {
            self.stats.number_of_terminals[n.value() as usize] += 1;
            self.latest = Some(n);
            return self.nodes.push(&n);
        }

        let new_level = match self.latest {
            None => {
                self.stats.canonical &= n.id() == MAX_ID;
                false
            }
            Some(latest) => {
                let new_level = latest.label() != n.label();
                self.stats.canonical &= if new_level {
                    n.id() == MAX_ID
                } else {
                    n.id() + 1 == latest.id()
                        && (n.high < latest.high || (n.high == latest.high && n.low < latest.low))
                };
                new_level
            }
        };

        if let (true, Some(latest)) = (new_level, self.latest) {
            self.push_level(LevelInfo::new(latest.label(), self.level_size))?;
            self.level_size = 0;
            self.max_short_internal = self.max_short_internal.max(self.curr_short_internal);
            self.curr_short_internal = 0;
            self.long_internal_ptr = Ptr::node(latest.label(), MAX_ID);
        }

        // Until the first level change, all nodes sit at the bottom of the diagram.
        if self.long_internal_ptr.is_nil() {
            for child in n.children() {
                if child.is_terminal() {
                    self.terminals_at_bottom[child.value() as usize] += 1;
                }
            }
        }

        for child in n.children() {
            if child.is_node() {
                if child > self.long_internal_ptr {
                    self.long_internal += 1;
                } else {
                    self.curr_short_internal += 1;
                }
            } else {
                self.stats.number_of_terminals[child.value() as usize] += 1;
            }
        }

        self.latest = Some(n);
        self.level_size += 1;
        self.nodes.push(&n)
    }

    /// Finishes the file and hands it over as a shared, read-only handle.
    pub fn finish(mut self) -> Result<NodeFile> {
        debug_assert!(self.has_pushed(), "A node file must contain at least one node");

        if let Some(latest) = self.latest.filter(|n| !n.is_terminal()) {
            self.push_level(LevelInfo::new(latest.label(), self.level_size))?;
            self.max_short_internal = self.max_short_internal.max(self.curr_short_internal);
        }
        self.fixup_cuts();

        let stats = self.stats;
        let file = LevelizedFile::from_parts(
            vec![self.nodes.finish()?],
            self.levels.finish()?,
            stats,
            self.block_records,
        );
        Ok(std::sync::Arc::new(file))
    }

    fn fixup_cuts(&mut self) {
        let nodes = self.nodes.len();
        let [n_false, n_true] = self.stats.number_of_terminals;

        if n_false + n_true == 1 && self.levels.is_empty() {
            self.stats.max_1level_cut = 1;
            self.stats.max_2level_cut = 1;
            return;
        }

        let internal = self.max_short_internal + self.long_internal;
        let above_bottom = (n_false - self.terminals_at_bottom[0])
            + (n_true - self.terminals_at_bottom[1]);
        let cut = (internal + above_bottom).max(n_false + n_true);
        // The cut never exceeds all arcs, nor the number of nodes plus the root arc.
        let cut = cut.min(nodes + 1).min(2 * nodes).max(1);
        self.stats.max_1level_cut = cut;

        self.stats.max_2level_cut = if nodes == self.levels.len() {
            cut
        } else {
            ((3 * cut) / 2).min(2 * nodes).max(cut)
        };
    }
}
