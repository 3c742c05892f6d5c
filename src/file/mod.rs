//! Levelized files.
//!
//! A levelized file bundles one or more element streams with a stream of [`LevelInfo`]s and some
//! aggregate metadata ([`FileStats`]). It has exactly two states:
//!
//! | State            | Type                     | Access                     |
//! |------------------|--------------------------|----------------------------|
//! | being written    | [`NodeWriter`] / [`ArcWriter`] | append-only, single owner |
//! | finished         | [`SharedFile<T>`]        | read-only, shared          |
//!
//! Calling `finish()` consumes the writer, so a finished file can never be written to again.
//! Temporary element files are deleted when the last [`SharedFile`] handle is dropped, unless the
//! file was reopened from a persisted path prefix.
//!
//! ## On-disk layout of a persisted file
//!
//! ```text
//! <prefix>.file_0 .. <prefix>.file_{k-1}   element streams (fixed-size records)
//! <prefix>.levels                          level-info stream
//! <prefix>.meta                            64 byte metadata header
//! ```
//!
//! Node files are written bottom-up (highest label first, ids descending within a level), so a
//! *reverse* read visits the nodes top-down in ascending uid order. Arc files are written during a
//! top-down sweep, so a reverse read of their level infos visits the levels bottom-up.

mod arc_writer;
mod node_writer;
mod raw;
mod stream;

use std::path::{Path, PathBuf};

use log::debug;

pub use arc_writer::ArcWriter;
pub use node_writer::NodeWriter;
pub use raw::{RawFile, RawReader, RawWriter};
pub use stream::{ArcStream, LevelInfoStream, NodeStream};

use crate::arc::{Arc, LevelInfo};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::ptr::Label;
use crate::record::{read_u32, read_u64, write_u32, write_u64, Record};

/// Element types that can be stored in a levelized file.
pub trait Levelized: Record {
    /// Number of element streams.
    const STREAMS: usize;
}

impl Levelized for Node {
    const STREAMS: usize = 1;
}

/// Internal arcs, in-order terminal arcs, and out-of-order terminal arcs.
impl Levelized for Arc {
    const STREAMS: usize = 3;
}

pub(crate) const INTERNAL_ARCS: usize = 0;
pub(crate) const TERMINAL_ARCS_IN_ORDER: usize = 1;
pub(crate) const TERMINAL_ARCS_OUT_OF_ORDER: usize = 2;

/// Aggregate metadata maintained by the writers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats {
    /// Number of arcs to `false` and `true`, respectively.
    pub number_of_terminals: [u64; 2],
    /// Upper bound on the number of arcs crossing any single level boundary.
    pub max_1level_cut: u64,
    /// Upper bound on the number of arcs crossing any two consecutive level boundaries.
    pub max_2level_cut: u64,
    /// Maximum width of a level.
    pub width: u64,
    /// Smallest and largest label present.
    pub label_range: Option<(Label, Label)>,
    /// Whether the file is a canonical, reduced diagram.
    pub canonical: bool,
}

impl FileStats {
    pub(crate) fn include_label(&mut self, label: Label) {
        self.label_range = match self.label_range {
            None => Some((label, label)),
            Some((lo, hi)) => Some((lo.min(label), hi.max(label))),
        };
    }
}

/// Shared, read-only handle to a finished levelized file.
pub type SharedFile<T> = std::sync::Arc<LevelizedFile<T>>;
pub type NodeFile = SharedFile<Node>;
pub type ArcFile = SharedFile<Arc>;

#[derive(Debug)]
pub struct LevelizedFile<T> {
    elements: Vec<RawFile<T>>,
    levels: RawFile<LevelInfo>,
    stats: FileStats,
    block_records: usize,
}

const META_MAGIC: [u8; 4] = *b"XDD1";
const META_VERSION: u8 = 1;
const META_LEN: usize = 64;

fn element_path(prefix: &Path, idx: usize) -> PathBuf {
    suffixed(prefix, &format!("file_{}", idx))
}

fn levels_path(prefix: &Path) -> PathBuf {
    suffixed(prefix, "levels")
}

fn meta_path(prefix: &Path) -> PathBuf {
    suffixed(prefix, "meta")
}

fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

impl<T: Levelized> LevelizedFile<T> {
    pub(crate) fn from_parts(
        elements: Vec<RawFile<T>>,
        levels: RawFile<LevelInfo>,
        stats: FileStats,
        block_records: usize,
    ) -> Self {
        debug_assert_eq!(elements.len(), T::STREAMS);
        Self {
            elements,
            levels,
            stats,
            block_records,
        }
    }

    /// Number of elements in stream `idx`.
    pub fn size_of(&self, idx: usize) -> u64 {
        self.elements[idx].len()
    }

    /// Total number of elements over all streams.
    pub fn size(&self) -> u64 {
        self.elements.iter().map(|f| f.len()).sum()
    }

    /// Number of levels.
    pub fn levels(&self) -> u64 {
        self.levels.len()
    }

    pub fn stats(&self) -> &FileStats {
        &self.stats
    }

    pub fn max_1level_cut(&self) -> u64 {
        self.stats.max_1level_cut
    }

    pub fn max_2level_cut(&self) -> u64 {
        self.stats.max_2level_cut
    }

    pub fn width(&self) -> u64 {
        self.stats.width
    }

    pub fn number_of_terminals(&self, value: bool) -> u64 {
        self.stats.number_of_terminals[value as usize]
    }

    pub fn is_canonical(&self) -> bool {
        self.stats.canonical
    }

    /// Smallest label of the diagram, if it has any levels.
    pub fn min_label(&self) -> Option<Label> {
        self.stats.label_range.map(|(lo, _)| lo)
    }

    /// Largest label of the diagram, if it has any levels.
    pub fn max_label(&self) -> Option<Label> {
        self.stats.label_range.map(|(_, hi)| hi)
    }

    pub(crate) fn block_records(&self) -> usize {
        self.block_records
    }

    pub(crate) fn element_reader(&self, idx: usize, reverse: bool) -> Result<RawReader<T>> {
        self.elements[idx].reader(self.block_records, reverse)
    }

    /// Reads the level infos in physical order (or reversed).
    pub fn level_infos(&self, reverse: bool) -> Result<LevelInfoStream> {
        LevelInfoStream::new(&self.levels, self.block_records, reverse)
    }

    /// All paths backing this file, element streams first.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut res: Vec<PathBuf> = self.elements.iter().map(|f| f.path().to_path_buf()).collect();
        res.push(self.levels.path().to_path_buf());
        res
    }

    /// Whether this handle was opened from persisted paths (and will not delete them).
    pub fn is_persistent(&self) -> bool {
        self.levels.is_pinned()
    }

    /// Copies this file to the canonical paths under `prefix`, so it can be reopened later with
    /// [`LevelizedFile::open`].
    pub fn persist(&self, prefix: impl AsRef<Path>) -> Result<()> {
        let prefix = prefix.as_ref();
        let mut targets: Vec<PathBuf> = (0..T::STREAMS).map(|i| element_path(prefix, i)).collect();
        targets.push(levels_path(prefix));
        targets.push(meta_path(prefix));
        if let Some(existing) = targets.iter().find(|p| p.exists()) {
            return Err(Error::AlreadyExists(existing.clone()));
        }

        if let Err(e) = self.write_targets(&targets) {
            for target in &targets {
                let _ = std::fs::remove_file(target);
            }
            return Err(e);
        }
        debug!("persisted levelized file to '{}'", prefix.display());
        Ok(())
    }

    /// Writes the element streams, the levels, and the header to `targets`, in that order.
    fn write_targets(&self, targets: &[PathBuf]) -> Result<()> {
        let sources = self
            .elements
            .iter()
            .map(|raw| raw.path())
            .chain(std::iter::once(self.levels.path()));
        for (source, target) in sources.zip(targets) {
            std::fs::copy(source, target)?;
        }
        std::fs::write(&targets[T::STREAMS + 1], self.encode_meta())?;
        Ok(())
    }

    /// Reopens a file persisted under `prefix`.
    pub fn open(prefix: impl AsRef<Path>, config: &Config) -> Result<SharedFile<T>> {
        let prefix = prefix.as_ref();
        let mut elements = Vec::with_capacity(T::STREAMS);
        for idx in 0..T::STREAMS {
            let path = element_path(prefix, idx);
            if !path.exists() {
                return Err(Error::MissingFile(path));
            }
            elements.push(RawFile::open_pinned(path)?);
        }
        let path = levels_path(prefix);
        if !path.exists() {
            return Err(Error::MissingFile(path));
        }
        let levels = RawFile::open_pinned(path)?;

        let path = meta_path(prefix);
        if !path.exists() {
            return Err(Error::MissingFile(path));
        }
        let bytes = std::fs::read(&path)?;
        let stats = Self::decode_meta(&path, &bytes)?;

        Ok(std::sync::Arc::new(Self::from_parts(
            elements,
            levels,
            stats,
            config.block_records,
        )))
    }

    fn encode_meta(&self) -> [u8; META_LEN] {
        let mut buf = [0u8; META_LEN];
        buf[0..4].copy_from_slice(&META_MAGIC);
        buf[4] = META_VERSION;
        buf[5] = T::STREAMS as u8;
        buf[6] = self.stats.canonical as u8;
        buf[7] = self.stats.label_range.is_some() as u8;
        write_u64(&mut buf, 8, self.stats.number_of_terminals[0]);
        write_u64(&mut buf, 16, self.stats.number_of_terminals[1]);
        write_u64(&mut buf, 24, self.stats.max_1level_cut);
        write_u64(&mut buf, 32, self.stats.max_2level_cut);
        write_u64(&mut buf, 40, self.stats.width);
        let (lo, hi) = self.stats.label_range.unwrap_or((0, 0));
        write_u32(&mut buf, 48, lo);
        write_u32(&mut buf, 52, hi);
        buf
    }

    fn decode_meta(path: &Path, buf: &[u8]) -> Result<FileStats> {
        let invalid = |reason: String| Error::InvalidHeader {
            path: path.to_path_buf(),
            reason,
        };
        if buf.len() < META_LEN {
            return Err(invalid(format!("too small: {} < {}", buf.len(), META_LEN)));
        }
        if buf[0..4] != META_MAGIC {
            return Err(invalid("invalid magic bytes".to_string()));
        }
        if buf[4] != META_VERSION {
            return Err(invalid(format!("unsupported version {}", buf[4])));
        }
        if buf[5] as usize != T::STREAMS {
            return Err(invalid(format!(
                "expected {} element streams, found {}",
                T::STREAMS,
                buf[5]
            )));
        }
        Ok(FileStats {
            number_of_terminals: [read_u64(buf, 8), read_u64(buf, 16)],
            max_1level_cut: read_u64(buf, 24),
            max_2level_cut: read_u64(buf, 32),
            width: read_u64(buf, 40),
            label_range: (buf[7] != 0).then(|| (read_u32(buf, 48), read_u32(buf, 52))),
            canonical: buf[6] != 0,
        })
    }
}

impl LevelizedFile<Node> {
    /// Whether the diagram is a single terminal.
    pub fn is_terminal(&self) -> bool {
        self.levels() == 0
    }

    /// Value of a terminal diagram.
    pub fn value(&self) -> bool {
        debug_assert!(self.is_terminal());
        self.number_of_terminals(true) > 0
    }

    /// Whether the diagram is the `false` terminal.
    pub fn is_false(&self) -> bool {
        self.is_terminal() && !self.value()
    }

    /// Whether the diagram is the `true` terminal.
    pub fn is_true(&self) -> bool {
        self.is_terminal() && self.value()
    }

    /// Number of internal nodes (zero for a terminal diagram).
    pub fn nodecount(&self) -> u64 {
        if self.is_terminal() {
            0
        } else {
            self.size()
        }
    }

    /// Number of distinct variables (levels) the diagram depends on.
    pub fn varcount(&self) -> u64 {
        self.levels()
    }

    /// Streams the nodes top-down, in ascending uid order.
    pub fn nodes(self: &std::sync::Arc<Self>, negate: bool) -> Result<NodeStream> {
        NodeStream::new(self, negate)
    }

    /// Labels of all levels, ascending.
    pub fn labels(&self) -> Result<Vec<Label>> {
        let mut res = Vec::with_capacity(self.levels() as usize);
        let mut ls = self.level_infos(true)?;
        while ls.can_pull() {
            res.push(ls.pull()?.label);
        }
        Ok(res)
    }
}

impl LevelizedFile<Arc> {
    /// Number of node-to-node arcs.
    pub fn internal_arcs(&self) -> u64 {
        self.size_of(INTERNAL_ARCS)
    }

    /// Number of node-to-terminal arcs.
    pub fn terminal_arcs(&self) -> u64 {
        self.size_of(TERMINAL_ARCS_IN_ORDER) + self.size_of(TERMINAL_ARCS_OUT_OF_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ptr::{Ptr, MAX_ID};

    fn small_file(config: &Config) -> NodeFile {
        let mut nw = NodeWriter::new(config).unwrap();
        let n2 = Node::with_label(2, MAX_ID, Ptr::FALSE, Ptr::TRUE);
        let n1 = Node::with_label(1, MAX_ID, n2.uid, Ptr::TRUE);
        nw.push(n2).unwrap();
        nw.push(n1).unwrap();
        nw.finish().unwrap()
    }

    #[test]
    fn test_accessors() {
        let config = Config::default();
        let f = small_file(&config);
        assert!(!f.is_terminal());
        assert_eq!(f.size(), 2);
        assert_eq!(f.levels(), 2);
        assert_eq!(f.min_label(), Some(1));
        assert_eq!(f.max_label(), Some(2));
        assert_eq!(f.number_of_terminals(false), 1);
        assert_eq!(f.number_of_terminals(true), 2);
        assert!(f.is_canonical());
        assert_eq!(f.labels().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("f");
        let config = Config::default();
        let f = small_file(&config);
        f.persist(&prefix).unwrap();

        let g = LevelizedFile::<Node>::open(&prefix, &config).unwrap();
        assert!(g.is_persistent());
        assert_eq!(g.stats(), f.stats());
        assert_eq!(g.size(), 2);

        let mut ns = g.nodes(false).unwrap();
        assert_eq!(ns.pull().unwrap().uid, Ptr::node(1, MAX_ID));
        assert_eq!(ns.pull().unwrap().uid, Ptr::node(2, MAX_ID));
        assert!(!ns.can_pull());

        // Pinned paths survive dropping the handle.
        let paths = g.paths();
        drop(g);
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_persist_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("f");
        let config = Config::default();
        let f = small_file(&config);
        f.persist(&prefix).unwrap();
        assert!(matches!(f.persist(&prefix), Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_failed_persist_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("f");
        let config = Config::default();
        let f = small_file(&config);

        // Without its levels, the copy fails after the element stream has landed.
        let levels = f.paths().pop().unwrap();
        std::fs::remove_file(levels).unwrap();
        assert!(matches!(f.persist(&prefix), Err(Error::Io(_))));
        assert!(!element_path(&prefix, 0).exists());
        assert!(!meta_path(&prefix).exists());
    }

    #[test]
    fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let res = LevelizedFile::<Node>::open(dir.path().join("nope"), &config);
        assert!(matches!(res, Err(Error::MissingFile(_))));
    }

    #[test]
    fn test_open_wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("f");
        let config = Config::default();
        small_file(&config).persist(&prefix).unwrap();
        // A node file only has one element stream.
        let res = LevelizedFile::<Arc>::open(&prefix, &config);
        assert!(matches!(res, Err(Error::MissingFile(_))));
    }

    #[test]
    fn test_temp_paths_removed_on_last_drop() {
        let config = Config::default();
        let f = small_file(&config);
        let g = f.clone();
        let paths = f.paths();
        drop(f);
        assert!(paths.iter().all(|p| p.exists()));
        drop(g);
        assert!(paths.iter().all(|p| !p.exists()));
    }
}
