use std::cmp::Ordering;

use log::trace;

use crate::arc::{Arc, LevelInfo};
use crate::config::Config;
use crate::error::Result;
use crate::ptr::Ptr;
use crate::sorter::{Order, Sorter};

use super::{
    ArcFile, FileStats, LevelizedFile, RawFile, RawWriter, INTERNAL_ARCS,
    TERMINAL_ARCS_IN_ORDER, TERMINAL_ARCS_OUT_OF_ORDER,
};

/// Orders arcs by their source.
pub(crate) struct BySource;

impl Order<Arc> for BySource {
    fn cmp(a: &Arc, b: &Arc) -> Ordering {
        a.source.cmp(&b.source)
    }
}

/// Writer of an unreduced arc file.
///
/// Internal arcs must be pushed with ascending targets. Terminal arcs may be pushed in any order:
/// those whose source is larger than every previously pushed terminal source go to the in-order
/// stream, all others to the out-of-order stream. [`ArcWriter::finish`] sorts the latter by source,
/// so that both terminal streams can be merged when read.
pub struct ArcWriter {
    config: Config,
    streams: Vec<RawWriter<Arc>>,
    levels: RawWriter<LevelInfo>,
    stats: FileStats,
    latest_internal_target: Ptr,
    latest_terminal_source: Option<Ptr>,
}

impl ArcWriter {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            streams: vec![
                RawWriter::new(config)?,
                RawWriter::new(config)?,
                RawWriter::new(config)?,
            ],
            levels: RawWriter::new(config)?,
            stats: FileStats::default(),
            latest_internal_target: Ptr::node(0, 0),
            latest_terminal_source: None,
        })
    }

    /// Pushes a node-to-node arc.
    pub fn push_internal(&mut self, arc: Arc) -> Result<()> {
        debug_assert!(arc.source.is_node() && arc.target.is_node());
        debug_assert!(
            arc.source.label() < arc.target.label(),
            "Arc {:?} must point downwards",
            arc
        );
        debug_assert!(
            self.latest_internal_target <= arc.target,
            "Internal arcs must be pushed with ascending targets"
        );
        self.latest_internal_target = arc.target;
        self.streams[INTERNAL_ARCS].push(&arc)
    }

    /// Pushes a node-to-terminal arc.
    pub fn push_terminal(&mut self, arc: Arc) -> Result<()> {
        debug_assert!(arc.source.is_node() && arc.target.is_terminal());
        self.stats.number_of_terminals[arc.target.value() as usize] += 1;

        let in_order = self
            .latest_terminal_source
            .map_or(true, |latest| latest < arc.source);
        if in_order {
            self.latest_terminal_source = Some(arc.source);
            self.streams[TERMINAL_ARCS_IN_ORDER].push(&arc)
        } else {
            self.streams[TERMINAL_ARCS_OUT_OF_ORDER].push(&arc)
        }
    }

    /// Pushes an arc to whichever stream it belongs.
    pub fn push(&mut self, arc: Arc) -> Result<()> {
        if arc.target.is_terminal() {
            self.push_terminal(arc)
        } else {
            self.push_internal(arc)
        }
    }

    /// Pushes the summary of a level. Levels must be pushed in the order they are swept.
    pub fn push_level(&mut self, info: LevelInfo) -> Result<()> {
        debug_assert!(info.width > 0);
        self.stats.width = self.stats.width.max(info.width);
        self.stats.include_label(info.label);
        self.levels.push(&info)
    }

    pub fn set_max_1level_cut(&mut self, cut: u64) {
        self.stats.max_1level_cut = cut;
    }

    /// Number of arcs pushed so far.
    pub fn size(&self) -> u64 {
        self.streams.iter().map(|s| s.len()).sum()
    }

    pub fn number_of_terminals(&self, value: bool) -> u64 {
        self.stats.number_of_terminals[value as usize]
    }

    /// Sorts the out-of-order terminal arcs and hands the file over as a shared, read-only handle.
    pub fn finish(mut self) -> Result<ArcFile> {
        let out_of_order = self
            .streams
            .pop()
            .expect("arc writer has three streams")
            .finish()?;
        let out_of_order = self.sort_terminals(out_of_order)?;

        let mut elements = Vec::with_capacity(3);
        for stream in self.streams {
            elements.push(stream.finish()?);
        }
        elements.push(out_of_order);
        debug_assert_eq!(elements.len(), 3);
        debug_assert_eq!(elements.len() - 1, TERMINAL_ARCS_OUT_OF_ORDER);

        // The queue of a sweep never holds more than every arc, so bound the cut by that.
        let arcs: u64 = elements.iter().map(|f| f.len()).sum();
        if self.stats.max_1level_cut == 0 || self.stats.max_1level_cut > arcs {
            self.stats.max_1level_cut = arcs;
        }
        self.stats.max_2level_cut = self.stats.max_1level_cut;

        Ok(std::sync::Arc::new(LevelizedFile::from_parts(
            elements,
            self.levels.finish()?,
            self.stats,
            self.config.block_records,
        )))
    }

    fn sort_terminals(&self, unsorted: RawFile<Arc>) -> Result<RawFile<Arc>> {
        if unsorted.len() < 2 {
            return Ok(unsorted);
        }
        trace!("sorting {} out-of-order terminal arcs", unsorted.len());

        let mut sorter = Sorter::<Arc, BySource>::new(&self.config, self.config.memory_available());
        let mut reader = unsorted.reader(self.config.block_records, false)?;
        while reader.can_pull() {
            sorter.push(reader.pull()?)?;
        }
        let mut sorted = sorter.sort()?;
        let mut writer = RawWriter::new(&self.config)?;
        while sorted.can_pull() {
            writer.push(&sorted.pull()?)?;
        }
        writer.finish()
    }
}
