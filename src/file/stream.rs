use crate::arc::{Arc, LevelInfo};
use crate::error::Result;
use crate::node::Node;
use crate::ptr::Ptr;

use super::{
    LevelizedFile, NodeFile, RawFile, RawReader, SharedFile, INTERNAL_ARCS,
    TERMINAL_ARCS_IN_ORDER, TERMINAL_ARCS_OUT_OF_ORDER,
};

/// Reads the nodes of a node file.
///
/// By default the nodes are read top-down, i.e. in ascending uid order. The stream keeps its file
/// alive and optionally negates all terminal values on the fly.
pub struct NodeStream {
    _file: NodeFile,
    reader: RawReader<Node>,
    negate: bool,
}

impl NodeStream {
    /// Top-down stream over `file`.
    pub fn new(file: &NodeFile, negate: bool) -> Result<Self> {
        Self::with_direction(file, negate, true)
    }

    /// Bottom-up stream over `file`, i.e. in the order the nodes were written.
    pub fn bottom_up(file: &NodeFile, negate: bool) -> Result<Self> {
        Self::with_direction(file, negate, false)
    }

    fn with_direction(file: &NodeFile, negate: bool, reverse: bool) -> Result<Self> {
        Ok(Self {
            _file: file.clone(),
            reader: file.element_reader(0, reverse)?,
            negate,
        })
    }

    pub fn can_pull(&self) -> bool {
        self.reader.can_pull()
    }

    pub fn peek(&self) -> Node {
        self.reader.peek().negate_if(self.negate)
    }

    pub fn pull(&mut self) -> Result<Node> {
        Ok(self.reader.pull()?.negate_if(self.negate))
    }

    /// Skips forward to the first node whose uid is at least `target`, and returns it without
    /// consuming it.
    ///
    /// `target` must not be smaller than a previously sought uid and must be present further on
    /// in the stream.
    pub fn seek(&mut self, target: Ptr) -> Result<Node> {
        let target = target.unflag();
        while self.reader.peek().uid < target {
            self.reader.pull()?;
        }
        Ok(self.peek())
    }
}

/// Reads the level infos of a levelized file.
pub struct LevelInfoStream {
    reader: RawReader<LevelInfo>,
}

impl LevelInfoStream {
    pub(crate) fn new(
        levels: &RawFile<LevelInfo>,
        block_records: usize,
        reverse: bool,
    ) -> Result<Self> {
        Ok(Self {
            reader: levels.reader(block_records, reverse)?,
        })
    }

    pub fn can_pull(&self) -> bool {
        self.reader.can_pull()
    }

    pub fn peek(&self) -> LevelInfo {
        *self.reader.peek()
    }

    pub fn pull(&mut self) -> Result<LevelInfo> {
        self.reader.pull()
    }
}

/// Reads an arc file bottom-up, as needed by Reduce.
///
/// Internal arcs come out with descending targets. Terminal arcs come out with descending
/// sources, merged from the in-order and the (sorted) out-of-order streams.
pub struct ArcStream {
    _file: SharedFile<Arc>,
    internal: RawReader<Arc>,
    in_order: RawReader<Arc>,
    out_of_order: RawReader<Arc>,
    unread_terminals: [u64; 2],
}

impl ArcStream {
    pub fn new(file: &SharedFile<Arc>) -> Result<Self> {
        Ok(Self {
            _file: file.clone(),
            internal: file.element_reader(INTERNAL_ARCS, true)?,
            in_order: file.element_reader(TERMINAL_ARCS_IN_ORDER, true)?,
            out_of_order: file.element_reader(TERMINAL_ARCS_OUT_OF_ORDER, true)?,
            unread_terminals: [file.number_of_terminals(false), file.number_of_terminals(true)],
        })
    }

    pub fn can_pull_internal(&self) -> bool {
        self.internal.can_pull()
    }

    pub fn peek_internal(&self) -> Arc {
        *self.internal.peek()
    }

    pub fn pull_internal(&mut self) -> Result<Arc> {
        self.internal.pull()
    }

    pub fn can_pull_terminal(&self) -> bool {
        self.in_order.can_pull() || self.out_of_order.can_pull()
    }

    fn take_in_order(&self) -> bool {
        match (self.in_order.head(), self.out_of_order.head()) {
            (Some(a), Some(b)) => a.source > b.source,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn peek_terminal(&self) -> Arc {
        if self.take_in_order() {
            *self.in_order.peek()
        } else {
            *self.out_of_order.peek()
        }
    }

    pub fn pull_terminal(&mut self) -> Result<Arc> {
        let arc = if self.take_in_order() {
            self.in_order.pull()?
        } else {
            self.out_of_order.pull()?
        };
        self.unread_terminals[arc.target.value() as usize] -= 1;
        Ok(arc)
    }

    /// Number of terminal arcs to `value` not yet pulled.
    pub fn unread_terminals(&self, value: bool) -> u64 {
        self.unread_terminals[value as usize]
    }
}

impl LevelizedFile<Arc> {
    /// Streams the arcs bottom-up.
    pub fn arcs(self: &std::sync::Arc<Self>) -> Result<ArcStream> {
        ArcStream::new(self)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::Config;
    use crate::file::{ArcWriter, NodeWriter};
    use crate::ptr::MAX_ID;

    #[test]
    fn test_node_stream_directions_and_seek() {
        let config = Config::default().with_block_records(2);
        let mut nw = NodeWriter::new(&config).unwrap();
        let n3 = Node::with_label(3, MAX_ID, Ptr::FALSE, Ptr::TRUE);
        let n2b = Node::with_label(2, MAX_ID, n3.uid, Ptr::TRUE);
        let n2a = Node::with_label(2, MAX_ID - 1, Ptr::FALSE, n3.uid);
        let n1 = Node::with_label(1, MAX_ID, n2a.uid, n2b.uid);
        for n in [n3, n2b, n2a, n1] {
            nw.push(n).unwrap();
        }
        let f = nw.finish().unwrap();

        let mut ns = NodeStream::new(&f, false).unwrap();
        assert_eq!(ns.pull().unwrap(), n1);
        assert_eq!(ns.seek(n2b.uid).unwrap(), n2b);
        assert_eq!(ns.seek(n2b.uid.flag()).unwrap(), n2b);
        assert_eq!(ns.seek(n3.uid).unwrap(), n3);

        let mut ns = NodeStream::bottom_up(&f, true).unwrap();
        let first = ns.pull().unwrap();
        assert_eq!(first.uid, n3.uid);
        assert_eq!(first.low, Ptr::TRUE);
        assert_eq!(first.high, Ptr::FALSE);
    }

    #[test]
    fn test_terminal_arcs_merge_descending() {
        let config = Config::default();
        let mut aw = ArcWriter::new(&config).unwrap();
        let sources = [
            Ptr::node(1, 0),
            Ptr::node(2, 0),
            Ptr::node(0, 0).flag(),
            Ptr::node(2, 1).flag(),
            Ptr::node(1, 0).flag(),
        ];
        for s in sources {
            aw.push_terminal(Arc::new(s, Ptr::TRUE)).unwrap();
        }
        aw.push_level(LevelInfo::new(0, 1)).unwrap();
        let f = aw.finish().unwrap();

        let mut arcs = f.arcs().unwrap();
        let mut pulled = vec![];
        while arcs.can_pull_terminal() {
            pulled.push(arcs.pull_terminal().unwrap().source);
        }
        let mut expected = sources.to_vec();
        expected.sort();
        expected.reverse();
        assert_eq!(pulled, expected);
        assert_eq!(arcs.unread_terminals(true), 0);
    }
}
