//! Levelized priority queue.
//!
//! A priority queue that releases its elements one level at a time. Elements of the *current*
//! level can be pulled; everything pushed belongs to a later level. The sweep calls
//! [`LevelizedPq::setup_next_level`] whenever the current level is exhausted.
//!
//! Two tiers exist:
//!
//! - **internal**: a single in-memory heap, used whenever the predicted peak size fits into memory;
//! - **external**: the next level of the [`LevelMerger`] gets a dedicated [`Sorter`] bucket, and
//!   everything else goes to a spilling overflow [`Pq`].

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::marker::PhantomData;

use log::debug;

use crate::config::{Config, MemoryMode};
use crate::error::Result;
use crate::file::{LevelInfoStream, NodeFile, SharedFile};
use crate::ptr::Label;
use crate::record::Record;
use crate::sorter::{Order, Pq, SortedStream, Sorter};

/// Order of the elements of a [`LevelizedPq`].
pub trait LevelOrder<T>: Order<T> {
    /// Whether levels are visited from the largest label to the smallest.
    const DESCENDING: bool;

    /// The level an element is released on.
    fn level(item: &T) -> Label;
}

fn cmp_levels(a: Label, b: Label, descending: bool) -> Ordering {
    if descending {
        b.cmp(&a)
    } else {
        a.cmp(&b)
    }
}

/// Whether level `a` comes strictly before level `b`.
fn before(a: Label, b: Label, descending: bool) -> bool {
    cmp_levels(a, b, descending) == Ordering::Less
}

/// Orders by level in sweep direction first, then by `O`.
struct ByLevel<O>(PhantomData<O>);

impl<T, O: LevelOrder<T>> Order<T> for ByLevel<O> {
    fn cmp(a: &T, b: &T) -> Ordering {
        cmp_levels(O::level(a), O::level(b), O::DESCENDING).then_with(|| O::cmp(a, b))
    }
}

enum LevelSource {
    Infos(LevelInfoStream),
    Labels(VecDeque<Label>),
}

impl LevelSource {
    fn head(&self) -> Option<Label> {
        match self {
            LevelSource::Infos(s) => s.can_pull().then(|| s.peek().label),
            LevelSource::Labels(ls) => ls.front().copied(),
        }
    }

    fn skip(&mut self) -> Result<()> {
        match self {
            LevelSource::Infos(s) => {
                s.pull()?;
            }
            LevelSource::Labels(ls) => {
                ls.pop_front();
            }
        }
        Ok(())
    }
}

/// Merges the levels of several files and label lists, without duplicates, in sweep order.
pub struct LevelMerger {
    descending: bool,
    sources: Vec<LevelSource>,
}

impl LevelMerger {
    pub fn new(descending: bool) -> Self {
        Self {
            descending,
            sources: Vec::new(),
        }
    }

    /// Adds the levels of a node file.
    pub fn add_nodes(mut self, file: &NodeFile) -> Result<Self> {
        // Node files store their levels bottom-up.
        let stream = file.level_infos(!self.descending)?;
        self.sources.push(LevelSource::Infos(stream));
        Ok(self)
    }

    /// Adds the levels of a file whose level infos were written in ascending order.
    pub fn add_ascending<T: crate::file::Levelized>(mut self, file: &SharedFile<T>) -> Result<Self> {
        let stream = file.level_infos(self.descending)?;
        self.sources.push(LevelSource::Infos(stream));
        Ok(self)
    }

    /// Adds an arbitrary list of labels.
    pub fn add_labels(mut self, labels: impl IntoIterator<Item = Label>) -> Self {
        let mut labels: Vec<Label> = labels.into_iter().collect();
        labels.sort_by(|a, b| cmp_levels(*a, *b, self.descending));
        labels.dedup();
        self.sources.push(LevelSource::Labels(labels.into()));
        self
    }

    /// The next level, if any.
    pub fn peek(&self) -> Option<Label> {
        self.sources
            .iter()
            .filter_map(|s| s.head())
            .min_by(|a, b| cmp_levels(*a, *b, self.descending))
    }

    pub fn can_pull(&self) -> bool {
        self.peek().is_some()
    }

    /// Returns the next level and advances every source past it.
    pub fn pull(&mut self) -> Result<Option<Label>> {
        let Some(next) = self.peek() else {
            return Ok(None);
        };
        for source in &mut self.sources {
            if source.head() == Some(next) {
                source.skip()?;
            }
        }
        Ok(Some(next))
    }

    /// Drops all levels up to and including `level`.
    fn skip_through(&mut self, level: Label) -> Result<()> {
        while let Some(next) = self.peek() {
            if before(level, next, self.descending) {
                break;
            }
            self.pull()?;
        }
        Ok(())
    }
}

struct External<T, O> {
    config: Config,
    bucket_memory: usize,
    /// The lookahead bucket: the first merger level after the current one.
    bucket: Option<(Label, Sorter<T, O>)>,
    current: SortedStream<T, O>,
    overflow: Pq<T, ByLevel<O>>,
}

enum Tier<T, O> {
    Internal(Pq<T, ByLevel<O>>),
    External(Box<External<T, O>>),
}

/// A priority queue that releases its elements level by level.
pub struct LevelizedPq<T, O> {
    levels: LevelMerger,
    tier: Tier<T, O>,
    current: Option<Label>,
    size: usize,
}

impl<T: Record, O: LevelOrder<T>> LevelizedPq<T, O> {
    /// Creates a queue over the levels of `levels`.
    ///
    /// `max_size` is an upper bound on the number of elements that will be in the queue at once.
    /// It only steers the choice of tier.
    pub fn new(config: &Config, levels: LevelMerger, memory_bytes: usize, max_size: u64) -> Result<Self> {
        debug_assert_eq!(levels.descending, O::DESCENDING);
        let needed = max_size.saturating_mul(std::mem::size_of::<T>() as u64);
        let internal = match config.memory_mode {
            MemoryMode::Internal => true,
            MemoryMode::External => false,
            MemoryMode::Auto => needed <= memory_bytes as u64,
        };
        debug!(
            "levelized pq: {} tier (predicted {} elements, {} of {} bytes)",
            if internal { "internal" } else { "external" },
            max_size,
            needed,
            memory_bytes
        );

        let mut pq = Self {
            levels,
            tier: Tier::Internal(Pq::new(config, usize::MAX)),
            current: None,
            size: 0,
        };
        if !internal {
            let bucket_memory = memory_bytes / 2;
            let mut external = External {
                config: config.clone(),
                bucket_memory,
                bucket: None,
                current: SortedStream::empty(),
                overflow: Pq::new(config, memory_bytes - bucket_memory),
            };
            if let Some(label) = pq.levels.pull()? {
                external.bucket = Some((label, Sorter::new(config, bucket_memory)));
            }
            pq.tier = Tier::External(Box::new(external));
        }
        Ok(pq)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        let level = O::level(&item);
        debug_assert!(
            self.current.map_or(true, |c| before(c, level, O::DESCENDING)),
            "Elements must be pushed to a level after the current one"
        );
        self.size += 1;
        match &mut self.tier {
            Tier::Internal(heap) => heap.push(item),
            Tier::External(ext) => match &mut ext.bucket {
                Some((label, sorter)) if *label == level => sorter.push(item),
                _ => ext.overflow.push(item),
            },
        }
    }

    /// Whether levels remain after the current one.
    pub fn has_next_level(&self) -> bool {
        let bucketed = match &self.tier {
            Tier::Internal(_) => false,
            Tier::External(ext) => ext.bucket.is_some(),
        };
        bucketed || self.levels.can_pull()
    }

    pub fn has_current_level(&self) -> bool {
        self.current.is_some()
    }

    /// # Panics
    ///
    /// Panics if no level has been set up yet.
    pub fn current_level(&self) -> Label {
        self.current.expect("no level has been set up")
    }

    /// The earliest level that holds elements.
    fn next_nonempty_level(&self) -> Option<Label> {
        match &self.tier {
            Tier::Internal(heap) => (!heap.is_empty()).then(|| O::level(heap.top())),
            Tier::External(ext) => {
                let bucket = ext
                    .bucket
                    .as_ref()
                    .filter(|(_, s)| !s.is_empty())
                    .map(|(l, _)| *l);
                let overflow = (!ext.overflow.is_empty()).then(|| O::level(ext.overflow.top()));
                match (bucket, overflow) {
                    (Some(a), Some(b)) => Some(if before(b, a, O::DESCENDING) { b } else { a }),
                    (a, b) => a.or(b),
                }
            }
        }
    }

    /// Moves on to the earliest level that has elements, or to `stop` if that comes first.
    ///
    /// The current level must have been emptied.
    pub fn setup_next_level(&mut self, stop: Option<Label>) -> Result<()> {
        debug_assert!(self.empty_level(), "The current level has not been emptied");

        let next = match (self.next_nonempty_level(), stop) {
            (Some(a), Some(s)) => Some(if before(s, a, O::DESCENDING) { s } else { a }),
            (a, s) => a.or(s),
        };
        self.current = next;
        let Some(next) = next else {
            return Ok(());
        };
        self.levels.skip_through(next)?;

        if let Tier::External(ext) = &mut self.tier {
            match ext.bucket.take() {
                Some((label, sorter)) if label == next => {
                    ext.current = sorter.sort()?;
                }
                Some((label, sorter)) if before(next, label, O::DESCENDING) => {
                    ext.current = SortedStream::empty();
                    ext.bucket = Some((label, sorter));
                }
                _ => {
                    ext.current = SortedStream::empty();
                }
            }
            if ext.bucket.is_none() {
                if let Some(label) = self.levels.pull()? {
                    ext.bucket = Some((label, Sorter::new(&ext.config, ext.bucket_memory)));
                }
            }
        }
        Ok(())
    }

    /// Whether the current level has elements left.
    pub fn can_pull(&self) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        match &self.tier {
            Tier::Internal(heap) => !heap.is_empty() && O::level(heap.top()) == current,
            Tier::External(ext) => {
                ext.current.can_pull()
                    || (!ext.overflow.is_empty() && O::level(ext.overflow.top()) == current)
            }
        }
    }

    pub fn empty_level(&self) -> bool {
        !self.can_pull()
    }

    /// Whether the next element comes from the overflow rather than the bucket stream.
    fn from_overflow(ext: &External<T, O>, current: Label) -> bool {
        let overflow = (!ext.overflow.is_empty())
            .then(|| ext.overflow.top())
            .filter(|t| O::level(t) == current);
        match (ext.current.head(), overflow) {
            (Some(a), Some(b)) => O::cmp(b, a) == Ordering::Less,
            (None, Some(_)) => true,
            _ => false,
        }
    }

    /// The smallest element of the current level.
    ///
    /// # Panics
    ///
    /// Panics if the current level is empty.
    pub fn top(&self) -> &T {
        debug_assert!(self.can_pull());
        match &self.tier {
            Tier::Internal(heap) => heap.top(),
            Tier::External(ext) => {
                if Self::from_overflow(ext, self.current_level()) {
                    ext.overflow.top()
                } else {
                    ext.current.head().expect("current level is non-empty")
                }
            }
        }
    }

    /// Removes and returns the smallest element of the current level.
    pub fn pull(&mut self) -> Result<T> {
        debug_assert!(self.can_pull());
        let current = self.current_level();
        let item = match &mut self.tier {
            Tier::Internal(heap) => heap.pull()?,
            Tier::External(ext) => {
                if Self::from_overflow(ext, current) {
                    ext.overflow.pull()?
                } else {
                    ext.current.pull()?
                }
            }
        };
        self.size -= 1;
        Ok(item)
    }

    pub fn pop(&mut self) -> Result<()> {
        self.pull().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    /// Items are `level << 16 | payload`.
    struct Asc;

    impl Order<u64> for Asc {
        fn cmp(a: &u64, b: &u64) -> Ordering {
            a.cmp(b)
        }
    }

    impl LevelOrder<u64> for Asc {
        const DESCENDING: bool = false;

        fn level(item: &u64) -> Label {
            (item >> 16) as Label
        }
    }

    struct Desc;

    impl Order<u64> for Desc {
        fn cmp(a: &u64, b: &u64) -> Ordering {
            b.cmp(a)
        }
    }

    impl LevelOrder<u64> for Desc {
        const DESCENDING: bool = true;

        fn level(item: &u64) -> Label {
            (item >> 16) as Label
        }
    }

    fn item(level: u64, payload: u64) -> u64 {
        level << 16 | payload
    }

    fn configs() -> Vec<Config> {
        vec![
            Config::default().with_memory_mode(MemoryMode::Internal),
            Config::default()
                .with_memory_mode(MemoryMode::External)
                .with_block_records(2),
        ]
    }

    /// Drains the queue level by level.
    fn drain<O: LevelOrder<u64>>(pq: &mut LevelizedPq<u64, O>) -> Vec<(Label, Vec<u64>)> {
        let mut res = vec![];
        while !pq.is_empty() {
            pq.setup_next_level(None).unwrap();
            let mut group = vec![];
            while pq.can_pull() {
                group.push(pq.pull().unwrap());
            }
            res.push((pq.current_level(), group));
        }
        res
    }

    #[test]
    fn test_groups_by_level() {
        for config in configs() {
            let levels = LevelMerger::new(false).add_labels([3, 5, 7]);
            let mut pq = LevelizedPq::<u64, Asc>::new(&config, levels, 0, 6).unwrap();
            for (i, l) in [3, 3, 5, 5, 5, 7].into_iter().enumerate() {
                pq.push(item(l, 10 - i as u64)).unwrap();
            }
            assert_eq!(pq.size(), 6);
            assert!(!pq.has_current_level());

            let groups = drain(&mut pq);
            let sizes: Vec<(Label, usize)> = groups.iter().map(|(l, g)| (*l, g.len())).collect();
            assert_eq!(sizes, vec![(3, 2), (5, 3), (7, 1)]);
            // Within a level, elements come out in order.
            assert_eq!(groups[1].1, vec![item(5, 6), item(5, 7), item(5, 8)]);
        }
    }

    #[test]
    fn test_push_while_sweeping() {
        for config in configs() {
            let levels = LevelMerger::new(false).add_labels([0, 1, 2, 4]).add_labels([2, 3]);
            let mut pq = LevelizedPq::<u64, Asc>::new(&config, levels, 0, 100).unwrap();
            pq.push(item(0, 0)).unwrap();
            let mut seen = vec![];
            while !pq.is_empty() {
                pq.setup_next_level(None).unwrap();
                while pq.can_pull() {
                    let x = pq.pull().unwrap();
                    seen.push(x);
                    let level = Asc::level(&x) as u64;
                    // Fan out to the next two levels.
                    if level < 4 {
                        pq.push(item(level + 1, x & 0xff)).unwrap();
                    }
                    if level < 3 {
                        pq.push(item(level + 2, (x & 0xff) + 1)).unwrap();
                    }
                }
            }
            let mut sorted = seen.clone();
            sorted.sort();
            assert_eq!(seen, sorted);
            assert_eq!(seen.len(), 1 + 1 + 2 + 3 + 5);
        }
    }

    #[test]
    fn test_descending_with_stop() {
        for config in configs() {
            let levels = LevelMerger::new(true).add_labels([1, 4, 6]);
            let mut pq = LevelizedPq::<u64, Desc>::new(&config, levels, 0, 10).unwrap();
            pq.push(item(4, 1)).unwrap();
            pq.push(item(4, 9)).unwrap();
            pq.push(item(1, 0)).unwrap();

            // The stop level comes first in descending order.
            pq.setup_next_level(Some(6)).unwrap();
            assert_eq!(pq.current_level(), 6);
            assert!(pq.empty_level());

            pq.setup_next_level(Some(2)).unwrap();
            assert_eq!(pq.current_level(), 4);
            assert_eq!(*pq.top(), item(4, 9));
            pq.pop().unwrap();
            assert_eq!(pq.pull().unwrap(), item(4, 1));

            pq.setup_next_level(Some(2)).unwrap();
            assert_eq!(pq.current_level(), 2);
            assert!(!pq.can_pull());

            pq.setup_next_level(None).unwrap();
            assert_eq!(pq.current_level(), 1);
            assert_eq!(pq.pull().unwrap(), item(1, 0));
            assert!(pq.is_empty());
            assert!(!pq.has_next_level());
        }
    }

    #[test]
    fn test_external_matches_internal() {
        let labels: Vec<Label> = (0..20).collect();
        let mut results = vec![];
        for config in configs() {
            let levels = LevelMerger::new(false).add_labels(labels.clone());
            let mut pq = LevelizedPq::<u64, Asc>::new(&config, levels, 0, 1000).unwrap();
            for i in 0..500u64 {
                pq.push(item((i * 7) % 20, (i * 13) % 97)).unwrap();
            }
            results.push(drain(&mut pq));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[0].len(), 20);
    }

    #[test]
    fn test_level_merger_dedups() {
        let mut merger = LevelMerger::new(false)
            .add_labels([5, 1, 3])
            .add_labels([3, 4]);
        let mut res = vec![];
        while let Some(l) = merger.pull().unwrap() {
            res.push(l);
        }
        assert_eq!(res, vec![1, 3, 4, 5]);
    }
}
