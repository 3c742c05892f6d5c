//! External-memory sorting and priority queues.
//!
//! Both structures keep up to a memory budget worth of elements in memory. Beyond that, they spill
//! sorted runs to temporary files and k-way merge the runs with a `BinaryHeap<Reverse<_>>`.
//!
//! Orderings are static: an [`Order`] is a zero-sized type implementing a comparison, so the heap
//! and merge code is monomorphized per comparator.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::marker::PhantomData;

use log::debug;

use crate::config::Config;
use crate::error::Result;
use crate::file::{RawFile, RawReader, RawWriter};
use crate::record::Record;

/// A total order on `T`.
pub trait Order<T> {
    fn cmp(a: &T, b: &T) -> Ordering;
}

/// Number of elements of type `T` that fit into `bytes` of memory (at least a small constant).
pub fn memory_fits<T>(bytes: usize) -> usize {
    (bytes / std::mem::size_of::<T>().max(1)).max(16)
}

/// Heap entry ordered by `O`, ties broken by the originating run.
struct Entry<T, O> {
    value: T,
    run: usize,
    _order: PhantomData<O>,
}

impl<T, O: Order<T>> Entry<T, O> {
    fn new(value: T, run: usize) -> Self {
        Self {
            value,
            run,
            _order: PhantomData,
        }
    }
}

impl<T, O: Order<T>> PartialEq for Entry<T, O> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, O: Order<T>> Eq for Entry<T, O> {}

impl<T, O: Order<T>> PartialOrd for Entry<T, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, O: Order<T>> Ord for Entry<T, O> {
    fn cmp(&self, other: &Self) -> Ordering {
        O::cmp(&self.value, &other.value).then_with(|| self.run.cmp(&other.run))
    }
}

/// Runs of the same generation are merged into one once this many of them exist.
const FAN_IN: usize = 8;

fn write_run<T: Record>(config: &Config, values: &[T]) -> Result<RawFile<T>> {
    let mut writer = RawWriter::new(config)?;
    for v in values {
        writer.push(v)?;
    }
    writer.finish()
}

/// Merges the remainder of each reader into a single run.
fn merge_runs<T: Record, O: Order<T>>(config: &Config, mut readers: Vec<RawReader<T>>) -> Result<RawFile<T>> {
    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (run, reader) in readers.iter_mut().enumerate() {
        if reader.can_pull() {
            heap.push(Reverse(Entry::<T, O>::new(reader.pull()?, run)));
        }
    }
    let mut writer = RawWriter::new(config)?;
    while let Some(Reverse(entry)) = heap.pop() {
        let reader = &mut readers[entry.run];
        if reader.can_pull() {
            heap.push(Reverse(Entry::new(reader.pull()?, entry.run)));
        }
        writer.push(&entry.value)?;
    }
    writer.finish()
}

/// A generation with at least [`FAN_IN`] runs, if any.
fn full_generation(generations: impl Iterator<Item = u32>) -> Option<u32> {
    let mut counts: Vec<usize> = Vec::new();
    for g in generations {
        let g = g as usize;
        if counts.len() <= g {
            counts.resize(g + 1, 0);
        }
        counts[g] += 1;
    }
    counts.iter().position(|&c| c >= FAN_IN).map(|g| g as u32)
}

/// Sorts an unbounded number of elements with bounded memory.
pub struct Sorter<T, O> {
    config: Config,
    buffer: Vec<T>,
    capacity: usize,
    runs: Vec<(RawFile<T>, u32)>,
    len: usize,
    _order: PhantomData<O>,
}

impl<T: Record, O: Order<T>> Sorter<T, O> {
    /// Creates a sorter that keeps at most `memory_bytes` worth of elements in memory.
    pub fn new(config: &Config, memory_bytes: usize) -> Self {
        Self {
            config: config.clone(),
            buffer: Vec::new(),
            capacity: memory_fits::<T>(memory_bytes),
            runs: Vec::new(),
            len: 0,
            _order: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.buffer.len() >= self.capacity {
            self.spill()?;
        }
        self.buffer.push(value);
        self.len += 1;
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        self.buffer.sort_by(O::cmp);
        debug!(
            "sorter: spilling run #{} of {} elements",
            self.runs.len(),
            self.buffer.len()
        );
        self.runs.push((write_run(&self.config, &self.buffer)?, 0));
        self.buffer.clear();
        self.compact()
    }

    /// Merges full generations until every generation holds fewer than [`FAN_IN`] runs.
    fn compact(&mut self) -> Result<()> {
        while let Some(generation) = full_generation(self.runs.iter().map(|(_, g)| *g)) {
            let (merged, kept): (Vec<_>, Vec<_>) =
                std::mem::take(&mut self.runs).into_iter().partition(|(_, g)| *g == generation);
            self.runs = kept;
            debug!("sorter: merging {} runs of generation {}", merged.len(), generation);
            let readers = merged
                .iter()
                .map(|(file, _)| file.reader(self.config.block_records, false))
                .collect::<Result<Vec<_>>>()?;
            let file = merge_runs::<T, O>(&self.config, readers)?;
            self.runs.push((file, generation + 1));
        }
        Ok(())
    }

    /// Finishes the pushing phase and returns the elements in order.
    pub fn sort(mut self) -> Result<SortedStream<T, O>> {
        if self.runs.is_empty() {
            self.buffer.sort_by(O::cmp);
            return SortedStream::start(Source::Memory(self.buffer.into_iter()));
        }

        if !self.buffer.is_empty() {
            self.spill()?;
        }
        let mut readers = Vec::with_capacity(self.runs.len());
        let mut heap = BinaryHeap::with_capacity(self.runs.len());
        for (run, (file, _)) in self.runs.iter().enumerate() {
            let mut reader = file.reader(self.config.block_records, false)?;
            if reader.can_pull() {
                heap.push(Reverse(Entry::new(reader.pull()?, run)));
            }
            readers.push(reader);
        }
        SortedStream::start(Source::Merge {
            _runs: self.runs,
            readers,
            heap,
        })
    }
}

enum Source<T, O> {
    Memory(std::vec::IntoIter<T>),
    Merge {
        _runs: Vec<(RawFile<T>, u32)>,
        readers: Vec<RawReader<T>>,
        heap: BinaryHeap<Reverse<Entry<T, O>>>,
    },
}

/// The sorted output of a [`Sorter`].
pub struct SortedStream<T, O> {
    head: Option<T>,
    source: Source<T, O>,
}

impl<T: Record, O: Order<T>> SortedStream<T, O> {
    fn start(source: Source<T, O>) -> Result<Self> {
        let mut stream = Self { head: None, source };
        stream.advance()?;
        Ok(stream)
    }

    /// An empty stream.
    pub fn empty() -> Self {
        Self {
            head: None,
            source: Source::Memory(Vec::new().into_iter()),
        }
    }

    fn advance(&mut self) -> Result<()> {
        self.head = match &mut self.source {
            Source::Memory(it) => it.next(),
            Source::Merge { readers, heap, .. } => match heap.pop() {
                None => None,
                Some(Reverse(entry)) => {
                    let reader = &mut readers[entry.run];
                    if reader.can_pull() {
                        heap.push(Reverse(Entry::new(reader.pull()?, entry.run)));
                    }
                    Some(entry.value)
                }
            },
        };
        Ok(())
    }

    pub fn can_pull(&self) -> bool {
        self.head.is_some()
    }

    pub fn head(&self) -> Option<&T> {
        self.head.as_ref()
    }

    /// Consumes and returns the next element.
    ///
    /// # Panics
    ///
    /// Panics if the stream is exhausted.
    pub fn pull(&mut self) -> Result<T> {
        let value = self.head.take().expect("pull() on an exhausted sorted stream");
        self.advance()?;
        Ok(value)
    }
}

/// An external-memory min-priority queue (with respect to `O`).
///
/// Elements are kept in an in-memory heap until it exceeds its capacity, at which point the heap
/// is written out as a sorted run. The minimum is the smallest among the heap top and all run
/// heads. Exhausted runs are dropped, and runs are merged by generation as in [`Sorter`], so the
/// number of open runs stays logarithmic in the number of spills.
pub struct Pq<T, O> {
    config: Config,
    heap: BinaryHeap<Reverse<Entry<T, O>>>,
    capacity: usize,
    runs: Vec<Run<T>>,
    len: usize,
}

struct Run<T> {
    file: RawFile<T>,
    reader: RawReader<T>,
    generation: u32,
}

impl<T: Record, O: Order<T>> Pq<T, O> {
    pub fn new(config: &Config, memory_bytes: usize) -> Self {
        Self {
            config: config.clone(),
            heap: BinaryHeap::new(),
            capacity: memory_fits::<Entry<T, O>>(memory_bytes),
            runs: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.heap.len() >= self.capacity {
            self.spill()?;
        }
        self.heap.push(Reverse(Entry::new(value, 0)));
        self.len += 1;
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        let mut values: Vec<T> = std::mem::take(&mut self.heap)
            .into_iter()
            .map(|Reverse(e)| e.value)
            .collect();
        values.sort_by(O::cmp);
        debug!("pq: spilling run #{} of {} elements", self.runs.len(), values.len());
        let file = write_run(&self.config, &values)?;
        self.add_run(file, 0)?;
        self.compact()
    }

    fn add_run(&mut self, file: RawFile<T>, generation: u32) -> Result<()> {
        let reader = file.reader(self.config.block_records, false)?;
        if reader.can_pull() {
            self.runs.push(Run {
                file,
                reader,
                generation,
            });
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        while let Some(generation) = full_generation(self.runs.iter().map(|r| r.generation)) {
            let (merged, kept): (Vec<_>, Vec<_>) =
                std::mem::take(&mut self.runs).into_iter().partition(|r| r.generation == generation);
            self.runs = kept;
            debug!("pq: merging {} runs of generation {}", merged.len(), generation);
            let mut files = Vec::with_capacity(merged.len());
            let mut readers = Vec::with_capacity(merged.len());
            for run in merged {
                files.push(run.file);
                readers.push(run.reader);
            }
            let file = merge_runs::<T, O>(&self.config, readers)?;
            drop(files);
            self.add_run(file, generation + 1)?;
        }
        Ok(())
    }

    /// Where the minimum is: `None` for the heap, `Some(i)` for run `i`.
    fn min_source(&self) -> Option<Option<usize>> {
        let mut best: Option<(&T, Option<usize>)> = self.heap.peek().map(|Reverse(e)| (&e.value, None));
        for (i, run) in self.runs.iter().enumerate() {
            if let Some(v) = run.reader.head() {
                let better = match best {
                    None => true,
                    Some((b, _)) => O::cmp(v, b) == Ordering::Less,
                };
                if better {
                    best = Some((v, Some(i)));
                }
            }
        }
        best.map(|(_, src)| src)
    }

    /// The minimum element.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty.
    pub fn top(&self) -> &T {
        match self.min_source().expect("top() on an empty priority queue") {
            None => &self.heap.peek().expect("heap is non-empty").0.value,
            Some(i) => self.runs[i].reader.peek(),
        }
    }

    /// Removes and returns the minimum element.
    pub fn pull(&mut self) -> Result<T> {
        let value = match self.min_source().expect("pull() on an empty priority queue") {
            None => self.heap.pop().expect("heap is non-empty").0.value,
            Some(i) => {
                let value = self.runs[i].reader.pull()?;
                if !self.runs[i].reader.can_pull() {
                    self.runs.swap_remove(i);
                }
                value
            }
        };
        self.len -= 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    struct Ascending;

    impl Order<u64> for Ascending {
        fn cmp(a: &u64, b: &u64) -> Ordering {
            a.cmp(b)
        }
    }

    struct Descending;

    impl Order<u64> for Descending {
        fn cmp(a: &u64, b: &u64) -> Ordering {
            b.cmp(a)
        }
    }

    fn scrambled(n: u64) -> Vec<u64> {
        (0..n).map(|i| (i * 7919) % n).collect()
    }

    #[test]
    fn test_sort_in_memory() {
        let config = Config::default();
        let mut sorter = Sorter::<u64, Ascending>::new(&config, 1 << 20);
        for v in scrambled(100) {
            sorter.push(v).unwrap();
        }
        assert_eq!(sorter.len(), 100);
        let mut sorted = sorter.sort().unwrap();
        for expected in 0..100 {
            assert_eq!(sorted.pull().unwrap(), expected);
        }
        assert!(!sorted.can_pull());
    }

    #[test]
    fn test_sort_with_spills() {
        let config = Config::default().with_block_records(5);
        // Room for 16 elements only, so 1000 elements spill many runs.
        let mut sorter = Sorter::<u64, Descending>::new(&config, 0);
        for v in scrambled(1000) {
            sorter.push(v).unwrap();
        }
        let mut sorted = sorter.sort().unwrap();
        let mut res = vec![];
        while sorted.can_pull() {
            res.push(sorted.pull().unwrap());
        }
        let expected: Vec<u64> = (0..1000).rev().collect();
        assert_eq!(res, expected);
    }

    #[test]
    fn test_pq_interleaved_with_spills() {
        let config = Config::default().with_block_records(3);
        let mut pq = Pq::<u64, Ascending>::new(&config, 0);
        for v in scrambled(200) {
            pq.push(v * 2).unwrap();
        }
        assert_eq!(pq.len(), 200);
        for expected in 0..100 {
            assert_eq!(*pq.top(), expected * 2);
            assert_eq!(pq.pull().unwrap(), expected * 2);
        }
        // Push odd values in between remaining even values.
        for v in 100..200 {
            pq.push(v * 2 + 1).unwrap();
        }
        let mut res = vec![];
        while !pq.is_empty() {
            res.push(pq.pull().unwrap());
        }
        let expected: Vec<u64> = (200..400).collect();
        assert_eq!(res, expected);
    }

    #[test]
    fn test_pq_keeps_few_runs() {
        let config = Config::default().with_block_records(4);
        let mut pq = Pq::<u64, Descending>::new(&config, 0);
        // 16 elements per run, so this spills a few hundred runs.
        for v in scrambled(5000) {
            pq.push(v).unwrap();
            assert!(pq.runs.len() < 3 * FAN_IN);
        }
        assert!(pq.runs.iter().any(|r| r.generation >= 2));

        let mut expected = 5000;
        while !pq.is_empty() {
            expected -= 1;
            assert_eq!(pq.pull().unwrap(), expected);
        }
        assert_eq!(expected, 0);
        assert!(pq.runs.is_empty());
    }

    #[test]
    fn test_sorter_merges_generations() {
        let config = Config::default().with_block_records(4);
        let mut sorter = Sorter::<u64, Ascending>::new(&config, 0);
        for v in scrambled(3000) {
            sorter.push(v).unwrap();
            assert!(sorter.runs.len() < 3 * FAN_IN);
        }
        let mut sorted = sorter.sort().unwrap();
        for expected in 0..3000 {
            assert_eq!(sorted.pull().unwrap(), expected);
        }
        assert!(!sorted.can_pull());
    }
}
