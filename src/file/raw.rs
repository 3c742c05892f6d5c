//! Flat arrays of [`Record`]s on disk.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::Record;

#[derive(Debug)]
enum Backing {
    /// Deleted when dropped.
    Temp(TempPath),
    /// Left in place when dropped.
    Pinned(PathBuf),
}

/// A finished, immutable array of records.
#[derive(Debug)]
pub struct RawFile<T> {
    backing: Backing,
    len: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RawFile<T> {
    /// Opens an existing file that must not be deleted on drop.
    pub(crate) fn open_pinned(path: PathBuf) -> Result<Self> {
        let bytes = std::fs::metadata(&path)?.len();
        if bytes % T::SIZE as u64 != 0 {
            return Err(Error::InvalidHeader {
                path,
                reason: format!("{} bytes is not a multiple of the {}-byte record size", bytes, T::SIZE),
            });
        }
        Ok(Self {
            backing: Backing::Pinned(path),
            len: bytes / T::SIZE as u64,
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        match &self.backing {
            Backing::Temp(path) => &**path,
            Backing::Pinned(path) => path.as_path(),
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self.backing, Backing::Pinned(_))
    }

    /// Opens a reader starting at the front (or at the back when `reverse`).
    pub fn reader(&self, block_records: usize, reverse: bool) -> Result<RawReader<T>> {
        RawReader::new(self, block_records, reverse)
    }
}

/// Append-only writer of a temporary [`RawFile`].
pub struct RawWriter<T> {
    out: BufWriter<File>,
    path: TempPath,
    len: u64,
    buf: Vec<u8>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Record> RawWriter<T> {
    pub fn new(config: &Config) -> Result<Self> {
        let (file, path) = config.temp_file()?.into_parts();
        Ok(Self {
            out: BufWriter::with_capacity(config.block_records * T::SIZE, file),
            path,
            len: 0,
            buf: vec![0u8; T::SIZE],
            _marker: PhantomData,
        })
    }

    pub fn push(&mut self, value: &T) -> Result<()> {
        value.write_le(&mut self.buf);
        self.out.write_all(&self.buf)?;
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(mut self) -> Result<RawFile<T>> {
        self.out.flush()?;
        Ok(RawFile {
            backing: Backing::Temp(self.path),
            len: self.len,
            _marker: PhantomData,
        })
    }
}

/// Buffered sequential reader over a [`RawFile`], forward or reverse, with one element lookahead.
pub struct RawReader<T> {
    file: File,
    reverse: bool,
    block_records: usize,
    /// Unread index range `[lo, hi)` still on disk.
    lo: u64,
    hi: u64,
    /// Current block in consumption order.
    block: Vec<T>,
    cursor: usize,
    bytes: Vec<u8>,
    head: Option<T>,
}

impl<T: Record> RawReader<T> {
    fn new(raw: &RawFile<T>, block_records: usize, reverse: bool) -> Result<Self> {
        let mut reader = Self {
            file: File::open(raw.path())?,
            reverse,
            block_records: block_records.max(1),
            lo: 0,
            hi: raw.len,
            block: Vec::new(),
            cursor: 0,
            bytes: Vec::new(),
            head: None,
        };
        reader.advance()?;
        Ok(reader)
    }

    fn load_block(&mut self) -> Result<()> {
        let count = (self.hi - self.lo).min(self.block_records as u64);
        let start = if self.reverse {
            self.hi - count
        } else {
            self.lo
        };
        self.bytes.resize(count as usize * T::SIZE, 0);
        self.file.seek(SeekFrom::Start(start * T::SIZE as u64))?;
        self.file.read_exact(&mut self.bytes)?;

        self.block.clear();
        self.block
            .extend(self.bytes.chunks_exact(T::SIZE).map(T::read_le));
        if self.reverse {
            self.block.reverse();
            self.hi -= count;
        } else {
            self.lo += count;
        }
        self.cursor = 0;
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        if self.cursor == self.block.len() {
            if self.lo == self.hi {
                self.head = None;
                return Ok(());
            }
            self.load_block()?;
        }
        self.head = Some(self.block[self.cursor]);
        self.cursor += 1;
        Ok(())
    }

    pub fn can_pull(&self) -> bool {
        self.head.is_some()
    }

    /// The next element, without consuming it.
    ///
    /// # Panics
    ///
    /// Panics if the reader is exhausted.
    pub fn peek(&self) -> &T {
        self.head.as_ref().expect("peek() on an exhausted stream")
    }

    pub fn head(&self) -> Option<&T> {
        self.head.as_ref()
    }

    /// Consumes and returns the next element.
    ///
    /// # Panics
    ///
    /// Panics if the reader is exhausted.
    pub fn pull(&mut self) -> Result<T> {
        let value = self.head.take().expect("pull() on an exhausted stream");
        self.advance()?;
        Ok(value)
    }
}
