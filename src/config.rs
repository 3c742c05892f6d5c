//! Execution configuration and the memory collaborator.

use std::path::PathBuf;

use log::debug;
use tempfile::NamedTempFile;

/// Which priority-queue tier an algorithm may use.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum MemoryMode {
    /// Pick the tier from the predicted queue size and the memory budget.
    #[default]
    Auto,
    /// Always use the in-memory tier.
    Internal,
    /// Always use the bucketed, spilling tier.
    External,
}

/// Returns the number of bytes the operating system currently reports as available.
pub fn available_memory() -> usize {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let mem = sys.available_memory();
    usize::try_from(mem).unwrap_or(usize::MAX)
}

/// Configuration shared by every operation of a [`Manager`][crate::manager::Manager].
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound (in bytes) on auxiliary memory. `None` asks the operating system.
    pub memory_limit: Option<usize>,
    pub memory_mode: MemoryMode,
    /// Directory for temporary files. `None` uses [`std::env::temp_dir`].
    pub temp_dir: Option<PathBuf>,
    /// Share of Reduce's budget given to its priority queue; the rest goes to its sorters.
    pub reduce_pq_share: f64,
    /// Number of records buffered by each file stream.
    pub block_records: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_limit: None,
            memory_mode: MemoryMode::Auto,
            temp_dir: None,
            reduce_pq_share: 0.5,
            block_records: 4096,
        }
    }
}

impl Config {
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_memory_mode(mut self, mode: MemoryMode) -> Self {
        self.memory_mode = mode;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_reduce_pq_share(mut self, share: f64) -> Self {
        assert!(
            share > 0.0 && share < 1.0,
            "Reduce priority queue share must be in (0, 1)"
        );
        self.reduce_pq_share = share;
        self
    }

    pub fn with_block_records(mut self, records: usize) -> Self {
        assert!(records > 0, "Streams need room for at least one record");
        self.block_records = records;
        self
    }

    /// The memory budget (in bytes) for a single algorithm invocation.
    pub fn memory_available(&self) -> usize {
        match self.memory_limit {
            Some(limit) => limit,
            None => {
                let mem = available_memory();
                debug!("memory_available() = {} bytes (from OS)", mem);
                mem
            }
        }
    }

    pub(crate) fn temp_file(&self) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("extdd-");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}
