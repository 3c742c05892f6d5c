//! Recoverable errors.
//!
//! Malformed inputs (children above their parent, writing after sharing, unsorted pushes) are
//! precondition violations and are caught by debug assertions instead. Everything here is a
//! condition a caller can legitimately run into at runtime.

use std::path::PathBuf;

use thiserror::Error;

use crate::ptr::Label;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{}' does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("'{}' already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("invalid header in '{}': {reason}", .path.display())]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("unsupported variable map: {0}")]
    UnsupportedMap(String),

    #[error("label {0} exceeds the maximum supported label")]
    LabelOutOfRange(u64),

    #[error("labels must be given in ascending order, got {prev} before {next}")]
    UnorderedLabels { prev: Label, next: Label },

    #[error("{varcount} variables cannot cover the {levels} levels of the diagram")]
    VarcountTooSmall { varcount: u64, levels: u64 },
}
