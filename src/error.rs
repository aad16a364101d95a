//! Centralized error types for mboxsplit.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the mboxsplit library.
///
/// A message whose date cannot be determined is *not* an error at this
/// level; see [`DateError`].
#[derive(Error, Debug)]
pub enum SplitError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input MBOX file does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// The output directory does not exist and creating it is disabled.
    #[error("Output directory does not exist: {0}")]
    OutputDirMissing(PathBuf),

    /// The output path exists but is not a directory.
    #[error("Output path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Convenience alias for `Result<T, SplitError>`.
pub type Result<T> = std::result::Result<T, SplitError>;

impl SplitError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a message could not be given a dated destination.
///
/// Any of these routes the message to the broken mailbox.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// The header block has no `Date:` field (or it is empty).
    #[error("no Date header")]
    Missing,

    /// The `Date:` field is present but no known format matched.
    #[error("unparseable Date header: {0:?}")]
    Unparseable(String),
}
