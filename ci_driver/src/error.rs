use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised by the dispatch core.
///
/// Configuration and validation failures are fatal to the run and are
/// reported once before exit.  MalformedListEntry is deferred: it is
/// attached to the affected sample when the dispatcher skips it, and the
/// remaining samples still run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not read {path}: {source}")]
    MissingFile { path: PathBuf, source: io::Error },
    #[error("Missing anchor or outDirectory in configuration")]
    MissingAnchorOrOutDir,
    #[error("Missing db (required when references is set)")]
    MissingDb,
    #[error("Missing reference or db for single sample analysis")]
    MissingReferenceOrDb,
    #[error("{file}:{line} Malformed sample list entry (expected <path> and <name>)")]
    MalformedListEntry { file: PathBuf, line: usize },
}
