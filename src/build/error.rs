//! Errors raised while building a bundle.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::discovery::DiscoveryError;

/// A build failure.
///
/// Errors are `Clone` so the first failure can be recorded by the engine
/// while the task that raised it still returns it.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// A relative `require` inside a local branch matched no file
    #[error("could not resolve \"{target}\" from \"{branch}\"'s file \"{file}\"")]
    Resolution { target: String, branch: String, file: String },
    /// A source file could not be read
    #[error("failed to read \"{branch}\"'s file \"{path}\": {source}")]
    Read {
        branch: String,
        path: String,
        #[source]
        source: Arc<io::Error>,
    },
    /// A file's content failed validation
    #[error("\"{}\" is invalid: {message}", filename.display())]
    Validation { filename: PathBuf, message: String },
    /// An output or published file could not be written
    #[error("failed to write \"{}\": {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    /// Expanding a manifest field failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// A task panicked or was torn down
    #[error("build task failed: {0}")]
    Task(String),
}

impl BuildError {
    /// Read failure for `path` inside `branch`.
    pub fn read(branch: impl Into<String>, path: impl Into<String>, source: io::Error) -> Self {
        BuildError::Read { branch: branch.into(), path: path.into(), source: Arc::new(source) }
    }

    /// Write failure for `path`.
    pub fn write(path: &Path, source: io::Error) -> Self {
        BuildError::Write { path: path.to_path_buf(), source: Arc::new(source) }
    }

    /// Task failure with a message.
    pub fn task(message: impl Into<String>) -> Self {
        BuildError::Task(message.into())
    }
}
