//! Publishing asset files into the output directory.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

use crate::build::{BuildContext, BuildError, FileEntry, Step};

/// How a file reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    Copy,
    Symlink,
}

/// Places each file at `<dest>/<asset folder>/<path>`.
///
/// Existing targets are replaced.
#[derive(Debug, Clone)]
pub struct Publish {
    dest: PathBuf,
    mode: PublishMode,
}

impl Publish {
    pub fn mode(&self) -> PublishMode {
        self.mode
    }

    /// Where `file` lands.
    pub fn target(&self, file: &FileEntry) -> PathBuf {
        let mut target = self.dest.clone();
        target.extend(file.branch().asset_folder().split('/'));
        target.extend(file.path.split('/'));
        target
    }
}

/// Copy asset files under `dest`.
pub fn copy(dest: impl Into<PathBuf>) -> Publish {
    Publish { dest: dest.into(), mode: PublishMode::Copy }
}

/// Symlink asset files under `dest`.
pub fn symlink(dest: impl Into<PathBuf>) -> Publish {
    Publish { dest: dest.into(), mode: PublishMode::Symlink }
}

#[async_trait]
impl Step for Publish {
    async fn apply(&self, file: &mut FileEntry, _ctx: &BuildContext) -> Result<(), BuildError> {
        let read_error = |e| BuildError::read(file.branch().canonical_name(), file.path.clone(), e);
        if !fs::try_exists(&file.filename).await.map_err(read_error)? {
            return Err(read_error(io::Error::new(io::ErrorKind::NotFound, "file does not exist")));
        }

        let target = self.target(file);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| BuildError::write(parent, e))?;
        }
        remove_existing(&target).await?;

        match self.mode {
            PublishMode::Copy => {
                fs::copy(&file.filename, &target).await.map_err(|e| BuildError::write(&target, e))?;
            }
            PublishMode::Symlink => {
                link(&file.filename, &target).await.map_err(|e| BuildError::write(&target, e))?;
            }
        }
        trace!(file = %file.name, target = %target.display(), mode = ?self.mode, "published");
        Ok(())
    }
}

async fn remove_existing(target: &Path) -> Result<(), BuildError> {
    match fs::remove_file(target).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::write(target, e)),
    }
}

#[cfg(unix)]
async fn link(source: &Path, target: &Path) -> io::Result<()> {
    fs::symlink(source, target).await
}

#[cfg(windows)]
async fn link(source: &Path, target: &Path) -> io::Result<()> {
    fs::symlink_file(source, target).await
}
