//! Build report types.
//!
//! Summarizes the artifacts one `twine build` invocation produced.

use std::path::PathBuf;
use std::time::Duration;

/// Outcome of a single artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Bundle written, with its size in bytes
    Written(u64),
    /// Asset files published
    Published,
    /// Build failed with error
    Failed(String),
}

impl ArtifactStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, ArtifactStatus::Failed(_))
    }
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactStatus::Written(bytes) => write!(f, "{} bytes", bytes),
            ArtifactStatus::Published => write!(f, "published"),
            ArtifactStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of building one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactResult {
    /// Bundle kind label (`scripts`, `styles`, `files`)
    pub kind: &'static str,
    /// Output file or directory
    pub path: PathBuf,
    pub status: ArtifactStatus,
    pub duration: Duration,
}

impl ArtifactResult {
    /// A written bundle.
    pub fn written(kind: &'static str, path: PathBuf, bytes: u64, duration: Duration) -> Self {
        Self { kind, path, status: ArtifactStatus::Written(bytes), duration }
    }

    /// Published asset files.
    pub fn published(kind: &'static str, path: PathBuf, duration: Duration) -> Self {
        Self { kind, path, status: ArtifactStatus::Published, duration }
    }

    /// A failed artifact.
    pub fn failed(kind: &'static str, path: PathBuf, error: String, duration: Duration) -> Self {
        Self { kind, path, status: ArtifactStatus::Failed(error), duration }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub artifacts: Vec<ArtifactResult>,
    pub total_duration: Duration,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: ArtifactResult) {
        self.artifacts.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn failed_count(&self) -> usize {
        self.artifacts.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn failures(&self) -> Vec<&ArtifactResult> {
        self.artifacts.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the build.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let failed = self.failed_count();
        let total = self.artifacts.len();

        if failed > 0 {
            lines.push(format!("Build failed: {} of {} artifacts failed", failed, total));
            for artifact in self.failures() {
                lines.push(format!("  - {}: {}", artifact.kind, artifact.status));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} artifacts in {:?}",
                total, self.total_duration
            ));
            for artifact in &self.artifacts {
                lines.push(format!(
                    "  {} -> {} ({})",
                    artifact.kind,
                    artifact.path.display(),
                    artifact.status
                ));
            }
        }

        lines.join("\n")
    }
}
