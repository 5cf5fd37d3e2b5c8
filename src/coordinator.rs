//! Rebuild coalescing for long-running builds.
//!
//! While a build runs, any number of further requests collapse into exactly
//! one rebuild that starts once the current build finishes.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Coordinator state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinatorState {
    #[default]
    Idle,
    Running,
    /// Running, with one rebuild queued behind the current build
    RunningRebuildQueued,
}

/// What a build request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildRequest {
    /// Nothing was running: the caller must start the build
    Start,
    /// A rebuild was queued behind the running build
    Queued,
    /// A rebuild was already queued; this request adds nothing
    Coalesced,
}

/// What follows a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Idle,
    /// A queued rebuild: the caller must build again
    Rebuild,
}

#[derive(Debug, Default)]
pub struct BuildCoordinator {
    state: Mutex<CoordinatorState>,
}

impl BuildCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.lock()
    }

    /// Ask for a build.
    pub fn request_build(&self) -> BuildRequest {
        let mut state = self.lock();
        match *state {
            CoordinatorState::Idle => {
                *state = CoordinatorState::Running;
                BuildRequest::Start
            }
            CoordinatorState::Running => {
                *state = CoordinatorState::RunningRebuildQueued;
                BuildRequest::Queued
            }
            CoordinatorState::RunningRebuildQueued => BuildRequest::Coalesced,
        }
    }

    /// Report that the running build finished.
    pub fn finish_build(&self) -> Completion {
        let mut state = self.lock();
        match *state {
            CoordinatorState::RunningRebuildQueued => {
                *state = CoordinatorState::Running;
                Completion::Rebuild
            }
            CoordinatorState::Running | CoordinatorState::Idle => {
                *state = CoordinatorState::Idle;
                Completion::Idle
            }
        }
    }

    /// Request a build and, if this call started it, keep running `build`
    /// until no rebuild is queued.
    ///
    /// Returns how many builds this call ran; zero when the request was
    /// queued or coalesced into a build driven elsewhere.
    pub async fn run<F, Fut>(&self, mut build: F) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        match self.request_build() {
            BuildRequest::Start => {}
            request => {
                debug!(?request, "build already running");
                return 0;
            }
        }

        let guard = ResetOnPanic(self);
        let mut runs = 0;
        loop {
            build().await;
            runs += 1;
            match self.finish_build() {
                Completion::Idle => break,
                Completion::Rebuild => debug!(runs, "running queued rebuild"),
            }
        }
        std::mem::forget(guard);
        runs
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the coordinator to idle if a build unwinds.
struct ResetOnPanic<'a>(&'a BuildCoordinator);

impl Drop for ResetOnPanic<'_> {
    fn drop(&mut self) {
        *self.0.lock() = CoordinatorState::Idle;
    }
}
