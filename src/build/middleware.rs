//! Per-field middleware.
//!
//! Each manifest field owns an ordered list of [`Step`]s. Every file of a
//! field runs through that field's steps in registration order before the
//! bundle kind's terminal step serializes it.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::context::BuildContext;
use super::error::BuildError;
use super::file::FileEntry;

/// One transformation applied to a file.
///
/// Steps may mark the file for inclusion, load or rewrite its content, set
/// `define`, attach a source map or publish the file somewhere. A returned
/// error aborts the whole build.
#[async_trait]
pub trait Step: Send + Sync {
    /// Transform `file` in place.
    async fn apply(&self, file: &mut FileEntry, ctx: &BuildContext) -> Result<(), BuildError>;
}

/// A [`Step`] backed by a synchronous closure.
pub struct FnStep<F>(F);

/// Wrap a closure as a [`Step`].
pub fn step_fn<F>(f: F) -> FnStep<F>
where
    F: Fn(&mut FileEntry, &BuildContext) -> Result<(), BuildError> + Send + Sync,
{
    FnStep(f)
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&mut FileEntry, &BuildContext) -> Result<(), BuildError> + Send + Sync,
{
    async fn apply(&self, file: &mut FileEntry, ctx: &BuildContext) -> Result<(), BuildError> {
        (self.0)(file, ctx)
    }
}

/// Field name to ordered steps, kept in field registration order.
#[derive(Clone, Default)]
pub struct Middleware {
    stacks: Vec<(String, Vec<Arc<dyn Step>>)>,
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.stacks.iter().map(|(field, steps)| (field, steps.len())))
            .finish()
    }
}

impl Middleware {
    /// Create an empty middleware table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to `field`, registering the field on first use.
    pub fn use_step(&mut self, field: &str, step: Arc<dyn Step>) -> &mut Self {
        match self.stacks.iter_mut().find(|(name, _)| name == field) {
            Some((_, steps)) => steps.push(step),
            None => self.stacks.push((field.to_string(), vec![step])),
        }
        self
    }

    /// Append several steps to `field`, in order.
    pub fn use_steps(
        &mut self,
        field: &str,
        steps: impl IntoIterator<Item = Arc<dyn Step>>,
    ) -> &mut Self {
        for step in steps {
            self.use_step(field, step);
        }
        self
    }

    /// Registered field names, in registration order.
    pub fn fields(&self) -> Vec<String> {
        self.stacks.iter().map(|(field, _)| field.clone()).collect()
    }

    /// Number of steps registered for `field`.
    pub fn step_count(&self, field: &str) -> usize {
        self.stacks.iter().find(|(name, _)| name == field).map_or(0, |(_, steps)| steps.len())
    }

    /// Run `file` through its field's steps.
    pub async fn run(&self, file: &mut FileEntry, ctx: &BuildContext) -> Result<(), BuildError> {
        let Some((_, steps)) = self.stacks.iter().find(|(name, _)| *name == file.field) else {
            return Ok(());
        };
        for step in steps {
            step.apply(file, ctx).await?;
        }
        Ok(())
    }
}
