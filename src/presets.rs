//! Builders wired with the default steps for each configured field.

use std::sync::Arc;

use crate::build::{BuildContext, Builder, Files, Scripts, Step, Styles};
use crate::plugins;
use crate::tree::Branch;

/// Scripts builder over the configured script fields.
pub fn scripts(branches: Vec<Arc<Branch>>, context: BuildContext) -> Builder<Scripts> {
    let fields = context.config().fields.scripts.clone();
    let mut builder = Builder::new(Scripts, branches, context);
    for field in &fields {
        builder.use_steps(field, plugins::default_steps(field));
    }
    builder
}

/// Styles builder over the configured style fields.
pub fn styles(branches: Vec<Arc<Branch>>, context: BuildContext) -> Builder<Styles> {
    let fields = context.config().fields.styles.clone();
    let mut builder = Builder::new(Styles, branches, context);
    for field in &fields {
        builder.use_step(field, Arc::new(plugins::css()));
    }
    builder
}

/// Files builder publishing the configured asset fields into the output
/// directory.
pub fn files(branches: Vec<Arc<Branch>>, context: BuildContext) -> Builder<Files> {
    let config = context.config();
    let fields = config.fields.files.clone();
    let dest = context.resolve_path(&config.output.files);
    let step: Arc<dyn Step> = if config.output.symlink {
        Arc::new(plugins::symlink(dest))
    } else {
        Arc::new(plugins::copy(dest))
    };

    let mut builder = Builder::new(Files, branches, context);
    for field in &fields {
        builder.use_step(field, Arc::clone(&step));
    }
    builder
}
