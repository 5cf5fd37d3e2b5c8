//! Bundle build engine for twine
//!
//! Turns a resolved component tree into one script bundle, one stylesheet
//! bundle or a published asset directory.
//!
//! # Overview
//!
//! The build consists of:
//! - **Extraction**: expand each branch's manifest fields into files
//! - **Middleware**: run every file through its field's steps
//! - **Assembly**: wrap processed files and stream them out in dispatch order
//!
//! # Example
//!
//! ```ignore
//! use twine::build::{BuildContext, Builder, Scripts};
//! use twine::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let builder = twine::scripts(branches, context);
//!
//! let written = builder.run().write_to_file(Path::new("build/build.js")).await?;
//! ```

pub mod context;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod extract;
pub mod file;
pub mod kind;
pub mod middleware;
pub mod result;
pub mod stream;

pub use context::*;
pub use discovery::*;
pub use engine::*;
pub use error::*;
pub use extract::*;
pub use file::*;
pub use kind::*;
pub use middleware::*;
pub use result::*;
pub use stream::*;
