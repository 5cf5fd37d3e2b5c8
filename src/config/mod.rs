//! Configuration module for the twine build engine
//!
//! Provides types and parsing for `twine.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
