//! Configuration types for projects and builds.
//!
//! This module contains the project configuration file format and the
//! options that control a single build run.

pub mod build;
pub mod file;

pub use build::BuildOptions;
pub use file::{CONFIG_FILE_NAME, DEFAULT_ENCODING, ProjectConfig};
