//! # vde-builder
//!
//! Packages a vBulletin extension project, laid out as a directory tree of
//! PHP code, templates, plugins, scheduled tasks, options and phrases, into a
//! single product descriptor XML plus an upload tree of files to copy onto the
//! forum.
//!
//! This library provides the core functionality for the `vde-build` CLI tool:
//! loading a project from disk, building the descriptor and mirroring files.

pub mod builder;
pub mod charset;
pub mod config;
pub mod definition;
pub mod document;
pub mod error;
pub mod loader;
pub mod mirror;
pub mod project;

pub use builder::{BuildReport, Builder};
pub use error::{Error, Result};
pub use loader::ProjectLoader;
