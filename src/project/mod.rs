//! Project data structures.
//!
//! This module contains the typed records a project directory is normalized
//! into by the loader, and which the builder turns into a descriptor.
//!
//! ## Main Parts
//!
//! - [`Project`] - The product configuration plus every discovered record
//! - [`Metadata`] - Title, description, version and author information
//! - [`records`] - One record type per content type (templates, plugins, ...)

#[allow(clippy::module_inception)]
pub mod project;
pub mod records;

pub use project::{Metadata, Project, VersionRange};
pub use records::{
    CodeVersion, Phrase, PhraseField, Plugin, Schedule, ScheduledTask, Setting, SettingGroup,
    Template,
};
