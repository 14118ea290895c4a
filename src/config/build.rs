//! Options for a single build run.
//!
//! These are layered the same way for every invocation:
//! **CLI argument > project config > hardcoded default**.

use std::path::PathBuf;

use crate::project::Project;

/// Configuration for build execution behavior.
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    /// Overrides the project's configured build path when set
    pub build_path: Option<PathBuf>,

    /// Whether the caller wants a machine-readable report instead of the log
    pub json: bool,
}

impl BuildOptions {
    /// Apply the overrides to a loaded project.
    pub fn apply(&self, project: &mut Project) {
        if let Some(build_path) = &self.build_path {
            project.build_path.clone_from(build_path);
        }
    }
}
