//! Upload tree mirroring.
//!
//! Copies files into a destination tree while keeping their path relative to
//! a base directory, creating intermediate directories as needed.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::{Error, Result};

/// A file copied by [`FileMirror::mirror`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirroredFile {
    pub source: PathBuf,
    pub destination: PathBuf,

    /// Path of the file relative to the mirror base
    pub relative: PathBuf,

    /// Number of bytes copied
    pub bytes: u64,
}

/// Copies files into a destination tree relative to a fixed base directory.
pub struct FileMirror {
    base: PathBuf,
}

impl FileMirror {
    /// Create a mirror rooted at `base`.
    ///
    /// # Arguments
    ///
    /// * `base` - Directory that source files are made relative to
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Path of `file` relative to the mirror base.
    ///
    /// # Arguments
    ///
    /// * `file` - A path below the base
    ///
    /// # Returns
    ///
    /// The path of `file` with the base prefix stripped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutsideBase`] if `file` is not below the base.
    pub fn relative_path(&self, file: &Path) -> Result<PathBuf> {
        match file.strip_prefix(&self.base) {
            Ok(relative) if !relative.as_os_str().is_empty() => Ok(relative.to_path_buf()),
            _ => Err(Error::OutsideBase {
                path: file.to_path_buf(),
                base: self.base.clone(),
            }),
        }
    }

    /// Copy every file in `files` to the same relative location under `dest_root`.
    ///
    /// Existing directories are reused and existing files overwritten. The
    /// first failure stops the run; files copied before it stay in place.
    ///
    /// # Arguments
    ///
    /// * `files` - Source files, each below the base
    /// * `dest_root` - Directory the relative paths are placed under
    ///
    /// # Returns
    ///
    /// One [`MirroredFile`] per copied file, in input order.
    ///
    /// # Errors
    ///
    /// - [`Error::OutsideBase`] if a file is not below the base
    /// - [`Error::Mirror`] if a directory cannot be created or a copy fails
    pub fn mirror(&self, files: &[PathBuf], dest_root: &Path) -> Result<Vec<MirroredFile>> {
        let mut mirrored = Vec::with_capacity(files.len());

        for source in files {
            let relative = self.relative_path(source)?;
            let destination = dest_root.join(&relative);

            let mirror_error = |e| Error::Mirror {
                source_path: source.clone(),
                destination: destination.clone(),
                source: e,
            };

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(mirror_error)?;
            }
            let bytes = fs::copy(source, &destination).map_err(mirror_error)?;

            debug!(
                source = %source.display(),
                destination = %destination.display(),
                bytes,
                "mirrored file"
            );

            mirrored.push(MirroredFile {
                source: source.clone(),
                destination,
                relative,
                bytes,
            });
        }

        Ok(mirrored)
    }
}
