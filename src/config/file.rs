//! Project configuration file support.
//!
//! Every project directory carries a `config.toml` describing the product:
//! its identifier, metadata, build location, explicit upload files and
//! dependency constraints.
//!
//! # Example config
//!
//! ```toml
//! id = "demo"
//! active = true
//! encoding = "UTF-8"
//! title = "Demo Product"
//! description = "Adds a demo to the forum"
//! url = "https://example.com/demo"
//! versionurl = "https://example.com/demo/version"
//! version = "1.0.0"
//! author = "someone"
//! buildpath = "~/builds/demo"
//! basepath = ".."
//! files = ["includes/demo/functions_demo.php"]
//!
//! [dependencies]
//! php = ["5.2.0", ""]
//! vbulletin = ["3.8.0", "3.8.99"]
//! ```

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Name of the configuration file expected at the root of every project.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Encoding declared in the descriptor when the config does not name one.
pub const DEFAULT_ENCODING: &str = "ISO-8859-1";

/// Raw contents of a project's `config.toml`.
///
/// Optional keys are `Option<T>` so the loader can apply defaults; metadata
/// keys default to empty strings.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Product identifier, used for the `productid` attribute and file name
    #[serde(default)]
    pub id: String,

    /// Whether the product is installed active (defaults to `true`)
    pub active: Option<bool>,

    /// Encoding declared in the descriptor header
    pub encoding: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub url: String,

    /// Version check URL
    #[serde(default)]
    pub versionurl: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub author: String,

    /// Output directory, relative to the project directory unless absolute
    #[serde(default)]
    pub buildpath: PathBuf,

    /// Directory that mirrored files are made relative to
    pub basepath: Option<PathBuf>,

    /// Files copied verbatim into the upload tree
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Dependency type mapped to `[minversion, maxversion]`
    #[serde(default)]
    pub dependencies: BTreeMap<String, (String, String)>,
}

/// Expand a leading `~` in a path to the user's home directory.
///
/// Paths that don't start with `~` are returned unchanged.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Remove `.` and `..` components without touching the filesystem.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `path` against `dir` after tilde expansion.
#[must_use]
pub fn resolve_path(dir: &Path, path: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        normalize_path(&expanded)
    } else {
        normalize_path(&dir.join(expanded))
    }
}

impl ProjectConfig {
    /// Returns the config file location for the project at `project_dir`.
    #[must_use]
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE_NAME)
    }

    /// Load the configuration of the project at `project_dir`.
    ///
    /// # Errors
    ///
    /// - [`Error::ProjectNotFound`] if there is no `config.toml`
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Config`] if the file is not valid TOML or has unknown keys
    /// - [`Error::InvalidConfig`] if `id` or `buildpath` is empty
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::config_path(project_dir);

        if !path.is_file() {
            return Err(Error::ProjectNotFound {
                path: project_dir.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let config: Self = toml::from_str(&content).map_err(|source| Error::Config {
            path: path.clone(),
            source,
        })?;

        config.validate(&path)?;

        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidConfig {
                path: path.to_path_buf(),
                message: "`id` must not be empty".to_string(),
            });
        }

        if self.buildpath.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                path: path.to_path_buf(),
                message: "`buildpath` must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// The encoding to declare, falling back to [`DEFAULT_ENCODING`].
    #[must_use]
    pub fn encoding(&self) -> &str {
        match self.encoding.as_deref() {
            Some(encoding) if !encoding.trim().is_empty() => encoding,
            _ => DEFAULT_ENCODING,
        }
    }
}
