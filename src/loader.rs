//! Project directory loading.
//!
//! The loader reads a project's `config.toml` and scans its subdirectories
//! according to fixed per-type conventions:
//!
//! | Content type    | Convention                                              |
//! |-----------------|---------------------------------------------------------|
//! | Codes           | `updown/up-<version>.php`, `updown/down-<version>.php`  |
//! | Templates       | `templates/<name>.html`                                 |
//! | Plugins         | `plugins/<hook>.php`                                    |
//! | Scheduled tasks | `cron/<varname>.php`                                    |
//! | Options         | `options/<group>/<group>.php`, `options/<group>/<varname>.php` |
//! | Phrases         | `phrases/<field>/<field>.txt`, `phrases/<field>/<varname>.txt` |
//!
//! Every directory is optional. Entries are visited in file name order so that
//! building an unchanged project always produces the same descriptor. Files
//! that don't follow a convention are skipped. Every file is decoded from the
//! project's declared encoding.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use tracing::debug;
use walkdir::WalkDir;

use crate::{
    charset::{self, read_text},
    config::{
        ProjectConfig,
        file::{normalize_path, resolve_path},
    },
    definition::Definition,
    error::{Error, Result},
    project::{
        CodeVersion, Metadata, Phrase, PhraseField, Plugin, Project, Schedule, ScheduledTask,
        Setting, SettingGroup, Template, VersionRange,
    },
};

const CODES_DIR: &str = "updown";
const TEMPLATES_DIR: &str = "templates";
const PLUGINS_DIR: &str = "plugins";
const TASKS_DIR: &str = "cron";
const OPTIONS_DIR: &str = "options";
const PHRASES_DIR: &str = "phrases";

/// Execution order given to plugins that don't declare one.
pub const DEFAULT_EXECUTION_ORDER: i64 = 10;

/// Loads a project directory into a [`Project`].
pub struct ProjectLoader {
    /// Absolute path of the project directory
    root: PathBuf,
}

impl ProjectLoader {
    /// Create a loader for the project directory at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - The project directory, absolute or relative to the current directory
    ///
    /// # Returns
    ///
    /// A loader rooted at the normalized absolute form of `root`. The directory
    /// is not read until [`load_project`](Self::load_project).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if `root` cannot be made absolute.
    pub fn new(root: &Path) -> Result<Self> {
        let absolute = std::path::absolute(root).map_err(|e| Error::io(root, e))?;

        Ok(Self {
            root: normalize_path(&absolute),
        })
    }

    /// Load the project at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - The project directory (the one holding `config.toml`)
    ///
    /// # Returns
    ///
    /// The fully populated [`Project`], every collection in file name order.
    ///
    /// # Errors
    ///
    /// - [`Error::ProjectNotFound`] if `path` has no `config.toml`
    /// - [`Error::Config`] / [`Error::InvalidConfig`] for a bad config file
    /// - [`Error::UnsupportedEncoding`] if the declared encoding is unusable
    /// - [`Error::Io`] if a discovered file cannot be read
    /// - [`Error::Decode`] if a file is not valid in the declared encoding
    /// - [`Error::Definition`] if an option, group or task file cannot be parsed
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::path::Path;
    /// # use vde_builder::ProjectLoader;
    /// let project = ProjectLoader::load(Path::new("projects/demo"))?;
    /// println!("Loaded {} templates", project.templates.len());
    /// # Ok::<(), vde_builder::Error>(())
    /// ```
    pub fn load(path: &Path) -> Result<Project> {
        Self::new(path)?.load_project()
    }

    /// Load the configuration and every content type.
    ///
    /// # Errors
    ///
    /// See [`ProjectLoader::load`].
    pub fn load_project(&self) -> Result<Project> {
        let config = ProjectConfig::load(&self.root)?;
        let encoding = charset::for_label(config.encoding())?;

        let mut project = Project::new(
            config.id.clone(),
            self.root.clone(),
            resolve_path(&self.root, &config.buildpath),
        );

        project.active = config.active.unwrap_or(true);
        project.encoding = config.encoding().to_string();
        project.timestamp = modified_timestamp(&ProjectConfig::config_path(&self.root));
        project.base_path = config
            .basepath
            .as_deref()
            .map_or_else(|| self.root.clone(), |base| resolve_path(&self.root, base));
        project.meta = Metadata {
            title: config.title,
            description: config.description,
            version: config.version,
            url: config.url,
            version_check_url: config.versionurl,
            author: config.author,
        };
        project.files = config
            .files
            .iter()
            .map(|file| resolve_path(&project.base_path, file))
            .collect();
        project.dependencies = config
            .dependencies
            .into_iter()
            .map(|(kind, (min, max))| (kind, VersionRange { min, max }))
            .collect();

        project.codes = self.load_codes(encoding)?;
        project.templates = self.load_templates(&project.meta, encoding)?;
        project.plugins = self.load_plugins(&project.meta, encoding)?;
        project.tasks = self.load_tasks(encoding)?;
        project.option_groups = self.load_options(encoding)?;
        project.phrase_fields = self.load_phrases(&project.meta, encoding)?;

        debug!(
            id = %project.id,
            codes = project.codes.len(),
            templates = project.templates.len(),
            plugins = project.plugins.len(),
            tasks = project.tasks.len(),
            option_groups = project.option_groups.len(),
            phrase_fields = project.phrase_fields.len(),
            "loaded project"
        );

        Ok(project)
    }

    /// Read `updown/{up,down}-<version>.php`, grouped by version.
    ///
    /// # Arguments
    ///
    /// * `encoding` - The project encoding
    ///
    /// # Returns
    ///
    /// One [`CodeVersion`] per version, in natural version order. A version
    /// with only an `up-` file has no uninstall code and vice versa.
    fn load_codes(&self, encoding: &'static Encoding) -> Result<Vec<CodeVersion>> {
        let mut versions: BTreeMap<String, CodeVersion> = BTreeMap::new();

        for path in list_files(&self.root.join(CODES_DIR))? {
            let Some((direction, version)) = file_name(&path).and_then(parse_code_file_name)
            else {
                continue;
            };

            let code = extract_code(&read_text(&path, encoding)?);
            let entry = versions
                .entry(version.to_string())
                .or_insert_with(|| CodeVersion {
                    version: version.to_string(),
                    ..CodeVersion::default()
                });

            match direction {
                CodeDirection::Up => entry.install_code = Some(code),
                CodeDirection::Down => entry.uninstall_code = Some(code),
            }
        }

        let mut codes: Vec<CodeVersion> = versions.into_values().collect();
        codes.sort_by(|a, b| compare_versions(&a.version, &b.version));

        Ok(codes)
    }

    /// Read `templates/<name>.html`, dated by file modification time.
    fn load_templates(
        &self,
        meta: &Metadata,
        encoding: &'static Encoding,
    ) -> Result<Vec<Template>> {
        let mut templates = Vec::new();

        for path in list_files(&self.root.join(TEMPLATES_DIR))? {
            let Some(name) = stem_with_extension(&path, ".html") else {
                continue;
            };

            debug!(template = %name, "found template");
            templates.push(Template {
                body: read_text(&path, encoding)?,
                version: meta.version.clone(),
                author: meta.author.clone(),
                date: modified_timestamp(&path),
                name,
            });
        }

        Ok(templates)
    }

    /// Read `plugins/<hook>.php`.
    ///
    /// # Arguments
    ///
    /// * `meta` - Project metadata, used for the default plugin title
    /// * `encoding` - The project encoding
    ///
    /// # Returns
    ///
    /// One [`Plugin`] per file. Title, active flag and execution order come
    /// from the leading doc comment tags when present.
    fn load_plugins(
        &self,
        meta: &Metadata,
        encoding: &'static Encoding,
    ) -> Result<Vec<Plugin>> {
        let mut plugins = Vec::new();

        for path in list_files(&self.root.join(PLUGINS_DIR))? {
            let Some(hook_name) = stem_with_extension(&path, ".php") else {
                continue;
            };

            let code = extract_code(&read_text(&path, encoding)?);
            let header = PluginHeader::parse(&code);

            debug!(hook = %hook_name, "found plugin");
            plugins.push(Plugin {
                title: header
                    .title
                    .unwrap_or_else(|| format!("{} - {hook_name}", meta.title)),
                active: header.active.unwrap_or(true),
                execution_order: header.execution_order.unwrap_or(DEFAULT_EXECUTION_ORDER),
                hook_name,
                code,
            });
        }

        Ok(plugins)
    }

    /// Read `cron/<varname>.php` definition files.
    ///
    /// The minute may be given as `minute` or `minutes`; `minute` wins when
    /// both are set.
    fn load_tasks(&self, encoding: &'static Encoding) -> Result<Vec<ScheduledTask>> {
        let mut tasks = Vec::new();
        let defaults = Schedule::default();

        for path in list_files(&self.root.join(TASKS_DIR))? {
            let Some(varname) = stem_with_extension(&path, ".php") else {
                continue;
            };

            let def = Definition::read(&path, encoding)?;
            let minute_key = if def.contains("minute") {
                "minute"
            } else {
                "minutes"
            };

            debug!(task = %varname, "found scheduled task");
            tasks.push(ScheduledTask {
                filename: def.text_or("filename", ""),
                active: def.flag_or("active", true),
                log_level: def.text_or("loglevel", "0"),
                schedule: Schedule {
                    weekday: def.text_or("weekday", &defaults.weekday),
                    day: def.text_or("day", &defaults.day),
                    hour: def.text_or("hour", &defaults.hour),
                    minute: def.text_or(minute_key, &defaults.minute),
                },
                title: def.text_or("title", ""),
                description: def.text_or("description", ""),
                log_text: def.text_or("logtext", ""),
                varname,
            });
        }

        Ok(tasks)
    }

    /// Read `options/<group>/` directories.
    ///
    /// A directory is only a group if it contains `<group>.php`.
    fn load_options(&self, encoding: &'static Encoding) -> Result<Vec<SettingGroup>> {
        let mut groups = Vec::new();

        for dir in list_dirs(&self.root.join(OPTIONS_DIR))? {
            let Some(varname) = file_name(&dir).map(str::to_string) else {
                continue;
            };

            let group_file = dir.join(format!("{varname}.php"));
            if !group_file.is_file() {
                debug!(dir = %dir.display(), "skipping option directory without group file");
                continue;
            }

            let group_def = Definition::read(&group_file, encoding)?;
            let mut settings = Vec::new();

            for path in list_files(&dir)? {
                if path == group_file {
                    continue;
                }
                let Some(setting_name) = stem_with_extension(&path, ".php") else {
                    continue;
                };

                let def = Definition::read(&path, encoding)?;
                settings.push(Setting {
                    varname: setting_name,
                    display_order: def.int_or("displayorder", 0),
                    advanced: def.flag_or("advanced", false),
                    datatype: def.text("datatype"),
                    option_code: def.text("optioncode"),
                    validation_code: def.text("validationcode"),
                    default_value: def.text("defaultvalue"),
                    blacklist: def.text("blacklist"),
                    advanced_value: def.text("advanced"),
                    value: def.text("value"),
                    title: def.text_or("title", ""),
                    description: def.text_or("description", ""),
                });
            }

            debug!(group = %varname, settings = settings.len(), "found setting group");
            groups.push(SettingGroup {
                display_order: group_def.int_or("displayorder", 0),
                title: group_def.text_or("title", ""),
                varname,
                settings,
            });
        }

        Ok(groups)
    }

    /// Read `phrases/<field>/` directories.
    ///
    /// A directory is only a field if it contains `<field>.txt`, whose
    /// contents are the field title.
    fn load_phrases(
        &self,
        meta: &Metadata,
        encoding: &'static Encoding,
    ) -> Result<Vec<PhraseField>> {
        let mut fields = Vec::new();

        for dir in list_dirs(&self.root.join(PHRASES_DIR))? {
            let Some(field_name) = file_name(&dir).map(str::to_string) else {
                continue;
            };

            let field_file = dir.join(format!("{field_name}.txt"));
            if !field_file.is_file() {
                debug!(dir = %dir.display(), "skipping phrase directory without field file");
                continue;
            }

            let mut field = PhraseField::new(
                field_name.clone(),
                read_text(&field_file, encoding)?.trim().to_string(),
            );

            for path in list_files(&dir)? {
                if path == field_file {
                    continue;
                }
                let Some(varname) = stem_with_extension(&path, ".txt") else {
                    continue;
                };

                field.phrases.insert(
                    varname,
                    Phrase {
                        text: read_text(&path, encoding)?.trim().to_string(),
                        author: meta.author.clone(),
                        version: meta.version.clone(),
                        date: modified_timestamp(&path),
                    },
                );
            }

            debug!(field = %field_name, phrases = field.phrases.len(), "found phrase field");
            fields.push(field);
        }

        Ok(fields)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CodeDirection {
    Up,
    Down,
}

/// Split `up-<version>.php` / `down-<version>.php` into direction and version.
fn parse_code_file_name(name: &str) -> Option<(CodeDirection, &str)> {
    let stem = name.strip_suffix(".php")?;

    let (direction, version) = if let Some(version) = stem.strip_prefix("up-") {
        (CodeDirection::Up, version)
    } else {
        (CodeDirection::Down, stem.strip_prefix("down-")?)
    };

    if version.is_empty() {
        None
    } else {
        Some((direction, version))
    }
}

/// Compare version strings segment by segment, numerically where possible.
///
/// Segments are separated by `.`, `-` or `_`. Numeric segments compare as
/// numbers, anything else as text, and a version that runs out of segments
/// first sorts first.
///
/// # Arguments
///
/// * `a` - The left-hand version
/// * `b` - The right-hand version
///
/// # Returns
///
/// The [`Ordering`] of `a` relative to `b`.
///
/// # Examples
///
/// ```
/// # use std::cmp::Ordering;
/// # use vde_builder::loader::compare_versions;
/// assert_eq!(compare_versions("1.9", "1.10"), Ordering::Less);
/// assert_eq!(compare_versions("2.0", "2.0.1"), Ordering::Less);
/// ```
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let separators = ['.', '-', '_'];
    let mut left = a.split(separators);
    let mut right = b.split(separators);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Strip the PHP open/close markers from stored code and trim it.
///
/// A leading `<?php` (or `<?`) and a trailing `?>` are removed, then
/// surrounding whitespace. The result is opaque data; it is never executed.
///
/// # Arguments
///
/// * `source` - The full contents of a code or plugin file
///
/// # Returns
///
/// The code payload.
///
/// # Examples
///
/// ```
/// # use vde_builder::loader::extract_code;
/// assert_eq!(extract_code("<?php\necho 1;\n?>\n"), "echo 1;");
/// ```
#[must_use]
pub fn extract_code(source: &str) -> String {
    let mut code = source.trim();

    if let Some(rest) = code.strip_prefix("<?php") {
        code = rest;
    } else if let Some(rest) = code.strip_prefix("<?") {
        code = rest;
    }

    if let Some(rest) = code.strip_suffix("?>") {
        code = rest;
    }

    code.trim().to_string()
}

/// Metadata a plugin may declare in a leading doc comment:
///
/// ```php
/// /**
///  * @title Show the demo banner
///  * @active 1
///  * @executionorder 5
///  */
/// ```
#[derive(Debug, Default, PartialEq, Eq)]
struct PluginHeader {
    title: Option<String>,
    active: Option<bool>,
    execution_order: Option<i64>,
}

impl PluginHeader {
    fn parse(code: &str) -> Self {
        let mut header = Self::default();

        let Some(comment) = code
            .strip_prefix("/**")
            .and_then(|rest| rest.split_once("*/"))
            .map(|(comment, _)| comment)
        else {
            return header;
        };

        for line in comment.lines() {
            let line = line.trim().trim_start_matches('*').trim();
            let Some(tag_line) = line.strip_prefix('@') else {
                continue;
            };
            let (tag, value) = tag_line
                .split_once(char::is_whitespace)
                .map_or((tag_line, ""), |(tag, value)| (tag, value.trim()));

            match tag.to_ascii_lowercase().as_str() {
                "title" if !value.is_empty() => header.title = Some(value.to_string()),
                "active" => {
                    header.active = Some(!matches!(
                        value.to_ascii_lowercase().as_str(),
                        "0" | "false" | "no" | "off"
                    ));
                }
                "executionorder" => header.execution_order = value.parse().ok(),
                _ => {}
            }
        }

        header
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// File stem of `path` when its name ends with `extension` (including the dot).
fn stem_with_extension(path: &Path, extension: &str) -> Option<String> {
    file_name(path)
        .and_then(|name| name.strip_suffix(extension))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Direct children of `dir`, sorted by file name.
///
/// # Arguments
///
/// * `dir` - The directory to list
///
/// # Returns
///
/// The paths of the entries, or an empty list when `dir` does not exist.
///
/// # Errors
///
/// Returns [`Error::Io`] if an entry cannot be read.
fn list_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            entry.map(walkdir::DirEntry::into_path).map_err(|e| {
                let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                Error::io(path, e.into())
            })
        })
        .collect()
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_entries(dir)?
        .into_iter()
        .filter(|path| path.is_file())
        .collect())
}

fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_entries(dir)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect())
}

/// Modification time of `path` in unix seconds, or 0 if unavailable.
fn modified_timestamp(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_or(0, |modified| DateTime::<Utc>::from(modified).timestamp())
}
