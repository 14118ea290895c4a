//! Core project data structure.
//!
//! A [`Project`] is the normalized form of a project directory: the product
//! configuration plus every record discovered on disk. The loader owns it
//! while scanning; afterwards it is handed to the builder read-only.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result},
    path::PathBuf,
};

use super::records::{CodeVersion, PhraseField, Plugin, ScheduledTask, SettingGroup, Template};

/// Descriptive product metadata.
///
/// Every field is present; missing config keys are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub description: String,

    /// Free-form version string, not validated
    pub version: String,

    pub url: String,
    pub version_check_url: String,
    pub author: String,
}

/// Minimum and maximum version accepted for a dependency.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionRange {
    pub min: String,
    pub max: String,
}

/// Representation of a packaged extension project.
#[derive(Clone, Debug)]
pub struct Project {
    /// Product identifier
    pub id: String,

    pub active: bool,

    /// Encoding declared in the descriptor header
    pub encoding: String,

    /// The project directory (where `config.toml` lives)
    pub root: PathBuf,

    /// Directory the descriptor and upload tree are written to
    pub build_path: PathBuf,

    /// Directory that mirrored files are made relative to
    pub base_path: PathBuf,

    pub meta: Metadata,

    /// Dependency type mapped to its accepted version range
    pub dependencies: BTreeMap<String, VersionRange>,

    /// Absolute paths of files copied verbatim into the upload tree
    pub files: Vec<PathBuf>,

    pub codes: Vec<CodeVersion>,
    pub templates: Vec<Template>,
    pub plugins: Vec<Plugin>,
    pub tasks: Vec<ScheduledTask>,
    pub option_groups: Vec<SettingGroup>,
    pub phrase_fields: Vec<PhraseField>,

    /// Modification time of the config file, in unix seconds.
    ///
    /// Used as the date of entries that have no file of their own.
    pub timestamp: i64,
}

impl Project {
    /// Create an empty project with the given identity and locations.
    ///
    /// Content collections start empty; the loader fills them.
    #[must_use]
    pub fn new(id: impl Into<String>, root: PathBuf, build_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            active: true,
            encoding: crate::config::DEFAULT_ENCODING.to_string(),
            base_path: root.clone(),
            root,
            build_path,
            meta: Metadata::default(),
            dependencies: BTreeMap::new(),
            files: Vec::new(),
            codes: Vec::new(),
            templates: Vec::new(),
            plugins: Vec::new(),
            tasks: Vec::new(),
            option_groups: Vec::new(),
            phrase_fields: Vec::new(),
            timestamp: 0,
        }
    }

    /// Path of the descriptor written by a build.
    #[must_use]
    pub fn descriptor_path(&self) -> PathBuf {
        self.build_path.join(format!("product-{}.xml", self.id))
    }

    /// Root of the mirrored upload tree written by a build.
    #[must_use]
    pub fn upload_path(&self) -> PathBuf {
        self.build_path.join("upload")
    }

    /// Template bodies keyed by template name.
    #[must_use]
    pub fn template_bodies(&self) -> BTreeMap<&str, &str> {
        self.templates
            .iter()
            .map(|t| (t.name.as_str(), t.body.as_str()))
            .collect()
    }

    /// Plugin code keyed by hook name.
    #[must_use]
    pub fn plugin_code(&self) -> BTreeMap<&str, &str> {
        self.plugins
            .iter()
            .map(|p| (p.hook_name.as_str(), p.code.as_str()))
            .collect()
    }

    /// Setting values keyed by varname.
    ///
    /// A setting's `value` wins over its `defaultvalue`; settings with
    /// neither map to an empty string.
    #[must_use]
    pub fn option_values(&self) -> BTreeMap<&str, &str> {
        self.option_groups
            .iter()
            .flat_map(|group| &group.settings)
            .map(|setting| {
                let value = setting
                    .value
                    .as_deref()
                    .or(setting.default_value.as_deref())
                    .unwrap_or_default();
                (setting.varname.as_str(), value)
            })
            .collect()
    }

    /// Phrase texts keyed by field name, then varname.
    #[must_use]
    pub fn phrase_texts(&self) -> BTreeMap<&str, BTreeMap<&str, &str>> {
        self.phrase_fields
            .iter()
            .map(|field| {
                let texts = field
                    .phrases
                    .iter()
                    .map(|(varname, phrase)| (varname.as_str(), phrase.text.as_str()))
                    .collect();
                (field.field_name.as_str(), texts)
            })
            .collect()
    }

    /// Install and uninstall code keyed by version.
    #[must_use]
    pub fn code_pairs(&self) -> BTreeMap<&str, (Option<&str>, Option<&str>)> {
        self.codes
            .iter()
            .map(|code| {
                (
                    code.version.as_str(),
                    (code.install_code.as_deref(), code.uninstall_code.as_deref()),
                )
            })
            .collect()
    }
}

impl Display for Project {
    /// Format the project as `📦 <title> [<id>] (<path>)`, falling back to the
    /// id alone when the title is empty.
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.meta.title.is_empty() {
            write!(f, "📦 {} ({})", self.id, self.root.display())
        } else {
            write!(
                f,
                "📦 {} [{}] ({})",
                self.meta.title,
                self.id,
                self.root.display()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::records::{Phrase, Setting};

    fn sample_project() -> Project {
        Project::new("demo", PathBuf::from("/p/demo"), PathBuf::from("/p/build"))
    }

    #[test]
    fn test_new_project_defaults() {
        let project = sample_project();

        assert!(project.active);
        assert_eq!(project.encoding, "ISO-8859-1");
        assert_eq!(project.base_path, PathBuf::from("/p/demo"));
        assert!(project.templates.is_empty());
    }

    #[test]
    fn test_descriptor_and_upload_paths() {
        let project = sample_project();

        assert_eq!(
            project.descriptor_path(),
            PathBuf::from("/p/build/product-demo.xml")
        );
        assert_eq!(project.upload_path(), PathBuf::from("/p/build/upload"));
    }

    #[test]
    fn test_option_values_prefer_value_over_default() {
        let mut project = sample_project();
        project.option_groups.push(SettingGroup {
            varname: "demo".to_string(),
            display_order: 1,
            title: "Demo".to_string(),
            settings: vec![
                Setting {
                    varname: "with_value".to_string(),
                    default_value: Some("0".to_string()),
                    value: Some("1".to_string()),
                    ..Setting::default()
                },
                Setting {
                    varname: "default_only".to_string(),
                    default_value: Some("5".to_string()),
                    ..Setting::default()
                },
                Setting {
                    varname: "neither".to_string(),
                    ..Setting::default()
                },
            ],
        });

        let values = project.option_values();
        assert_eq!(values.get("with_value"), Some(&"1"));
        assert_eq!(values.get("default_only"), Some(&"5"));
        assert_eq!(values.get("neither"), Some(&""));
    }

    #[test]
    fn test_phrase_texts_nest_by_field() {
        let mut project = sample_project();
        let mut field = PhraseField::new("global", "GLOBAL");
        field.phrases.insert(
            "hello".to_string(),
            Phrase {
                text: "Hello".to_string(),
                author: String::new(),
                version: String::new(),
                date: 0,
            },
        );
        project.phrase_fields.push(field);

        let texts = project.phrase_texts();
        assert_eq!(texts["global"]["hello"], "Hello");
    }

    #[test]
    fn test_display_with_and_without_title() {
        let mut project = sample_project();
        assert_eq!(project.to_string(), "📦 demo (/p/demo)");

        project.meta.title = "Demo".to_string();
        assert_eq!(project.to_string(), "📦 Demo [demo] (/p/demo)");
    }
}
