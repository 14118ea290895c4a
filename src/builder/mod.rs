//! Product descriptor building.
//!
//! The [`Builder`] walks a loaded [`Project`] one content type at a time, in a
//! fixed order, and writes each into a [`DocumentBuilder`]. Along the way it
//! collects derived phrases (from scheduled tasks and settings) and extra
//! files to upload (task scripts). The finished document is encoded in the
//! project's declared encoding, written to `<buildpath>/product-<id>.xml`, and
//! the upload files are mirrored into `<buildpath>/upload`.

pub mod phrases;

use std::{
    fmt::{self, Display, Formatter},
    fs,
    path::{Path, PathBuf},
};

use humansize::{DECIMAL, format_size};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    charset,
    config::file::resolve_path,
    document::DocumentBuilder,
    error::{Error, Result},
    mirror::FileMirror,
    project::Project,
};

use phrases::{
    PhraseAccumulator, SETTINGS_FIELD, SETTINGS_FIELD_TITLE, TASK_FIELD, TASK_FIELD_TITLE,
};

/// Content types, in the order they appear in the descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Dependencies,
    Codes,
    ScheduledTasks,
    Plugins,
    Templates,
    Options,
    Phrases,
}

impl ContentType {
    /// Processing order. Phrases come last so that every derived phrase has
    /// been collected before they are written.
    pub const ORDER: [Self; 7] = [
        Self::Dependencies,
        Self::Codes,
        Self::ScheduledTasks,
        Self::Plugins,
        Self::Templates,
        Self::Options,
        Self::Phrases,
    ];

    /// Tag of the group holding this content type in the descriptor.
    #[must_use]
    pub const fn group_tag(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::Codes => "codes",
            Self::ScheduledTasks => "cronentries",
            Self::Plugins => "plugins",
            Self::Templates => "templates",
            Self::Options => "options",
            Self::Phrases => "phrases",
        }
    }
}

/// Human-readable record of what a build did.
///
/// Every line is also emitted as a `tracing` event.
#[derive(Clone, Debug, Default)]
pub struct BuildLog {
    lines: Vec<String>,
}

impl BuildLog {
    /// Append a line to the log and emit it as an `info` event.
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{line}");
        self.lines.push(line);
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Display for BuildLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Outcome of a successful build.
#[derive(Clone, Debug, Serialize)]
pub struct BuildReport {
    pub project_id: String,

    /// Path of the written descriptor
    pub descriptor: PathBuf,

    /// Destinations of the mirrored upload files
    pub copied_files: Vec<PathBuf>,

    /// Total size of the mirrored upload files, in bytes
    pub copied_bytes: u64,

    #[serde(serialize_with = "serialize_log")]
    pub log: BuildLog,
}

fn serialize_log<S: serde::Serializer>(
    log: &BuildLog,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    log.lines().serialize(serializer)
}

/// Builds the descriptor and upload tree of one project.
///
/// A builder is used for a single build; it owns the document, the derived
/// phrases and the list of derived upload files for that build.
pub struct Builder<'a> {
    project: &'a Project,
    xml: DocumentBuilder,
    phrases: PhraseAccumulator,

    /// Files discovered while processing content (task scripts)
    files: Vec<PathBuf>,

    log: BuildLog,
}

impl<'a> Builder<'a> {
    /// Create a builder for `project`.
    ///
    /// # Arguments
    ///
    /// * `project` - The loaded project; it is only read
    ///
    /// # Returns
    ///
    /// A builder with an empty document, no derived phrases and an empty log.
    #[must_use]
    pub fn new(project: &'a Project) -> Self {
        Self {
            project,
            xml: DocumentBuilder::new(),
            phrases: PhraseAccumulator::new(),
            files: Vec::new(),
            log: BuildLog::default(),
        }
    }

    /// Build the project.
    ///
    /// This method runs the whole build:
    /// 1. Creates the build directory
    /// 2. Writes the product header and every content type in [`ContentType::ORDER`]
    /// 3. Encodes the descriptor and writes `product-<id>.xml`
    /// 4. Mirrors explicit and task files into the upload tree
    ///
    /// The descriptor is written before mirroring starts, so a mirroring
    /// failure leaves a complete descriptor behind.
    ///
    /// # Returns
    ///
    /// A [`BuildReport`] with the descriptor path, the mirrored files and the
    /// build log.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedEncoding`] if the project encoding is unusable
    /// - [`Error::Build`] if the build directory cannot be created
    /// - [`Error::Io`] if the descriptor cannot be written
    /// - [`Error::OutsideBase`] / [`Error::Mirror`] if an upload file cannot be mirrored
    /// - [`Error::Document`] if the document groups are unbalanced
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::path::Path;
    /// # use vde_builder::{Builder, ProjectLoader};
    /// let project = ProjectLoader::load(Path::new("projects/demo"))?;
    /// let report = Builder::new(&project).build()?;
    /// println!("Wrote {}", report.descriptor.display());
    /// # Ok::<(), vde_builder::Error>(())
    /// ```
    pub fn build(mut self) -> Result<BuildReport> {
        let project = self.project;
        let encoding = charset::for_label(&project.encoding)?;

        fs::create_dir_all(&project.build_path).map_err(|source| Error::Build {
            path: project.build_path.clone(),
            source,
        })?;

        self.log.push(format!("Building project {}", project.id));

        let active = bool_attr(project.active);
        self.xml.open_group(
            "product",
            &[("productid", project.id.as_str()), ("active", active)],
        );
        self.xml.add_leaf("title", &project.meta.title, &[], false);
        self.xml
            .add_leaf("description", &project.meta.description, &[], false);
        self.xml.add_leaf("version", &project.meta.version, &[], false);
        self.xml.add_leaf("url", &project.meta.url, &[], false);
        self.xml.add_leaf(
            "versioncheckurl",
            &project.meta.version_check_url,
            &[],
            false,
        );

        for kind in ContentType::ORDER {
            self.xml.open_group(kind.group_tag(), &[]);
            self.process(kind)?;
            self.xml.close_group()?;
        }

        self.xml.close_group()?;

        let descriptor = project.descriptor_path();
        let content = format!(
            "<?xml version=\"1.0\" encoding=\"{}\"?>\r\n\r\n{}",
            project.encoding,
            self.xml.output()?
        );
        fs::write(&descriptor, charset::encode(&content, encoding))
            .map_err(|e| Error::io(&descriptor, e))?;

        self.log.push(format!(
            "Created Product XML Successfully at {}",
            descriptor.display()
        ));

        let (copied_files, copied_bytes) = self.mirror_files()?;

        self.log.push(format!(
            "Project {} Built Successfully!",
            project.meta.title
        ));

        Ok(BuildReport {
            project_id: project.id.clone(),
            descriptor,
            copied_files,
            copied_bytes,
            log: self.log,
        })
    }

    /// Write the entries of one content type into its (already open) group.
    fn process(&mut self, kind: ContentType) -> Result<()> {
        match kind {
            ContentType::Dependencies => self.process_dependencies(),
            ContentType::Codes => self.process_codes(),
            ContentType::ScheduledTasks => self.process_tasks(),
            ContentType::Plugins => self.process_plugins(),
            ContentType::Templates => self.process_templates(),
            ContentType::Options => self.process_options(),
            ContentType::Phrases => self.process_phrases(),
        }
    }

    /// One `dependency` leaf per configured dependency, in name order.
    ///
    /// Empty range bounds are written as empty attributes.
    ///
    /// # Errors
    ///
    /// None; always returns `Ok`.
    fn process_dependencies(&mut self) -> Result<()> {
        for (kind, range) in &self.project.dependencies {
            self.xml.add_leaf(
                "dependency",
                "",
                &[
                    ("type", kind.as_str()),
                    ("minversion", range.min.as_str()),
                    ("maxversion", range.max.as_str()),
                ],
                false,
            );
            self.log.push(format!("Added dependency on {kind}"));
        }

        Ok(())
    }

    /// One `code` group per version.
    ///
    /// Install and uninstall code are raw leaves, left out when empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Document`] if a `code` group cannot be closed.
    fn process_codes(&mut self) -> Result<()> {
        for code in &self.project.codes {
            self.xml.open_group("code", &[("version", code.version.as_str())]);
            self.xml.add_leaf_if_present(
                "installcode",
                code.install_code.as_deref().unwrap_or_default(),
                &[],
                true,
            );
            self.xml.add_leaf_if_present(
                "uninstallcode",
                code.uninstall_code.as_deref().unwrap_or_default(),
                &[],
                true,
            );
            self.xml.close_group()?;

            self.log
                .push(format!("Added install code for version {}", code.version));
        }

        Ok(())
    }

    /// One `cron` group per scheduled task.
    ///
    /// Besides the document entries, each task adds three derived phrases
    /// (`task_<varname>_title`, `_desc`, `_log`) to the `cron` field, and its
    /// script file, resolved against the base path, to the upload list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Document`] if a `cron` group cannot be closed.
    fn process_tasks(&mut self) -> Result<()> {
        let project = self.project;

        for task in &project.tasks {
            self.xml.open_group(
                "cron",
                &[
                    ("varname", task.varname.as_str()),
                    ("active", bool_attr(task.active)),
                    ("loglevel", task.log_level.as_str()),
                ],
            );
            self.xml.add_leaf("filename", &task.filename, &[], false);
            self.xml.add_leaf(
                "scheduling",
                "",
                &[
                    ("weekday", task.schedule.weekday.as_str()),
                    ("day", task.schedule.day.as_str()),
                    ("hour", task.schedule.hour.as_str()),
                    ("minute", task.schedule.minute.as_str()),
                ],
                false,
            );
            self.xml.close_group()?;

            let varname = &task.varname;
            for (suffix, text) in [
                ("title", task.title.as_str()),
                ("desc", task.description.as_str()),
                ("log", task.log_text.as_str()),
            ] {
                self.phrases.add(
                    TASK_FIELD,
                    TASK_FIELD_TITLE,
                    format!("task_{varname}_{suffix}"),
                    text,
                );
            }

            if !task.filename.is_empty() {
                let file = resolve_path(&project.base_path, Path::new(&task.filename));
                if !self.files.contains(&file) {
                    self.files.push(file);
                }
            }

            self.log
                .push(format!("Added scheduled task entitled {}", task.title));
        }

        Ok(())
    }

    /// One `plugin` group per hook, with the code as a raw leaf.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Document`] if the plugin group cannot be closed.
    fn process_plugins(&mut self) -> Result<()> {
        for plugin in &self.project.plugins {
            let execution_order = plugin.execution_order.to_string();
            self.xml.open_group(
                "plugin",
                &[
                    ("active", bool_attr(plugin.active)),
                    ("executionorder", execution_order.as_str()),
                ],
            );
            self.xml.add_leaf("title", &plugin.title, &[], false);
            self.xml.add_leaf("hookname", &plugin.hook_name, &[], false);
            self.xml.add_leaf("phpcode", &plugin.code, &[], true);
            self.xml.close_group()?;

            self.log
                .push(format!("Added plugin on {}", plugin.hook_name));
        }

        Ok(())
    }

    /// One raw `template` leaf per template, dated by its file mtime.
    ///
    /// # Errors
    ///
    /// None; always returns `Ok`.
    fn process_templates(&mut self) -> Result<()> {
        for template in &self.project.templates {
            let date = template.date.to_string();
            self.xml.add_leaf(
                "template",
                &template.body,
                &[
                    ("name", template.name.as_str()),
                    ("templatetype", "template"),
                    ("date", date.as_str()),
                    ("username", template.author.as_str()),
                    ("version", template.version.as_str()),
                ],
                true,
            );

            self.log.push(format!("Added template {}", template.name));
        }

        Ok(())
    }

    /// One `settinggroup` group per option group, one `setting` group per setting.
    ///
    /// Only the setting fields that are present are written. The group title
    /// and every setting title and description become derived phrases in the
    /// `vbsettings` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Document`] if a group cannot be closed.
    fn process_options(&mut self) -> Result<()> {
        let project = self.project;

        for group in &project.option_groups {
            self.phrases.add(
                SETTINGS_FIELD,
                SETTINGS_FIELD_TITLE,
                format!("settinggroup_{}", group.varname),
                &group.title,
            );

            let group_order = group.display_order.to_string();
            self.xml.open_group(
                "settinggroup",
                &[
                    ("name", group.varname.as_str()),
                    ("displayorder", group_order.as_str()),
                ],
            );

            for setting in &group.settings {
                let display_order = setting.display_order.to_string();
                let mut attrs = vec![
                    ("varname", setting.varname.as_str()),
                    ("displayorder", display_order.as_str()),
                ];
                if setting.advanced {
                    attrs.push(("advanced", "1"));
                }
                self.xml.open_group("setting", &attrs);

                for (tag, value) in [
                    ("datatype", &setting.datatype),
                    ("optioncode", &setting.option_code),
                    ("validationcode", &setting.validation_code),
                    ("defaultvalue", &setting.default_value),
                    ("blacklist", &setting.blacklist),
                    ("advanced", &setting.advanced_value),
                ] {
                    if let Some(value) = value {
                        self.xml.add_leaf(tag, value, &[], false);
                    }
                }

                self.xml.close_group()?;

                let varname = &setting.varname;
                self.phrases.add(
                    SETTINGS_FIELD,
                    SETTINGS_FIELD_TITLE,
                    format!("setting_{varname}_title"),
                    &setting.title,
                );
                self.phrases.add(
                    SETTINGS_FIELD,
                    SETTINGS_FIELD_TITLE,
                    format!("setting_{varname}_desc"),
                    &setting.description,
                );

                self.log.push(format!("Added option {varname}"));
            }

            self.xml.close_group()?;
        }

        Ok(())
    }

    /// Merge derived phrases into the discovered ones and write every field.
    ///
    /// Runs last, once every other content type has added its derived
    /// phrases. See [`PhraseAccumulator::merge`] for the precedence rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Document`] if a `phrasetype` group cannot be closed.
    fn process_phrases(&mut self) -> Result<()> {
        let project = self.project;
        let derived = std::mem::take(&mut self.phrases);
        if !derived.is_empty() {
            debug!(count = derived.len(), "merging derived phrases");
        }
        let fields = derived.merge(&project.phrase_fields, &project.meta, project.timestamp);

        for field in &fields {
            self.xml.open_group(
                "phrasetype",
                &[
                    ("name", field.title.as_str()),
                    ("fieldname", field.field_name.as_str()),
                ],
            );

            for (varname, phrase) in &field.phrases {
                let date = phrase.date.to_string();
                self.xml.add_leaf(
                    "phrase",
                    &phrase.text,
                    &[
                        ("name", varname.as_str()),
                        ("date", date.as_str()),
                        ("username", phrase.author.as_str()),
                        ("version", phrase.version.as_str()),
                    ],
                    false,
                );

                self.log.push(format!("Added phrase {varname}"));
            }

            self.xml.close_group()?;
        }

        Ok(())
    }

    /// Mirror explicit files and task scripts into the upload tree.
    ///
    /// A file listed both explicitly and by a task is copied once.
    ///
    /// # Returns
    ///
    /// The destinations of the copied files and their total size in bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::OutsideBase`] if a file is not below the base path
    /// - [`Error::Mirror`] if a copy fails
    fn mirror_files(&mut self) -> Result<(Vec<PathBuf>, u64)> {
        let project = self.project;

        let mut files = project.files.clone();
        for file in &self.files {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }

        if files.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let mirrored = FileMirror::new(&project.base_path).mirror(&files, &project.upload_path())?;

        let mut total = 0;
        let mut destinations = Vec::with_capacity(mirrored.len());
        for file in mirrored {
            self.log
                .push(format!("Copied file {}", file.relative.display()));
            total += file.bytes;
            destinations.push(file.destination);
        }

        self.log.push(format!(
            "Copied {} files ({})",
            destinations.len(),
            format_size(total, DECIMAL)
        ));

        Ok((destinations, total))
    }
}

const fn bool_attr(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;
    use crate::project::{
        CodeVersion, Metadata, Phrase, PhraseField, Plugin, Schedule, ScheduledTask, Setting,
        SettingGroup, Template, VersionRange,
    };

    fn create_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn test_project(tmp: &TempDir) -> Project {
        let mut project = Project::new(
            "demo",
            tmp.path().join("project"),
            tmp.path().join("build"),
        );
        project.base_path = tmp.path().join("forum");
        project.timestamp = 1_700_000_000;
        project.meta = Metadata {
            title: "Demo".to_string(),
            description: "Demo & friends".to_string(),
            version: "1.0.0".to_string(),
            url: "https://example.com".to_string(),
            version_check_url: String::new(),
            author: "someone".to_string(),
        };
        project
    }

    fn build_descriptor(project: &Project) -> String {
        let report = Builder::new(project).build().unwrap();
        fs::read_to_string(report.descriptor).unwrap()
    }

    #[test]
    fn test_empty_project_writes_all_groups_in_order() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp);

        let xml = build_descriptor(&project);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\r\n\r\n"));
        assert!(xml.contains("<product productid=\"demo\" active=\"1\">\n"));
        assert!(xml.contains("\t<title>Demo</title>\n"));
        assert!(xml.contains("\t<description>Demo &amp; friends</description>\n"));
        assert!(xml.contains("\t<versioncheckurl />\n"));
        assert!(xml.ends_with("</product>\n"));

        let positions: Vec<usize> = ContentType::ORDER
            .iter()
            .map(|kind| xml.find(&format!("\t<{}>", kind.group_tag())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_build_creates_missing_build_directory() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.build_path = tmp.path().join("deep/nested/build");

        let report = Builder::new(&project).build().unwrap();

        assert_eq!(
            report.descriptor,
            tmp.path().join("deep/nested/build/product-demo.xml")
        );
        assert!(report.descriptor.is_file());
        assert!(report.copied_files.is_empty());
    }

    #[test]
    fn test_build_directory_failure_is_build_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        create_file(&blocker, "not a directory");

        let mut project = test_project(&tmp);
        project.build_path = blocker.join("build");

        let err = Builder::new(&project).build().unwrap_err();
        assert!(matches!(err, Error::Build { .. }));
    }

    #[test]
    fn test_inactive_project_and_custom_encoding() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.active = false;
        project.encoding = "UTF-8".to_string();

        let xml = build_descriptor(&project);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<product productid=\"demo\" active=\"0\">"));
    }

    #[test]
    fn test_dependencies_one_leaf_each() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.dependencies = BTreeMap::from([
            (
                "php".to_string(),
                VersionRange {
                    min: "5.2.0".to_string(),
                    max: String::new(),
                },
            ),
            (
                "vbulletin".to_string(),
                VersionRange {
                    min: "3.8.0".to_string(),
                    max: "3.8.99".to_string(),
                },
            ),
        ]);

        let xml = build_descriptor(&project);

        assert_eq!(xml.matches("<dependency ").count(), 2);
        assert!(xml.contains("<dependency type=\"php\" minversion=\"5.2.0\" maxversion=\"\" />"));
        assert!(xml.contains(
            "<dependency type=\"vbulletin\" minversion=\"3.8.0\" maxversion=\"3.8.99\" />"
        ));
    }

    #[test]
    fn test_codes_omit_empty_leaves() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.codes = vec![
            CodeVersion {
                version: "1.0.0".to_string(),
                install_code: Some("install();".to_string()),
                uninstall_code: Some(String::new()),
            },
            CodeVersion {
                version: "1.1.0".to_string(),
                install_code: None,
                uninstall_code: Some("uninstall();".to_string()),
            },
        ];

        let xml = build_descriptor(&project);

        assert!(xml.contains(
            "\t\t<code version=\"1.0.0\">\n\
             \t\t\t<installcode><![CDATA[install();]]></installcode>\n\
             \t\t</code>\n"
        ));
        assert!(xml.contains(
            "\t\t<code version=\"1.1.0\">\n\
             \t\t\t<uninstallcode><![CDATA[uninstall();]]></uninstallcode>\n\
             \t\t</code>\n"
        ));
        assert_eq!(xml.matches("<uninstallcode>").count(), 1);
    }

    #[test]
    fn test_tasks_emit_group_phrases_and_upload_file() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        create_file(
            &project.base_path.join("includes/cron/demo.php"),
            "<?php cleanup();",
        );
        project.tasks = vec![ScheduledTask {
            varname: "demo".to_string(),
            filename: "./includes/cron/demo.php".to_string(),
            active: true,
            log_level: "1".to_string(),
            schedule: Schedule {
                hour: "3".to_string(),
                ..Schedule::default()
            },
            title: "Demo Cleanup".to_string(),
            description: "Cleans up".to_string(),
            log_text: "Cleaned".to_string(),
        }];

        let report = Builder::new(&project).build().unwrap();
        let xml = fs::read_to_string(&report.descriptor).unwrap();

        assert!(xml.contains("<cron varname=\"demo\" active=\"1\" loglevel=\"1\">"));
        assert!(xml.contains("<filename>./includes/cron/demo.php</filename>"));
        assert!(xml.contains("<scheduling weekday=\"-1\" day=\"-1\" hour=\"3\" minute=\"0\" />"));
        assert!(xml.contains("<phrasetype name=\"Scheduled Tasks\" fieldname=\"cron\">"));
        assert!(xml.contains(
            "<phrase name=\"task_demo_title\" date=\"1700000000\" username=\"someone\" version=\"1.0.0\">Demo Cleanup</phrase>"
        ));
        assert!(xml.contains("name=\"task_demo_desc\""));
        assert!(xml.contains("name=\"task_demo_log\""));

        let uploaded = project.upload_path().join("includes/cron/demo.php");
        assert_eq!(report.copied_files, vec![uploaded.clone()]);
        assert_eq!(fs::read_to_string(uploaded).unwrap(), "<?php cleanup();");
    }

    #[test]
    fn test_plugins_and_templates() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.plugins = vec![Plugin {
            hook_name: "global_start".to_string(),
            title: "Demo - global_start".to_string(),
            active: true,
            execution_order: 10,
            code: "if ($a < $b) { demo(); }".to_string(),
        }];
        project.templates = vec![Template {
            name: "greeting".to_string(),
            body: "<b>Hello</b>".to_string(),
            version: "1.0.0".to_string(),
            author: "someone".to_string(),
            date: 1_600_000_000,
        }];

        let xml = build_descriptor(&project);

        assert!(xml.contains(
            "\t\t<plugin active=\"1\" executionorder=\"10\">\n\
             \t\t\t<title>Demo - global_start</title>\n\
             \t\t\t<hookname>global_start</hookname>\n\
             \t\t\t<phpcode><![CDATA[if ($a < $b) { demo(); }]]></phpcode>\n\
             \t\t</plugin>\n"
        ));
        assert!(xml.contains(
            "<template name=\"greeting\" templatetype=\"template\" date=\"1600000000\" username=\"someone\" version=\"1.0.0\"><![CDATA[<b>Hello</b>]]></template>"
        ));
    }

    #[test]
    fn test_options_emit_present_fields_and_phrases() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.option_groups = vec![SettingGroup {
            varname: "demo".to_string(),
            display_order: 500,
            title: "Demo Settings".to_string(),
            settings: vec![
                Setting {
                    varname: "demo_enabled".to_string(),
                    display_order: 10,
                    datatype: Some("boolean".to_string()),
                    option_code: Some("yesno".to_string()),
                    default_value: Some("1".to_string()),
                    title: "Enabled".to_string(),
                    description: "Turns the demo on".to_string(),
                    ..Setting::default()
                },
                Setting {
                    varname: "demo_secret".to_string(),
                    display_order: 20,
                    advanced: true,
                    advanced_value: Some("1".to_string()),
                    title: "Secret".to_string(),
                    ..Setting::default()
                },
            ],
        }];

        let xml = build_descriptor(&project);

        assert!(xml.contains(
            "\t\t<settinggroup name=\"demo\" displayorder=\"500\">\n\
             \t\t\t<setting varname=\"demo_enabled\" displayorder=\"10\">\n\
             \t\t\t\t<datatype>boolean</datatype>\n\
             \t\t\t\t<optioncode>yesno</optioncode>\n\
             \t\t\t\t<defaultvalue>1</defaultvalue>\n\
             \t\t\t</setting>\n\
             \t\t\t<setting varname=\"demo_secret\" displayorder=\"20\" advanced=\"1\">\n\
             \t\t\t\t<advanced>1</advanced>\n\
             \t\t\t</setting>\n\
             \t\t</settinggroup>\n"
        ));
        assert!(xml.contains("<phrasetype name=\"vBulletin Settings\" fieldname=\"vbsettings\">"));
        assert!(xml.contains("name=\"settinggroup_demo\""));
        assert!(xml.contains("name=\"setting_demo_enabled_title\""));
        assert!(xml.contains(">Turns the demo on</phrase>"));
        assert!(xml.contains("name=\"setting_demo_secret_desc\""));
    }

    #[test]
    fn test_discovered_phrases_win_over_derived() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.option_groups = vec![SettingGroup {
            varname: "demo".to_string(),
            display_order: 1,
            title: "Derived Title".to_string(),
            settings: Vec::new(),
        }];
        let mut field = PhraseField::new("vbsettings", "Settings");
        field.phrases.insert(
            "settinggroup_demo".to_string(),
            Phrase {
                text: "Translated Title".to_string(),
                author: "translator".to_string(),
                version: "0.9".to_string(),
                date: 1,
            },
        );
        project.phrase_fields = vec![field];

        let xml = build_descriptor(&project);

        assert_eq!(xml.matches("<phrasetype ").count(), 1);
        assert!(xml.contains("<phrasetype name=\"Settings\" fieldname=\"vbsettings\">"));
        assert!(xml.contains(
            "<phrase name=\"settinggroup_demo\" date=\"1\" username=\"translator\" version=\"0.9\">Translated Title</phrase>"
        ));
        assert!(!xml.contains("Derived Title"));
    }

    #[test]
    fn test_explicit_and_task_files_are_copied_once() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        let script = project.base_path.join("includes/cron/demo.php");
        create_file(&script, "<?php");
        project.files = vec![script.clone()];
        project.tasks = vec![ScheduledTask {
            varname: "demo".to_string(),
            filename: "includes/cron/demo.php".to_string(),
            active: true,
            log_level: "0".to_string(),
            schedule: Schedule::default(),
            title: String::new(),
            description: String::new(),
            log_text: String::new(),
        }];

        let report = Builder::new(&project).build().unwrap();

        assert_eq!(report.copied_files.len(), 1);
        assert_eq!(report.copied_bytes, 5);
    }

    #[test]
    fn test_file_outside_base_fails_after_descriptor() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        let stray = tmp.path().join("elsewhere/file.txt");
        create_file(&stray, "stray");
        project.files = vec![stray];

        let err = Builder::new(&project).build().unwrap_err();

        assert!(matches!(err, Error::OutsideBase { .. }));
        assert!(project.descriptor_path().is_file());
    }

    #[test]
    fn test_build_log_lines() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.templates = vec![Template {
            name: "greeting".to_string(),
            body: "Hello".to_string(),
            version: String::new(),
            author: String::new(),
            date: 0,
        }];

        let report = Builder::new(&project).build().unwrap();
        let lines = report.log.lines();

        assert_eq!(lines.first().map(String::as_str), Some("Building project demo"));
        assert!(lines.contains(&"Added template greeting".to_string()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Project Demo Built Successfully!")
        );
        assert_eq!(report.log.to_string().lines().count(), lines.len());
    }

    #[test]
    fn test_report_serializes_log_as_lines() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp);

        let report = Builder::new(&project).build().unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["project_id"], "demo");
        assert!(json["log"].is_array());
        assert_eq!(json["copied_bytes"], 0);
    }

    #[test]
    fn test_descriptor_is_encoded_in_declared_latin1() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.templates = vec![Template {
            name: "greeting".to_string(),
            body: "café".to_string(),
            version: String::new(),
            author: String::new(),
            date: 0,
        }];

        let report = Builder::new(&project).build().unwrap();
        let bytes = fs::read(report.descriptor).unwrap();

        assert!(bytes.starts_with(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>"));
        assert!(bytes.windows(12).any(|w| w == b"<![CDATA[caf"));
        assert!(bytes.windows(4).any(|w| w == b"caf\xe9"));
        assert!(!bytes.windows(2).any(|w| w == b"\xc3\xa9"));
    }

    #[test]
    fn test_descriptor_is_encoded_in_declared_utf8() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.encoding = "UTF-8".to_string();
        project.meta.title = "Café".to_string();

        let report = Builder::new(&project).build().unwrap();
        let xml = fs::read_to_string(report.descriptor).unwrap();

        assert!(xml.contains("<title>Café</title>"));
    }

    #[test]
    fn test_unsupported_encoding_fails_before_writing() {
        let tmp = TempDir::new().unwrap();
        let mut project = test_project(&tmp);
        project.encoding = "UTF-16".to_string();

        let err = Builder::new(&project).build().unwrap_err();

        assert!(matches!(err, Error::UnsupportedEncoding { .. }));
        assert!(!project.build_path.exists());
    }
}
