//! Records for each content type of a project.
//!
//! Every record is the "extended" form of its content type: it carries the
//! full metadata the descriptor needs, already normalized by the loader.

use std::collections::BTreeMap;

/// Install and uninstall code registered for one product version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeVersion {
    /// Version string as it appears in the `up-<version>.php` file name
    pub version: String,

    /// Code run when the product is installed or upgraded to `version`
    pub install_code: Option<String>,

    /// Code run when the product is uninstalled
    pub uninstall_code: Option<String>,
}

/// A template discovered under `templates/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub body: String,
    pub version: String,
    pub author: String,

    /// Last modification time of the template file, in unix seconds
    pub date: i64,
}

/// When a scheduled task runs. `-1` means "every".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub weekday: String,
    pub day: String,
    pub hour: String,
    pub minute: String,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            weekday: "-1".to_string(),
            day: "-1".to_string(),
            hour: "-1".to_string(),
            minute: "0".to_string(),
        }
    }
}

/// A scheduled task defined under `cron/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledTask {
    pub varname: String,

    /// Script run by the task, relative to the project's base path
    pub filename: String,

    pub active: bool,
    pub log_level: String,
    pub schedule: Schedule,
    pub title: String,
    pub description: String,
    pub log_text: String,
}

/// A plugin attached to a hook, discovered under `plugins/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plugin {
    pub hook_name: String,
    pub title: String,
    pub active: bool,
    pub execution_order: i64,
    pub code: String,
}

/// A setting group directory under `options/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingGroup {
    pub varname: String,
    pub display_order: i64,
    pub title: String,
    pub settings: Vec<Setting>,
}

/// A single setting inside a [`SettingGroup`].
///
/// The optional fields are only written to the descriptor when the
/// definition file sets them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Setting {
    pub varname: String,
    pub display_order: i64,
    pub advanced: bool,
    pub datatype: Option<String>,
    pub option_code: Option<String>,
    pub validation_code: Option<String>,
    pub default_value: Option<String>,
    pub blacklist: Option<String>,

    /// Raw `advanced` value as written in the definition file
    pub advanced_value: Option<String>,

    /// Current value, used by the flat accessor in place of the default
    pub value: Option<String>,

    pub title: String,
    pub description: String,
}

/// A single phrase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phrase {
    pub text: String,
    pub author: String,
    pub version: String,
    pub date: i64,
}

/// A phrase type (field) with its phrases keyed by varname.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhraseField {
    pub field_name: String,
    pub title: String,
    pub phrases: BTreeMap<String, Phrase>,
}

impl PhraseField {
    #[must_use]
    pub fn new(field_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            title: title.into(),
            phrases: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_default_runs_hourly() {
        let schedule = Schedule::default();

        assert_eq!(schedule.weekday, "-1");
        assert_eq!(schedule.day, "-1");
        assert_eq!(schedule.hour, "-1");
        assert_eq!(schedule.minute, "0");
    }

    #[test]
    fn test_phrase_field_new_is_empty() {
        let field = PhraseField::new("global", "GLOBAL");

        assert_eq!(field.field_name, "global");
        assert_eq!(field.title, "GLOBAL");
        assert!(field.phrases.is_empty());
    }
}
