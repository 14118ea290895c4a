//! Derived phrase collection and merging.
//!
//! Scheduled tasks and settings don't carry their titles and descriptions
//! inline; the descriptor stores them as phrases. The builder records those
//! derived phrases here while processing the other content types, then merges
//! them with the phrase fields discovered on disk.

use std::collections::BTreeMap;

use crate::project::{Metadata, Phrase, PhraseField};

/// Phrase field holding scheduled task titles, descriptions and log texts.
pub const TASK_FIELD: &str = "cron";
pub const TASK_FIELD_TITLE: &str = "Scheduled Tasks";

/// Phrase field holding setting group and setting titles and descriptions.
pub const SETTINGS_FIELD: &str = "vbsettings";
pub const SETTINGS_FIELD_TITLE: &str = "vBulletin Settings";

#[derive(Debug)]
struct DerivedField {
    field_name: String,
    title: String,
    phrases: BTreeMap<String, String>,
}

/// Derived phrases, grouped by field in the order fields were first used.
#[derive(Debug, Default)]
pub struct PhraseAccumulator {
    fields: Vec<DerivedField>,
}

impl PhraseAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a derived phrase.
    ///
    /// A later phrase with the same varname in the same field replaces the
    /// earlier one. The field title is only used the first time a field is
    /// seen.
    ///
    /// # Arguments
    ///
    /// * `field_name` - The phrase field, such as `cron` or `vbsettings`
    /// * `field_title` - Title for the field if no discovered field exists
    /// * `varname` - The phrase name, such as `task_demo_title`
    /// * `text` - The phrase text
    ///
    /// # Examples
    ///
    /// ```
    /// # use vde_builder::builder::phrases::{PhraseAccumulator, TASK_FIELD, TASK_FIELD_TITLE};
    /// let mut phrases = PhraseAccumulator::new();
    /// phrases.add(TASK_FIELD, TASK_FIELD_TITLE, "task_demo_title".to_string(), "Demo");
    /// assert_eq!(phrases.len(), 1);
    /// ```
    pub fn add(&mut self, field_name: &str, field_title: &str, varname: String, text: &str) {
        let index = match self.fields.iter().position(|f| f.field_name == field_name) {
            Some(index) => index,
            None => {
                self.fields.push(DerivedField {
                    field_name: field_name.to_string(),
                    title: field_title.to_string(),
                    phrases: BTreeMap::new(),
                });
                self.fields.len() - 1
            }
        };

        self.fields[index].phrases.insert(varname, text.to_string());
    }

    /// Total number of derived phrases across all fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.iter().map(|f| f.phrases.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge the derived phrases into the discovered phrase fields.
    ///
    /// Discovered fields keep their position, title and phrases. Derived
    /// phrases only fill in varnames the discovered field lacks. Derived
    /// fields with no discovered counterpart are appended under their own
    /// title. Derived phrases are attributed to the project author and
    /// version and dated `date`.
    ///
    /// # Arguments
    ///
    /// * `discovered` - Phrase fields loaded from the project, in scan order
    /// * `meta` - Project metadata, for the author and version of derived phrases
    /// * `date` - Unix timestamp given to derived phrases
    ///
    /// # Returns
    ///
    /// The merged fields: discovered ones first, then derived-only ones.
    #[must_use]
    pub fn merge(self, discovered: &[PhraseField], meta: &Metadata, date: i64) -> Vec<PhraseField> {
        let mut merged = discovered.to_vec();

        for derived in self.fields {
            let index = match merged
                .iter()
                .position(|f| f.field_name == derived.field_name)
            {
                Some(index) => index,
                None => {
                    merged.push(PhraseField::new(derived.field_name, derived.title));
                    merged.len() - 1
                }
            };

            let field = &mut merged[index];
            for (varname, text) in derived.phrases {
                field.phrases.entry(varname).or_insert_with(|| Phrase {
                    text,
                    author: meta.author.clone(),
                    version: meta.version.clone(),
                    date,
                });
            }
        }

        merged
    }
}
