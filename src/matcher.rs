//! Name matching against date/time templates.

use regex::Regex;
use time::PrimitiveDateTime;

use crate::template::DateTimeTemplate;
use crate::{Error, Result};

/// How much of a timestamp a name actually carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Specificity {
    /// The name encodes a date (and possibly a time of day).
    Full,
    /// The name encodes only a time of day; the date comes from the folder.
    TimeOnly,
    /// The name is constant; the timestamp is the folder's.
    FolderOnly,
    /// The name is constant and has not been combined with a folder date yet.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameMatch {
    /// Parsed value. Time-only matches carry [`crate::template::ZERO_DATE`].
    pub timestamp: PrimitiveDateTime,
    pub specificity: Specificity,
}

/// Matches raw names against a template, optionally after a regular
/// expression has cut the relevant parts out of the name.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    template: DateTimeTemplate,
    preselector: Option<Regex>,
}

impl NameMatcher {
    pub fn new(template: DateTimeTemplate) -> Self {
        Self {
            template,
            preselector: None,
        }
    }

    /// The capture groups of `pattern` are concatenated and the result is
    /// matched against `template` instead of the raw name.
    pub fn with_preselector(template: DateTimeTemplate, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|err| Error::config(format!("invalid preselector '{pattern}': {err}")))?;
        Ok(Self {
            template,
            preselector: Some(regex),
        })
    }

    pub fn template(&self) -> &DateTimeTemplate {
        &self.template
    }

    pub fn match_name(&self, name: &str) -> Option<NameMatch> {
        let timestamp = match &self.preselector {
            Some(regex) => {
                let captures = regex.captures(name)?;
                let selected: String = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|group| group.as_str())
                    .collect();
                self.template.parse_value(&selected)?
            }
            None => self.template.parse_value(name)?,
        };

        let specificity = if self.template.has_date() {
            Specificity::Full
        } else if self.template.has_time() {
            Specificity::TimeOnly
        } else {
            Specificity::None
        };

        Some(NameMatch {
            timestamp,
            specificity,
        })
    }
}

/// Combine a name match with the date of the folder containing it.
///
/// Returns `None` when the name needs a folder date and none is known.
pub fn resolve_file_begin(
    found: NameMatch,
    folder_date: Option<PrimitiveDateTime>,
) -> Option<(PrimitiveDateTime, Specificity)> {
    match found.specificity {
        Specificity::Full => Some((found.timestamp, Specificity::Full)),
        Specificity::TimeOnly => folder_date.map(|folder| {
            (
                PrimitiveDateTime::new(folder.date(), found.timestamp.time()),
                Specificity::TimeOnly,
            )
        }),
        Specificity::FolderOnly | Specificity::None => {
            folder_date.map(|folder| (folder, Specificity::FolderOnly))
        }
    }
}
