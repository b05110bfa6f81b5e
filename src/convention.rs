//! Per-stream naming conventions.
//!
//! A [`NamingConvention`] describes how one stream lays its files out on
//! disk: a coarse-to-fine list of folder templates, a file template, an
//! optional regex pre-selection, the nominal period a file covers and the
//! offset of the naming clock from UTC. [`CompiledConvention`] is the
//! validated form the discovery and read paths work with.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, PrimitiveDateTime, Time};

use crate::matcher::NameMatcher;
use crate::template::{DateTimeTemplate, ZERO_DATE};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    /// Folder templates from the outermost to the innermost level.
    #[serde(default)]
    pub path_segments: Vec<String>,
    pub file_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_date_time_preselector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_date_time_selector: Option<String>,
    #[serde(with = "timespan")]
    pub file_period: Duration,
    /// Local naming time minus UTC.
    #[serde(default, with = "timespan")]
    pub utc_offset: Duration,
}

impl NamingConvention {
    pub fn new<I, S>(
        path_segments: I,
        file_template: impl Into<String>,
        file_period: Duration,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path_segments: path_segments.into_iter().map(Into::into).collect(),
            file_template: file_template.into(),
            file_date_time_preselector: None,
            file_date_time_selector: None,
            file_period,
            utc_offset: Duration::ZERO,
        }
    }

    pub fn with_utc_offset(mut self, utc_offset: Duration) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    pub fn with_preselector(
        mut self,
        preselector: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        self.file_date_time_preselector = Some(preselector.into());
        self.file_date_time_selector = Some(selector.into());
        self
    }

    /// Validate the convention and compile its templates.
    pub fn compile(&self) -> Result<CompiledConvention> {
        if !self.file_period.is_positive() {
            return Err(Error::config(format!(
                "file period must be positive, got {}",
                self.file_period
            )));
        }

        let folder_matchers = self
            .path_segments
            .iter()
            .map(|segment| DateTimeTemplate::parse(segment).map(NameMatcher::new))
            .collect::<Result<Vec<_>>>()?;
        let file_template = DateTimeTemplate::parse(&self.file_template)?;

        let preselector = self
            .file_date_time_preselector
            .as_deref()
            .filter(|pattern| !pattern.trim().is_empty());
        let selector = self
            .file_date_time_selector
            .as_deref()
            .filter(|pattern| !pattern.is_empty());

        let file_matcher = match (preselector, selector) {
            (Some(pattern), Some(selector)) => {
                NameMatcher::with_preselector(DateTimeTemplate::parse(selector)?, pattern)?
            }
            (Some(_), None) => {
                return Err(Error::config(
                    "a file date/time preselector requires a file date/time selector",
                ))
            }
            (None, _) => NameMatcher::new(file_template.clone()),
        };

        Ok(CompiledConvention {
            source: self.clone(),
            folder_matchers,
            file_template,
            file_matcher,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledConvention {
    source: NamingConvention,
    folder_matchers: Vec<NameMatcher>,
    file_template: DateTimeTemplate,
    file_matcher: NameMatcher,
}

impl CompiledConvention {
    pub fn convention(&self) -> &NamingConvention {
        &self.source
    }

    /// One matcher per folder level, outermost first.
    pub fn folder_matchers(&self) -> &[NameMatcher] {
        &self.folder_matchers
    }

    /// Template used to build file names when locating files.
    pub fn file_template(&self) -> &DateTimeTemplate {
        &self.file_template
    }

    /// Matcher used to recover timestamps from listed file names.
    pub fn file_matcher(&self) -> &NameMatcher {
        &self.file_matcher
    }

    pub fn file_period(&self) -> Duration {
        self.source.file_period
    }

    pub fn utc_offset(&self) -> Duration {
        self.source.utc_offset
    }

    /// Shift a UTC instant into the naming clock.
    pub fn to_local(&self, utc: OffsetDateTime) -> PrimitiveDateTime {
        let local = utc.saturating_add(self.source.utc_offset);
        PrimitiveDateTime::new(local.date(), local.time())
    }

    /// Shift a naming-clock timestamp back to UTC.
    pub fn to_utc(&self, local: PrimitiveDateTime) -> OffsetDateTime {
        local.saturating_sub(self.source.utc_offset).assume_utc()
    }

    /// Round a naming-clock timestamp down to a file period boundary.
    ///
    /// Boundaries are whole multiples of the period counted from
    /// 0001-01-01 00:00, so weekly periods start on Mondays.
    pub fn round_down(&self, local: PrimitiveDateTime) -> PrimitiveDateTime {
        let anchor = PrimitiveDateTime::new(ZERO_DATE, Time::MIDNIGHT);
        let elapsed = (local - anchor).whole_nanoseconds();
        let period = self.source.file_period.whole_nanoseconds();
        let floored = elapsed - elapsed.rem_euclid(period);
        anchor
            .checked_add(Duration::nanoseconds_i128(floored))
            .unwrap_or(local)
    }
}

/// Durations written as `[-][d.]hh:mm[:ss[.fffffff]]` or as whole seconds.
pub mod timespan {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(i64),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => parse(&text).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid time span '{text}'"))
            }),
            Raw::Seconds(seconds) => Ok(Duration::seconds(seconds)),
        }
    }

    pub fn parse(text: &str) -> Option<Duration> {
        let text = text.trim();
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let parts: Vec<&str> = body.split(':').collect();
        let magnitude = match parts.as_slice() {
            [days] => Duration::days(days.parse().ok()?),
            [head, minutes, rest @ ..] if rest.len() <= 1 => {
                let (days, hours) = match head.split_once('.') {
                    Some((days, hours)) => (days.parse::<i64>().ok()?, hours),
                    None => (0, *head),
                };
                let hours: i64 = hours.parse().ok()?;
                let minutes: i64 = minutes.parse().ok()?;
                let (seconds, nanos) = match rest.first() {
                    Some(seconds) => parse_seconds(seconds)?,
                    None => (0, 0),
                };
                if hours >= 24 || minutes >= 60 || seconds >= 60 {
                    return None;
                }
                Duration::days(days)
                    + Duration::hours(hours)
                    + Duration::minutes(minutes)
                    + Duration::seconds(seconds)
                    + Duration::nanoseconds(nanos)
            }
            _ => return None,
        };

        Some(if negative { -magnitude } else { magnitude })
    }

    pub fn format(value: Duration) -> String {
        let sign = if value.is_negative() { "-" } else { "" };
        let value = value.abs();
        let days = value.whole_days();
        let hours = value.whole_hours() % 24;
        let minutes = value.whole_minutes() % 60;
        let seconds = value.whole_seconds() % 60;
        let ticks = value.subsec_nanoseconds() / 100;

        let mut out = String::from(sign);
        if days > 0 {
            out.push_str(&format!("{days}."));
        }
        out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
        if ticks > 0 {
            out.push_str(&format!(".{ticks:07}"));
        }
        out
    }

    fn parse_seconds(text: &str) -> Option<(i64, i64)> {
        match text.split_once('.') {
            Some((seconds, fraction)) => {
                if fraction.is_empty() || fraction.len() > 9 {
                    return None;
                }
                let scale = 10i64.pow(9 - fraction.len() as u32);
                Some((seconds.parse().ok()?, fraction.parse::<i64>().ok()? * scale))
            }
            None => Some((text.parse().ok()?, 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn preselector_without_selector_is_rejected() {
        let mut convention = NamingConvention::new(["yyyy-MM"], "yyyy-MM-dd", Duration::DAY);
        convention.file_date_time_preselector = Some(r"(\d+)".to_string());

        let err = convention.compile().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn non_positive_period_is_rejected() {
        let convention = NamingConvention::new(Vec::<String>::new(), "yyyy", Duration::ZERO);
        assert!(matches!(convention.compile(), Err(Error::Configuration(_))));
    }

    #[test]
    fn local_and_utc_round_trip_through_offset() {
        let compiled = NamingConvention::new(["yyyy"], "yyyy-MM-dd_HH", Duration::HOUR)
            .with_utc_offset(Duration::hours(2))
            .compile()
            .unwrap();

        let utc = datetime!(2020-01-01 23:00 UTC);
        let local = compiled.to_local(utc);
        assert_eq!(local, datetime!(2020-01-02 01:00));
        assert_eq!(compiled.to_utc(local), utc);
    }

    #[test]
    fn rounds_down_to_file_period() {
        let compiled = NamingConvention::new(["yyyy"], "yyyy-MM-dd_HH-mm", Duration::minutes(10))
            .compile()
            .unwrap();
        assert_eq!(
            compiled.round_down(datetime!(2020-01-01 12:17:31)),
            datetime!(2020-01-01 12:10)
        );
    }

    #[test]
    fn weekly_periods_start_on_mondays() {
        let compiled = NamingConvention::new(["yyyy"], "yyyy-MM-dd", Duration::WEEK)
            .compile()
            .unwrap();
        assert_eq!(
            compiled.round_down(datetime!(2020-01-08 12:00)),
            datetime!(2020-01-06 00:00)
        );
        assert_eq!(
            compiled.round_down(datetime!(2020-01-06 00:00)),
            datetime!(2020-01-06 00:00)
        );
    }

    #[test]
    fn timespan_strings() {
        assert_eq!(timespan::parse("00:10:00"), Some(Duration::minutes(10)));
        assert_eq!(timespan::parse("1.00:00:00"), Some(Duration::DAY));
        assert_eq!(timespan::parse("-02:00:00"), Some(Duration::hours(-2)));
        assert_eq!(timespan::parse("00:00:00.5"), Some(Duration::milliseconds(500)));
        assert_eq!(timespan::parse("1"), Some(Duration::DAY));
        assert_eq!(timespan::parse("25:00:00"), None);
        assert_eq!(timespan::format(Duration::DAY + Duration::minutes(5)), "1.00:05:00");
        assert_eq!(timespan::format(Duration::hours(-2)), "-02:00:00");
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "path_segments": ["yyyy-MM", "yyyy-MM-dd"],
            "file_template": "yyyy-MM-dd_HH-mm-ss",
            "file_period": "1.00:00:00",
            "utc_offset": 3600
        }"#;
        let convention: NamingConvention = serde_json::from_str(json).unwrap();
        assert_eq!(convention.file_period, Duration::DAY);
        assert_eq!(convention.utc_offset, Duration::HOUR);
        assert!(convention.file_date_time_preselector.is_none());
        assert!(convention.compile().is_ok());
    }
}
