//! Permissive due-timestamp parsing
//!
//! Accepts the shapes people actually type into front-matter: RFC 3339,
//! ISO-8601 without an offset, a bare date, or epoch milliseconds. Values
//! without an offset are read in the local time zone.

use chrono::{
    DateTime, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc,
};
use serde_yaml::Value;
use std::fmt;

/// Naive date-time layouts tried in order after RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A parsed due value.
///
/// Unparsable input is kept as `Invalid` rather than rejected so the note
/// still yields a declaration. An invalid instant is never before "now".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DueAt {
    Valid(DateTime<Utc>),
    Invalid(String),
}

impl DueAt {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Valid(at) => Some(*at),
            Self::Invalid(_) => None,
        }
    }

    /// Strictly-before comparison used by the sweep.
    pub fn is_before(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Valid(at) => *at < now,
            Self::Invalid(_) => false,
        }
    }

    /// ISO-8601 UTC rendering with millisecond precision, e.g.
    /// `2024-01-01T00:00:00.000Z`.
    pub fn to_iso8601(&self) -> Option<String> {
        self.instant()
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Text fed to the identity digest.
    pub(crate) fn identity_key(&self) -> String {
        match self {
            Self::Valid(at) => at.to_rfc3339_opts(SecondsFormat::Millis, true),
            Self::Invalid(raw) => format!("invalid:{}", raw),
        }
    }
}

impl fmt::Display for DueAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(at) => write!(f, "{}", at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Invalid(raw) => write!(f, "invalid date ({})", raw),
        }
    }
}

/// Parse a timestamp string. Returns `None` when no layout matches.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(local_to_utc(naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(local_to_utc);
    }

    if let Ok(millis) = s.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }

    None
}

/// Interpret a front-matter value as a due instant.
pub fn due_from_value(value: &Value) -> DueAt {
    let parsed = match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };

    match parsed {
        Some(at) => DueAt::Valid(at),
        None => DueAt::Invalid(raw_text(value)),
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{:?}", other)),
    }
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match chrono::Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => naive.and_utc(),
    }
}
