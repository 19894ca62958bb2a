//! Due-date extraction from note front-matter
//!
//! A note declares a due date in a YAML header delimited by `---` lines:
//!
//! ```text
//! ---
//! due: 2024-01-01T00:00:00Z
//! title: Pay taxes
//! ---
//! # Body
//! ```
//!
//! Only the configured key is inspected, so a note yields at most one
//! [`DueDeclaration`] per parse.

mod timestamp;

pub use timestamp::{due_from_value, parse_timestamp, DueAt};

use serde_yaml::Value;
use thiserror::Error;

/// Line that opens and closes the header block.
pub const HEADER_DELIMITER: &str = "---";

/// Errors raised while reading a note's header.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed front-matter: {0}")]
    Header(#[from] serde_yaml::Error),
}

/// A due date found in one note on one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueDeclaration {
    pub due_at: DueAt,
    pub title: String,
    pub body: String,
}

/// Return the raw header block, or `None` when the note does not open
/// with a delimiter line.
///
/// The block runs up to the next delimiter line. A header that is never
/// closed extends to the end of the note.
pub fn header_block(content: &str) -> Option<String> {
    let mut lines = content.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    if lines.next()? != HEADER_DELIMITER {
        return None;
    }

    let header: Vec<&str> = lines.take_while(|l| *l != HEADER_DELIMITER).collect();
    Some(header.join("\n"))
}

/// Parse the header of `content` and look up `due_key`.
///
/// `base_name` is the note's file name without directory or extension; it
/// fills in `title` and `body` when the header omits them.
pub fn extract_due(
    content: &str,
    due_key: &str,
    base_name: &str,
) -> Result<Option<DueDeclaration>, ExtractError> {
    let Some(header) = header_block(content) else {
        return Ok(None);
    };
    if header.trim().is_empty() {
        return Ok(None);
    }

    let payload: Value = serde_yaml::from_str(&header)?;
    let Some(due_value) = payload.get(due_key) else {
        return Ok(None);
    };

    let title = text_field(&payload, "title").unwrap_or_else(|| base_name.to_string());
    let body = text_field(&payload, "body")
        .unwrap_or_else(|| format!("Notification from {}", base_name));

    Ok(Some(DueDeclaration {
        due_at: due_from_value(due_value),
        title,
        body,
    }))
}

/// Scalar header field rendered as text. Falsy values (null, `false`,
/// zero, NaN, empty string) count as absent.
fn text_field(payload: &Value, key: &str) -> Option<String> {
    let text = match payload.get(key)? {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()) => return None,
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_header_block() {
        let content = "---\ndue: 2024-01-01\ntitle: Test\n---\n\n# Content\n";
        let header = header_block(content).unwrap();
        assert_eq!(header, "due: 2024-01-01\ntitle: Test");
    }

    #[test]
    fn test_header_block_crlf() {
        let content = "---\r\ndue: 2024-01-01\r\n---\r\nbody";
        assert_eq!(header_block(content).unwrap(), "due: 2024-01-01");
    }

    #[test]
    fn test_header_block_requires_leading_delimiter() {
        assert!(header_block("# Title\n---\ndue: 2024-01-01\n---\n").is_none());
        assert!(header_block("\n---\ndue: 2024-01-01\n---\n").is_none());
        assert!(header_block("----\ndue: 2024-01-01\n---\n").is_none());
    }

    #[test]
    fn test_header_block_unterminated() {
        let content = "---\ndue: 2024-01-01\ntitle: Open";
        assert_eq!(header_block(content).unwrap(), "due: 2024-01-01\ntitle: Open");
    }

    #[test]
    fn test_extract_defaults_from_base_name() {
        let content = "---\ndue: 2024-01-01T00:00:00Z\n---\n";
        let decl = extract_due(content, "due", "Taxes").unwrap().unwrap();
        assert_eq!(
            decl,
            DueDeclaration {
                due_at: DueAt::Valid(utc("2024-01-01T00:00:00Z")),
                title: "Taxes".to_string(),
                body: "Notification from Taxes".to_string(),
            }
        );
    }

    #[test]
    fn test_extract_title_and_body_overrides() {
        let content = "---\ndue: 2024-01-01T00:00:00Z\ntitle: File taxes\nbody: Before noon\n---\n";
        let decl = extract_due(content, "due", "Taxes").unwrap().unwrap();
        assert_eq!(decl.title, "File taxes");
        assert_eq!(decl.body, "Before noon");
    }

    #[test]
    fn test_extract_empty_title_falls_back() {
        let content = "---\ndue: 2024-01-01T00:00:00Z\ntitle: \"\"\nbody:\n---\n";
        let decl = extract_due(content, "due", "Taxes").unwrap().unwrap();
        assert_eq!(decl.title, "Taxes");
        assert_eq!(decl.body, "Notification from Taxes");
    }

    #[test]
    fn test_extract_falsy_title_falls_back() {
        let content = "---\ndue: 2024-01-01T00:00:00Z\ntitle: false\nbody: 0\n---\n";
        let decl = extract_due(content, "due", "Taxes").unwrap().unwrap();
        assert_eq!(decl.title, "Taxes");
        assert_eq!(decl.body, "Notification from Taxes");

        let content = "---\ndue: 2024-01-01T00:00:00Z\ntitle: 2024\nbody: true\n---\n";
        let decl = extract_due(content, "due", "Taxes").unwrap().unwrap();
        assert_eq!(decl.title, "2024");
        assert_eq!(decl.body, "true");
    }

    #[test]
    fn test_extract_custom_key() {
        let content = "---\ndue: 2030-01-01T00:00:00Z\ndeadline: 2024-06-01T12:00:00Z\n---\n";
        let decl = extract_due(content, "deadline", "Report").unwrap().unwrap();
        assert_eq!(decl.due_at, DueAt::Valid(utc("2024-06-01T12:00:00Z")));
    }

    #[test]
    fn test_extract_missing_key() {
        let content = "---\ntitle: No due here\n---\n";
        assert!(extract_due(content, "due", "Note").unwrap().is_none());
    }

    #[test]
    fn test_extract_no_header() {
        let content = "# Just a heading\n\ndue: 2024-01-01\n";
        assert!(extract_due(content, "due", "Note").unwrap().is_none());
    }

    #[test]
    fn test_extract_empty_header() {
        assert!(extract_due("---\n---\n", "due", "Note").unwrap().is_none());
    }

    #[test]
    fn test_extract_malformed_header() {
        let content = "---\ndue: [2024-01-01\ntitle: broken\n---\n";
        let err = extract_due(content, "due", "Note").unwrap_err();
        assert!(matches!(err, ExtractError::Header(_)));
    }

    #[test]
    fn test_extract_unparsable_due_still_declares() {
        let content = "---\ndue: whenever\n---\n";
        let decl = extract_due(content, "due", "Someday").unwrap().unwrap();
        assert_eq!(decl.due_at, DueAt::Invalid("whenever".to_string()));
        assert_eq!(decl.title, "Someday");
    }

    #[test]
    fn test_extract_numeric_title() {
        let content = "---\ndue: 2024-01-01T00:00:00Z\ntitle: 42\n---\n";
        let decl = extract_due(content, "due", "Note").unwrap().unwrap();
        assert_eq!(decl.title, "42");
    }
}
