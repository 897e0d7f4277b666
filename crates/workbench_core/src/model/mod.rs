//! Domain model for the project → topic → section → entry hierarchy and its
//! versioning records.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own field-level validation shared by repositories and services.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Revisions and snapshots are immutable once persisted.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod hierarchy;
pub mod image;
pub mod project;
pub mod version;

/// Maximum title length for projects, topics, sections and entries.
pub const TITLE_MAX_CHARS: usize = 200;

/// Maximum note length for revisions and snapshots.
pub const NOTE_MAX_CHARS: usize = 200;

/// Field-level validation failure, reported back to callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for FieldError {}

/// Trims and checks a title value.
///
/// Blank titles are rejected unless `allow_blank` is set (entries may be
/// untitled).
pub fn normalize_title(
    field: &'static str,
    value: &str,
    allow_blank: bool,
) -> Result<String, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() && !allow_blank {
        return Err(FieldError::new(field, "must not be blank"));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(FieldError::new(
            field,
            format!("must be at most {TITLE_MAX_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trims a free-text note and checks its length.
pub fn normalize_note(field: &'static str, value: Option<&str>) -> Result<String, FieldError> {
    let trimmed = value.unwrap_or_default().trim();
    if trimmed.chars().count() > NOTE_MAX_CHARS {
        return Err(FieldError::new(
            field,
            format!("must be at most {NOTE_MAX_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_note, normalize_title, TITLE_MAX_CHARS};

    #[test]
    fn normalize_title_trims_and_rejects_blank() {
        assert_eq!(normalize_title("title", "  Тема 1 ", false).unwrap(), "Тема 1");
        let err = normalize_title("title", "   ", false).unwrap_err();
        assert_eq!(err.field, "title");
        assert_eq!(normalize_title("title", "  ", true).unwrap(), "");
    }

    #[test]
    fn normalize_title_counts_chars_not_bytes() {
        let cyrillic = "я".repeat(TITLE_MAX_CHARS);
        assert!(normalize_title("title", &cyrillic, false).is_ok());
        let too_long = "я".repeat(TITLE_MAX_CHARS + 1);
        assert!(normalize_title("title", &too_long, false).is_err());
    }

    #[test]
    fn normalize_note_defaults_to_empty() {
        assert_eq!(normalize_note("note", None).unwrap(), "");
        assert_eq!(normalize_note("note", Some(" v1 ")).unwrap(), "v1");
    }
}
