//! Topic, section and entry models.
//!
//! # Invariants
//! - `sort_order` is unique among siblings and starts at 1.
//! - A container's `origin` distinguishes user-created containers from the
//!   system placeholders used to flatten shallow project structures.
//! - An entry's draft is overwritten in place; history lives in revisions.

use super::project::ProjectId;
use super::version::SnapshotId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub type TopicId = Uuid;
pub type SectionId = Uuid;
pub type EntryId = Uuid;

/// Who created a topic or section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerOrigin {
    /// Created by the user and always visible.
    #[default]
    User,
    /// Auto-created placeholder hidden by shallow structure modes.
    System,
}

impl ContainerOrigin {
    pub fn is_system(self) -> bool {
        matches!(self, Self::System)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Entry content category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    #[default]
    Note,
    Prompt,
    Answer,
    Artifact,
    Mixed,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Prompt => "prompt",
            Self::Answer => "answer",
            Self::Artifact => "artifact",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(Self::Note),
            "prompt" => Some(Self::Prompt),
            "answer" => Some(Self::Answer),
            "artifact" => Some(Self::Artifact),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub project_id: ProjectId,
    pub title: String,
    pub sort_order: i64,
    pub origin: ContainerOrigin,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub topic_id: TopicId,
    pub title: String,
    pub sort_order: i64,
    pub origin: ContainerOrigin,
    /// Current published snapshot. A pointer, not ownership.
    pub release_snapshot_id: Option<SnapshotId>,
    pub created_at: i64,
}

/// Rich-text draft payload.
///
/// `delta` is the editor's structured document (Quill delta JSON), `html`
/// its rendering and `text` the plain-text extract used by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub delta: Value,
    pub html: String,
    pub text: String,
}

impl Draft {
    /// Empty editor document: one newline insert and an empty paragraph.
    pub fn empty_document() -> Self {
        Self {
            delta: json!({ "ops": [{ "insert": "\n" }] }),
            html: "<p></p>".to_string(),
            text: String::new(),
        }
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            delta: json!({}),
            html: String::new(),
            text: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub section_id: SectionId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub sort_order: i64,
    pub draft: Draft,
    pub updated_at: i64,
}

/// Input for creating a topic or section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContainer {
    pub title: String,
    /// Explicit sibling position; appended at the end when absent.
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub origin: ContainerOrigin,
}

impl NewContainer {
    pub fn user(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sort_order: None,
            origin: ContainerOrigin::User,
        }
    }

    pub fn system(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sort_order: None,
            origin: ContainerOrigin::System,
        }
    }
}

/// Input for creating an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: EntryType,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub draft: Draft,
}

impl NewEntry {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: EntryType::Note,
            sort_order: None,
            draft: Draft::default(),
        }
    }
}

/// Partial draft save. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPatch {
    #[serde(default, rename = "draft_delta")]
    pub delta: Option<Value>,
    #[serde(default, rename = "draft_html")]
    pub html: Option<String>,
    #[serde(default, rename = "draft_text")]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<EntryType>,
}

impl DraftPatch {
    pub fn is_empty(&self) -> bool {
        self.delta.is_none()
            && self.html.is_none()
            && self.text.is_none()
            && self.title.is_none()
            && self.kind.is_none()
    }
}

/// Section summary used in project tree responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionNode {
    pub id: SectionId,
    pub title: String,
    pub sort_order: i64,
    pub origin: ContainerOrigin,
}

/// Topic with its ordered sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicNode {
    pub id: TopicId,
    pub title: String,
    pub sort_order: i64,
    pub origin: ContainerOrigin,
    pub sections: Vec<SectionNode>,
}

#[cfg(test)]
mod tests {
    use super::{ContainerOrigin, Draft, DraftPatch, EntryType};

    #[test]
    fn empty_document_has_single_newline_op() {
        let draft = Draft::empty_document();
        assert_eq!(draft.delta["ops"][0]["insert"], "\n");
        assert_eq!(draft.html, "<p></p>");
        assert!(draft.text.is_empty());
    }

    #[test]
    fn draft_patch_uses_wire_field_names() {
        let patch: DraftPatch =
            serde_json::from_str(r#"{"draft_text":"hello","type":"prompt"}"#).unwrap();
        assert_eq!(patch.text.as_deref(), Some("hello"));
        assert_eq!(patch.kind, Some(EntryType::Prompt));
        assert!(patch.delta.is_none());
        assert!(!patch.is_empty());
        assert!(DraftPatch::default().is_empty());
    }

    #[test]
    fn origin_marks_system_containers() {
        assert!(ContainerOrigin::System.is_system());
        assert!(!ContainerOrigin::User.is_system());
        assert_eq!(ContainerOrigin::parse("system"), Some(ContainerOrigin::System));
    }
}
