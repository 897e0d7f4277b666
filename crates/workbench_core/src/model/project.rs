//! Project domain model.
//!
//! # Invariants
//! - `structure` decides how many hierarchy levels are user-visible; the
//!   hidden levels are filled with system containers.
//! - Timestamps are Unix epoch milliseconds.

use super::{normalize_title, FieldError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Done,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// How many hierarchy levels a project exposes.
///
/// - `Topics`: Project → Topics → Sections → Entries.
/// - `Sections`: Project → Sections → Entries (one system topic).
/// - `Entries`: Project → Entries (system topic + system section).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStructure {
    Topics,
    #[default]
    Sections,
    Entries,
}

impl ProjectStructure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Topics => "topics",
            Self::Sections => "sections",
            Self::Entries => "entries",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "topics" => Some(Self::Topics),
            "sections" => Some(Self::Sections),
            "entries" => Some(Self::Entries),
            _ => None,
        }
    }
}

/// Persisted project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub status: ProjectStatus,
    pub structure: ProjectStructure,
    pub pinned: bool,
    pub last_opened_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub structure: ProjectStructure,
    #[serde(default)]
    pub pinned: bool,
}

impl NewProject {
    pub fn new(title: impl Into<String>, structure: ProjectStructure) -> Self {
        Self {
            title: title.into(),
            status: ProjectStatus::default(),
            structure,
            pinned: false,
        }
    }

    /// Returns a copy with the title trimmed, or the first field error.
    pub fn validated(&self) -> Result<Self, FieldError> {
        Ok(Self {
            title: normalize_title("title", &self.title, false)?,
            ..self.clone()
        })
    }
}

/// Partial project update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub status: Option<ProjectStatus>,
    pub structure: Option<ProjectStructure>,
    pub pinned: Option<bool>,
}

impl ProjectPatch {
    /// Applies the patch onto `project`, validating changed fields.
    pub fn apply_to(&self, project: &mut Project) -> Result<(), FieldError> {
        if let Some(title) = self.title.as_deref() {
            project.title = normalize_title("title", title, false)?;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(structure) = self.structure {
            project.structure = structure;
        }
        if let Some(pinned) = self.pinned {
            project.pinned = pinned;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{NewProject, ProjectStatus, ProjectStructure};

    #[test]
    fn new_project_deserializes_with_defaults() {
        let value: NewProject = serde_json::from_str(r#"{"title":"Roadmap"}"#).unwrap();
        assert_eq!(value.status, ProjectStatus::Active);
        assert_eq!(value.structure, ProjectStructure::Sections);
        assert!(!value.pinned);
    }

    #[test]
    fn structure_round_trips_through_db_text() {
        for structure in [
            ProjectStructure::Topics,
            ProjectStructure::Sections,
            ProjectStructure::Entries,
        ] {
            assert_eq!(ProjectStructure::parse(structure.as_str()), Some(structure));
        }
        assert_eq!(ProjectStructure::parse("flat"), None);
    }
}
