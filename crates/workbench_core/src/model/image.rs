//! Image asset model.

use super::hierarchy::EntryId;
use super::project::ProjectId;
use serde::Serialize;
use uuid::Uuid;

pub type ImageId = Uuid;

/// Persisted image row. `file_path` is relative to the media root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub id: ImageId,
    pub project_id: Option<ProjectId>,
    pub entry_id: Option<EntryId>,
    pub file_path: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: i64,
}

/// Raw upload as received from the outer transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// When set, the project is derived from the entry.
    pub entry_id: Option<EntryId>,
    pub project_id: Option<ProjectId>,
}

/// Upload response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub id: ImageId,
    pub url: String,
    pub width: u32,
    pub height: u32,
}
