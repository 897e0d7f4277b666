//! Revision and snapshot models.
//!
//! # Invariants
//! - `rev_no` starts at 1 and only grows, per entry for revisions and per
//!   section (across both kinds) for snapshots.
//! - A snapshot item's revision belongs to the item's entry.
//! - Nothing here is mutated after creation.

use super::hierarchy::{EntryId, SectionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type RevisionId = Uuid;
pub type SnapshotId = Uuid;
pub type SnapshotItemId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Ad-hoc checkpoint.
    #[default]
    Snapshot,
    /// Published state, tracked by the section's release pointer.
    Release,
}

impl SnapshotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Release => "release",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "snapshot" => Some(Self::Snapshot),
            "release" => Some(Self::Release),
            _ => None,
        }
    }
}

/// Immutable copy of one entry's draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRevision {
    pub id: RevisionId,
    pub entry_id: EntryId,
    pub rev_no: i64,
    pub delta: Value,
    pub html: String,
    pub text: String,
    pub note: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSnapshot {
    pub id: SnapshotId,
    pub section_id: SectionId,
    pub kind: SnapshotKind,
    pub rev_no: i64,
    pub note: String,
    pub created_at: i64,
}

/// Position of one (entry, revision) pair inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub id: SnapshotItemId,
    pub snapshot_id: SnapshotId,
    pub entry_id: EntryId,
    pub entry_revision_id: RevisionId,
    pub sort_order: i64,
}

/// Snapshot together with its ordered items and their revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDetail {
    pub snapshot: SectionSnapshot,
    pub items: Vec<SnapshotItemDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotItemDetail {
    pub item: SnapshotItem,
    pub revision: EntryRevision,
}

/// Body of a section snapshot request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    #[serde(default)]
    pub note: Option<String>,
    /// Restricts the snapshot to these entries; `None` means all entries.
    #[serde(default)]
    pub entry_ids: Option<Vec<EntryId>>,
}

/// Body of a section release request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotReceipt {
    pub snapshot_id: SnapshotId,
    pub rev_no: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseReceipt {
    pub release_snapshot_id: SnapshotId,
    pub rev_no: i64,
}
