//! Revision, snapshot and release use-cases.
//!
//! # Responsibility
//! - Validate notes and selections before versioning writes.
//! - Expose read models for revision and snapshot history.
//!
//! # Invariants
//! - A release always covers every entry of its section.
//! - Referenced revisions are never deleted; the attempt is a conflict.

use crate::model::hierarchy::{EntryId, SectionId};
use crate::model::version::{
    EntryRevision, ReleaseReceipt, ReleaseRequest, RevisionId, SectionSnapshot, SnapshotDetail,
    SnapshotId, SnapshotItemDetail, SnapshotKind, SnapshotReceipt, SnapshotRequest,
};
use crate::model::{normalize_note, FieldError};
use crate::repo::version_repo::{EntrySelection, VersionRepository};
use crate::repo::RepoError;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug)]
pub enum VersionServiceError {
    /// Input field rejected.
    Validation(FieldError),
    /// Entry, section, revision or snapshot does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Store refused the write, e.g. deleting a referenced revision.
    Conflict(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for VersionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VersionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for VersionServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::IntegrityViolation(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

impl From<FieldError> for VersionServiceError {
    fn from(value: FieldError) -> Self {
        Self::Validation(value)
    }
}

pub type VersionResult<T> = Result<T, VersionServiceError>;

pub struct VersionService<R: VersionRepository> {
    repo: R,
}

impl<R: VersionRepository> VersionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Captures one entry's current draft as a new revision.
    pub fn capture_revision(
        &self,
        entry_id: EntryId,
        note: Option<&str>,
    ) -> VersionResult<EntryRevision> {
        let note = normalize_note("note", note)?;
        let revision = self.repo.capture_revision(entry_id, &note)?;
        info!(
            "event=revision_capture module=version status=ok entry_id={entry_id} rev_no={}",
            revision.rev_no
        );
        Ok(revision)
    }

    /// Snapshots all entries of a section, or the requested subset in
    /// section order.
    pub fn snapshot_section(
        &self,
        section_id: SectionId,
        request: &SnapshotRequest,
    ) -> VersionResult<SnapshotReceipt> {
        let note = normalize_note("note", request.note.as_deref())?;
        let selection = match &request.entry_ids {
            Some(ids) => EntrySelection::Only(ids.clone()),
            None => EntrySelection::All,
        };
        let snapshot = self.write_snapshot(section_id, SnapshotKind::Snapshot, &note, &selection)?;
        Ok(SnapshotReceipt {
            snapshot_id: snapshot.id,
            rev_no: snapshot.rev_no,
        })
    }

    /// Releases the full section and points the section at the release.
    pub fn make_release(
        &self,
        section_id: SectionId,
        request: &ReleaseRequest,
    ) -> VersionResult<ReleaseReceipt> {
        let note = normalize_note("note", request.note.as_deref())?;
        let snapshot =
            self.write_snapshot(section_id, SnapshotKind::Release, &note, &EntrySelection::All)?;
        Ok(ReleaseReceipt {
            release_snapshot_id: snapshot.id,
            rev_no: snapshot.rev_no,
        })
    }

    fn write_snapshot(
        &self,
        section_id: SectionId,
        kind: SnapshotKind,
        note: &str,
        selection: &EntrySelection,
    ) -> VersionResult<SectionSnapshot> {
        let started_at = Instant::now();
        let kind_name = kind.as_str();
        info!("event=section_{kind_name} module=version status=start section_id={section_id}");
        match self.repo.create_snapshot(section_id, kind, note, selection) {
            Ok((snapshot, items)) => {
                info!(
                    "event=section_{kind_name} module=version status=ok section_id={section_id} snapshot_id={} rev_no={} items={} duration_ms={}",
                    snapshot.id,
                    snapshot.rev_no,
                    items.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(snapshot)
            }
            Err(err) => {
                error!(
                    "event=section_{kind_name} module=version status=error section_id={section_id} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
        }
    }

    pub fn get_revision(&self, id: RevisionId) -> VersionResult<EntryRevision> {
        self.repo
            .get_revision(id)?
            .ok_or(VersionServiceError::NotFound {
                entity: "entry revision",
                id,
            })
    }

    /// Revisions of one entry, newest first.
    pub fn list_revisions(&self, entry_id: EntryId) -> VersionResult<Vec<EntryRevision>> {
        Ok(self.repo.list_revisions(entry_id)?)
    }

    /// Deletes a revision no snapshot refers to.
    pub fn delete_revision(&self, id: RevisionId) -> VersionResult<()> {
        match self.repo.delete_revision(id) {
            Ok(()) => {
                info!("event=revision_delete module=version status=ok revision_id={id}");
                Ok(())
            }
            Err(err) => {
                error!("event=revision_delete module=version status=error revision_id={id} error={err}");
                Err(err.into())
            }
        }
    }

    /// Snapshots of one section, newest first.
    pub fn list_snapshots(&self, section_id: SectionId) -> VersionResult<Vec<SectionSnapshot>> {
        Ok(self.repo.list_snapshots(section_id)?)
    }

    /// Snapshot with its items in bundle order, each with its revision.
    pub fn get_snapshot(&self, id: SnapshotId) -> VersionResult<SnapshotDetail> {
        let snapshot = self
            .repo
            .get_snapshot(id)?
            .ok_or(VersionServiceError::NotFound {
                entity: "snapshot",
                id,
            })?;
        let mut items = Vec::new();
        for item in self.repo.list_snapshot_items(id)? {
            let revision = self.get_revision(item.entry_revision_id)?;
            items.push(SnapshotItemDetail { item, revision });
        }
        Ok(SnapshotDetail { snapshot, items })
    }

    pub fn current_release(&self, section_id: SectionId) -> VersionResult<Option<SnapshotDetail>> {
        match self.repo.current_release(section_id)? {
            Some(snapshot) => self.get_snapshot(snapshot.id).map(Some),
            None => Ok(None),
        }
    }
}
