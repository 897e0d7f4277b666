//! Revision and snapshot repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Capture entry drafts into immutable revisions.
//! - Compose section snapshots (checkpoints and releases) atomically.
//! - Maintain the section release pointer.
//!
//! # Invariants
//! - `rev_no` comes from the parent's counter column (`entries.rev_seq`,
//!   `sections.snapshot_seq`), bumped inside the writing transaction.
//! - Snapshot rows, their revisions and items commit together or not at all.
//! - The release pointer is only written together with a new release.

use super::hierarchy_repo::{list_entries_of, load_entry, load_section};
use super::{ensure_connection_ready, parse_enum, parse_json, parse_uuid, RepoError, RepoResult};
use crate::model::hierarchy::{EntryId, SectionId};
use crate::model::version::{
    EntryRevision, RevisionId, SectionSnapshot, SnapshotId, SnapshotItem, SnapshotKind,
};
use crate::model::FieldError;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use uuid::Uuid;

const REVISION_SELECT_SQL: &str = "SELECT
    id,
    entry_id,
    rev_no,
    delta,
    html,
    text,
    note,
    created_at
FROM entry_revisions";

const SNAPSHOT_SELECT_SQL: &str = "SELECT
    id,
    section_id,
    kind,
    rev_no,
    note,
    created_at
FROM section_snapshots";

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    snapshot_id,
    entry_id,
    entry_revision_id,
    sort_order
FROM section_snapshot_items";

/// Which entries of a section go into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySelection {
    /// Every entry currently in the section.
    All,
    /// Only these entries; ids outside the section are ignored.
    Only(Vec<EntryId>),
}

/// Repository interface for versioning operations.
pub trait VersionRepository {
    /// Copies one entry's current draft into a new revision.
    fn capture_revision(&self, entry_id: EntryId, note: &str) -> RepoResult<EntryRevision>;
    fn get_revision(&self, id: RevisionId) -> RepoResult<Option<EntryRevision>>;
    /// Lists revisions of one entry, newest first.
    fn list_revisions(&self, entry_id: EntryId) -> RepoResult<Vec<EntryRevision>>;
    /// Deletes a revision; fails while any snapshot item references it.
    fn delete_revision(&self, id: RevisionId) -> RepoResult<()>;

    /// Captures revisions for the selected entries and bundles them into a
    /// new snapshot of `kind`. A release also becomes the section's current
    /// release; releases always cover the whole section.
    fn create_snapshot(
        &self,
        section_id: SectionId,
        kind: SnapshotKind,
        note: &str,
        selection: &EntrySelection,
    ) -> RepoResult<(SectionSnapshot, Vec<SnapshotItem>)>;
    fn get_snapshot(&self, id: SnapshotId) -> RepoResult<Option<SectionSnapshot>>;
    /// Lists snapshots of one section, newest first.
    fn list_snapshots(&self, section_id: SectionId) -> RepoResult<Vec<SectionSnapshot>>;
    /// Lists items of one snapshot in bundle order.
    fn list_snapshot_items(&self, snapshot_id: SnapshotId) -> RepoResult<Vec<SnapshotItem>>;
    /// Returns the snapshot the section's release pointer refers to.
    fn current_release(&self, section_id: SectionId) -> RepoResult<Option<SectionSnapshot>>;
}

/// SQLite-backed versioning repository.
pub struct SqliteVersionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["entry_revisions", "section_snapshots", "section_snapshot_items"],
        )?;
        Ok(Self { conn })
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn capture_revision(&self, entry_id: EntryId, note: &str) -> RepoResult<EntryRevision> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_entry(&tx, entry_id)?.is_none() {
            return Err(RepoError::not_found("entry", entry_id));
        }
        let revision_id = insert_revision(&tx, entry_id, note)?;
        let revision = load_required_revision(&tx, revision_id)?;
        tx.commit()?;
        Ok(revision)
    }

    fn get_revision(&self, id: RevisionId) -> RepoResult<Option<EntryRevision>> {
        load_revision(self.conn, id)
    }

    fn list_revisions(&self, entry_id: EntryId) -> RepoResult<Vec<EntryRevision>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVISION_SELECT_SQL}
             WHERE entry_id = ?1
             ORDER BY rev_no DESC;"
        ))?;
        let mut rows = stmt.query([entry_id.to_string()])?;
        let mut revisions = Vec::new();
        while let Some(row) = rows.next()? {
            revisions.push(parse_revision_row(row)?);
        }
        Ok(revisions)
    }

    fn delete_revision(&self, id: RevisionId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM entry_revisions WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("entry revision", id));
        }
        Ok(())
    }

    fn create_snapshot(
        &self,
        section_id: SectionId,
        kind: SnapshotKind,
        note: &str,
        selection: &EntrySelection,
    ) -> RepoResult<(SectionSnapshot, Vec<SnapshotItem>)> {
        if kind == SnapshotKind::Release && *selection != EntrySelection::All {
            return Err(FieldError::new(
                "entry_ids",
                "a release always covers every entry of the section",
            )
            .into());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_section(&tx, section_id)?.is_none() {
            return Err(RepoError::not_found("section", section_id));
        }

        let entry_ids = select_entry_ids(&tx, section_id, selection)?;
        let snapshot_id = Uuid::new_v4();
        let rev_no = next_snapshot_rev_no(&tx, section_id)?;
        tx.execute(
            "INSERT INTO section_snapshots (id, section_id, kind, rev_no, note)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                snapshot_id.to_string(),
                section_id.to_string(),
                kind.as_str(),
                rev_no,
                note,
            ],
        )?;

        let mut items = Vec::with_capacity(entry_ids.len());
        for (index, entry_id) in entry_ids.into_iter().enumerate() {
            let revision_id = insert_revision(&tx, entry_id, "")?;
            let item = SnapshotItem {
                id: Uuid::new_v4(),
                snapshot_id,
                entry_id,
                entry_revision_id: revision_id,
                sort_order: index as i64 + 1,
            };
            tx.execute(
                "INSERT INTO section_snapshot_items (
                    id,
                    snapshot_id,
                    entry_id,
                    entry_revision_id,
                    sort_order
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    item.id.to_string(),
                    snapshot_id.to_string(),
                    entry_id.to_string(),
                    revision_id.to_string(),
                    item.sort_order,
                ],
            )?;
            items.push(item);
        }

        if kind == SnapshotKind::Release {
            tx.execute(
                "UPDATE sections SET release_snapshot_id = ?2 WHERE id = ?1;",
                params![section_id.to_string(), snapshot_id.to_string()],
            )?;
        }

        let snapshot =
            load_snapshot(&tx, snapshot_id)?.ok_or(RepoError::not_found("snapshot", snapshot_id))?;
        tx.commit()?;
        Ok((snapshot, items))
    }

    fn get_snapshot(&self, id: SnapshotId) -> RepoResult<Option<SectionSnapshot>> {
        load_snapshot(self.conn, id)
    }

    fn list_snapshots(&self, section_id: SectionId) -> RepoResult<Vec<SectionSnapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SNAPSHOT_SELECT_SQL}
             WHERE section_id = ?1
             ORDER BY rev_no DESC;"
        ))?;
        let mut rows = stmt.query([section_id.to_string()])?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            snapshots.push(parse_snapshot_row(row)?);
        }
        Ok(snapshots)
    }

    fn list_snapshot_items(&self, snapshot_id: SnapshotId) -> RepoResult<Vec<SnapshotItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE snapshot_id = ?1
             ORDER BY sort_order ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([snapshot_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn current_release(&self, section_id: SectionId) -> RepoResult<Option<SectionSnapshot>> {
        let section =
            load_section(self.conn, section_id)?.ok_or(RepoError::not_found("section", section_id))?;
        match section.release_snapshot_id {
            Some(snapshot_id) => load_snapshot(self.conn, snapshot_id),
            None => Ok(None),
        }
    }
}

/// Resolves the selection into entry ids in section order.
fn select_entry_ids(
    conn: &Connection,
    section_id: SectionId,
    selection: &EntrySelection,
) -> RepoResult<Vec<EntryId>> {
    let ordered = list_entries_of(conn, section_id)?
        .into_iter()
        .map(|entry| entry.id);
    Ok(match selection {
        EntrySelection::All => ordered.collect(),
        EntrySelection::Only(ids) => {
            let wanted: HashSet<EntryId> = ids.iter().copied().collect();
            ordered.filter(|id| wanted.contains(id)).collect()
        }
    })
}

/// Inserts a verbatim copy of the entry's draft and returns the revision id.
fn insert_revision(conn: &Connection, entry_id: EntryId, note: &str) -> RepoResult<RevisionId> {
    let revision_id = Uuid::new_v4();
    let rev_no = next_entry_rev_no(conn, entry_id)?;
    conn.execute(
        "INSERT INTO entry_revisions (id, entry_id, rev_no, delta, html, text, note)
         SELECT ?1, id, ?2, draft_delta, draft_html, draft_text, ?3
         FROM entries
         WHERE id = ?4;",
        params![revision_id.to_string(), rev_no, note, entry_id.to_string()],
    )?;
    Ok(revision_id)
}

/// Bumps and returns the entry's revision counter.
///
/// The counter never falls below the highest stored `rev_no`, so numbering
/// stays `1 + max` even for rows written before the counter existed.
fn next_entry_rev_no(conn: &Connection, entry_id: EntryId) -> RepoResult<i64> {
    conn.query_row(
        "UPDATE entries
         SET rev_seq = MAX(
             rev_seq,
             (SELECT COALESCE(MAX(rev_no), 0) FROM entry_revisions WHERE entry_id = ?1)
         ) + 1
         WHERE id = ?1
         RETURNING rev_seq;",
        [entry_id.to_string()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(RepoError::not_found("entry", entry_id))
}

/// Bumps and returns the section's snapshot counter (shared by both kinds).
fn next_snapshot_rev_no(conn: &Connection, section_id: SectionId) -> RepoResult<i64> {
    conn.query_row(
        "UPDATE sections
         SET snapshot_seq = MAX(
             snapshot_seq,
             (SELECT COALESCE(MAX(rev_no), 0) FROM section_snapshots WHERE section_id = ?1)
         ) + 1
         WHERE id = ?1
         RETURNING snapshot_seq;",
        [section_id.to_string()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(RepoError::not_found("section", section_id))
}

pub(crate) fn load_revision(conn: &Connection, id: RevisionId) -> RepoResult<Option<EntryRevision>> {
    let mut stmt = conn.prepare(&format!("{REVISION_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_revision_row(row)?));
    }
    Ok(None)
}

fn load_required_revision(conn: &Connection, id: RevisionId) -> RepoResult<EntryRevision> {
    load_revision(conn, id)?.ok_or(RepoError::not_found("entry revision", id))
}

fn load_snapshot(conn: &Connection, id: SnapshotId) -> RepoResult<Option<SectionSnapshot>> {
    let mut stmt = conn.prepare(&format!("{SNAPSHOT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_snapshot_row(row)?));
    }
    Ok(None)
}

fn parse_revision_row(row: &Row<'_>) -> RepoResult<EntryRevision> {
    let id_text: String = row.get("id")?;
    let entry_text: String = row.get("entry_id")?;
    let delta_text: String = row.get("delta")?;
    Ok(EntryRevision {
        id: parse_uuid(&id_text, "entry_revisions.id")?,
        entry_id: parse_uuid(&entry_text, "entry_revisions.entry_id")?,
        rev_no: row.get("rev_no")?,
        delta: parse_json(&delta_text, "entry_revisions.delta")?,
        html: row.get("html")?,
        text: row.get("text")?,
        note: row.get("note")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_snapshot_row(row: &Row<'_>) -> RepoResult<SectionSnapshot> {
    let id_text: String = row.get("id")?;
    let section_text: String = row.get("section_id")?;
    let kind_text: String = row.get("kind")?;
    Ok(SectionSnapshot {
        id: parse_uuid(&id_text, "section_snapshots.id")?,
        section_id: parse_uuid(&section_text, "section_snapshots.section_id")?,
        kind: parse_enum(&kind_text, "section_snapshots.kind", SnapshotKind::parse)?,
        rev_no: row.get("rev_no")?,
        note: row.get("note")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<SnapshotItem> {
    let id_text: String = row.get("id")?;
    let snapshot_text: String = row.get("snapshot_id")?;
    let entry_text: String = row.get("entry_id")?;
    let revision_text: String = row.get("entry_revision_id")?;
    Ok(SnapshotItem {
        id: parse_uuid(&id_text, "section_snapshot_items.id")?,
        snapshot_id: parse_uuid(&snapshot_text, "section_snapshot_items.snapshot_id")?,
        entry_id: parse_uuid(&entry_text, "section_snapshot_items.entry_id")?,
        entry_revision_id: parse_uuid(&revision_text, "section_snapshot_items.entry_revision_id")?,
        sort_order: row.get("sort_order")?,
    })
}
