//! Ordered sibling lists.
//!
//! Topics, sections and entries each carry a `sort_order` that is unique
//! within their parent. This module owns every read/write of that column:
//! appends take `max + 1`, moves renumber the whole sibling list `1..=n`
//! inside the caller's transaction.
//!
//! # Invariants
//! - Sibling order is `sort_order ASC, id ASC`.
//! - Renumbering goes through negative values first so the per-parent
//!   unique index never sees two rows with the same order.

use super::{parse_uuid, RepoResult};
use crate::model::hierarchy::{SectionId, TopicId};
use crate::model::project::ProjectId;
use rusqlite::{params, Connection};
use uuid::Uuid;

/// One parent's list of ordered children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingScope {
    TopicsOf(ProjectId),
    SectionsOf(TopicId),
    EntriesOf(SectionId),
}

impl SiblingScope {
    fn table(self) -> &'static str {
        match self {
            Self::TopicsOf(_) => "topics",
            Self::SectionsOf(_) => "sections",
            Self::EntriesOf(_) => "entries",
        }
    }

    fn parent_column(self) -> &'static str {
        match self {
            Self::TopicsOf(_) => "project_id",
            Self::SectionsOf(_) => "topic_id",
            Self::EntriesOf(_) => "section_id",
        }
    }

    fn parent_id(self) -> Uuid {
        match self {
            Self::TopicsOf(id) | Self::SectionsOf(id) | Self::EntriesOf(id) => id,
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Self::TopicsOf(_) => "topics.id",
            Self::SectionsOf(_) => "sections.id",
            Self::EntriesOf(_) => "entries.id",
        }
    }
}

/// Returns the order value for a child appended at the end.
pub fn next_sort_order(conn: &Connection, scope: SiblingScope) -> RepoResult<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM {} WHERE {} = ?1;",
        scope.table(),
        scope.parent_column()
    );
    let next = conn.query_row(&sql, [scope.parent_id().to_string()], |row| row.get(0))?;
    Ok(next)
}

/// Returns whether `sort_order` is already used by a sibling.
pub fn is_sort_order_taken(
    conn: &Connection,
    scope: SiblingScope,
    sort_order: i64,
) -> RepoResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND sort_order = ?2);",
        scope.table(),
        scope.parent_column()
    );
    let taken: i64 = conn.query_row(
        &sql,
        params![scope.parent_id().to_string(), sort_order],
        |row| row.get(0),
    )?;
    Ok(taken == 1)
}

/// Lists sibling ids in display order.
pub fn list_sibling_ids(conn: &Connection, scope: SiblingScope) -> RepoResult<Vec<Uuid>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ?1 ORDER BY sort_order ASC, id ASC;",
        scope.table(),
        scope.parent_column()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([scope.parent_id().to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, scope.id_column())?);
    }
    Ok(ids)
}

/// Moves `id` to zero-based `target_index` among its siblings and
/// renumbers the list `1..=n`.
///
/// Returns `false` when `id` is not a child of the scope. Must run inside a
/// transaction owned by the caller.
pub fn move_within(
    conn: &Connection,
    scope: SiblingScope,
    id: Uuid,
    target_index: usize,
) -> RepoResult<bool> {
    let siblings = list_sibling_ids(conn, scope)?;
    let Some(planned) = plan_move(&siblings, id, target_index) else {
        return Ok(false);
    };
    renumber(conn, scope, &planned)?;
    Ok(true)
}

/// Rewrites `sort_order` so that `ordered_ids[i]` gets `i + 1`.
pub fn renumber(conn: &Connection, scope: SiblingScope, ordered_ids: &[Uuid]) -> RepoResult<()> {
    let park_sql = format!(
        "UPDATE {} SET sort_order = -sort_order - 1 WHERE {} = ?1;",
        scope.table(),
        scope.parent_column()
    );
    conn.execute(&park_sql, [scope.parent_id().to_string()])?;

    let assign_sql = format!(
        "UPDATE {} SET sort_order = ?2 WHERE id = ?1 AND {} = ?3;",
        scope.table(),
        scope.parent_column()
    );
    let mut stmt = conn.prepare(&assign_sql)?;
    for (index, id) in ordered_ids.iter().enumerate() {
        stmt.execute(params![
            id.to_string(),
            index as i64 + 1,
            scope.parent_id().to_string()
        ])?;
    }
    Ok(())
}

/// Computes the sibling order after moving `id` to `target_index`.
///
/// The index is clamped to the list bounds. Returns `None` when `id` is not
/// in `siblings`.
pub fn plan_move(siblings: &[Uuid], id: Uuid, target_index: usize) -> Option<Vec<Uuid>> {
    if !siblings.contains(&id) {
        return None;
    }
    let mut planned: Vec<Uuid> = siblings
        .iter()
        .copied()
        .filter(|sibling| *sibling != id)
        .collect();
    let index = target_index.min(planned.len());
    planned.insert(index, id);
    Some(planned)
}
