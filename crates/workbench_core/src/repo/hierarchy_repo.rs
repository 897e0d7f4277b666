//! Topic/section/entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the containment hierarchy below projects.
//! - Save entry drafts in place.
//! - Run the entrypoint find-or-create sequence in one transaction.
//!
//! # Invariants
//! - Child listing is deterministic: `sort_order ASC, id ASC`.
//! - New children are appended at `max(sort_order) + 1` unless an explicit,
//!   free order is supplied.
//! - Entrypoint healing never creates a container when one already exists.

use super::ordering::{self, SiblingScope};
use super::project_repo::project_structure;
use super::{
    ensure_connection_ready, parse_enum, parse_json, parse_optional_uuid, parse_uuid, RepoError,
    RepoResult,
};
use crate::model::hierarchy::{
    ContainerOrigin, Draft, DraftPatch, Entry, EntryId, EntryType, NewContainer, NewEntry,
    Section, SectionId, Topic, TopicId,
};
use crate::model::project::{ProjectId, ProjectStructure};
use crate::model::FieldError;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const TOPIC_SELECT_SQL: &str = "SELECT
    t.id AS id,
    t.project_id AS project_id,
    t.title AS title,
    t.sort_order AS sort_order,
    t.origin AS origin,
    t.created_at AS created_at
FROM topics t";

const SECTION_SELECT_SQL: &str = "SELECT
    s.id AS id,
    s.topic_id AS topic_id,
    s.title AS title,
    s.sort_order AS sort_order,
    s.origin AS origin,
    s.release_snapshot_id AS release_snapshot_id,
    s.created_at AS created_at
FROM sections s";

const ENTRY_SELECT_SQL: &str = "SELECT
    e.id AS id,
    e.section_id AS section_id,
    e.title AS title,
    e.type AS type,
    e.sort_order AS sort_order,
    e.draft_delta AS draft_delta,
    e.draft_html AS draft_html,
    e.draft_text AS draft_text,
    e.updated_at AS updated_at
FROM entries e";

/// Containers and entry to create when a project has no entrypoint yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrypointPlan {
    pub topic: NewContainer,
    pub section: NewContainer,
    pub entry: NewEntry,
}

/// Which parts of the entrypoint were created by one healing call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntrypointCreated {
    pub topic: bool,
    pub section: bool,
    pub entry: bool,
}

impl EntrypointCreated {
    pub fn any(&self) -> bool {
        self.topic || self.section || self.entry
    }
}

/// First reachable (section, entry) pair of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    pub section: Section,
    pub entry: Entry,
    pub created: EntrypointCreated,
}

/// Repository interface for hierarchy operations.
pub trait HierarchyRepository {
    fn create_topic(&self, project_id: ProjectId, topic: &NewContainer) -> RepoResult<Topic>;
    fn get_topic(&self, id: TopicId) -> RepoResult<Option<Topic>>;
    fn list_topics(&self, project_id: ProjectId) -> RepoResult<Vec<Topic>>;
    fn rename_topic(&self, id: TopicId, title: &str) -> RepoResult<Topic>;
    /// Moves a topic to a zero-based index among its siblings.
    fn move_topic(&self, id: TopicId, target_index: usize) -> RepoResult<()>;
    fn delete_topic(&self, id: TopicId) -> RepoResult<()>;

    fn create_section(&self, topic_id: TopicId, section: &NewContainer) -> RepoResult<Section>;
    fn get_section(&self, id: SectionId) -> RepoResult<Option<Section>>;
    fn list_sections(&self, topic_id: TopicId) -> RepoResult<Vec<Section>>;
    /// Lists every section of a project in tree order.
    fn list_project_sections(&self, project_id: ProjectId) -> RepoResult<Vec<Section>>;
    fn rename_section(&self, id: SectionId, title: &str) -> RepoResult<Section>;
    fn move_section(&self, id: SectionId, target_index: usize) -> RepoResult<()>;
    fn delete_section(&self, id: SectionId) -> RepoResult<()>;

    fn create_entry(&self, section_id: SectionId, entry: &NewEntry) -> RepoResult<Entry>;
    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>>;
    fn list_entries(&self, section_id: SectionId) -> RepoResult<Vec<Entry>>;
    /// Overwrites the provided draft fields in place.
    fn update_entry_draft(&self, id: EntryId, patch: &DraftPatch) -> RepoResult<Entry>;
    fn move_entry(&self, id: EntryId, target_index: usize) -> RepoResult<()>;
    fn delete_entry(&self, id: EntryId) -> RepoResult<()>;

    /// Finds or creates the project's first (section, entry) pair.
    ///
    /// `plan` receives the project's structure mode, read inside the same
    /// transaction, and decides what placeholder containers look like.
    fn ensure_entrypoint(
        &self,
        project_id: ProjectId,
        plan: fn(ProjectStructure) -> EntrypointPlan,
    ) -> RepoResult<Entrypoint>;
}

/// SQLite-backed hierarchy repository.
pub struct SqliteHierarchyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHierarchyRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["topics", "sections", "entries"])?;
        Ok(Self { conn })
    }
}

impl HierarchyRepository for SqliteHierarchyRepository<'_> {
    fn create_topic(&self, project_id: ProjectId, topic: &NewContainer) -> RepoResult<Topic> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if project_structure(&tx, project_id)?.is_none() {
            return Err(RepoError::not_found("project", project_id));
        }
        let created = insert_topic(&tx, project_id, topic)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_topic(&self, id: TopicId) -> RepoResult<Option<Topic>> {
        load_topic(self.conn, id)
    }

    fn list_topics(&self, project_id: ProjectId) -> RepoResult<Vec<Topic>> {
        list_topics_of(self.conn, project_id)
    }

    fn rename_topic(&self, id: TopicId, title: &str) -> RepoResult<Topic> {
        let changed = self.conn.execute(
            "UPDATE topics SET title = ?2 WHERE id = ?1;",
            params![id.to_string(), title],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("topic", id));
        }
        load_topic(self.conn, id)?.ok_or(RepoError::not_found("topic", id))
    }

    fn move_topic(&self, id: TopicId, target_index: usize) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let topic = load_topic(&tx, id)?.ok_or(RepoError::not_found("topic", id))?;
        ordering::move_within(&tx, SiblingScope::TopicsOf(topic.project_id), id, target_index)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_topic(&self, id: TopicId) -> RepoResult<()> {
        delete_row(self.conn, "topics", "topic", id)
    }

    fn create_section(&self, topic_id: TopicId, section: &NewContainer) -> RepoResult<Section> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_topic(&tx, topic_id)?.is_none() {
            return Err(RepoError::not_found("topic", topic_id));
        }
        let created = insert_section(&tx, topic_id, section)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_section(&self, id: SectionId) -> RepoResult<Option<Section>> {
        load_section(self.conn, id)
    }

    fn list_sections(&self, topic_id: TopicId) -> RepoResult<Vec<Section>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SECTION_SELECT_SQL}
             WHERE s.topic_id = ?1
             ORDER BY s.sort_order ASC, s.id ASC;"
        ))?;
        let mut rows = stmt.query([topic_id.to_string()])?;
        let mut sections = Vec::new();
        while let Some(row) = rows.next()? {
            sections.push(parse_section_row(row)?);
        }
        Ok(sections)
    }

    fn list_project_sections(&self, project_id: ProjectId) -> RepoResult<Vec<Section>> {
        list_project_sections_of(self.conn, project_id)
    }

    fn rename_section(&self, id: SectionId, title: &str) -> RepoResult<Section> {
        let changed = self.conn.execute(
            "UPDATE sections SET title = ?2 WHERE id = ?1;",
            params![id.to_string(), title],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("section", id));
        }
        load_section(self.conn, id)?.ok_or(RepoError::not_found("section", id))
    }

    fn move_section(&self, id: SectionId, target_index: usize) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let section = load_section(&tx, id)?.ok_or(RepoError::not_found("section", id))?;
        ordering::move_within(&tx, SiblingScope::SectionsOf(section.topic_id), id, target_index)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_section(&self, id: SectionId) -> RepoResult<()> {
        delete_row(self.conn, "sections", "section", id)
    }

    fn create_entry(&self, section_id: SectionId, entry: &NewEntry) -> RepoResult<Entry> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_section(&tx, section_id)?.is_none() {
            return Err(RepoError::not_found("section", section_id));
        }
        let created = insert_entry(&tx, section_id, entry)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>> {
        load_entry(self.conn, id)
    }

    fn list_entries(&self, section_id: SectionId) -> RepoResult<Vec<Entry>> {
        list_entries_of(self.conn, section_id)
    }

    fn update_entry_draft(&self, id: EntryId, patch: &DraftPatch) -> RepoResult<Entry> {
        let delta = patch.delta.as_ref().map(serde_json::Value::to_string);
        let changed = self.conn.execute(
            "UPDATE entries
             SET draft_delta = COALESCE(?2, draft_delta),
                 draft_html = COALESCE(?3, draft_html),
                 draft_text = COALESCE(?4, draft_text),
                 title = COALESCE(?5, title),
                 type = COALESCE(?6, type),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                delta,
                patch.html.as_deref(),
                patch.text.as_deref(),
                patch.title.as_deref(),
                patch.kind.map(EntryType::as_str),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("entry", id));
        }
        load_entry(self.conn, id)?.ok_or(RepoError::not_found("entry", id))
    }

    fn move_entry(&self, id: EntryId, target_index: usize) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let entry = load_entry(&tx, id)?.ok_or(RepoError::not_found("entry", id))?;
        ordering::move_within(&tx, SiblingScope::EntriesOf(entry.section_id), id, target_index)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_entry(&self, id: EntryId) -> RepoResult<()> {
        delete_row(self.conn, "entries", "entry", id)
    }

    fn ensure_entrypoint(
        &self,
        project_id: ProjectId,
        plan: fn(ProjectStructure) -> EntrypointPlan,
    ) -> RepoResult<Entrypoint> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let structure =
            project_structure(&tx, project_id)?.ok_or(RepoError::not_found("project", project_id))?;
        let plan = plan(structure);
        let mut created = EntrypointCreated::default();

        let existing_section = list_project_sections_of(&tx, project_id)?.into_iter().next();
        let section = match existing_section {
            Some(section) => section,
            None => {
                let existing_topic = list_topics_of(&tx, project_id)?.into_iter().next();
                let topic = match existing_topic {
                    Some(topic) => topic,
                    None => {
                        created.topic = true;
                        insert_topic(&tx, project_id, &plan.topic)?
                    }
                };
                created.section = true;
                insert_section(&tx, topic.id, &plan.section)?
            }
        };

        let existing_entry = list_entries_of(&tx, section.id)?.into_iter().next();
        let entry = match existing_entry {
            Some(entry) => entry,
            None => {
                created.entry = true;
                insert_entry(&tx, section.id, &plan.entry)?
            }
        };

        tx.commit()?;
        Ok(Entrypoint {
            section,
            entry,
            created,
        })
    }
}

fn resolve_sort_order(
    conn: &Connection,
    scope: SiblingScope,
    requested: Option<i64>,
) -> RepoResult<i64> {
    match requested {
        None => ordering::next_sort_order(conn, scope),
        Some(value) if value < 1 => Err(FieldError::new("sort_order", "must be at least 1").into()),
        Some(value) => {
            if ordering::is_sort_order_taken(conn, scope, value)? {
                return Err(FieldError::new("sort_order", "already used by a sibling").into());
            }
            Ok(value)
        }
    }
}

fn insert_topic(conn: &Connection, project_id: ProjectId, topic: &NewContainer) -> RepoResult<Topic> {
    let id = Uuid::new_v4();
    let sort_order = resolve_sort_order(conn, SiblingScope::TopicsOf(project_id), topic.sort_order)?;
    conn.execute(
        "INSERT INTO topics (id, project_id, title, sort_order, origin)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            id.to_string(),
            project_id.to_string(),
            topic.title.as_str(),
            sort_order,
            topic.origin.as_str(),
        ],
    )?;
    load_topic(conn, id)?.ok_or(RepoError::not_found("topic", id))
}

fn insert_section(
    conn: &Connection,
    topic_id: TopicId,
    section: &NewContainer,
) -> RepoResult<Section> {
    let id = Uuid::new_v4();
    let sort_order =
        resolve_sort_order(conn, SiblingScope::SectionsOf(topic_id), section.sort_order)?;
    conn.execute(
        "INSERT INTO sections (id, topic_id, title, sort_order, origin)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            id.to_string(),
            topic_id.to_string(),
            section.title.as_str(),
            sort_order,
            section.origin.as_str(),
        ],
    )?;
    load_section(conn, id)?.ok_or(RepoError::not_found("section", id))
}

fn insert_entry(conn: &Connection, section_id: SectionId, entry: &NewEntry) -> RepoResult<Entry> {
    let id = Uuid::new_v4();
    let sort_order = resolve_sort_order(conn, SiblingScope::EntriesOf(section_id), entry.sort_order)?;
    conn.execute(
        "INSERT INTO entries (
            id,
            section_id,
            title,
            type,
            sort_order,
            draft_delta,
            draft_html,
            draft_text
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        params![
            id.to_string(),
            section_id.to_string(),
            entry.title.as_str(),
            entry.kind.as_str(),
            sort_order,
            entry.draft.delta.to_string(),
            entry.draft.html.as_str(),
            entry.draft.text.as_str(),
        ],
    )?;
    load_entry(conn, id)?.ok_or(RepoError::not_found("entry", id))
}

fn delete_row(conn: &Connection, table: &'static str, entity: &'static str, id: Uuid) -> RepoResult<()> {
    let changed = conn.execute(
        &format!("DELETE FROM {table} WHERE id = ?1;"),
        [id.to_string()],
    )?;
    if changed == 0 {
        return Err(RepoError::not_found(entity, id));
    }
    Ok(())
}

pub(crate) fn load_topic(conn: &Connection, id: TopicId) -> RepoResult<Option<Topic>> {
    let mut stmt = conn.prepare(&format!("{TOPIC_SELECT_SQL} WHERE t.id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_topic_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_section(conn: &Connection, id: SectionId) -> RepoResult<Option<Section>> {
    let mut stmt = conn.prepare(&format!("{SECTION_SELECT_SQL} WHERE s.id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_section_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_entry(conn: &Connection, id: EntryId) -> RepoResult<Option<Entry>> {
    let mut stmt = conn.prepare(&format!("{ENTRY_SELECT_SQL} WHERE e.id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_entry_row(row)?));
    }
    Ok(None)
}

fn list_topics_of(conn: &Connection, project_id: ProjectId) -> RepoResult<Vec<Topic>> {
    let mut stmt = conn.prepare(&format!(
        "{TOPIC_SELECT_SQL}
         WHERE t.project_id = ?1
         ORDER BY t.sort_order ASC, t.id ASC;"
    ))?;
    let mut rows = stmt.query([project_id.to_string()])?;
    let mut topics = Vec::new();
    while let Some(row) = rows.next()? {
        topics.push(parse_topic_row(row)?);
    }
    Ok(topics)
}

fn list_project_sections_of(conn: &Connection, project_id: ProjectId) -> RepoResult<Vec<Section>> {
    let mut stmt = conn.prepare(&format!(
        "{SECTION_SELECT_SQL}
         INNER JOIN topics t ON t.id = s.topic_id
         WHERE t.project_id = ?1
         ORDER BY t.sort_order ASC, t.id ASC, s.sort_order ASC, s.id ASC;"
    ))?;
    let mut rows = stmt.query([project_id.to_string()])?;
    let mut sections = Vec::new();
    while let Some(row) = rows.next()? {
        sections.push(parse_section_row(row)?);
    }
    Ok(sections)
}

pub(crate) fn list_entries_of(conn: &Connection, section_id: SectionId) -> RepoResult<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "{ENTRY_SELECT_SQL}
         WHERE e.section_id = ?1
         ORDER BY e.sort_order ASC, e.id ASC;"
    ))?;
    let mut rows = stmt.query([section_id.to_string()])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }
    Ok(entries)
}

fn parse_topic_row(row: &Row<'_>) -> RepoResult<Topic> {
    let id_text: String = row.get("id")?;
    let project_text: String = row.get("project_id")?;
    let origin_text: String = row.get("origin")?;
    Ok(Topic {
        id: parse_uuid(&id_text, "topics.id")?,
        project_id: parse_uuid(&project_text, "topics.project_id")?,
        title: row.get("title")?,
        sort_order: row.get("sort_order")?,
        origin: parse_enum(&origin_text, "topics.origin", ContainerOrigin::parse)?,
        created_at: row.get("created_at")?,
    })
}

fn parse_section_row(row: &Row<'_>) -> RepoResult<Section> {
    let id_text: String = row.get("id")?;
    let topic_text: String = row.get("topic_id")?;
    let origin_text: String = row.get("origin")?;
    Ok(Section {
        id: parse_uuid(&id_text, "sections.id")?,
        topic_id: parse_uuid(&topic_text, "sections.topic_id")?,
        title: row.get("title")?,
        sort_order: row.get("sort_order")?,
        origin: parse_enum(&origin_text, "sections.origin", ContainerOrigin::parse)?,
        release_snapshot_id: parse_optional_uuid(
            row.get("release_snapshot_id")?,
            "sections.release_snapshot_id",
        )?,
        created_at: row.get("created_at")?,
    })
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<Entry> {
    let id_text: String = row.get("id")?;
    let section_text: String = row.get("section_id")?;
    let type_text: String = row.get("type")?;
    let delta_text: String = row.get("draft_delta")?;
    Ok(Entry {
        id: parse_uuid(&id_text, "entries.id")?,
        section_id: parse_uuid(&section_text, "entries.section_id")?,
        title: row.get("title")?,
        kind: parse_enum(&type_text, "entries.type", EntryType::parse)?,
        sort_order: row.get("sort_order")?,
        draft: Draft {
            delta: parse_json(&delta_text, "entries.draft_delta")?,
            html: row.get("draft_html")?,
            text: row.get("draft_text")?,
        },
        updated_at: row.get("updated_at")?,
    })
}
