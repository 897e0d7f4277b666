//! Project repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the `projects` table.
//! - Keep the default project listing order in one place.
//!
//! # Invariants
//! - Listing order is `pinned DESC, last_opened_at DESC, updated_at DESC,
//!   created_at DESC, id ASC`; projects never opened sort after opened ones.
//! - Deleting a project cascades to its whole hierarchy.

use super::{
    bool_to_int, ensure_connection_ready, parse_enum, parse_flag, parse_uuid, RepoError,
    RepoResult,
};
use crate::model::project::{NewProject, Project, ProjectId, ProjectStatus, ProjectStructure};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    title,
    status,
    structure,
    pinned,
    last_opened_at,
    created_at,
    updated_at
FROM projects";

/// Filter options for listing projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectListQuery {
    pub status: Option<ProjectStatus>,
    pub pinned_only: bool,
}

/// Repository interface for project operations.
pub trait ProjectRepository {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
    /// Persists title/status/structure/pinned of an existing project.
    fn update_project(&self, project: &Project) -> RepoResult<Project>;
    /// Stamps `last_opened_at` with the current time.
    fn mark_opened(&self, id: ProjectId) -> RepoResult<Project>;
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["projects"])?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project> {
        let project = project.validated()?;
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO projects (id, title, status, structure, pinned)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                project.title.as_str(),
                project.status.as_str(),
                project.structure.as_str(),
                bool_to_int(project.pinned),
            ],
        )?;
        load_required_project(self.conn, id)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        load_project(self.conn, id)
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut sql = format!("{PROJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if query.pinned_only {
            sql.push_str(" AND pinned = 1");
        }

        sql.push_str(
            " ORDER BY pinned DESC,
                last_opened_at IS NULL ASC,
                last_opened_at DESC,
                updated_at DESC,
                created_at DESC,
                id ASC",
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn update_project(&self, project: &Project) -> RepoResult<Project> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET title = ?2,
                 status = ?3,
                 structure = ?4,
                 pinned = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                project.id.to_string(),
                project.title.as_str(),
                project.status.as_str(),
                project.structure.as_str(),
                bool_to_int(project.pinned),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project", project.id));
        }
        load_required_project(self.conn, project.id)
    }

    fn mark_opened(&self, id: ProjectId) -> RepoResult<Project> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET last_opened_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        load_required_project(self.conn, id)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        Ok(())
    }
}

pub(crate) fn load_project(conn: &Connection, id: ProjectId) -> RepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_required_project(conn: &Connection, id: ProjectId) -> RepoResult<Project> {
    load_project(conn, id)?.ok_or(RepoError::not_found("project", id))
}

/// Reads only the structure mode; used by the entrypoint healer.
pub(crate) fn project_structure(
    conn: &Connection,
    id: ProjectId,
) -> RepoResult<Option<ProjectStructure>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT structure FROM projects WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|value| parse_enum(&value, "projects.structure", ProjectStructure::parse))
        .transpose()
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    let structure_text: String = row.get("structure")?;

    Ok(Project {
        id: parse_uuid(&id_text, "projects.id")?,
        title: row.get("title")?,
        status: parse_enum(&status_text, "projects.status", ProjectStatus::parse)?,
        structure: parse_enum(&structure_text, "projects.structure", ProjectStructure::parse)?,
        pinned: parse_flag(row.get("pinned")?, "projects.pinned")?,
        last_opened_at: row.get("last_opened_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
