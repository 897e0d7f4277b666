//! Substring search over entry drafts and released revisions.
//!
//! # Responsibility
//! - Match query text case-insensitively (Unicode) via the `icontains`
//!   SQL function registered at connection bootstrap.
//! - Return typed hits carrying the full hierarchy path.
//!
//! # Invariants
//! - Blank queries return no hits.
//! - Draft hits come before release hits; each group is capped separately.
//! - Ordering inside a group is deterministic.

use crate::config::SearchSettings;
use crate::db::DbError;
use crate::model::hierarchy::{EntryId, SectionId, TopicId};
use crate::model::project::ProjectId;
use crate::model::version::{RevisionId, SnapshotId};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Default per-group hit cap.
pub const DEFAULT_RESULT_CAP: u32 = 50;

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug)]
pub enum SearchError {
    /// A query parameter has an unsupported value.
    InvalidQuery { param: &'static str, value: String },
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { param, value } => {
                write!(f, "invalid search parameter {param}=`{value}`")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchScope {
    #[default]
    Global,
    Project(ProjectId),
}

/// Which content groups to search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchTarget {
    /// Live entry drafts.
    #[default]
    Draft,
    /// Revision text of items in release snapshots.
    Release,
    All,
}

impl SearchTarget {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "release" => Some(Self::Release),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn includes_drafts(self) -> bool {
        matches!(self, Self::Draft | Self::All)
    }

    fn includes_releases(self) -> bool {
        matches!(self, Self::Release | Self::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub scope: SearchScope,
    pub only: SearchTarget,
    /// Hit cap applied to each group.
    pub limit: u32,
}

impl SearchQuery {
    /// Creates a global draft search with the default cap.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: SearchScope::Global,
            only: SearchTarget::Draft,
            limit: DEFAULT_RESULT_CAP,
        }
    }

    /// Builds a query from transport parameters
    /// (`q`, `scope=global|project`, `project_id`, `only=draft|release|all`).
    ///
    /// `scope=project` without a project id searches globally.
    pub fn from_params(
        q: Option<&str>,
        scope: Option<&str>,
        project_id: Option<ProjectId>,
        only: Option<&str>,
    ) -> SearchResult<Self> {
        let scope = match (scope.unwrap_or("global"), project_id) {
            ("global", _) | ("project", None) => SearchScope::Global,
            ("project", Some(project_id)) => SearchScope::Project(project_id),
            (other, _) => {
                return Err(SearchError::InvalidQuery {
                    param: "scope",
                    value: other.to_string(),
                })
            }
        };
        let only = match only {
            None => SearchTarget::Draft,
            Some(value) => SearchTarget::parse(value).ok_or_else(|| SearchError::InvalidQuery {
                param: "only",
                value: value.to_string(),
            })?,
        };
        Ok(Self {
            text: q.unwrap_or_default().to_string(),
            scope,
            only,
            limit: DEFAULT_RESULT_CAP,
        })
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Applies the configured per-group cap.
    pub fn with_settings(self, settings: &SearchSettings) -> Self {
        self.with_limit(settings.result_cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Draft,
    Release,
}

/// One search hit with its hierarchy path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub kind: HitKind,
    pub project_id: ProjectId,
    pub project_title: String,
    pub topic_id: TopicId,
    pub topic_title: String,
    pub section_id: SectionId,
    pub section_title: String,
    pub entry_id: EntryId,
    pub entry_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<SnapshotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_revision_id: Option<RevisionId>,
}

const DRAFT_SEARCH_SQL: &str = "SELECT
    p.id AS project_id,
    p.title AS project_title,
    t.id AS topic_id,
    t.title AS topic_title,
    s.id AS section_id,
    s.title AS section_title,
    e.id AS entry_id,
    e.title AS entry_title,
    NULL AS snapshot_id,
    NULL AS entry_revision_id
FROM entries e
JOIN sections s ON s.id = e.section_id
JOIN topics t ON t.id = s.topic_id
JOIN projects p ON p.id = t.project_id
WHERE icontains(e.draft_text, ?)";

const RELEASE_SEARCH_SQL: &str = "SELECT
    p.id AS project_id,
    p.title AS project_title,
    t.id AS topic_id,
    t.title AS topic_title,
    s.id AS section_id,
    s.title AS section_title,
    e.id AS entry_id,
    e.title AS entry_title,
    snap.id AS snapshot_id,
    r.id AS entry_revision_id
FROM section_snapshot_items i
JOIN section_snapshots snap ON snap.id = i.snapshot_id
JOIN entry_revisions r ON r.id = i.entry_revision_id
JOIN entries e ON e.id = i.entry_id
JOIN sections s ON s.id = snap.section_id
JOIN topics t ON t.id = s.topic_id
JOIN projects p ON p.id = t.project_id
WHERE snap.kind = 'release'
  AND icontains(r.text, ?)";

/// Runs the query: draft group first, then release group.
pub fn search(conn: &Connection, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
    let text = query.text.trim();
    if text.is_empty() || query.limit == 0 {
        return Ok(Vec::new());
    }

    let started_at = Instant::now();
    let mut hits = Vec::new();
    if query.only.includes_drafts() {
        hits.extend(run_group(
            conn,
            DRAFT_SEARCH_SQL,
            "e.updated_at DESC, e.id ASC",
            HitKind::Draft,
            text,
            query,
        )?);
    }
    if query.only.includes_releases() {
        hits.extend(run_group(
            conn,
            RELEASE_SEARCH_SQL,
            "snap.created_at DESC, snap.rev_no DESC, s.id ASC, i.sort_order ASC",
            HitKind::Release,
            text,
            query,
        )?);
    }

    info!(
        "event=search module=search status=ok hits={} duration_ms={}",
        hits.len(),
        started_at.elapsed().as_millis()
    );
    Ok(hits)
}

fn run_group(
    conn: &Connection,
    base_sql: &str,
    order_by: &str,
    kind: HitKind,
    text: &str,
    query: &SearchQuery,
) -> SearchResult<Vec<SearchHit>> {
    let mut sql = base_sql.to_string();
    let mut bind_values: Vec<Value> = vec![Value::Text(text.to_string())];
    if let SearchScope::Project(project_id) = query.scope {
        sql.push_str(" AND p.id = ?");
        bind_values.push(Value::Text(project_id.to_string()));
    }
    sql.push_str(&format!(" ORDER BY {order_by} LIMIT ?"));
    bind_values.push(Value::Integer(i64::from(query.limit)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut hits = Vec::new();
    while let Some(row) = rows.next()? {
        hits.push(parse_hit(row, kind)?);
    }
    Ok(hits)
}

fn parse_hit(row: &Row<'_>, kind: HitKind) -> SearchResult<SearchHit> {
    Ok(SearchHit {
        kind,
        project_id: uuid_column(row, "project_id")?,
        project_title: row.get("project_title")?,
        topic_id: uuid_column(row, "topic_id")?,
        topic_title: row.get("topic_title")?,
        section_id: uuid_column(row, "section_id")?,
        section_title: row.get("section_title")?,
        entry_id: uuid_column(row, "entry_id")?,
        entry_title: row.get("entry_title")?,
        snapshot_id: optional_uuid_column(row, "snapshot_id")?,
        entry_revision_id: optional_uuid_column(row, "entry_revision_id")?,
    })
}

fn uuid_column(row: &Row<'_>, column: &str) -> SearchResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| SearchError::InvalidData(format!("invalid uuid `{text}` in {column}")))
}

fn optional_uuid_column(row: &Row<'_>, column: &str) -> SearchResult<Option<Uuid>> {
    let text: Option<String> = row.get(column)?;
    text.map(|text| {
        Uuid::parse_str(&text)
            .map_err(|_| SearchError::InvalidData(format!("invalid uuid `{text}` in {column}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::{SearchError, SearchQuery, SearchScope, SearchTarget};
    use crate::config::SearchSettings;
    use uuid::Uuid;

    #[test]
    fn params_default_to_global_drafts() {
        let query = SearchQuery::from_params(Some("x"), None, None, None).unwrap();
        assert_eq!(query.scope, SearchScope::Global);
        assert_eq!(query.only, SearchTarget::Draft);
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn project_scope_without_id_is_global() {
        let query = SearchQuery::from_params(Some("x"), Some("project"), None, None).unwrap();
        assert_eq!(query.scope, SearchScope::Global);

        let id = Uuid::new_v4();
        let query =
            SearchQuery::from_params(Some("x"), Some("project"), Some(id), Some("all")).unwrap();
        assert_eq!(query.scope, SearchScope::Project(id));
        assert_eq!(query.only, SearchTarget::All);
    }

    #[test]
    fn configured_result_cap_replaces_default_limit() {
        let query = SearchQuery::from_params(Some("x"), None, None, Some("all"))
            .unwrap()
            .with_settings(&SearchSettings { result_cap: 7 });
        assert_eq!(query.limit, 7);
        assert_eq!(query.only, SearchTarget::All);
    }

    #[test]
    fn unknown_only_value_is_rejected() {
        let err = SearchQuery::from_params(Some("x"), None, None, Some("drafts")).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { param: "only", .. }));
    }
}
