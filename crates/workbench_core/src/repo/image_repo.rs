//! Image asset repository.
//!
//! Only metadata is stored here; files are owned by the image service.

use super::{ensure_connection_ready, parse_optional_uuid, parse_uuid, RepoError, RepoResult};
use crate::model::hierarchy::EntryId;
use crate::model::image::{ImageAsset, ImageId};
use crate::model::project::ProjectId;
use rusqlite::{params, Connection, OptionalExtension, Row};

const IMAGE_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    entry_id,
    file_path,
    width,
    height,
    created_at
FROM images";

/// Metadata to persist for a stored image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub id: ImageId,
    pub project_id: Option<ProjectId>,
    pub entry_id: Option<EntryId>,
    pub file_path: String,
    pub width: u32,
    pub height: u32,
}

pub trait ImageRepository {
    fn insert_image(&self, image: &NewImage) -> RepoResult<ImageAsset>;
    fn get_image(&self, id: ImageId) -> RepoResult<Option<ImageAsset>>;
    fn list_project_images(&self, project_id: ProjectId) -> RepoResult<Vec<ImageAsset>>;
    /// Resolves the project that owns an entry. `None` when the entry is missing.
    fn entry_project(&self, entry_id: EntryId) -> RepoResult<Option<ProjectId>>;
    fn project_exists(&self, project_id: ProjectId) -> RepoResult<bool>;
}

pub struct SqliteImageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteImageRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["images", "entries", "projects"])?;
        Ok(Self { conn })
    }
}

impl ImageRepository for SqliteImageRepository<'_> {
    fn insert_image(&self, image: &NewImage) -> RepoResult<ImageAsset> {
        self.conn.execute(
            "INSERT INTO images (id, project_id, entry_id, file_path, width, height)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                image.id.to_string(),
                image.project_id.map(|id| id.to_string()),
                image.entry_id.map(|id| id.to_string()),
                image.file_path.as_str(),
                image.width,
                image.height,
            ],
        )?;
        self.get_image(image.id)?
            .ok_or(RepoError::not_found("image", image.id))
    }

    fn get_image(&self, id: ImageId) -> RepoResult<Option<ImageAsset>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{IMAGE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_image_row(row)?));
        }
        Ok(None)
    }

    fn list_project_images(&self, project_id: ProjectId) -> RepoResult<Vec<ImageAsset>> {
        let mut stmt = self.conn.prepare(&format!(
            "{IMAGE_SELECT_SQL}
             WHERE project_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            images.push(parse_image_row(row)?);
        }
        Ok(images)
    }

    fn entry_project(&self, entry_id: EntryId) -> RepoResult<Option<ProjectId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT t.project_id
                 FROM entries e
                 JOIN sections s ON s.id = e.section_id
                 JOIN topics t ON t.id = s.topic_id
                 WHERE e.id = ?1;",
                [entry_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|value| parse_uuid(&value, "topics.project_id"))
            .transpose()
    }

    fn project_exists(&self, project_id: ProjectId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1);",
            [project_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_image_row(row: &Row<'_>) -> RepoResult<ImageAsset> {
    let id_text: String = row.get("id")?;
    Ok(ImageAsset {
        id: parse_uuid(&id_text, "images.id")?,
        project_id: parse_optional_uuid(row.get("project_id")?, "images.project_id")?,
        entry_id: parse_optional_uuid(row.get("entry_id")?, "images.entry_id")?,
        file_path: row.get("file_path")?,
        width: row.get("width")?,
        height: row.get("height")?,
        created_at: row.get("created_at")?,
    })
}
