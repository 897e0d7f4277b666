use image::{ImageFormat, Rgba, RgbaImage};
use rusqlite::Connection;
use std::io::Cursor;
use workbench_core::config::ImageSettings;
use workbench_core::db::open_db_in_memory;
use workbench_core::{
    ImageService, ImageServiceError, ImageUpload, MediaStorage, NewProject, ProjectCreated,
    ProjectService, ProjectStructure, SqliteHierarchyRepository, SqliteImageRepository,
    SqliteProjectRepository,
};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 128]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn storage(root: &std::path::Path, max_side: u32) -> MediaStorage {
    MediaStorage {
        media_root: root.to_path_buf(),
        media_url: "/media/".to_string(),
        limits: ImageSettings {
            max_upload_bytes: 10 * 1024 * 1024,
            max_side,
        },
    }
}

fn create_project(conn: &Connection) -> ProjectCreated {
    ProjectService::new(
        SqliteProjectRepository::try_new(conn).unwrap(),
        SqliteHierarchyRepository::try_new(conn).unwrap(),
    )
    .create_project(&NewProject::new("Gallery", ProjectStructure::Entries))
    .unwrap()
}

fn upload(bytes: Vec<u8>) -> ImageUpload {
    ImageUpload {
        content_type: "image/png".to_string(),
        bytes,
        entry_id: None,
        project_id: None,
    }
}

#[test]
fn upload_shrinks_and_stores_webp_under_entry_project() {
    let conn = open_db_in_memory().unwrap();
    let media = tempfile::tempdir().unwrap();
    let created = create_project(&conn);
    let service = ImageService::new(
        SqliteImageRepository::try_new(&conn).unwrap(),
        storage(media.path(), 100),
    );

    let stored = service
        .upload(&ImageUpload {
            entry_id: Some(created.entry_id),
            ..upload(png_bytes(400, 200))
        })
        .unwrap();

    assert_eq!((stored.width, stored.height), (100, 50));
    let relative = format!(
        "workbench/images/{}/{}.webp",
        created.project.id, stored.id
    );
    assert_eq!(stored.url, format!("/media/{relative}"));

    let written = std::fs::read(media.path().join(&relative)).unwrap();
    assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::WebP);
    let decoded = image::load_from_memory(&written).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 50));

    let asset = service.get_image(stored.id).unwrap().unwrap();
    assert_eq!(asset.project_id, Some(created.project.id));
    assert_eq!(asset.entry_id, Some(created.entry_id));
    assert_eq!(asset.file_path, relative);
    assert_eq!(
        service.list_project_images(created.project.id).unwrap().len(),
        1
    );
}

#[test]
fn small_images_are_not_upscaled_and_unowned_go_to_no_project() {
    let conn = open_db_in_memory().unwrap();
    let media = tempfile::tempdir().unwrap();
    let service = ImageService::new(
        SqliteImageRepository::try_new(&conn).unwrap(),
        storage(media.path(), 2000),
    );

    let stored = service.upload(&upload(png_bytes(30, 20))).unwrap();
    assert_eq!((stored.width, stored.height), (30, 20));
    assert!(stored.url.contains("/no-project/"));
}

#[test]
fn invalid_uploads_are_client_errors() {
    let conn = open_db_in_memory().unwrap();
    let media = tempfile::tempdir().unwrap();
    let mut settings = storage(media.path(), 2000);
    settings.limits.max_upload_bytes = 64;
    let service = ImageService::new(SqliteImageRepository::try_new(&conn).unwrap(), settings);

    let err = service
        .upload(&ImageUpload {
            content_type: "text/plain".to_string(),
            ..upload(vec![1, 2, 3])
        })
        .unwrap_err();
    assert!(matches!(err, ImageServiceError::UnsupportedContentType(_)));

    let err = service.upload(&upload(png_bytes(64, 64))).unwrap_err();
    assert!(matches!(err, ImageServiceError::TooLarge { max: 64, .. }));

    let err = service.upload(&upload(b"not an image".to_vec())).unwrap_err();
    assert!(matches!(err, ImageServiceError::Processing(_)));
    assert!(err.is_client_error());

    let err = service.upload(&upload(Vec::new())).unwrap_err();
    assert!(matches!(err, ImageServiceError::EmptyUpload));
}

#[test]
fn upload_for_missing_owner_is_not_found_and_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let media = tempfile::tempdir().unwrap();
    let service = ImageService::new(
        SqliteImageRepository::try_new(&conn).unwrap(),
        storage(media.path(), 2000),
    );

    let missing = uuid::Uuid::new_v4();
    let err = service
        .upload(&ImageUpload {
            project_id: Some(missing),
            ..upload(png_bytes(2, 2))
        })
        .unwrap_err();
    assert!(
        matches!(err, ImageServiceError::NotFound { entity: "project", id } if id == missing)
    );
    assert!(err.is_client_error());

    let err = service
        .upload(&ImageUpload {
            entry_id: Some(missing),
            ..upload(png_bytes(2, 2))
        })
        .unwrap_err();
    assert!(matches!(err, ImageServiceError::NotFound { entity: "entry", .. }));

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM images;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(std::fs::read_dir(media.path()).unwrap().count(), 0);
}

#[test]
fn deleting_entry_keeps_image_but_clears_link() {
    let conn = open_db_in_memory().unwrap();
    let media = tempfile::tempdir().unwrap();
    let created = create_project(&conn);
    let service = ImageService::new(
        SqliteImageRepository::try_new(&conn).unwrap(),
        storage(media.path(), 2000),
    );
    let stored = service
        .upload(&ImageUpload {
            entry_id: Some(created.entry_id),
            ..upload(png_bytes(4, 4))
        })
        .unwrap();

    conn.execute(
        "DELETE FROM entries WHERE id = ?1;",
        [created.entry_id.to_string()],
    )
    .unwrap();

    let asset = service.get_image(stored.id).unwrap().unwrap();
    assert_eq!(asset.entry_id, None);
    assert_eq!(asset.project_id, Some(created.project.id));
}
