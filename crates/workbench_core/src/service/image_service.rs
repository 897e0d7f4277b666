//! Image upload pipeline.
//!
//! # Responsibility
//! - Validate uploads (content type, size) and resolve their owners.
//! - Normalize pixels to RGBA, shrink to the configured bound and store
//!   them as lossless WebP under the media root.
//! - Record the stored file in the `images` table.
//!
//! # Invariants
//! - Images are never upscaled.
//! - A file is only left on disk when its row was persisted.

use crate::config::{CoreConfig, ImageSettings};
use crate::model::image::{ImageAsset, ImageId, ImageUpload, UploadedImage};
use crate::model::project::ProjectId;
use crate::repo::image_repo::{ImageRepository, NewImage};
use crate::repo::RepoError;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// Directory below the media root that receives uploads.
const IMAGE_DIR: &str = "workbench/images";
const NO_PROJECT_DIR: &str = "no-project";

#[derive(Debug)]
pub enum ImageServiceError {
    /// Upload carried no bytes.
    EmptyUpload,
    /// Content type is not `image/*`.
    UnsupportedContentType(String),
    TooLarge { size: u64, max: u64 },
    /// Referenced entry or project does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Decode, resize or encode failed.
    Processing(String),
    /// Writing the file under the media root failed.
    Io(std::io::Error),
    Repo(RepoError),
}

impl ImageServiceError {
    /// Whether the failure is caused by the upload itself.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Repo(_))
    }
}

impl Display for ImageServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUpload => write!(f, "file is required"),
            Self::UnsupportedContentType(value) => {
                write!(f, "only image/* allowed, got `{value}`")
            }
            Self::TooLarge { size, max } => {
                write!(f, "file too large: {size} bytes, limit {max}")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Processing(message) => write!(f, "image processing failed: {message}"),
            Self::Io(err) => write!(f, "image storage failed: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImageServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ImageServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<std::io::Error> for ImageServiceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<image::ImageError> for ImageServiceError {
    fn from(value: image::ImageError) -> Self {
        Self::Processing(value.to_string())
    }
}

/// Where uploads go and how large they may be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStorage {
    pub media_root: PathBuf,
    pub media_url: String,
    pub limits: ImageSettings,
}

impl MediaStorage {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            media_root: config.media_root.clone(),
            media_url: config.media_url.clone(),
            limits: config.image,
        }
    }

    fn url_for(&self, relative_path: &str) -> String {
        format!("{}/{relative_path}", self.media_url.trim_end_matches('/'))
    }
}

pub struct ImageService<R: ImageRepository> {
    repo: R,
    storage: MediaStorage,
}

impl<R: ImageRepository> ImageService<R> {
    pub fn new(repo: R, storage: MediaStorage) -> Self {
        Self { repo, storage }
    }

    /// Validates, normalizes and stores one uploaded image.
    pub fn upload(&self, upload: &ImageUpload) -> Result<UploadedImage, ImageServiceError> {
        let started_at = Instant::now();
        match self.store_upload(upload) {
            Ok(stored) => {
                info!(
                    "event=image_upload module=image status=ok image_id={} width={} height={} duration_ms={}",
                    stored.id,
                    stored.width,
                    stored.height,
                    started_at.elapsed().as_millis()
                );
                Ok(stored)
            }
            Err(err) => {
                if err.is_client_error() {
                    warn!(
                        "event=image_upload module=image status=error bytes={} error={err}",
                        upload.bytes.len()
                    );
                } else {
                    error!(
                        "event=image_upload module=image status=error bytes={} error={err}",
                        upload.bytes.len()
                    );
                }
                Err(err)
            }
        }
    }

    pub fn get_image(&self, id: ImageId) -> Result<Option<ImageAsset>, ImageServiceError> {
        Ok(self.repo.get_image(id)?)
    }

    pub fn list_project_images(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ImageAsset>, ImageServiceError> {
        Ok(self.repo.list_project_images(project_id)?)
    }

    fn store_upload(&self, upload: &ImageUpload) -> Result<UploadedImage, ImageServiceError> {
        validate_upload(upload, &self.storage.limits)?;
        let project_id = self.resolve_project(upload)?;

        let pixels = normalize_image(&upload.bytes, self.storage.limits.max_side)?;
        let encoded = encode_webp(&pixels)?;

        let id = Uuid::new_v4();
        let folder = project_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| NO_PROJECT_DIR.to_string());
        let relative_path = format!("{IMAGE_DIR}/{folder}/{id}.webp");
        let absolute_path = self.storage.media_root.join(&relative_path);
        if let Some(parent) = absolute_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&absolute_path, &encoded)?;

        let record = NewImage {
            id,
            project_id,
            entry_id: upload.entry_id,
            file_path: relative_path.clone(),
            width: pixels.width(),
            height: pixels.height(),
        };
        if let Err(err) = self.repo.insert_image(&record) {
            if let Err(cleanup) = std::fs::remove_file(&absolute_path) {
                warn!("event=image_cleanup module=image status=error image_id={id} error={cleanup}");
            }
            return Err(err.into());
        }

        Ok(UploadedImage {
            id,
            url: self.storage.url_for(&relative_path),
            width: pixels.width(),
            height: pixels.height(),
        })
    }

    /// Entry wins over project: an entry-bound image belongs to the entry's project.
    fn resolve_project(&self, upload: &ImageUpload) -> Result<Option<ProjectId>, ImageServiceError> {
        if let Some(entry_id) = upload.entry_id {
            return match self.repo.entry_project(entry_id)? {
                Some(project_id) => Ok(Some(project_id)),
                None => Err(ImageServiceError::NotFound {
                    entity: "entry",
                    id: entry_id,
                }),
            };
        }
        match upload.project_id {
            Some(project_id) if !self.repo.project_exists(project_id)? => {
                Err(ImageServiceError::NotFound {
                    entity: "project",
                    id: project_id,
                })
            }
            other => Ok(other),
        }
    }
}

fn validate_upload(upload: &ImageUpload, limits: &ImageSettings) -> Result<(), ImageServiceError> {
    if upload.bytes.is_empty() {
        return Err(ImageServiceError::EmptyUpload);
    }
    if !upload.content_type.starts_with("image/") {
        return Err(ImageServiceError::UnsupportedContentType(
            upload.content_type.clone(),
        ));
    }
    let size = upload.bytes.len() as u64;
    if size > limits.max_upload_bytes {
        return Err(ImageServiceError::TooLarge {
            size,
            max: limits.max_upload_bytes,
        });
    }
    Ok(())
}

/// Decodes to RGBA and shrinks so the longer side fits `max_side`.
fn normalize_image(bytes: &[u8], max_side: u32) -> Result<RgbaImage, ImageServiceError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = bounded_size(rgba.width(), rgba.height(), max_side);
    if (width, height) == rgba.dimensions() {
        return Ok(rgba);
    }
    Ok(image::imageops::resize(
        &rgba,
        width,
        height,
        FilterType::Lanczos3,
    ))
}

fn encode_webp(pixels: &RgbaImage) -> Result<Vec<u8>, ImageServiceError> {
    let mut encoded = Vec::new();
    WebPEncoder::new_lossless(&mut encoded).write_image(
        pixels.as_raw(),
        pixels.width(),
        pixels.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(encoded)
}

/// Target size keeping aspect ratio; never larger than the input.
pub fn bounded_size(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_side || longer == 0 {
        return (width, height);
    }
    let scale = f64::from(max_side) / f64::from(longer);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_side);
    (scaled(width), scaled(height))
}

#[cfg(test)]
mod tests {
    use super::bounded_size;

    #[test]
    fn small_images_keep_their_size() {
        assert_eq!(bounded_size(640, 480, 2000), (640, 480));
    }

    #[test]
    fn longer_side_is_clamped() {
        assert_eq!(bounded_size(4000, 1000, 2000), (2000, 500));
        assert_eq!(bounded_size(1000, 3000, 1500), (500, 1500));
    }

    #[test]
    fn thin_images_keep_one_pixel() {
        assert_eq!(bounded_size(10_000, 1, 2000), (2000, 1));
    }
}
