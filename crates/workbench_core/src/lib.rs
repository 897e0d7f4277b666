//! Core domain logic for the workbench: projects, topics, sections and
//! entries with versioned drafts, snapshots and releases.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_configured_db, open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::hierarchy::{
    ContainerOrigin, Draft, DraftPatch, Entry, EntryId, EntryType, NewContainer, NewEntry,
    Section, SectionId, SectionNode, Topic, TopicId, TopicNode,
};
pub use model::image::{ImageAsset, ImageId, ImageUpload, UploadedImage};
pub use model::project::{
    NewProject, Project, ProjectId, ProjectPatch, ProjectStatus, ProjectStructure,
};
pub use model::version::{
    EntryRevision, ReleaseReceipt, ReleaseRequest, RevisionId, SectionSnapshot, SnapshotDetail,
    SnapshotId, SnapshotKind, SnapshotReceipt, SnapshotRequest,
};
pub use model::FieldError;
pub use repo::hierarchy_repo::{HierarchyRepository, SqliteHierarchyRepository};
pub use repo::image_repo::{ImageRepository, SqliteImageRepository};
pub use repo::project_repo::{ProjectListQuery, ProjectRepository, SqliteProjectRepository};
pub use repo::version_repo::{SqliteVersionRepository, VersionRepository};
pub use repo::{RepoError, RepoResult};
pub use search::text::{search, SearchError, SearchHit, SearchQuery, SearchResult};
pub use service::hierarchy_service::{HierarchyService, HierarchyServiceError};
pub use service::image_service::{ImageService, ImageServiceError, MediaStorage};
pub use service::project_service::{ProjectCreated, ProjectService};
pub use service::version_service::{VersionService, VersionServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
