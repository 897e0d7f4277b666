//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Validate input before it reaches storage.
//! - Keep outer transports decoupled from storage details.

pub mod entrypoint_service;
pub mod hierarchy_service;
pub mod image_service;
pub mod project_service;
pub mod version_service;
