//! Search entry points.
//!
//! # Responsibility
//! - Expose substring search over drafts and releases.
//! - Keep search result shaping inside core.

pub mod text;
