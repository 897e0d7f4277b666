//! Topic/section/entry use-case service.
//!
//! # Responsibility
//! - Validate titles and parent existence above the repository layer.
//! - Provide create, rename, move, list and delete for every hierarchy level.
//! - Derive the plain-text draft extract used by search.
//!
//! # Invariants
//! - Titles are trimmed; topic and section titles must not be blank.
//! - A draft patch carrying html but no text gets its text derived from html.

use crate::model::hierarchy::{
    DraftPatch, Entry, EntryId, NewContainer, NewEntry, Section, SectionId, Topic, TopicId,
};
use crate::model::project::ProjectId;
use crate::model::{normalize_title, FieldError};
use crate::repo::hierarchy_repo::HierarchyRepository;
use crate::repo::RepoError;
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static LINE_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|blockquote|pre)>").expect("valid break regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static INLINE_WS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid inline ws regex"));

/// Service error shared by hierarchy and project use-cases.
#[derive(Debug)]
pub enum HierarchyServiceError {
    /// Input field rejected.
    Validation(FieldError),
    /// Target or parent row does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Write rejected by a store constraint.
    Conflict(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for HierarchyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HierarchyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for HierarchyServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::IntegrityViolation(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

impl From<FieldError> for HierarchyServiceError {
    fn from(value: FieldError) -> Self {
        Self::Validation(value)
    }
}

pub type HierarchyResult<T> = Result<T, HierarchyServiceError>;

/// Hierarchy service facade over repository implementations.
pub struct HierarchyService<R: HierarchyRepository> {
    repo: R,
}

impl<R: HierarchyRepository> HierarchyService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_topic(
        &self,
        project_id: ProjectId,
        input: &NewContainer,
    ) -> HierarchyResult<Topic> {
        let input = NewContainer {
            title: normalize_title("title", &input.title, false)?,
            ..input.clone()
        };
        let topic = self.repo.create_topic(project_id, &input)?;
        info!(
            "event=topic_create module=hierarchy status=ok project_id={project_id} topic_id={}",
            topic.id
        );
        Ok(topic)
    }

    pub fn get_topic(&self, id: TopicId) -> HierarchyResult<Topic> {
        self.repo.get_topic(id)?.ok_or(not_found("topic", id))
    }

    pub fn list_topics(&self, project_id: ProjectId) -> HierarchyResult<Vec<Topic>> {
        Ok(self.repo.list_topics(project_id)?)
    }

    pub fn rename_topic(&self, id: TopicId, title: &str) -> HierarchyResult<Topic> {
        let title = normalize_title("title", title, false)?;
        Ok(self.repo.rename_topic(id, &title)?)
    }

    /// Moves a topic to `target_index` (0-based) among its siblings.
    pub fn move_topic(&self, id: TopicId, target_index: usize) -> HierarchyResult<()> {
        self.repo.move_topic(id, target_index)?;
        info!("event=topic_move module=hierarchy status=ok topic_id={id} index={target_index}");
        Ok(())
    }

    pub fn delete_topic(&self, id: TopicId) -> HierarchyResult<()> {
        self.repo.delete_topic(id)?;
        info!("event=topic_delete module=hierarchy status=ok topic_id={id}");
        Ok(())
    }

    pub fn create_section(
        &self,
        topic_id: TopicId,
        input: &NewContainer,
    ) -> HierarchyResult<Section> {
        let input = NewContainer {
            title: normalize_title("title", &input.title, false)?,
            ..input.clone()
        };
        let section = self.repo.create_section(topic_id, &input)?;
        info!(
            "event=section_create module=hierarchy status=ok topic_id={topic_id} section_id={}",
            section.id
        );
        Ok(section)
    }

    pub fn get_section(&self, id: SectionId) -> HierarchyResult<Section> {
        self.repo.get_section(id)?.ok_or(not_found("section", id))
    }

    pub fn list_sections(&self, topic_id: TopicId) -> HierarchyResult<Vec<Section>> {
        Ok(self.repo.list_sections(topic_id)?)
    }

    pub fn rename_section(&self, id: SectionId, title: &str) -> HierarchyResult<Section> {
        let title = normalize_title("title", title, false)?;
        Ok(self.repo.rename_section(id, &title)?)
    }

    pub fn move_section(&self, id: SectionId, target_index: usize) -> HierarchyResult<()> {
        self.repo.move_section(id, target_index)?;
        info!(
            "event=section_move module=hierarchy status=ok section_id={id} index={target_index}"
        );
        Ok(())
    }

    pub fn delete_section(&self, id: SectionId) -> HierarchyResult<()> {
        self.repo.delete_section(id)?;
        info!("event=section_delete module=hierarchy status=ok section_id={id}");
        Ok(())
    }

    pub fn create_entry(&self, section_id: SectionId, input: &NewEntry) -> HierarchyResult<Entry> {
        let mut input = input.clone();
        input.title = normalize_title("title", &input.title, true)?;
        if input.draft.text.is_empty() && !input.draft.html.is_empty() {
            input.draft.text = derive_plain_text(&input.draft.html);
        }
        let entry = self.repo.create_entry(section_id, &input)?;
        info!(
            "event=entry_create module=hierarchy status=ok section_id={section_id} entry_id={}",
            entry.id
        );
        Ok(entry)
    }

    pub fn get_entry(&self, id: EntryId) -> HierarchyResult<Entry> {
        self.repo.get_entry(id)?.ok_or(not_found("entry", id))
    }

    pub fn list_entries(&self, section_id: SectionId) -> HierarchyResult<Vec<Entry>> {
        Ok(self.repo.list_entries(section_id)?)
    }

    /// Saves a partial draft. An empty patch returns the entry unchanged.
    ///
    /// A patch with `html` but no `text` still replaces `draft_text`, with
    /// the plain text derived from the html.
    pub fn update_entry_draft(&self, id: EntryId, patch: &DraftPatch) -> HierarchyResult<Entry> {
        if patch.is_empty() {
            return self.get_entry(id);
        }

        let mut patch = patch.clone();
        if let Some(title) = patch.title.as_deref() {
            patch.title = Some(normalize_title("title", title, true)?);
        }
        if patch.text.is_none() {
            patch.text = patch.html.as_deref().map(derive_plain_text);
        }

        match self.repo.update_entry_draft(id, &patch) {
            Ok(entry) => {
                info!("event=entry_draft_save module=hierarchy status=ok entry_id={id}");
                Ok(entry)
            }
            Err(err) => {
                error!("event=entry_draft_save module=hierarchy status=error entry_id={id} error={err}");
                Err(err.into())
            }
        }
    }

    pub fn move_entry(&self, id: EntryId, target_index: usize) -> HierarchyResult<()> {
        self.repo.move_entry(id, target_index)?;
        info!("event=entry_move module=hierarchy status=ok entry_id={id} index={target_index}");
        Ok(())
    }

    pub fn delete_entry(&self, id: EntryId) -> HierarchyResult<()> {
        self.repo.delete_entry(id)?;
        info!("event=entry_delete module=hierarchy status=ok entry_id={id}");
        Ok(())
    }
}

fn not_found(entity: &'static str, id: Uuid) -> HierarchyServiceError {
    HierarchyServiceError::NotFound { entity, id }
}

/// Extracts searchable plain text from draft html.
///
/// Block ends and `<br>` become line breaks, remaining tags are dropped,
/// basic entities are decoded and blank lines removed.
pub fn derive_plain_text(html: &str) -> String {
    let with_breaks = LINE_BREAK_RE.replace_all(html, "\n");
    let without_tags = TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&without_tags);
    decoded
        .lines()
        .map(|line| INLINE_WS_RE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::derive_plain_text;

    #[test]
    fn plain_text_keeps_paragraph_breaks() {
        let text = derive_plain_text("<p>Привет, <b>мир</b></p><p>second&nbsp;line</p>");
        assert_eq!(text, "Привет, мир\nsecond line");
    }

    #[test]
    fn plain_text_of_empty_paragraph_is_empty() {
        assert_eq!(derive_plain_text("<p></p>"), "");
        assert_eq!(derive_plain_text("<p><br></p>"), "");
    }

    #[test]
    fn plain_text_decodes_ampersand_last() {
        assert_eq!(derive_plain_text("a &amp;lt; b"), "a &lt; b");
    }
}
