//! Project entrypoint healing.
//!
//! Guarantees every project has a topic, section and entry to land on.
//! Which placeholders get created depends on the project's structure mode:
//! shallow modes hide their auto-created containers behind
//! `ContainerOrigin::System`.

use super::hierarchy_service::HierarchyResult;
use crate::model::hierarchy::{Draft, EntryType, NewContainer, NewEntry};
use crate::model::project::{ProjectId, ProjectStructure};
use crate::repo::hierarchy_repo::{Entrypoint, EntrypointPlan, HierarchyRepository};
use log::{error, info};
use std::time::Instant;

pub const USER_TOPIC_TITLE: &str = "Тема 1";
pub const SYSTEM_TOPIC_TITLE: &str = "📌 system";
pub const USER_SECTION_TITLE: &str = "Раздел 1";
pub const INBOX_SECTION_TITLE: &str = "📌 Входящие";
pub const FIRST_ENTRY_TITLE: &str = "Первая запись";

/// Placeholders to create for a project of the given structure.
pub fn entrypoint_plan(structure: ProjectStructure) -> EntrypointPlan {
    let topic = match structure {
        ProjectStructure::Topics => NewContainer::user(USER_TOPIC_TITLE),
        ProjectStructure::Sections | ProjectStructure::Entries => {
            NewContainer::system(SYSTEM_TOPIC_TITLE)
        }
    };
    let section = match structure {
        ProjectStructure::Entries => NewContainer::system(INBOX_SECTION_TITLE),
        ProjectStructure::Topics | ProjectStructure::Sections => {
            NewContainer::user(USER_SECTION_TITLE)
        }
    };
    let entry = NewEntry {
        title: FIRST_ENTRY_TITLE.to_string(),
        kind: EntryType::Note,
        sort_order: None,
        draft: Draft::empty_document(),
    };
    EntrypointPlan {
        topic,
        section,
        entry,
    }
}

/// Finds or creates the project's first (section, entry) pair.
///
/// Idempotent: a second call creates nothing and returns the same pair.
pub fn ensure_project_entrypoint<R: HierarchyRepository>(
    repo: &R,
    project_id: ProjectId,
) -> HierarchyResult<Entrypoint> {
    let started_at = Instant::now();
    match repo.ensure_entrypoint(project_id, entrypoint_plan) {
        Ok(entrypoint) => {
            info!(
                "event=entrypoint_heal module=entrypoint status=ok project_id={project_id} section_id={} entry_id={} created_topic={} created_section={} created_entry={} duration_ms={}",
                entrypoint.section.id,
                entrypoint.entry.id,
                entrypoint.created.topic,
                entrypoint.created.section,
                entrypoint.created.entry,
                started_at.elapsed().as_millis()
            );
            Ok(entrypoint)
        }
        Err(err) => {
            error!(
                "event=entrypoint_heal module=entrypoint status=error project_id={project_id} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::hierarchy::ContainerOrigin;

    #[test]
    fn topics_structure_plans_user_topic() {
        let plan = entrypoint_plan(ProjectStructure::Topics);
        assert_eq!(plan.topic.title, USER_TOPIC_TITLE);
        assert_eq!(plan.topic.origin, ContainerOrigin::User);
        assert_eq!(plan.section.origin, ContainerOrigin::User);
    }

    #[test]
    fn entries_structure_hides_both_containers() {
        let plan = entrypoint_plan(ProjectStructure::Entries);
        assert_eq!(plan.topic.origin, ContainerOrigin::System);
        assert_eq!(plan.section.title, INBOX_SECTION_TITLE);
        assert_eq!(plan.section.origin, ContainerOrigin::System);
        assert_eq!(plan.entry.draft, Draft::empty_document());
    }
}
