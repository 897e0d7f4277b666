//! Project use-case service.
//!
//! # Responsibility
//! - Create projects together with their entrypoint.
//! - Apply partial updates and opened-at stamps.
//! - Build the topic/section tree after healing the entrypoint.

use super::entrypoint_service::ensure_project_entrypoint;
use super::hierarchy_service::{HierarchyResult, HierarchyServiceError};
use crate::model::hierarchy::{EntryId, SectionId, SectionNode, TopicNode};
use crate::model::project::{NewProject, Project, ProjectId, ProjectPatch};
use crate::repo::hierarchy_repo::HierarchyRepository;
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use log::info;
use serde::Serialize;
use std::collections::HashMap;

/// Create response: the project and where to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectCreated {
    pub project: Project,
    pub section_id: SectionId,
    pub entry_id: EntryId,
}

/// Project service facade over project and hierarchy repositories.
pub struct ProjectService<P: ProjectRepository, H: HierarchyRepository> {
    projects: P,
    hierarchy: H,
}

impl<P: ProjectRepository, H: HierarchyRepository> ProjectService<P, H> {
    pub fn new(projects: P, hierarchy: H) -> Self {
        Self {
            projects,
            hierarchy,
        }
    }

    /// Inserts the project, then heals its entrypoint.
    ///
    /// The insert and the heal commit in separate transactions. If healing
    /// fails the project is kept without an entrypoint, and the next
    /// `project_tree` call heals it.
    pub fn create_project(&self, input: &NewProject) -> HierarchyResult<ProjectCreated> {
        let project = self.projects.create_project(input)?;
        info!(
            "event=project_create module=project status=ok project_id={} structure={}",
            project.id,
            project.structure.as_str()
        );
        let entrypoint = ensure_project_entrypoint(&self.hierarchy, project.id)?;
        Ok(ProjectCreated {
            project,
            section_id: entrypoint.section.id,
            entry_id: entrypoint.entry.id,
        })
    }

    pub fn get_project(&self, id: ProjectId) -> HierarchyResult<Project> {
        self.projects
            .get_project(id)?
            .ok_or(HierarchyServiceError::NotFound {
                entity: "project",
                id,
            })
    }

    pub fn list_projects(&self, query: &ProjectListQuery) -> HierarchyResult<Vec<Project>> {
        Ok(self.projects.list_projects(query)?)
    }

    pub fn update_project(&self, id: ProjectId, patch: &ProjectPatch) -> HierarchyResult<Project> {
        let mut project = self.get_project(id)?;
        patch.apply_to(&mut project)?;
        let project = self.projects.update_project(&project)?;
        info!("event=project_update module=project status=ok project_id={id}");
        Ok(project)
    }

    pub fn mark_opened(&self, id: ProjectId) -> HierarchyResult<Project> {
        Ok(self.projects.mark_opened(id)?)
    }

    /// Deletes the project and, by cascade, everything it contains.
    pub fn delete_project(&self, id: ProjectId) -> HierarchyResult<()> {
        self.projects.delete_project(id)?;
        info!("event=project_delete module=project status=ok project_id={id}");
        Ok(())
    }

    /// Heals the entrypoint, then returns topics with their sections, both
    /// ordered by `(sort_order, id)`.
    pub fn project_tree(&self, id: ProjectId) -> HierarchyResult<Vec<TopicNode>> {
        ensure_project_entrypoint(&self.hierarchy, id)?;

        let mut sections_by_topic: HashMap<_, Vec<SectionNode>> = HashMap::new();
        for section in self.hierarchy.list_project_sections(id)? {
            sections_by_topic
                .entry(section.topic_id)
                .or_default()
                .push(SectionNode {
                    id: section.id,
                    title: section.title,
                    sort_order: section.sort_order,
                    origin: section.origin,
                });
        }

        let tree = self
            .hierarchy
            .list_topics(id)?
            .into_iter()
            .map(|topic| TopicNode {
                sections: sections_by_topic.remove(&topic.id).unwrap_or_default(),
                id: topic.id,
                title: topic.title,
                sort_order: topic.sort_order,
                origin: topic.origin,
            })
            .collect();
        Ok(tree)
    }
}
