use rusqlite::Connection;
use workbench_core::db::open_db_in_memory;
use workbench_core::search::text::{HitKind, SearchScope, SearchTarget};
use workbench_core::{
    search, CoreConfig, DraftPatch, HierarchyService, NewEntry, NewProject, ProjectCreated,
    ProjectService, ProjectStructure, ReleaseRequest, SearchQuery, SqliteHierarchyRepository,
    SqliteProjectRepository, SqliteVersionRepository, VersionService,
};

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create_project(conn: &Connection, title: &str) -> ProjectCreated {
    ProjectService::new(
        SqliteProjectRepository::try_new(conn).unwrap(),
        SqliteHierarchyRepository::try_new(conn).unwrap(),
    )
    .create_project(&NewProject::new(title, ProjectStructure::Entries))
    .unwrap()
}

fn save_text(conn: &Connection, entry_id: uuid::Uuid, text: &str) {
    HierarchyService::new(SqliteHierarchyRepository::try_new(conn).unwrap())
        .update_entry_draft(
            entry_id,
            &DraftPatch {
                text: Some(text.to_string()),
                ..DraftPatch::default()
            },
        )
        .unwrap();
}

fn query(text: &str, only: SearchTarget) -> SearchQuery {
    SearchQuery {
        only,
        ..SearchQuery::new(text)
    }
}

#[test]
fn blank_query_returns_nothing() {
    let conn = setup();
    let created = create_project(&conn, "P");
    save_text(&conn, created.entry_id, "anything");

    assert!(search(&conn, &SearchQuery::new("   ")).unwrap().is_empty());
}

#[test]
fn draft_search_is_unicode_case_insensitive() {
    let conn = setup();
    let created = create_project(&conn, "Заметки");
    save_text(&conn, created.entry_id, "Встреча с КОМАНДОЙ в среду");

    let hits = search(&conn, &SearchQuery::new("командой")).unwrap();
    assert_eq!(hits.len(), 1);
    let hit = &hits[0];
    assert_eq!(hit.kind, HitKind::Draft);
    assert_eq!(hit.project_id, created.project.id);
    assert_eq!(hit.project_title, "Заметки");
    assert_eq!(hit.section_id, created.section_id);
    assert_eq!(hit.entry_id, created.entry_id);
    assert_eq!(hit.entry_title, "Первая запись");
    assert!(hit.snapshot_id.is_none());

    let json = serde_json::to_value(hit).unwrap();
    assert_eq!(json["kind"], "draft");
    assert!(json.get("snapshot_id").is_none());
}

#[test]
fn release_search_only_sees_released_revisions() {
    let conn = setup();
    let created = create_project(&conn, "P");
    save_text(&conn, created.entry_id, "published words");
    let versions = VersionService::new(SqliteVersionRepository::try_new(&conn).unwrap());
    let receipt = versions
        .make_release(created.section_id, &ReleaseRequest::default())
        .unwrap();
    save_text(&conn, created.entry_id, "edited draft");

    let hits = search(&conn, &query("published", SearchTarget::Release)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, HitKind::Release);
    assert_eq!(hits[0].snapshot_id, Some(receipt.release_snapshot_id));
    assert!(hits[0].entry_revision_id.is_some());

    assert!(search(&conn, &query("published", SearchTarget::Draft))
        .unwrap()
        .is_empty());
    assert!(search(&conn, &query("edited", SearchTarget::Release))
        .unwrap()
        .is_empty());
}

#[test]
fn plain_snapshots_are_not_searched_as_releases() {
    let conn = setup();
    let created = create_project(&conn, "P");
    save_text(&conn, created.entry_id, "checkpoint text");
    VersionService::new(SqliteVersionRepository::try_new(&conn).unwrap())
        .snapshot_section(created.section_id, &Default::default())
        .unwrap();

    assert!(search(&conn, &query("checkpoint", SearchTarget::Release))
        .unwrap()
        .is_empty());
}

#[test]
fn all_lists_drafts_before_releases() {
    let conn = setup();
    let created = create_project(&conn, "P");
    save_text(&conn, created.entry_id, "shared needle");
    VersionService::new(SqliteVersionRepository::try_new(&conn).unwrap())
        .make_release(created.section_id, &ReleaseRequest::default())
        .unwrap();

    let kinds: Vec<HitKind> = search(&conn, &query("NEEDLE", SearchTarget::All))
        .unwrap()
        .into_iter()
        .map(|hit| hit.kind)
        .collect();
    assert_eq!(kinds, vec![HitKind::Draft, HitKind::Release]);
}

#[test]
fn project_scope_restricts_hits() {
    let conn = setup();
    let first = create_project(&conn, "First");
    let second = create_project(&conn, "Second");
    save_text(&conn, first.entry_id, "common term");
    save_text(&conn, second.entry_id, "common term");

    assert_eq!(search(&conn, &SearchQuery::new("common")).unwrap().len(), 2);

    let scoped = SearchQuery {
        scope: SearchScope::Project(second.project.id),
        ..SearchQuery::new("common")
    };
    let hits = search(&conn, &scoped).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].project_id, second.project.id);
}

#[test]
fn each_group_is_capped() {
    let conn = setup();
    let created = create_project(&conn, "P");
    let hierarchy = HierarchyService::new(SqliteHierarchyRepository::try_new(&conn).unwrap());
    for index in 0..5 {
        let mut entry = NewEntry::titled(format!("E{index}"));
        entry.draft.text = "repeated".to_string();
        hierarchy.create_entry(created.section_id, &entry).unwrap();
    }

    let hits = search(&conn, &SearchQuery::new("repeated").with_limit(3)).unwrap();
    assert_eq!(hits.len(), 3);
}

#[test]
fn configured_result_cap_limits_hits() {
    let conn = setup();
    let created = create_project(&conn, "P");
    let hierarchy = HierarchyService::new(SqliteHierarchyRepository::try_new(&conn).unwrap());
    for index in 0..4 {
        let mut entry = NewEntry::titled(format!("E{index}"));
        entry.draft.text = "capped".to_string();
        hierarchy.create_entry(created.section_id, &entry).unwrap();
    }
    let config = CoreConfig::from_toml_str("[search]\nresult_cap = 2\n").unwrap();

    let query = SearchQuery::from_params(Some("capped"), None, None, None)
        .unwrap()
        .with_settings(&config.search);
    assert_eq!(search(&conn, &query).unwrap().len(), 2);
}
