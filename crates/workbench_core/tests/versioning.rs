use rusqlite::Connection;
use workbench_core::db::open_db_in_memory;
use workbench_core::{
    DraftPatch, EntryId, HierarchyService, NewEntry, NewProject, ProjectService,
    ProjectStructure, ReleaseRequest, SectionId, SnapshotKind, SnapshotRequest,
    SqliteHierarchyRepository, SqliteProjectRepository, SqliteVersionRepository, VersionService,
    VersionServiceError,
};

struct Fixture {
    conn: Connection,
    section_id: SectionId,
    entries: Vec<EntryId>,
}

/// Project in `entries` mode with entries A(1), B(2), C(3) in one section.
fn fixture() -> Fixture {
    let conn = open_db_in_memory().unwrap();
    let (section_id, entries) = {
        let projects = ProjectService::new(
            SqliteProjectRepository::try_new(&conn).unwrap(),
            SqliteHierarchyRepository::try_new(&conn).unwrap(),
        );
        let created = projects
            .create_project(&NewProject::new("Versioned", ProjectStructure::Entries))
            .unwrap();
        let hierarchy = HierarchyService::new(SqliteHierarchyRepository::try_new(&conn).unwrap());
        let a = created.entry_id;
        save_text(&hierarchy, a, "alpha");
        let b = hierarchy
            .create_entry(created.section_id, &NewEntry::titled("B"))
            .unwrap()
            .id;
        save_text(&hierarchy, b, "beta");
        let c = hierarchy
            .create_entry(created.section_id, &NewEntry::titled("C"))
            .unwrap()
            .id;
        save_text(&hierarchy, c, "gamma");
        (created.section_id, vec![a, b, c])
    };
    Fixture {
        conn,
        section_id,
        entries,
    }
}

fn save_text(hierarchy: &HierarchyService<SqliteHierarchyRepository<'_>>, id: EntryId, text: &str) {
    hierarchy
        .update_entry_draft(
            id,
            &DraftPatch {
                html: Some(format!("<p>{text}</p>")),
                ..DraftPatch::default()
            },
        )
        .unwrap();
}

fn versions(conn: &Connection) -> VersionService<SqliteVersionRepository<'_>> {
    VersionService::new(SqliteVersionRepository::try_new(conn).unwrap())
}

#[test]
fn sequential_revisions_are_numbered_from_one() {
    let fx = fixture();
    let service = versions(&fx.conn);
    let entry_id = fx.entries[0];

    let numbers: Vec<i64> = (0..4)
        .map(|_| service.capture_revision(entry_id, None).unwrap().rev_no)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let listed: Vec<i64> = service
        .list_revisions(entry_id)
        .unwrap()
        .into_iter()
        .map(|revision| revision.rev_no)
        .collect();
    assert_eq!(listed, vec![4, 3, 2, 1]);
}

#[test]
fn revision_copies_draft_without_touching_entry() {
    let fx = fixture();
    let hierarchy = HierarchyService::new(SqliteHierarchyRepository::try_new(&fx.conn).unwrap());
    let before = hierarchy.get_entry(fx.entries[1]).unwrap();

    let revision = versions(&fx.conn)
        .capture_revision(fx.entries[1], Some("  checkpoint "))
        .unwrap();

    assert_eq!(revision.text, "beta");
    assert_eq!(revision.html, before.draft.html);
    assert_eq!(revision.delta, before.draft.delta);
    assert_eq!(revision.note, "checkpoint");
    assert_eq!(hierarchy.get_entry(fx.entries[1]).unwrap(), before);
}

#[test]
fn snapshot_and_release_share_one_sequence() {
    let fx = fixture();
    let service = versions(&fx.conn);

    let first = service
        .snapshot_section(fx.section_id, &SnapshotRequest::default())
        .unwrap();
    let release = service
        .make_release(fx.section_id, &ReleaseRequest::default())
        .unwrap();
    let third = service
        .snapshot_section(fx.section_id, &SnapshotRequest::default())
        .unwrap();

    assert_eq!(
        (first.rev_no, release.rev_no, third.rev_no),
        (1, 2, 3)
    );
    let kinds: Vec<SnapshotKind> = service
        .list_snapshots(fx.section_id)
        .unwrap()
        .into_iter()
        .map(|snapshot| snapshot.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![SnapshotKind::Snapshot, SnapshotKind::Release, SnapshotKind::Snapshot]
    );
}

#[test]
fn full_snapshot_captures_every_entry_in_order() {
    let fx = fixture();
    let service = versions(&fx.conn);

    let receipt = service
        .snapshot_section(fx.section_id, &SnapshotRequest::default())
        .unwrap();
    let detail = service.get_snapshot(receipt.snapshot_id).unwrap();

    let pairs: Vec<(EntryId, i64)> = detail
        .items
        .iter()
        .map(|item| (item.item.entry_id, item.item.sort_order))
        .collect();
    assert_eq!(
        pairs,
        vec![(fx.entries[0], 1), (fx.entries[1], 2), (fx.entries[2], 3)]
    );
    for item in &detail.items {
        assert_eq!(item.revision.entry_id, item.item.entry_id);
        assert_eq!(item.revision.rev_no, 1);
    }
}

#[test]
fn subset_snapshot_follows_section_order() {
    let fx = fixture();
    let service = versions(&fx.conn);
    let (a, c) = (fx.entries[0], fx.entries[2]);

    let receipt = service
        .snapshot_section(
            fx.section_id,
            &SnapshotRequest {
                note: Some("subset".to_string()),
                entry_ids: Some(vec![c, a]),
            },
        )
        .unwrap();
    let detail = service.get_snapshot(receipt.snapshot_id).unwrap();

    let pairs: Vec<(EntryId, i64)> = detail
        .items
        .iter()
        .map(|item| (item.item.entry_id, item.item.sort_order))
        .collect();
    assert_eq!(pairs, vec![(a, 1), (c, 2)]);
    assert_eq!(detail.snapshot.note, "subset");
    assert!(service.list_revisions(fx.entries[1]).unwrap().is_empty());
}

#[test]
fn release_moves_the_section_pointer() {
    let fx = fixture();
    let service = versions(&fx.conn);
    assert!(service.current_release(fx.section_id).unwrap().is_none());

    let first = service
        .make_release(fx.section_id, &ReleaseRequest::default())
        .unwrap();
    service
        .snapshot_section(fx.section_id, &SnapshotRequest::default())
        .unwrap();
    let current = service.current_release(fx.section_id).unwrap().unwrap();
    assert_eq!(current.snapshot.id, first.release_snapshot_id);
    assert_eq!(current.items.len(), 3);

    let second = service
        .make_release(fx.section_id, &ReleaseRequest::default())
        .unwrap();
    let current = service.current_release(fx.section_id).unwrap().unwrap();
    assert_eq!(current.snapshot.id, second.release_snapshot_id);
    assert_eq!(current.snapshot.rev_no, 3);
}

#[test]
fn failed_release_leaves_no_trace() {
    let fx = fixture();
    let service = versions(&fx.conn);

    let err = service
        .make_release(
            fx.section_id,
            &ReleaseRequest {
                note: Some("x".repeat(201)),
            },
        )
        .unwrap_err();
    assert!(matches!(err, VersionServiceError::Validation(_)));

    // Force a failure after the snapshot row is written: items cannot be
    // inserted while this trigger is present.
    fx.conn
        .execute_batch(
            "CREATE TRIGGER reject_items BEFORE INSERT ON section_snapshot_items
             BEGIN SELECT RAISE(ABORT, 'items rejected'); END;",
        )
        .unwrap();
    let err = service
        .make_release(fx.section_id, &ReleaseRequest::default())
        .unwrap_err();
    assert!(matches!(err, VersionServiceError::Conflict(_)));

    assert!(service.list_snapshots(fx.section_id).unwrap().is_empty());
    assert!(service.current_release(fx.section_id).unwrap().is_none());
    for entry_id in &fx.entries {
        assert!(service.list_revisions(*entry_id).unwrap().is_empty());
    }

    fx.conn.execute_batch("DROP TRIGGER reject_items;").unwrap();
    let receipt = service
        .make_release(fx.section_id, &ReleaseRequest::default())
        .unwrap();
    assert_eq!(receipt.rev_no, 1);
}

#[test]
fn release_pointer_rejects_foreign_or_plain_snapshots() {
    let fx = fixture();
    let service = versions(&fx.conn);
    let plain = service
        .snapshot_section(fx.section_id, &SnapshotRequest::default())
        .unwrap();

    let err = fx
        .conn
        .execute(
            "UPDATE sections SET release_snapshot_id = ?1 WHERE id = ?2;",
            [plain.snapshot_id.to_string(), fx.section_id.to_string()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("release snapshot"));
}

#[test]
fn referenced_revision_cannot_be_deleted() {
    let fx = fixture();
    let service = versions(&fx.conn);
    let receipt = service
        .snapshot_section(fx.section_id, &SnapshotRequest::default())
        .unwrap();
    let detail = service.get_snapshot(receipt.snapshot_id).unwrap();
    let referenced = detail.items[0].revision.id;

    let err = service.delete_revision(referenced).unwrap_err();
    assert!(matches!(err, VersionServiceError::Conflict(_)));
    assert!(service.get_revision(referenced).is_ok());

    let loose = service.capture_revision(fx.entries[0], None).unwrap();
    service.delete_revision(loose.id).unwrap();
    assert!(matches!(
        service.get_revision(loose.id),
        Err(VersionServiceError::NotFound { .. })
    ));

    // Numbers are never reused after a delete.
    let next = service.capture_revision(fx.entries[0], None).unwrap();
    assert_eq!(next.rev_no, 3);
}

#[test]
fn deleting_entry_cascades_through_snapshot_items() {
    let fx = fixture();
    let service = versions(&fx.conn);
    let receipt = service
        .make_release(fx.section_id, &ReleaseRequest::default())
        .unwrap();

    let hierarchy = HierarchyService::new(SqliteHierarchyRepository::try_new(&fx.conn).unwrap());
    hierarchy.delete_entry(fx.entries[0]).unwrap();

    let detail = service.get_snapshot(receipt.release_snapshot_id).unwrap();
    assert_eq!(detail.items.len(), 2);
    assert!(service.list_revisions(fx.entries[0]).unwrap().is_empty());
}

#[test]
fn snapshot_of_missing_section_is_not_found() {
    let fx = fixture();
    let missing = uuid::Uuid::new_v4();
    let err = versions(&fx.conn)
        .snapshot_section(missing, &SnapshotRequest::default())
        .unwrap_err();
    assert!(matches!(
        err,
        VersionServiceError::NotFound { entity: "section", id } if id == missing
    ));
}
