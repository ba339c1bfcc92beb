//! Store behavior tests against an in-memory SQLite database.

use quill_db::Database;
use uuid::Uuid;

fn db() -> Database {
    Database::open_in_memory().expect("in-memory db")
}

fn add_user(db: &Database, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_user(&id, name, &format!("{name}@example.com"), "hash")
        .unwrap();
    id
}

fn add_note(db: &Database, owner: &str, title: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.insert_note(&id, title, "", "", owner).unwrap();
    id
}

#[test]
fn create_and_fetch_note() {
    let db = db();
    let owner = add_user(&db, "olive");
    let note_id = add_note(&db, &owner, "Groceries");

    let note = db.get_note(&note_id).unwrap().expect("note exists");
    assert_eq!(note.title, "Groceries");
    assert_eq!(note.owner_id, owner);
    assert!(!note.is_pinned);
    assert!(note.share_token.is_none());
}

#[test]
fn partial_update_keeps_omitted_fields() {
    let db = db();
    let owner = add_user(&db, "olive");
    let note_id = Uuid::new_v4().to_string();
    db.insert_note(&note_id, "Groceries", "milk", "food", &owner)
        .unwrap();

    let found = db.update_note(&note_id, None, Some("milk, eggs"), None).unwrap();
    assert!(found);

    let note = db.get_note(&note_id).unwrap().unwrap();
    assert_eq!(note.title, "Groceries");
    assert_eq!(note.content, "milk, eggs");
    assert_eq!(note.tags, "food");
}

#[test]
fn update_missing_note_reports_absent() {
    let db = db();
    let found = db
        .update_note(&Uuid::new_v4().to_string(), Some("x"), None, None)
        .unwrap();
    assert!(!found);
}

#[test]
fn visibility_follows_ownership_and_grants() {
    let db = db();
    let owner = add_user(&db, "olive");
    let reader = add_user(&db, "rita");
    let note_id = add_note(&db, &owner, "Shared");

    // No grant yet: invisible to the reader
    assert!(db.list_notes_for_user(&reader).unwrap().is_empty());

    db.upsert_collaborator(&note_id, &reader, "viewer").unwrap();
    let visible = db.list_notes_for_user(&reader).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].user_permission, "viewer");

    db.remove_collaborator(&note_id, &reader).unwrap();
    assert!(db.list_notes_for_user(&reader).unwrap().is_empty());

    // The owner sees it throughout, flagged as owner
    let owned = db.list_notes_for_user(&owner).unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].user_permission, "owner");
}

#[test]
fn listing_orders_pinned_first_then_recent_then_id() {
    let db = db();
    let owner = add_user(&db, "olive");

    // Insert with equal timestamps so the id tie-break decides within groups
    let a = "aaaaaaaa-0000-0000-0000-000000000001";
    let b = "bbbbbbbb-0000-0000-0000-000000000002";
    let c = "cccccccc-0000-0000-0000-000000000003";
    for id in [b, c, a] {
        db.insert_note(id, "note", "", "", &owner).unwrap();
    }
    db.set_pinned(c, true).unwrap();

    let listed = db.list_notes_for_user(&owner).unwrap();
    let ids: Vec<&str> = listed.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![c, a, b]);
}

#[test]
fn upsert_collaborator_replaces_instead_of_duplicating() {
    let db = db();
    let owner = add_user(&db, "olive");
    let collab = add_user(&db, "eddie");
    let note_id = add_note(&db, &owner, "Doc");

    db.upsert_collaborator(&note_id, &collab, "viewer").unwrap();
    db.upsert_collaborator(&note_id, &collab, "editor").unwrap();

    let rows = db.list_collaborators(&note_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].permission, "editor");
    assert_eq!(
        db.get_collaborator_permission(&note_id, &collab).unwrap(),
        Some("editor".into())
    );
}

#[test]
fn delete_cascades_grants_and_nulls_activity() {
    let db = db();
    let owner = add_user(&db, "olive");
    let collab = add_user(&db, "eddie");
    let note_id = add_note(&db, &owner, "Doomed");
    db.upsert_collaborator(&note_id, &collab, "editor").unwrap();

    let activity_id = Uuid::new_v4().to_string();
    db.insert_activity(&activity_id, &owner, Some(&note_id), "create", "{}")
        .unwrap();

    assert!(db.delete_note(&note_id).unwrap());

    assert!(db.get_note(&note_id).unwrap().is_none());
    assert_eq!(
        db.get_collaborator_permission(&note_id, &collab).unwrap(),
        None
    );

    // The audit row survives with its note reference nulled, not removed
    let (count, note_ref): (i64, Option<String>) = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*), MAX(note_id) FROM activity_log WHERE id = ?1",
                [activity_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(note_ref, None);
}

#[test]
fn share_token_creation_is_idempotent() {
    let db = db();
    let owner = add_user(&db, "olive");
    let note_id = add_note(&db, &owner, "Public");

    let first = db
        .ensure_share_token(&note_id, "token-one")
        .unwrap()
        .expect("note exists");
    let second = db
        .ensure_share_token(&note_id, "token-two")
        .unwrap()
        .expect("note exists");
    assert_eq!(first, "token-one");
    assert_eq!(second, "token-one");

    // Missing note yields no token at all
    assert!(db
        .ensure_share_token(&Uuid::new_v4().to_string(), "t")
        .unwrap()
        .is_none());
}

#[test]
fn share_token_lookup_exposes_read_only_projection() {
    let db = db();
    let owner = add_user(&db, "olive");
    let note_id = Uuid::new_v4().to_string();
    db.insert_note(&note_id, "Public", "hello", "misc", &owner)
        .unwrap();

    assert!(db.get_note_by_share_token("nope").unwrap().is_none());

    let token = db
        .ensure_share_token(&note_id, "tok")
        .unwrap()
        .unwrap();
    let shared = db.get_note_by_share_token(&token).unwrap().unwrap();
    assert_eq!(shared.title, "Public");
    assert_eq!(shared.content, "hello");
    assert_eq!(shared.owner_name, "olive");
}

#[test]
fn search_matches_title_content_and_tags() {
    let db = db();
    let owner = add_user(&db, "olive");
    let by_title = add_note(&db, &owner, "Meeting notes");
    let by_content = Uuid::new_v4().to_string();
    db.insert_note(&by_content, "Other", "meeting agenda", "", &owner)
        .unwrap();
    let by_tags = Uuid::new_v4().to_string();
    db.insert_note(&by_tags, "Third", "", "meetings", &owner)
        .unwrap();
    add_note(&db, &owner, "Unrelated");

    // Case-insensitive substring match across all three columns
    let hits = db.search_notes(&owner, "MEETING").unwrap();
    let ids: Vec<&str> = hits.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(hits.len(), 3);
    assert!(ids.contains(&by_title.as_str()));
    assert!(ids.contains(&by_content.as_str()));
    assert!(ids.contains(&by_tags.as_str()));
}

#[test]
fn duplicate_email_is_rejected() {
    let db = db();
    add_user(&db, "olive");
    let err = db.create_user(
        &Uuid::new_v4().to_string(),
        "olive2",
        "olive@example.com",
        "hash",
    );
    assert!(err.is_err());
}

#[test]
fn activity_listing_is_newest_first_and_bounded() {
    let db = db();
    let owner = add_user(&db, "olive");
    let note_id = add_note(&db, &owner, "Busy");

    for i in 0..5 {
        db.insert_activity(
            &Uuid::new_v4().to_string(),
            &owner,
            Some(&note_id),
            "update",
            &format!("{{\"seq\":{i}}}"),
        )
        .unwrap();
    }

    let entries = db.list_activity(&note_id, 3).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].details, "{\"seq\":4}");
    assert_eq!(entries[2].details, "{\"seq\":2}");
    assert!(entries.iter().all(|e| e.user_name == "olive"));
}
