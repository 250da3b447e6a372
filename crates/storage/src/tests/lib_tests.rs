use super::*;
use serde_json::json;

#[tokio::test]
async fn creates_and_lists_groups() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let family = storage
        .create_group(&GroupDraft::named("Family"))
        .await
        .expect("family");
    let work = storage
        .create_group(&GroupDraft::named("Work"))
        .await
        .expect("work");
    assert_ne!(family.id, work.id);
    assert!(!family.trashed);

    let groups = storage.list_groups().await.expect("groups");
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().any(|group| group.id == family.id));
    assert!(groups.iter().any(|group| group.id == work.id));
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn update_replaces_name_and_trashed_flag() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let group = storage
        .create_group(&GroupDraft::named("Family"))
        .await
        .expect("group");

    let renamed = storage
        .update_group(&group.renamed("Friends"))
        .await
        .expect("rename");
    assert_eq!(renamed.id, group.id);
    assert_eq!(renamed.name, "Friends");

    let trashed = storage
        .update_group(&renamed.flagged_trashed())
        .await
        .expect("trash");
    assert!(trashed.trashed);

    let restored = storage
        .update_group(&trashed.restored())
        .await
        .expect("restore");
    assert!(!restored.trashed);

    let loaded = storage
        .get_group(&group.id)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(loaded, restored);
}

#[tokio::test]
async fn update_of_unknown_group_fails() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let err = storage
        .update_group(&Group::new("missing", "Ghosts"))
        .await
        .expect_err("unknown id");
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn opaque_fields_are_passed_through() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut draft = GroupDraft::named("Family");
    draft
        .extra
        .insert("metadata".to_string(), json!({ "version": 1 }));
    let group = storage.create_group(&draft).await.expect("group");
    assert_eq!(group.extra.get("metadata"), Some(&json!({ "version": 1 })));

    let updated = storage
        .update_group(&group.renamed("Relatives"))
        .await
        .expect("update");
    assert_eq!(updated.extra, group.extra);
}

#[tokio::test]
async fn clean_trashed_groups_only_purges_trashed_records() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let keep = storage
        .create_group(&GroupDraft::named("Keep"))
        .await
        .expect("keep");
    let drop_me = storage
        .create_group(&GroupDraft::named("Drop"))
        .await
        .expect("drop");
    storage
        .update_group(&drop_me.flagged_trashed())
        .await
        .expect("trash");

    let purged = storage.clean_trashed_groups().await.expect("sweep");
    assert_eq!(purged, 1);
    assert!(storage.get_group(&drop_me.id).await.expect("load").is_none());
    assert!(storage.get_group(&keep.id).await.expect("load").is_some());

    let purged_again = storage.clean_trashed_groups().await.expect("sweep");
    assert_eq!(purged_again, 0);
}

#[tokio::test]
async fn records_carry_timestamps() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let group = storage
        .create_group(&GroupDraft::named("Family"))
        .await
        .expect("group");
    storage
        .update_group(&group.renamed("Friends"))
        .await
        .expect("rename");

    let records = storage.list_group_records().await.expect("records");
    assert_eq!(records.len(), 1);
    assert!(records[0].updated_at >= records[0].created_at);
}

#[test]
fn memory_urls_have_no_parent_directory() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert!(sqlite_path("sqlite://file:groups?mode=memory").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/groups.db?mode=rwc"),
        Some(PathBuf::from("./data/groups.db"))
    );
}
