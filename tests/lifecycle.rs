//! Tests for the soft-delete lifecycle: recycle-bin moves, restore,
//! purge and emptying the bin.

mod support;

use std::sync::Arc;
use uuid::Uuid;

use media_console::models::entry::{MediaEntry, MediaKind, NewMediaEntry, Visibility};
use media_console::services::blob_store::{BlobMeta, BlobStore, DiskBlobStore};
use media_console::services::catalog::{CatalogStore, Namespace, SqliteCatalog};
use media_console::services::lifecycle::{LifecycleError, LifecycleManager};

use support::{CountingBlobStore, editor, memory_pool, scratch_dir, viewer};

fn draft(title: &str, storage_path: Option<&str>) -> NewMediaEntry {
    NewMediaEntry {
        title: title.to_string(),
        description: Some("clip".to_string()),
        media_kind: MediaKind::Video,
        url: format!("http://localhost:3000/api/blobs/media/video/0_{title}"),
        storage_path: storage_path.map(str::to_string),
        thumbnail_url: None,
        size_bytes: 16,
        duration: Some("00:10".to_string()),
        visibility: Visibility::Visible,
    }
}

/// Catalog + disk blob store + lifecycle manager over one scratch root.
async fn disk_rig() -> (
    Arc<SqliteCatalog>,
    Arc<DiskBlobStore>,
    LifecycleManager,
    std::path::PathBuf,
) {
    let pool = memory_pool().await;
    let dir = scratch_dir();
    let catalog = Arc::new(SqliteCatalog::new(pool.clone()));
    let blobs = Arc::new(DiskBlobStore::new(
        pool,
        dir.clone(),
        "http://localhost:3000".to_string(),
    ));
    let lifecycle = LifecycleManager::new(catalog.clone(), blobs.clone());
    (catalog, blobs, lifecycle, dir)
}

async fn seed(catalog: &SqliteCatalog, title: &str, storage_path: Option<&str>) -> MediaEntry {
    catalog
        .create(&editor(), draft(title, storage_path))
        .await
        .expect("seed entry")
}

#[tokio::test]
async fn soft_delete_moves_the_entry_between_namespaces() {
    let (catalog, _blobs, lifecycle, _dir) = disk_rig().await;
    let entry = seed(&catalog, "a.mp4", None).await;

    let moved = lifecycle
        .move_to_bin(&editor(), entry.id)
        .await
        .expect("move to bin");

    assert_eq!(moved.id, entry.id);
    assert!(moved.deleted_at.is_some());
    assert!(
        catalog
            .list(Namespace::Active)
            .await
            .expect("active")
            .is_empty()
    );

    let trashed = catalog.list(Namespace::Trashed).await.expect("trashed");
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id, entry.id);
    assert_eq!(trashed[0].title, "a.mp4");
    assert!(trashed[0].deleted_at.is_some());
}

#[tokio::test]
async fn restore_returns_the_entry_under_a_fresh_identity() {
    let (catalog, _blobs, lifecycle, _dir) = disk_rig().await;
    let seeded = seed(&catalog, "a.mp4", Some("media/video/1_a.mp4")).await;
    let entry = catalog
        .get(Namespace::Active, seeded.id)
        .await
        .expect("stored entry");
    lifecycle
        .move_to_bin(&editor(), entry.id)
        .await
        .expect("move to bin");

    let restored = lifecycle
        .restore(&editor(), entry.id)
        .await
        .expect("restore");

    assert_ne!(restored.id, entry.id);
    assert!(restored.restored_at.is_some());
    assert_eq!(restored.deleted_at, None);
    assert_eq!(restored.title, entry.title);
    assert_eq!(restored.storage_path, entry.storage_path);
    assert_eq!(restored.created_at, entry.created_at);

    let active = catalog.list(Namespace::Active).await.expect("active");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, restored.id);
    assert!(
        catalog
            .list(Namespace::Trashed)
            .await
            .expect("trashed")
            .is_empty()
    );
}

#[tokio::test]
async fn read_only_actor_cannot_soft_delete() {
    let (catalog, _blobs, lifecycle, _dir) = disk_rig().await;
    let entry = seed(&catalog, "a.mp4", None).await;

    let err = lifecycle
        .move_to_bin(&viewer(), entry.id)
        .await
        .expect_err("permission rejection");
    assert!(matches!(err, LifecycleError::Unauthorized));
    assert_eq!(err.to_string(), "Only authorized users can delete media.");

    // Nothing moved.
    assert_eq!(catalog.list(Namespace::Active).await.expect("active").len(), 1);
    assert!(
        catalog
            .list(Namespace::Trashed)
            .await
            .expect("trashed")
            .is_empty()
    );
}

#[tokio::test]
async fn purge_removes_blob_sidecar_and_record() {
    let (catalog, blobs, lifecycle, dir) = disk_rig().await;
    let path = "media/video/1_a.mp4";
    blobs
        .put(&editor(), path, BlobMeta::default(), b"payload".as_slice().into())
        .await
        .expect("store payload");
    let entry = seed(&catalog, "a.mp4", Some(path)).await;
    lifecycle
        .move_to_bin(&editor(), entry.id)
        .await
        .expect("move to bin");

    lifecycle.purge(&editor(), entry.id).await.expect("purge");

    assert!(!dir.join(path).exists());
    assert!(blobs.open(path).await.is_err());
    assert!(
        catalog
            .list(Namespace::Trashed)
            .await
            .expect("trashed")
            .is_empty()
    );
    assert!(
        catalog
            .list(Namespace::Active)
            .await
            .expect("active")
            .is_empty()
    );
}

#[tokio::test]
async fn purge_survives_a_missing_blob() {
    let (catalog, _blobs, lifecycle, _dir) = disk_rig().await;
    // The record points at a path that was never stored.
    let entry = seed(&catalog, "ghost.mp4", Some("media/video/0_ghost.mp4")).await;
    lifecycle
        .move_to_bin(&editor(), entry.id)
        .await
        .expect("move to bin");

    lifecycle.purge(&editor(), entry.id).await.expect("purge");
    assert!(
        catalog
            .list(Namespace::Trashed)
            .await
            .expect("trashed")
            .is_empty()
    );
}

#[tokio::test]
async fn empty_bin_deletes_each_blob_exactly_once() {
    let pool = memory_pool().await;
    let catalog = Arc::new(SqliteCatalog::new(pool));
    let blobs = Arc::new(CountingBlobStore::default());
    let lifecycle = LifecycleManager::new(catalog.clone(), blobs.clone());

    let mut paths = Vec::new();
    for i in 0..5 {
        let path = format!("media/video/{i}_clip{i}.mp4");
        let entry = seed(&catalog, &format!("clip{i}.mp4"), Some(&path)).await;
        lifecycle
            .move_to_bin(&editor(), entry.id)
            .await
            .expect("move to bin");
        paths.push(path);
    }

    let purged = lifecycle.empty_bin(&editor()).await.expect("empty bin");
    assert_eq!(purged, 5);
    assert!(
        catalog
            .list(Namespace::Trashed)
            .await
            .expect("trashed")
            .is_empty()
    );

    let mut deleted = blobs.deleted_paths();
    deleted.sort();
    paths.sort();
    assert_eq!(deleted, paths);
}

#[tokio::test]
async fn bulk_move_reports_each_failure_and_keeps_going() {
    let (catalog, _blobs, lifecycle, _dir) = disk_rig().await;
    let first = seed(&catalog, "a.mp4", None).await;
    let second = seed(&catalog, "b.mp4", None).await;
    let bogus = Uuid::new_v4();

    let report = lifecycle
        .move_many_to_bin(&editor(), &[first.id, bogus, second.id])
        .await;

    assert_eq!(report.requested, 3);
    assert_eq!(report.moved, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, bogus);
    assert!(report.failures[0].error.contains("not found"));

    assert_eq!(
        catalog.list(Namespace::Trashed).await.expect("trashed").len(),
        2
    );
}

#[tokio::test]
async fn bulk_move_without_write_access_itemizes_every_rejection() {
    let (catalog, _blobs, lifecycle, _dir) = disk_rig().await;
    let first = seed(&catalog, "a.mp4", None).await;
    let second = seed(&catalog, "b.mp4", None).await;

    let report = lifecycle
        .move_many_to_bin(&viewer(), &[first.id, second.id])
        .await;

    assert_eq!(report.requested, 2);
    assert_eq!(report.moved, 0);
    assert_eq!(report.failures.len(), 2);
    for failure in &report.failures {
        assert_eq!(failure.error, "Only authorized users can delete media.");
    }
    assert_eq!(catalog.list(Namespace::Active).await.expect("active").len(), 2);
}
