//! Shared fixtures for the integration tests: an in-memory catalog
//! database, scratch blob roots, and scripted service doubles for the
//! upload pipeline's failure paths.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use media_console::models::entry::MediaKind;
use media_console::models::user::{MODE_READ, MODE_READ_WRITE, UserInfo};
use media_console::services::blob_store::{
    BlobError, BlobMeta, BlobReader, BlobResult, BlobStore, DiskBlobStore, StoredBlob,
    TrackedUpload,
};
use media_console::services::probe::{MediaProbe, ProbeOutcome, Thumbnail};

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    for stmt in include_str!("../../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt)
            .execute(&pool)
            .await
            .expect("migration statement");
    }
    Arc::new(pool)
}

/// Fresh scratch directory for blob files.
pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("media-console-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

pub fn editor() -> UserInfo {
    UserInfo {
        email: "editor@test".into(),
        mode: MODE_READ_WRITE,
    }
}

pub fn viewer() -> UserInfo {
    UserInfo {
        email: "viewer@test".into(),
        mode: MODE_READ,
    }
}

/// Probe double replaying a fixed outcome.
pub struct CannedProbe {
    outcome: ProbeOutcome,
}

impl CannedProbe {
    /// A "video-like" probe: tiny JPEG thumbnail plus a duration.
    pub fn with_duration(seconds: f64) -> Self {
        Self {
            outcome: ProbeOutcome {
                thumbnail: Some(Thumbnail::Jpeg(vec![0xFF, 0xD8, 0xFF, 0xE0])),
                duration_seconds: Some(seconds),
            },
        }
    }

    /// A probe that extracted nothing.
    pub fn empty() -> Self {
        Self {
            outcome: ProbeOutcome::default(),
        }
    }

    /// An "audio-like" probe: inline data-URL artwork.
    pub fn with_data_url(url: &str, seconds: Option<f64>) -> Self {
        Self {
            outcome: ProbeOutcome {
                thumbnail: Some(Thumbnail::DataUrl(url.to_string())),
                duration_seconds: seconds,
            },
        }
    }
}

#[async_trait]
impl MediaProbe for CannedProbe {
    async fn probe(&self, _kind: MediaKind, _filename: &str, _data: &Bytes) -> ProbeOutcome {
        self.outcome.clone()
    }
}

fn canned_blob(path: &str, size: i64) -> StoredBlob {
    StoredBlob {
        path: path.to_string(),
        content_type: None,
        content_disposition: None,
        size_bytes: size,
        etag: "0".repeat(32),
        created_at: chrono::Utc::now(),
    }
}

/// Blob store whose tracked transfers never move a byte. The write task
/// sits on the cancellation token like a wedged connection, so only the
/// stall watchdog can end it.
pub struct StallingBlobStore;

#[async_trait]
impl BlobStore for StallingBlobStore {
    async fn start_upload(
        &self,
        _actor: &UserInfo,
        _path: &str,
        _meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<TrackedUpload> {
        let counter = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            task_cancel.cancelled().await;
            Err(BlobError::Cancelled)
        });
        Ok(TrackedUpload::new(data.len() as u64, counter, cancel, task))
    }

    async fn put(
        &self,
        _actor: &UserInfo,
        path: &str,
        _meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<StoredBlob> {
        Ok(canned_blob(path, data.len() as i64))
    }

    async fn open(&self, path: &str) -> BlobResult<(StoredBlob, BlobReader)> {
        Err(BlobError::NotFound(path.to_string()))
    }

    async fn delete(&self, _actor: &UserInfo, _path: &str) -> BlobResult<()> {
        Ok(())
    }

    fn download_url(&self, path: &str) -> String {
        format!("http://blobs.test/api/blobs/{path}")
    }
}

/// Blob store whose transfers keep trickling bytes without ever
/// finishing. The counter moves every tick, so the stall watchdog stays
/// quiet and only the hard deadline can cancel the transfer.
pub struct CreepingBlobStore {
    pub tick: Duration,
}

#[async_trait]
impl BlobStore for CreepingBlobStore {
    async fn start_upload(
        &self,
        _actor: &UserInfo,
        _path: &str,
        _meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<TrackedUpload> {
        let counter = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_counter = counter.clone();
        let tick = self.tick;
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => return Err(BlobError::Cancelled),
                    _ = tokio::time::sleep(tick) => {
                        task_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                }
            }
        });
        Ok(TrackedUpload::new(data.len() as u64, counter, cancel, task))
    }

    async fn put(
        &self,
        _actor: &UserInfo,
        path: &str,
        _meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<StoredBlob> {
        Ok(canned_blob(path, data.len() as i64))
    }

    async fn open(&self, path: &str) -> BlobResult<(StoredBlob, BlobReader)> {
        Err(BlobError::NotFound(path.to_string()))
    }

    async fn delete(&self, _actor: &UserInfo, _path: &str) -> BlobResult<()> {
        Ok(())
    }

    fn download_url(&self, path: &str) -> String {
        format!("http://blobs.test/api/blobs/{path}")
    }
}

/// Real disk store that refuses transfers whose path contains a marker.
/// Lets one file of a batch fail while its neighbors go through.
pub struct FailingBlobStore {
    inner: DiskBlobStore,
    refuse_containing: String,
}

impl FailingBlobStore {
    pub fn new(inner: DiskBlobStore, refuse_containing: &str) -> Self {
        Self {
            inner,
            refuse_containing: refuse_containing.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn start_upload(
        &self,
        actor: &UserInfo,
        path: &str,
        meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<TrackedUpload> {
        if path.contains(&self.refuse_containing) {
            return Err(BlobError::Io(std::io::Error::other("injected write failure")));
        }
        self.inner.start_upload(actor, path, meta, data).await
    }

    async fn put(
        &self,
        actor: &UserInfo,
        path: &str,
        meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<StoredBlob> {
        self.inner.put(actor, path, meta, data).await
    }

    async fn open(&self, path: &str) -> BlobResult<(StoredBlob, BlobReader)> {
        self.inner.open(path).await
    }

    async fn delete(&self, actor: &UserInfo, path: &str) -> BlobResult<()> {
        self.inner.delete(actor, path).await
    }

    fn download_url(&self, path: &str) -> String {
        self.inner.download_url(path)
    }
}

/// Blob store that records every delete and succeeds at all of them.
#[derive(Default)]
pub struct CountingBlobStore {
    pub deleted: Mutex<Vec<String>>,
}

impl CountingBlobStore {
    pub fn deleted_paths(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn start_upload(
        &self,
        _actor: &UserInfo,
        path: &str,
        _meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<TrackedUpload> {
        let counter = Arc::new(AtomicU64::new(data.len() as u64));
        let cancel = CancellationToken::new();
        let blob = canned_blob(path, data.len() as i64);
        let task = tokio::spawn(async move { Ok(blob) });
        Ok(TrackedUpload::new(data.len() as u64, counter, cancel, task))
    }

    async fn put(
        &self,
        _actor: &UserInfo,
        path: &str,
        _meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<StoredBlob> {
        Ok(canned_blob(path, data.len() as i64))
    }

    async fn open(&self, path: &str) -> BlobResult<(StoredBlob, BlobReader)> {
        Err(BlobError::NotFound(path.to_string()))
    }

    async fn delete(&self, _actor: &UserInfo, path: &str) -> BlobResult<()> {
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }

    fn download_url(&self, path: &str) -> String {
        format!("http://blobs.test/api/blobs/{path}")
    }
}
