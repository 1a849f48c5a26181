//! src/services/blob_store.rs
//!
//! BlobStore: byte-level storage for media payloads and thumbnails. The
//! disk adapter writes beneath a base directory using the path layout
//! `media/{kind}/{millis}_{filename}` chosen by the upload pipeline, and
//! keeps a sidecar metadata row per blob so serving can replay the
//! content type and disposition attached at upload.
//!
//! Uploads started through [`BlobStore::start_upload`] run as their own
//! task and report transferred bytes through a shared counter, which is
//! what the pipeline's deadline and stall watchdogs observe.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::Context;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::models::user::UserInfo;

const MAX_BLOB_PATH_LEN: usize = 1024;
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("invalid blob path `{0}`")]
    InvalidPath(String),
    #[error("only authorized users can upload content")]
    PermissionDenied,
    #[error("transfer cancelled before completion")]
    Cancelled,
    #[error("transfer task failed: {0}")]
    TransferTask(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Metadata attached to a blob at upload time.
#[derive(Debug, Clone, Default)]
pub struct BlobMeta {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

/// A stored blob's sidecar record.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StoredBlob {
    pub path: String,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub size_bytes: i64,
    pub etag: String,
    pub created_at: DateTime<Utc>,
}

/// Opened blob payload ready for streaming out.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// An in-flight transfer. The write runs on its own task; the handle
/// exposes the byte counter the watchdogs poll and the token that aborts
/// the transfer.
pub struct TrackedUpload {
    total_bytes: u64,
    transferred: Arc<AtomicU64>,
    cancel: CancellationToken,
    task: JoinHandle<BlobResult<StoredBlob>>,
}

impl TrackedUpload {
    pub fn new(
        total_bytes: u64,
        transferred: Arc<AtomicU64>,
        cancel: CancellationToken,
        task: JoinHandle<BlobResult<StoredBlob>>,
    ) -> Self {
        Self {
            total_bytes,
            transferred,
            cancel,
            task,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Shared counter of transferred bytes, for polling off-task.
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.transferred.clone()
    }

    /// Token that aborts the transfer when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the transfer to finish.
    pub async fn join(self) -> BlobResult<StoredBlob> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(BlobError::TransferTask(err.to_string())),
        }
    }
}

/// Byte storage for media payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Begin a cancellable background transfer of `data` to `path`.
    async fn start_upload(
        &self,
        actor: &UserInfo,
        path: &str,
        meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<TrackedUpload>;

    /// Store `data` at `path` in one shot. Used for thumbnails and other
    /// small payloads that need no progress tracking.
    async fn put(
        &self,
        actor: &UserInfo,
        path: &str,
        meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<StoredBlob>;

    /// Open a blob for reading, returning its sidecar record and payload.
    async fn open(&self, path: &str) -> BlobResult<(StoredBlob, BlobReader)>;

    /// Remove a blob and its sidecar record.
    async fn delete(&self, actor: &UserInfo, path: &str) -> BlobResult<()>;

    /// Public URL the blob is served under.
    fn download_url(&self, path: &str) -> String;
}

/// Local-disk [`BlobStore`] with SQLite sidecar metadata.
#[derive(Clone)]
pub struct DiskBlobStore {
    db: Arc<SqlitePool>,
    base_path: PathBuf,
    public_url: String,
}

impl DiskBlobStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>, public_url: String) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_url,
        }
    }

    fn blob_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    async fn fetch_sidecar(&self, path: &str) -> BlobResult<StoredBlob> {
        sqlx::query_as::<_, StoredBlob>(
            "SELECT path, content_type, content_disposition, size_bytes, etag, created_at
             FROM blob_objects WHERE path = ?",
        )
        .bind(path)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => BlobError::NotFound(path.to_string()),
            other => BlobError::Sqlx(other),
        })
    }

    /// Recursively remove empty directories up to the storage root.
    ///
    /// Stops when:
    /// - directory not empty
    /// - directory not found
    /// - reached root
    /// - encountered unexpected I/O errors
    async fn prune_empty_dirs(&self, start: &Path) {
        let stop = self.base_path.as_path();
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Basic path validation to avoid trivial traversal vectors.
///
/// Rejects paths that begin with `/` or contain `..`, plus control
/// characters and backslashes.
fn ensure_path_safe(path: &str) -> BlobResult<()> {
    if path.is_empty() || path.len() > MAX_BLOB_PATH_LEN {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    if path.starts_with('/') || path.contains("..") {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    if path
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn ensure_can_write(actor: &UserInfo) -> BlobResult<()> {
    if actor.can_write() {
        Ok(())
    } else {
        Err(BlobError::PermissionDenied)
    }
}

/// Write `data` to disk in chunks and record the sidecar row.
///
/// - Writes incrementally to a temporary file, bumping `counter` per chunk.
/// - Honors `cancel` between chunks, discarding the partial file.
/// - Computes the MD5 etag while writing.
/// - Atomically renames into the final location, then upserts metadata.
///
/// Ensures durable writes (fsync) and cleans up temp files on errors.
async fn write_blob(
    db: Arc<SqlitePool>,
    file_path: PathBuf,
    path: String,
    meta: BlobMeta,
    data: Bytes,
    counter: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> BlobResult<StoredBlob> {
    let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
        BlobError::Io(io::Error::other("blob path missing parent directory"))
    })?;
    fs::create_dir_all(&parent).await?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    let mut file = File::create(&tmp_path).await?;

    let mut digest = Context::new();
    for chunk in data.chunks(UPLOAD_CHUNK_SIZE) {
        if cancel.is_cancelled() {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Cancelled);
        }
        if let Err(err) = file.write_all(chunk).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }
        digest.consume(chunk);
        counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }
    if let Err(err) = file.flush().await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(BlobError::Io(err));
    }
    if let Err(err) = file.sync_all().await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(BlobError::Io(err));
    }

    if let Err(err) = fs::rename(&tmp_path, &file_path).await {
        if err.kind() == ErrorKind::AlreadyExists {
            fs::remove_file(&file_path).await?;
            fs::rename(&tmp_path, &file_path).await?;
        } else {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }
    }

    let blob = StoredBlob {
        path: path.clone(),
        content_type: meta.content_type,
        content_disposition: meta.content_disposition,
        size_bytes: data.len() as i64,
        etag: format!("{:x}", digest.compute()),
        created_at: Utc::now(),
    };

    let insert_result = sqlx::query(
        "INSERT INTO blob_objects (path, content_type, content_disposition, size_bytes, etag, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(path) DO UPDATE SET
             content_type = excluded.content_type,
             content_disposition = excluded.content_disposition,
             size_bytes = excluded.size_bytes,
             etag = excluded.etag,
             created_at = excluded.created_at",
    )
    .bind(&blob.path)
    .bind(&blob.content_type)
    .bind(&blob.content_disposition)
    .bind(blob.size_bytes)
    .bind(&blob.etag)
    .bind(blob.created_at)
    .execute(&*db)
    .await;

    match insert_result {
        Ok(_) => Ok(blob),
        Err(err) => {
            let _ = fs::remove_file(&file_path).await;
            Err(BlobError::Sqlx(err))
        }
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn start_upload(
        &self,
        actor: &UserInfo,
        path: &str,
        meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<TrackedUpload> {
        ensure_can_write(actor)?;
        ensure_path_safe(path)?;

        let total_bytes = data.len() as u64;
        let counter = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(write_blob(
            self.db.clone(),
            self.blob_path(path),
            path.to_string(),
            meta,
            data,
            counter.clone(),
            cancel.clone(),
        ));

        Ok(TrackedUpload::new(total_bytes, counter, cancel, task))
    }

    async fn put(
        &self,
        actor: &UserInfo,
        path: &str,
        meta: BlobMeta,
        data: Bytes,
    ) -> BlobResult<StoredBlob> {
        ensure_can_write(actor)?;
        ensure_path_safe(path)?;

        write_blob(
            self.db.clone(),
            self.blob_path(path),
            path.to_string(),
            meta,
            data,
            Arc::new(AtomicU64::new(0)),
            CancellationToken::new(),
        )
        .await
    }

    async fn open(&self, path: &str) -> BlobResult<(StoredBlob, BlobReader)> {
        ensure_path_safe(path)?;
        let blob = self.fetch_sidecar(path).await?;

        let file_path = self.blob_path(path);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                BlobError::NotFound(path.to_string())
            } else {
                BlobError::Io(err)
            }
        })?;

        Ok((blob, Box::new(file) as BlobReader))
    }

    async fn delete(&self, actor: &UserInfo, path: &str) -> BlobResult<()> {
        ensure_can_write(actor)?;
        ensure_path_safe(path)?;

        let result = sqlx::query("DELETE FROM blob_objects WHERE path = ?")
            .bind(path)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BlobError::NotFound(path.to_string()));
        }

        let file_path = self.blob_path(path);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed blob file {}", file_path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("blob file {} already missing", file_path.display());
            }
            Err(err) => return Err(BlobError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }

        Ok(())
    }

    fn download_url(&self, path: &str) -> String {
        format!(
            "{}/api/blobs/{}",
            self.public_url.trim_end_matches('/'),
            path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_safety_rejects_traversal() {
        assert!(ensure_path_safe("media/video/1_a.mp4").is_ok());
        assert!(ensure_path_safe("thumbnails/1_thumb.jpg").is_ok());
        assert!(ensure_path_safe("").is_err());
        assert!(ensure_path_safe("/etc/passwd").is_err());
        assert!(ensure_path_safe("media/../secrets").is_err());
        assert!(ensure_path_safe("media\\video\\x").is_err());
    }
}
