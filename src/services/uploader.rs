//! src/services/uploader.rs
//!
//! UploadPipeline: sequential batch ingestion of media files. Each file
//! is checked against both catalog namespaces for a same-title duplicate,
//! probed for thumbnail and duration, transferred to blob storage under
//! watchdog supervision, and finally recorded in the active catalog.
//!
//! Two watchdogs guard every transfer: a hard deadline that cancels the
//! whole transfer, and a stall poll that cancels when the byte counter
//! has not moved between two polls. A cancelled transfer counts as that
//! file's failure; the batch moves on. Only a permission failure aborts
//! the remainder of the batch.

use bytes::Bytes;
use chrono::Utc;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::Ordering,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::entry::{MediaEntry, MediaKind, NewMediaEntry, Visibility};
use crate::models::report::BatchReport;
use crate::models::user::UserInfo;
use crate::services::blob_store::{BlobError, BlobMeta, BlobStore};
use crate::services::catalog::{CatalogError, CatalogStore, Namespace};
use crate::services::probe::{MediaProbe, Thumbnail};
use crate::services::view::format_duration_seconds;

/// Hard ceiling on a single file's transfer time.
pub const UPLOAD_DEADLINE: Duration = Duration::from_secs(20);
/// How often the stall watchdog samples the byte counter.
pub const STALL_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// How often in-flight progress is folded into the batch percentage.
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Registered batches kept around for progress queries.
const MAX_TRACKED_BATCHES: usize = 64;

/// A file accepted into an upload batch.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only authorized users can upload content.")]
    Unauthorized,
    #[error(transparent)]
    Catalog(CatalogError),
    #[error(transparent)]
    Blob(BlobError),
}

/// Publishes a batch's overall percentage. Writes are monotonic; a stale
/// sample can never move the percentage backwards.
#[derive(Clone)]
pub struct ProgressHandle {
    tx: Arc<watch::Sender<u8>>,
}

impl ProgressHandle {
    pub fn set(&self, percent: u8) {
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }
}

/// Tracks the latest progress of recent upload batches. Finished batches
/// keep reporting their final percentage until evicted by newer ones.
#[derive(Clone, Default)]
pub struct UploadRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    batches: HashMap<Uuid, watch::Receiver<u8>>,
    order: VecDeque<Uuid>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a progress channel for a batch.
    pub async fn register(&self, batch_id: Uuid) -> ProgressHandle {
        let (tx, rx) = watch::channel(0u8);
        let mut inner = self.inner.write().await;
        if inner.batches.insert(batch_id, rx).is_none() {
            inner.order.push_back(batch_id);
        }
        while inner.order.len() > MAX_TRACKED_BATCHES {
            if let Some(evicted) = inner.order.pop_front() {
                inner.batches.remove(&evicted);
            }
        }
        ProgressHandle { tx: Arc::new(tx) }
    }

    /// Latest percentage of a tracked batch.
    pub async fn snapshot(&self, batch_id: Uuid) -> Option<u8> {
        let inner = self.inner.read().await;
        inner.batches.get(&batch_id).map(|rx| *rx.borrow())
    }

    /// Live receiver for a tracked batch; yields the current value first.
    pub async fn subscribe(&self, batch_id: Uuid) -> Option<watch::Receiver<u8>> {
        let inner = self.inner.read().await;
        inner.batches.get(&batch_id).cloned()
    }
}

/// Drop unsupported files and in-batch duplicates, keeping first-seen
/// order. Two files are the same when name, size and content type all
/// match.
pub fn prepare_batch(raw: Vec<CandidateFile>) -> Vec<CandidateFile> {
    let mut accepted: Vec<CandidateFile> = Vec::new();
    for file in raw {
        if MediaKind::from_content_type(&file.content_type).is_none() {
            continue;
        }
        let already_queued = accepted.iter().any(|queued| {
            queued.name == file.name
                && queued.data.len() == file.data.len()
                && queued.content_type == file.content_type
        });
        if !already_queued {
            accepted.push(file);
        }
    }
    accepted
}

/// Sequential upload pipeline over the catalog, blob store and probe.
pub struct UploadPipeline {
    catalog: Arc<dyn CatalogStore>,
    blobs: Arc<dyn BlobStore>,
    probe: Arc<dyn MediaProbe>,
    registry: UploadRegistry,
    deadline: Duration,
    stall_poll: Duration,
}

impl UploadPipeline {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        blobs: Arc<dyn BlobStore>,
        probe: Arc<dyn MediaProbe>,
        registry: UploadRegistry,
    ) -> Self {
        Self {
            catalog,
            blobs,
            probe,
            registry,
            deadline: UPLOAD_DEADLINE,
            stall_poll: STALL_POLL_INTERVAL,
        }
    }

    /// Override the watchdog timings. Intended for tests that exercise
    /// cancellation without waiting out the production budgets.
    pub fn with_watchdog_timings(mut self, deadline: Duration, stall_poll: Duration) -> Self {
        self.deadline = deadline;
        self.stall_poll = stall_poll;
        self
    }

    /// Run a prepared batch to completion and classify the outcome.
    pub async fn run_batch(
        &self,
        actor: &UserInfo,
        batch_id: Uuid,
        files: Vec<CandidateFile>,
    ) -> BatchReport {
        let total_files = files.len();
        let mut report = BatchReport::new(batch_id, total_files);
        let progress = self.registry.register(batch_id).await;

        for (index, file) in files.into_iter().enumerate() {
            match self
                .catalog
                .find_by_title(Namespace::Active, &file.name)
                .await
            {
                Ok(Some(_)) => {
                    report.duplicates += 1;
                    progress.set(overall_percent(index, 1.0, total_files));
                    continue;
                }
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(file = %file.name, "duplicate check failed: {}", err);
                    progress.set(overall_percent(index, 1.0, total_files));
                    continue;
                }
            }

            match self
                .catalog
                .find_by_title(Namespace::Trashed, &file.name)
                .await
            {
                Ok(Some(_)) => {
                    report.recycle_duplicates += 1;
                    progress.set(overall_percent(index, 1.0, total_files));
                    continue;
                }
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(file = %file.name, "recycle-bin duplicate check failed: {}", err);
                    progress.set(overall_percent(index, 1.0, total_files));
                    continue;
                }
            }

            match self
                .upload_single(actor, index, total_files, &file, &progress)
                .await
            {
                Ok(entry) => {
                    report.uploaded += 1;
                    report.entries.push(entry);
                }
                Err(UploadError::Unauthorized) => {
                    warn!(file = %file.name, "upload rejected for unauthorized actor");
                    report.unauthorized = true;
                    break;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(file = %file.name, "upload failed: {}", err);
                    progress.set(overall_percent(index, 1.0, total_files));
                }
            }
        }

        report.finalize()
    }

    /// Upload one file: probe, store the payload under watchdogs, record
    /// the catalog entry.
    async fn upload_single(
        &self,
        actor: &UserInfo,
        index: usize,
        total_files: usize,
        file: &CandidateFile,
        progress: &ProgressHandle,
    ) -> Result<MediaEntry, UploadError> {
        let kind = MediaKind::from_content_type(&file.content_type).unwrap_or(MediaKind::Video);
        let storage_path = format!(
            "media/{}/{}_{}",
            kind.as_str(),
            Utc::now().timestamp_millis(),
            file.name
        );

        let probed = self.probe.probe(kind, &file.name, &file.data).await;

        // A failed thumbnail store never fails the file.
        let mut thumbnail_url = None;
        match probed.thumbnail {
            Some(Thumbnail::Jpeg(bytes)) => {
                let thumb_path = format!(
                    "thumbnails/{}_thumb.jpg",
                    Utc::now().timestamp_millis()
                );
                let meta = BlobMeta {
                    content_type: Some("image/jpeg".to_string()),
                    content_disposition: None,
                };
                match self
                    .blobs
                    .put(actor, &thumb_path, meta, Bytes::from(bytes))
                    .await
                {
                    Ok(_) => thumbnail_url = Some(self.blobs.download_url(&thumb_path)),
                    Err(err) => debug!(file = %file.name, "thumbnail store failed: {}", err),
                }
            }
            Some(Thumbnail::DataUrl(url)) => thumbnail_url = Some(url),
            None => {}
        }

        let meta = BlobMeta {
            content_type: Some(file.content_type.clone()),
            content_disposition: Some(format!("attachment; filename=\"{}\"", file.name)),
        };
        let handle = self
            .blobs
            .start_upload(actor, &storage_path, meta, file.data.clone())
            .await
            .map_err(blob_failure)?;

        let counter = handle.counter();
        let total_bytes = handle.total_bytes();

        let deadline = self.deadline;
        let deadline_cancel = handle.cancel_token();
        let deadline_guard = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!("transfer exceeded {:?} deadline; cancelling", deadline);
            deadline_cancel.cancel();
        });

        let stall_poll = self.stall_poll;
        let stall_cancel = handle.cancel_token();
        let stall_counter = counter.clone();
        let stall_guard = tokio::spawn(async move {
            let mut poll = tokio::time::interval(stall_poll);
            poll.tick().await;
            let mut last_bytes = 0u64;
            loop {
                poll.tick().await;
                let current = stall_counter.load(Ordering::Relaxed);
                if current == last_bytes {
                    warn!("no bytes transferred since last poll; cancelling transfer");
                    stall_cancel.cancel();
                    break;
                }
                last_bytes = current;
            }
        });

        let reporter_progress = progress.clone();
        let reporter_counter = counter;
        let reporter = tokio::spawn(async move {
            let mut poll = tokio::time::interval(PROGRESS_POLL_INTERVAL);
            loop {
                poll.tick().await;
                let transferred = reporter_counter.load(Ordering::Relaxed);
                let fraction = if total_bytes > 0 {
                    transferred as f64 / total_bytes as f64
                } else {
                    0.0
                };
                reporter_progress.set(overall_percent(index, fraction, total_files));
            }
        });

        let result = handle.join().await;
        deadline_guard.abort();
        stall_guard.abort();
        reporter.abort();

        let stored = result.map_err(blob_failure)?;
        // Snap exactly to the end of this file's portion.
        progress.set(overall_percent(index, 1.0, total_files));

        let draft = NewMediaEntry {
            title: file.name.clone(),
            description: None,
            media_kind: kind,
            url: self.blobs.download_url(&stored.path),
            storage_path: Some(storage_path),
            thumbnail_url,
            size_bytes: file.data.len() as i64,
            duration: Some(format_duration_seconds(probed.duration_seconds)),
            visibility: Visibility::Visible,
        };
        self.catalog
            .create(actor, draft)
            .await
            .map_err(catalog_failure)
    }
}

fn blob_failure(err: BlobError) -> UploadError {
    match err {
        BlobError::PermissionDenied => UploadError::Unauthorized,
        other => UploadError::Blob(other),
    }
}

fn catalog_failure(err: CatalogError) -> UploadError {
    match err {
        CatalogError::PermissionDenied => UploadError::Unauthorized,
        other => UploadError::Catalog(other),
    }
}

/// Overall batch percentage with `index` finished files and the current
/// file `file_fraction` of the way through.
fn overall_percent(index: usize, file_fraction: f64, total_files: usize) -> u8 {
    if total_files == 0 {
        return 0;
    }
    let overall = ((index as f64 + file_fraction.clamp(0.0, 1.0)) / total_files as f64) * 100.0;
    overall.round().clamp(0.0, 100.0) as u8
}
