//! Shared application state handed to every handler.

use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

use crate::services::blob_store::BlobStore;
use crate::services::catalog::CatalogStore;
use crate::services::identity::Identity;
use crate::services::lifecycle::LifecycleManager;
use crate::services::uploader::{UploadPipeline, UploadRegistry};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn Identity>,
    pub pipeline: Arc<UploadPipeline>,
    pub lifecycle: Arc<LifecycleManager>,
    pub uploads: UploadRegistry,
    /// Kept alongside the services for the readiness probe.
    pub db: Arc<SqlitePool>,
    pub storage_dir: PathBuf,
}
