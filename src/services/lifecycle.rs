//! src/services/lifecycle.rs
//!
//! LifecycleManager: the soft-delete path. Active entries move to the
//! recycle bin, bin entries can be restored or purged, and the bin can
//! be emptied wholesale. Purging removes the payload blob best-effort
//! before the record; a missing or stubborn blob never blocks the
//! record's removal.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::entry::MediaEntry;
use crate::models::report::{BulkTrashReport, TrashFailure};
use crate::models::user::UserInfo;
use crate::services::blob_store::BlobStore;
use crate::services::catalog::{CatalogError, CatalogStore, Namespace};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Only authorized users can delete media.")]
    Unauthorized,
    #[error(transparent)]
    Catalog(CatalogError),
}

pub struct LifecycleManager {
    catalog: Arc<dyn CatalogStore>,
    blobs: Arc<dyn BlobStore>,
}

impl LifecycleManager {
    pub fn new(catalog: Arc<dyn CatalogStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { catalog, blobs }
    }

    /// Move one active entry into the recycle bin.
    pub async fn move_to_bin(
        &self,
        actor: &UserInfo,
        id: Uuid,
    ) -> Result<MediaEntry, LifecycleError> {
        self.catalog
            .move_to_trash(actor, id)
            .await
            .map_err(catalog_failure)
    }

    /// Move a selection into the recycle bin. Each failure is recorded
    /// and the remaining items still get their turn.
    pub async fn move_many_to_bin(&self, actor: &UserInfo, ids: &[Uuid]) -> BulkTrashReport {
        let mut report = BulkTrashReport {
            requested: ids.len(),
            moved: 0,
            failures: Vec::new(),
        };
        for &id in ids {
            match self.move_to_bin(actor, id).await {
                Ok(_) => report.moved += 1,
                Err(err) => {
                    warn!(%id, "bulk move to bin failed: {}", err);
                    report.failures.push(TrashFailure {
                        id,
                        error: err.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Bring a recycle-bin entry back into the active catalog. The entry
    /// comes back under a fresh id with `restored_at` stamped.
    pub async fn restore(
        &self,
        actor: &UserInfo,
        id: Uuid,
    ) -> Result<MediaEntry, LifecycleError> {
        self.catalog
            .restore_from_trash(actor, id)
            .await
            .map_err(catalog_failure)
    }

    /// Permanently remove a recycle-bin entry and its payload.
    pub async fn purge(&self, actor: &UserInfo, id: Uuid) -> Result<MediaEntry, LifecycleError> {
        let entry = self
            .catalog
            .get(Namespace::Trashed, id)
            .await
            .map_err(catalog_failure)?;

        if let Some(path) = &entry.storage_path {
            if let Err(err) = self.blobs.delete(actor, path).await {
                debug!(path = %path, "blob removal failed during purge: {}", err);
            }
        }

        self.catalog
            .delete(actor, Namespace::Trashed, id)
            .await
            .map_err(catalog_failure)?;
        Ok(entry)
    }

    /// Purge every recycle-bin entry. A record deletion failure stops the
    /// sweep; the count of entries purged so far is lost with it.
    pub async fn empty_bin(&self, actor: &UserInfo) -> Result<usize, LifecycleError> {
        let trashed = self
            .catalog
            .list(Namespace::Trashed)
            .await
            .map_err(catalog_failure)?;

        let mut purged = 0usize;
        for entry in trashed {
            if let Some(path) = &entry.storage_path {
                if let Err(err) = self.blobs.delete(actor, path).await {
                    debug!(path = %path, "blob removal failed while emptying bin: {}", err);
                }
            }
            self.catalog
                .delete(actor, Namespace::Trashed, entry.id)
                .await
                .map_err(catalog_failure)?;
            purged += 1;
        }
        Ok(purged)
    }
}

fn catalog_failure(err: CatalogError) -> LifecycleError {
    match err {
        CatalogError::PermissionDenied => LifecycleError::Unauthorized,
        other => LifecycleError::Catalog(other),
    }
}
