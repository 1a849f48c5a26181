//! src/services/catalog.rs
//!
//! CatalogStore: record-level storage of catalog entries backed by SQLite.
//! The catalog keeps two flat namespaces with identical shape, the active
//! catalog (`media_entries`) and the recycle bin (`media_entries_deleted`).
//! An entry is always in exactly one of them; moves between the two happen
//! inside a single transaction.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::models::entry::{MediaEntry, MetadataPatch, NewMediaEntry};
use crate::models::user::UserInfo;

/// Which of the two catalog namespaces an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// The browsable catalog.
    Active,
    /// The recycle bin.
    Trashed,
}

impl Namespace {
    pub fn table(&self) -> &'static str {
        match self {
            Namespace::Active => "media_entries",
            Namespace::Trashed => "media_entries_deleted",
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("entry `{0}` not found")]
    EntryNotFound(Uuid),
    #[error("only authorized users can modify the catalog")]
    PermissionDenied,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Record storage for catalog entries.
///
/// Mutating operations take the acting user and reject actors without the
/// write bit before touching any state. Reads are open to any signed-in
/// user. `watch` hands out a change feed whose receivers always observe
/// the latest full listing of a namespace.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a new entry into the active catalog.
    async fn create(&self, actor: &UserInfo, draft: NewMediaEntry) -> CatalogResult<MediaEntry>;

    /// Full listing of one namespace, newest first.
    async fn list(&self, ns: Namespace) -> CatalogResult<Vec<MediaEntry>>;

    /// Point lookup by id.
    async fn get(&self, ns: Namespace, id: Uuid) -> CatalogResult<MediaEntry>;

    /// First entry carrying the given title, if any.
    async fn find_by_title(&self, ns: Namespace, title: &str)
    -> CatalogResult<Option<MediaEntry>>;

    /// Apply a metadata patch to an active entry. Absent fields are kept.
    async fn update_metadata(
        &self,
        actor: &UserInfo,
        id: Uuid,
        patch: MetadataPatch,
    ) -> CatalogResult<MediaEntry>;

    /// Move an active entry into the recycle bin, stamping `deleted_at`.
    /// Remove and insert commit together or not at all.
    async fn move_to_trash(&self, actor: &UserInfo, id: Uuid) -> CatalogResult<MediaEntry>;

    /// Move a recycle-bin entry back into the active catalog under a fresh
    /// id, stamping `restored_at` and clearing `deleted_at`.
    async fn restore_from_trash(&self, actor: &UserInfo, id: Uuid) -> CatalogResult<MediaEntry>;

    /// Permanently remove an entry from one namespace.
    async fn delete(&self, actor: &UserInfo, ns: Namespace, id: Uuid) -> CatalogResult<()>;

    /// Subscribe to the namespace listing. The receiver yields the current
    /// listing immediately and every revision after that.
    fn watch(&self, ns: Namespace) -> watch::Receiver<Vec<MediaEntry>>;
}

const ENTRY_COLUMNS: &str = "id, title, description, media_kind, url, storage_path, \
     thumbnail_url, size_bytes, duration, created_at, visibility, restored_at, deleted_at";

/// SQLite-backed [`CatalogStore`].
pub struct SqliteCatalog {
    db: Arc<SqlitePool>,
    active_feed: watch::Sender<Vec<MediaEntry>>,
    trashed_feed: watch::Sender<Vec<MediaEntry>>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        let (active_feed, _) = watch::channel(Vec::new());
        let (trashed_feed, _) = watch::channel(Vec::new());
        Self {
            db,
            active_feed,
            trashed_feed,
        }
    }

    /// Load both namespaces and publish them to the change feeds. Called
    /// once at startup so watchers start from the persisted state.
    pub async fn refresh(&self) -> CatalogResult<()> {
        let active = self.load(Namespace::Active).await?;
        self.active_feed.send_replace(active);
        let trashed = self.load(Namespace::Trashed).await?;
        self.trashed_feed.send_replace(trashed);
        Ok(())
    }

    fn feed(&self, ns: Namespace) -> &watch::Sender<Vec<MediaEntry>> {
        match ns {
            Namespace::Active => &self.active_feed,
            Namespace::Trashed => &self.trashed_feed,
        }
    }

    async fn load(&self, ns: Namespace) -> CatalogResult<Vec<MediaEntry>> {
        let rows = sqlx::query_as::<_, MediaEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} ORDER BY created_at DESC",
            ns.table()
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Re-query a namespace and publish the new listing. The mutation has
    /// already committed, so a failure here only delays watchers until the
    /// next revision.
    async fn republish(&self, ns: Namespace) {
        match self.load(ns).await {
            Ok(listing) => {
                self.feed(ns).send_replace(listing);
            }
            Err(err) => debug!("republish of {} listing failed: {}", ns.table(), err),
        }
    }
}

fn ensure_can_write(actor: &UserInfo) -> CatalogResult<()> {
    if actor.can_write() {
        Ok(())
    } else {
        Err(CatalogError::PermissionDenied)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn create(&self, actor: &UserInfo, draft: NewMediaEntry) -> CatalogResult<MediaEntry> {
        ensure_can_write(actor)?;

        let entry = MediaEntry {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            media_kind: draft.media_kind,
            url: draft.url,
            storage_path: draft.storage_path,
            thumbnail_url: draft.thumbnail_url,
            size_bytes: draft.size_bytes,
            duration: draft.duration,
            created_at: Utc::now(),
            visibility: draft.visibility,
            restored_at: None,
            deleted_at: None,
        };

        sqlx::query(&format!(
            "INSERT INTO media_entries ({ENTRY_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(entry.id)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.media_kind)
        .bind(&entry.url)
        .bind(&entry.storage_path)
        .bind(&entry.thumbnail_url)
        .bind(entry.size_bytes)
        .bind(&entry.duration)
        .bind(entry.created_at)
        .bind(entry.visibility)
        .bind(entry.restored_at)
        .bind(entry.deleted_at)
        .execute(&*self.db)
        .await?;

        self.republish(Namespace::Active).await;
        Ok(entry)
    }

    async fn list(&self, ns: Namespace) -> CatalogResult<Vec<MediaEntry>> {
        self.load(ns).await
    }

    async fn get(&self, ns: Namespace, id: Uuid) -> CatalogResult<MediaEntry> {
        sqlx::query_as::<_, MediaEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE id = ?",
            ns.table()
        ))
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => CatalogError::EntryNotFound(id),
            other => CatalogError::Sqlx(other),
        })
    }

    async fn find_by_title(
        &self,
        ns: Namespace,
        title: &str,
    ) -> CatalogResult<Option<MediaEntry>> {
        let entry = sqlx::query_as::<_, MediaEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE title = ? LIMIT 1",
            ns.table()
        ))
        .bind(title)
        .fetch_optional(&*self.db)
        .await?;
        Ok(entry)
    }

    async fn update_metadata(
        &self,
        actor: &UserInfo,
        id: Uuid,
        patch: MetadataPatch,
    ) -> CatalogResult<MediaEntry> {
        ensure_can_write(actor)?;

        let mut entry = self.get(Namespace::Active, id).await?;
        if let Some(title) = patch.title {
            entry.title = title;
        }
        if let Some(description) = patch.description {
            entry.description = Some(description);
        }
        if let Some(visibility) = patch.visibility {
            entry.visibility = visibility;
        }

        let result = sqlx::query(
            "UPDATE media_entries SET title = ?, description = ?, visibility = ? WHERE id = ?",
        )
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.visibility)
        .bind(id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::EntryNotFound(id));
        }

        self.republish(Namespace::Active).await;
        Ok(entry)
    }

    async fn move_to_trash(&self, actor: &UserInfo, id: Uuid) -> CatalogResult<MediaEntry> {
        ensure_can_write(actor)?;

        let mut tx = self.db.begin().await?;
        let mut entry = sqlx::query_as::<_, MediaEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM media_entries WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => CatalogError::EntryNotFound(id),
            other => CatalogError::Sqlx(other),
        })?;

        entry.deleted_at = Some(Utc::now());

        sqlx::query(&format!(
            "INSERT INTO media_entries_deleted ({ENTRY_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(entry.id)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.media_kind)
        .bind(&entry.url)
        .bind(&entry.storage_path)
        .bind(&entry.thumbnail_url)
        .bind(entry.size_bytes)
        .bind(&entry.duration)
        .bind(entry.created_at)
        .bind(entry.visibility)
        .bind(entry.restored_at)
        .bind(entry.deleted_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM media_entries WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.republish(Namespace::Active).await;
        self.republish(Namespace::Trashed).await;
        Ok(entry)
    }

    async fn restore_from_trash(&self, actor: &UserInfo, id: Uuid) -> CatalogResult<MediaEntry> {
        ensure_can_write(actor)?;

        let mut tx = self.db.begin().await?;
        let mut entry = sqlx::query_as::<_, MediaEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM media_entries_deleted WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => CatalogError::EntryNotFound(id),
            other => CatalogError::Sqlx(other),
        })?;

        entry.id = Uuid::new_v4();
        entry.restored_at = Some(Utc::now());
        entry.deleted_at = None;

        sqlx::query(&format!(
            "INSERT INTO media_entries ({ENTRY_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(entry.id)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.media_kind)
        .bind(&entry.url)
        .bind(&entry.storage_path)
        .bind(&entry.thumbnail_url)
        .bind(entry.size_bytes)
        .bind(&entry.duration)
        .bind(entry.created_at)
        .bind(entry.visibility)
        .bind(entry.restored_at)
        .bind(entry.deleted_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM media_entries_deleted WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.republish(Namespace::Active).await;
        self.republish(Namespace::Trashed).await;
        Ok(entry)
    }

    async fn delete(&self, actor: &UserInfo, ns: Namespace, id: Uuid) -> CatalogResult<()> {
        ensure_can_write(actor)?;

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", ns.table()))
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::EntryNotFound(id));
        }

        self.republish(ns).await;
        Ok(())
    }

    fn watch(&self, ns: Namespace) -> watch::Receiver<Vec<MediaEntry>> {
        self.feed(ns).subscribe()
    }
}
