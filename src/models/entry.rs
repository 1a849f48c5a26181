//! Catalog entry models shared by the store, services and handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Broad media classification derived from the upload's MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Stable lowercase name, used in storage paths and CSV export.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
        }
    }

    /// Classify a MIME type by its top-level prefix. Anything that is not
    /// video, audio or image is rejected from the catalog.
    pub fn from_content_type(content_type: &str) -> Option<MediaKind> {
        if content_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else if content_type.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else if content_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

/// Listing visibility of a catalog entry. Hidden entries stay in the
/// catalog but are excluded by the visibility filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// A single catalog record. The same shape is used for the active
/// catalog and the recycle bin; `deleted_at` is only set while the entry
/// sits in the bin.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MediaEntry {
    /// Unique identifier. A restore assigns a fresh one.
    pub id: Uuid,
    /// Display title, initially the uploaded file name.
    pub title: String,
    /// Free-form description, editable after upload.
    pub description: Option<String>,
    /// Media classification (video, audio or image).
    pub media_kind: MediaKind,
    /// Public URL the stored payload is served from.
    pub url: String,
    /// Storage path of the payload; absent for legacy rows without one.
    pub storage_path: Option<String>,
    /// Thumbnail URL, or a data URL for the fixed audio artwork.
    pub thumbnail_url: Option<String>,
    /// Payload size in bytes as measured at upload.
    pub size_bytes: i64,
    /// Pre-formatted duration (`MM:SS` or `H:MM:SS`, `-` when unknown).
    pub duration: Option<String>,
    /// When the entry was first uploaded. Survives trash round-trips.
    pub created_at: DateTime<Utc>,
    /// Listing visibility.
    pub visibility: Visibility,
    /// Set when the entry last came back from the recycle bin.
    pub restored_at: Option<DateTime<Utc>>,
    /// Set while the entry is in the recycle bin, cleared on restore.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields supplied when the upload pipeline records a new entry. The
/// store assigns the id and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewMediaEntry {
    pub title: String,
    pub description: Option<String>,
    pub media_kind: MediaKind,
    pub url: String,
    pub storage_path: Option<String>,
    pub thumbnail_url: Option<String>,
    pub size_bytes: i64,
    pub duration: Option<String>,
    pub visibility: Visibility,
}

/// Editable metadata. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_prefix_classifies_kind() {
        assert_eq!(
            MediaKind::from_content_type("video/mp4"),
            Some(MediaKind::Video)
        );
        assert_eq!(
            MediaKind::from_content_type("audio/mpeg"),
            Some(MediaKind::Audio)
        );
        assert_eq!(
            MediaKind::from_content_type("image/png"),
            Some(MediaKind::Image)
        );
        assert_eq!(MediaKind::from_content_type("application/pdf"), None);
        assert_eq!(MediaKind::from_content_type("text/plain"), None);
    }
}
