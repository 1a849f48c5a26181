//! src/services/view.rs
//!
//! Pure listing transforms: kind tabs, text search, visibility and date
//! filters, sorting and pagination, plus the display formatters for
//! sizes and durations. Everything here operates on already-loaded
//! entries and never touches storage.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::entry::{MediaEntry, MediaKind, Visibility};

/// Default page size for catalog listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Sort order selectable in the catalog view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SortMode {
    #[serde(rename = "az")]
    TitleAsc,
    #[serde(rename = "za")]
    TitleDesc,
    #[serde(rename = "newest")]
    NewestFirst,
    #[serde(rename = "oldest")]
    OldestFirst,
}

/// Keep entries of one media kind; `None` keeps everything.
pub fn filter_by_kind(entries: Vec<MediaEntry>, kind: Option<MediaKind>) -> Vec<MediaEntry> {
    match kind {
        None => entries,
        Some(kind) => entries
            .into_iter()
            .filter(|e| e.media_kind == kind)
            .collect(),
    }
}

/// Case-insensitive substring search over title and description. An
/// empty term keeps everything.
pub fn search(entries: Vec<MediaEntry>, term: &str) -> Vec<MediaEntry> {
    if term.is_empty() {
        return entries;
    }
    let term = term.to_lowercase();
    entries
        .into_iter()
        .filter(|e| {
            e.title.to_lowercase().contains(&term)
                || e.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&term))
        })
        .collect()
}

/// Keep entries with the given visibility; `None` keeps everything.
pub fn filter_by_visibility(
    entries: Vec<MediaEntry>,
    visibility: Option<Visibility>,
) -> Vec<MediaEntry> {
    match visibility {
        None => entries,
        Some(visibility) => entries
            .into_iter()
            .filter(|e| e.visibility == visibility)
            .collect(),
    }
}

/// Keep entries uploaded on the given calendar date (UTC).
pub fn filter_by_date(entries: Vec<MediaEntry>, date: Option<NaiveDate>) -> Vec<MediaEntry> {
    match date {
        None => entries,
        Some(date) => entries
            .into_iter()
            .filter(|e| e.created_at.date_naive() == date)
            .collect(),
    }
}

/// Sort in place. `None` keeps the incoming order.
pub fn sort_entries(entries: &mut [MediaEntry], mode: Option<SortMode>) {
    let Some(mode) = mode else { return };
    match mode {
        SortMode::TitleAsc => {
            entries.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        }
        SortMode::TitleDesc => {
            entries.sort_by(|a, b| b.title.to_lowercase().cmp(&a.title.to_lowercase()));
        }
        SortMode::NewestFirst => entries.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::OldestFirst => entries.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }
}

/// One page of a listing. Pages are 1-based; a page past the end is
/// empty.
pub fn paginate(entries: Vec<MediaEntry>, page: usize, per_page: usize) -> Vec<MediaEntry> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    entries
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect()
}

/// Render a byte count the way the catalog table shows it: `-` when
/// missing, two decimals below one megabyte, whole megabytes above.
pub fn format_size(bytes: Option<i64>) -> String {
    match bytes {
        None | Some(0) => "-".to_string(),
        Some(bytes) => {
            let mb = bytes as f64 / (1024.0 * 1024.0);
            if mb < 1.0 {
                format!("{:.2} MB", mb)
            } else {
                format!("{} MB", mb.round() as i64)
            }
        }
    }
}

/// Convert seconds -> "MM:SS" or "H:MM:SS". Absent or non-finite input
/// renders as `-`.
pub fn format_duration_seconds(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "-".to_string();
    };
    if !seconds.is_finite() {
        return "-".to_string();
    }
    let total = seconds as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}
