//! src/services/export.rs
//!
//! CSV export of the active catalog.

use chrono::SecondsFormat;

use crate::models::entry::MediaEntry;

/// Download filename the export is served under.
pub const EXPORT_FILENAME: &str = "media_export.csv";

const EXPORT_HEADER: &str = "title,description,url,created,mediaType,duration";

/// Render the catalog as CSV. The header row is unquoted; every value is
/// double-quoted with `"` doubled. Missing descriptions and durations
/// export as empty strings.
pub fn export_csv(entries: &[MediaEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(EXPORT_HEADER.to_string());
    for entry in entries {
        let row = [
            entry.title.as_str(),
            entry.description.as_deref().unwrap_or(""),
            entry.url.as_str(),
            &entry
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.media_kind.as_str(),
            entry.duration.as_deref().unwrap_or(""),
        ]
        .map(quote)
        .join(",");
        lines.push(row);
    }
    lines.join("\n")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entry::{MediaKind, Visibility};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn entry(title: &str, description: Option<&str>) -> MediaEntry {
        MediaEntry {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.map(str::to_string),
            media_kind: MediaKind::Video,
            url: "http://localhost:3000/api/blobs/media/video/1_a.mp4".to_string(),
            storage_path: Some("media/video/1_a.mp4".to_string()),
            thumbnail_url: None,
            size_bytes: 10,
            duration: Some("01:15".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            visibility: Visibility::Visible,
            restored_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn header_names_the_six_columns() {
        let csv = export_csv(&[]);
        assert_eq!(csv, "title,description,url,created,mediaType,duration");
    }

    #[test]
    fn rows_are_quoted_and_iso_dated() {
        let csv = export_csv(&[entry("a.mp4", Some("clip"))]);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "\"a.mp4\",\"clip\",\"http://localhost:3000/api/blobs/media/video/1_a.mp4\",\
             \"2024-03-01T12:00:00.000Z\",\"video\",\"01:15\""
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let csv = export_csv(&[entry("say \"hi\".mp4", None)]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("\"say \"\"hi\"\".mp4\",\"\","));
    }

    #[test]
    fn commas_stay_inside_the_quoted_cell() {
        let csv = export_csv(&[entry("a,b.mp4", Some("one, two"))]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("\"a,b.mp4\",\"one, two\","));
    }
}
