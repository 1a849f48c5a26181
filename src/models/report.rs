//! Outcome reports returned by the upload pipeline and bulk lifecycle
//! operations.

use serde::Serialize;
use uuid::Uuid;

use crate::models::entry::MediaEntry;

/// Overall classification of a finished upload batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every file uploaded.
    Success,
    /// At least one uploaded, at least one skipped or failed.
    PartialSuccess,
    /// Nothing uploaded, every file already in the active catalog.
    AlreadyUploaded,
    /// Nothing uploaded, every file already in the recycle bin.
    AlreadyInRecycleBin,
    /// Nothing uploaded for any other reason.
    Failed,
    /// The batch was aborted because the actor may not upload.
    Unauthorized,
}

/// Itemized result of one upload batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Identifier progress was published under.
    pub batch_id: Uuid,
    /// Files accepted into the batch after filtering and dedup.
    pub total_files: usize,
    /// Files stored and recorded in the catalog.
    pub uploaded: usize,
    /// Files skipped because an active entry carries the same title.
    pub duplicates: usize,
    /// Files skipped because a recycle-bin entry carries the same title.
    pub recycle_duplicates: usize,
    /// Files that errored; the batch continued past them.
    pub failed: usize,
    /// True when the batch stopped early on a permission failure.
    pub unauthorized: bool,
    /// The catalog entries created by this batch.
    pub entries: Vec<MediaEntry>,
    /// Derived classification, filled by [`BatchReport::finalize`].
    pub outcome: BatchOutcome,
    /// Human-readable summary, filled by [`BatchReport::finalize`].
    pub message: String,
}

impl BatchReport {
    pub fn new(batch_id: Uuid, total_files: usize) -> Self {
        BatchReport {
            batch_id,
            total_files,
            uploaded: 0,
            duplicates: 0,
            recycle_duplicates: 0,
            failed: 0,
            unauthorized: false,
            entries: Vec::new(),
            outcome: BatchOutcome::Failed,
            message: String::new(),
        }
    }

    /// Derive the outcome and summary message from the tallies.
    pub fn finalize(mut self) -> Self {
        self.outcome = self.derive_outcome();
        self.message = self.compose_message();
        self
    }

    fn derive_outcome(&self) -> BatchOutcome {
        if self.unauthorized {
            BatchOutcome::Unauthorized
        } else if self.uploaded > 0 {
            let skipped = self.duplicates + self.recycle_duplicates + self.failed;
            if skipped == 0 {
                BatchOutcome::Success
            } else {
                BatchOutcome::PartialSuccess
            }
        } else if self.total_files > 0 && self.duplicates == self.total_files {
            BatchOutcome::AlreadyUploaded
        } else if self.total_files > 0 && self.recycle_duplicates == self.total_files {
            BatchOutcome::AlreadyInRecycleBin
        } else {
            BatchOutcome::Failed
        }
    }

    fn compose_message(&self) -> String {
        match self.outcome {
            BatchOutcome::Success => "Upload Successful".to_string(),
            BatchOutcome::PartialSuccess => {
                let mut parts = vec![format!("Uploaded {} file(s).", self.uploaded)];
                if self.duplicates > 0 {
                    parts.push(format!("{} duplicate(s) skipped.", self.duplicates));
                }
                if self.recycle_duplicates > 0 {
                    parts.push(format!(
                        "{} file(s) already in Recycle Bin.",
                        self.recycle_duplicates
                    ));
                }
                if self.failed > 0 {
                    parts.push(format!("{} failed.", self.failed));
                }
                parts.join(" ")
            }
            BatchOutcome::AlreadyUploaded => "File already uploaded".to_string(),
            BatchOutcome::AlreadyInRecycleBin => {
                "File already exists in Recycle Bin".to_string()
            }
            BatchOutcome::Failed => "Upload Failed".to_string(),
            BatchOutcome::Unauthorized => {
                "Only authorized users can upload content.".to_string()
            }
        }
    }
}

/// One failed item of a bulk move to the recycle bin.
#[derive(Debug, Clone, Serialize)]
pub struct TrashFailure {
    pub id: Uuid,
    pub error: String,
}

/// Result of a bulk move to the recycle bin. Failures do not stop the
/// remaining items.
#[derive(Debug, Clone, Serialize)]
pub struct BulkTrashReport {
    pub requested: usize,
    pub moved: usize,
    pub failures: Vec<TrashFailure>,
}

/// Latest observed progress of an upload batch.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressSnapshot {
    pub batch_id: Uuid,
    pub percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(
        total: usize,
        uploaded: usize,
        duplicates: usize,
        recycle: usize,
        failed: usize,
    ) -> BatchReport {
        let mut r = BatchReport::new(Uuid::new_v4(), total);
        r.uploaded = uploaded;
        r.duplicates = duplicates;
        r.recycle_duplicates = recycle;
        r.failed = failed;
        r.finalize()
    }

    #[test]
    fn clean_batch_is_success() {
        let r = report(3, 3, 0, 0, 0);
        assert_eq!(r.outcome, BatchOutcome::Success);
        assert_eq!(r.message, "Upload Successful");
    }

    #[test]
    fn mixed_batch_itemizes_counts() {
        let r = report(4, 2, 1, 0, 1);
        assert_eq!(r.outcome, BatchOutcome::PartialSuccess);
        assert_eq!(r.message, "Uploaded 2 file(s). 1 duplicate(s) skipped. 1 failed.");
    }

    #[test]
    fn all_duplicates_reports_already_uploaded() {
        let r = report(2, 0, 2, 0, 0);
        assert_eq!(r.outcome, BatchOutcome::AlreadyUploaded);
        assert_eq!(r.message, "File already uploaded");
    }

    #[test]
    fn all_recycle_duplicates_reports_recycle_bin() {
        let r = report(2, 0, 0, 2, 0);
        assert_eq!(r.outcome, BatchOutcome::AlreadyInRecycleBin);
        assert_eq!(r.message, "File already exists in Recycle Bin");
    }

    #[test]
    fn nothing_uploaded_mixed_reasons_is_failed() {
        let r = report(3, 0, 1, 1, 1);
        assert_eq!(r.outcome, BatchOutcome::Failed);
        assert_eq!(r.message, "Upload Failed");
    }

    #[test]
    fn unauthorized_wins_over_other_tallies() {
        let mut r = BatchReport::new(Uuid::new_v4(), 3);
        r.uploaded = 1;
        r.unauthorized = true;
        let r = r.finalize();
        assert_eq!(r.outcome, BatchOutcome::Unauthorized);
        assert_eq!(r.message, "Only authorized users can upload content.");
    }
}
