use std::{fmt::Display, path::PathBuf, sync::Arc};

use crate::{
    database::EntryKey,
    types::{VideoEntry, WorkItem},
};

/// A recording whose output path has been claimed, ready to be downloaded
#[derive(Debug)]
pub struct DownloadJob {
    pub item: Arc<WorkItem>,
    pub video: VideoEntry,
    pub key: EntryKey,
    /// Placeholder created for the recording. Owned by the job.
    pub path: PathBuf,
}

/// Why a work item produced no download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The work-list row has no course or lesson ID
    MissingIds,
    /// The page gave no course name (not rendered, timed out, or absent)
    NoCourseName,
    /// The page has a course name but no usable recording
    NoVideos,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SkipReason::MissingIds => "missing course or lesson ID",
            SkipReason::NoCourseName => "course name not found",
            SkipReason::NoVideos => "no recording found",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoStatus {
    Downloaded { bytes: u64 },
    /// Found in the ledger, not downloaded again
    AlreadyDownloaded,
    /// Dry run: would be downloaded to the path
    Planned,
    Failed(String),
}

/// Result of one recording
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub item: Arc<WorkItem>,
    pub path: PathBuf,
    pub status: VideoStatus,
}

impl DownloadOutcome {
    /// The recording is available at `path`
    pub fn success(&self) -> bool {
        !matches!(self.status, VideoStatus::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            VideoStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// What comes out of the pipeline
#[derive(Debug)]
pub enum Outcome {
    Skipped { item: Arc<WorkItem>, reason: SkipReason },
    Video(DownloadOutcome),
}
