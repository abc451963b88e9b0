use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    actors::{DownloadOutcome, Outcome, SkipReason, VideoStatus},
    types::WorkItem,
};

/// Everything that happened during a run
#[derive(Debug, Default)]
pub struct RunReport {
    pub skipped: Vec<(Arc<WorkItem>, SkipReason)>,
    /// In completion order, not in source order
    pub videos: Vec<DownloadOutcome>,
}

impl RunReport {
    pub fn push(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Skipped { item, reason } => self.skipped.push((item, reason)),
            Outcome::Video(video) => self.videos.push(video),
        }
    }

    fn count(&self, f: impl Fn(&VideoStatus) -> bool) -> usize {
        self.videos.iter().filter(|v| f(&v.status)).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|status| matches!(status, VideoStatus::Downloaded { .. }))
    }

    pub fn already_downloaded(&self) -> usize {
        self.count(|status| matches!(status, VideoStatus::AlreadyDownloaded))
    }

    pub fn planned(&self) -> usize {
        self.count(|status| matches!(status, VideoStatus::Planned))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, VideoStatus::Failed(_)))
    }

    /// Log the failures one by one, then the totals
    pub fn log_summary(&self) {
        for (item, reason) in &self.skipped {
            warn!("Skipped {item}: {reason}");
        }
        for video in self.videos.iter().filter(|v| !v.success()) {
            warn!(
                "Failed '{}' ({}): {}",
                video.path.display(),
                video.item,
                video.error().unwrap_or_default()
            );
        }

        if self.planned() > 0 {
            info!("{} recordings would be downloaded", self.planned());
        }
        info!(
            "{} downloaded, {} already there, {} failed, {} work items skipped",
            self.downloaded(),
            self.already_downloaded(),
            self.failed(),
            self.skipped.len()
        );
    }
}
