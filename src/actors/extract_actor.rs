use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use crossbeam_channel::{Receiver, Sender};
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{debug, info, info_span, warn};

use crate::{
    database::{EntryKey, Ledger, Sqlite},
    extract::Extractor,
    io::{allocate, base_name, claim, folder_name},
    pacing::Pacer,
    result::Error,
    types::{Extension, VideoEntry, WorkItem},
};

use super::{Actor, DownloadJob, DownloadOutcome, Outcome, SkipReason, VideoStatus};

/// Single actor going through the work items in order.
///
/// Page navigation is stateful, so only one page is handled at a time.
/// Output paths are claimed here too, which keeps the naming the same
/// from one run to the next whatever the order downloads complete in.
#[derive(Debug)]
pub struct ExtractActor<'a> {
    extractor: &'a Extractor<'a>,
    pacer: &'a dyn Pacer,
    ledger: Option<&'a Sqlite>,
    out_dir: &'a Path,
    ext: Extension,
    dry_run: bool,
    /// Paths handed out by the dry run, which creates no placeholder
    planned: HashSet<PathBuf>,
    report_channel: Sender<Outcome>,

    receive_channel: Option<Receiver<WorkItem>>,
    send_channel: Option<Sender<DownloadJob>>,
}

impl Actor<WorkItem, DownloadJob> for ExtractActor<'_> {
    fn set_receive_channel(&mut self, channel: Receiver<WorkItem>) {
        self.receive_channel = Some(channel);
    }

    fn set_send_channel(&mut self, channel: Sender<DownloadJob>) {
        self.send_channel = Some(channel);
    }

    fn run(mut self) -> Result<()> {
        let receive_channel = self
            .receive_channel
            .take()
            .ok_or_else(|| miette!("Receive channel not set"))?;

        let send_channel = self
            .send_channel
            .take()
            .ok_or_else(|| miette!("Send channel not set"))?;

        debug!("Actor started, waiting for a work item");

        for item in receive_channel {
            let item = Arc::new(item);
            if !item.is_actionable() {
                warn!("Skipping work item without IDs: {item:?}");
                self.skip(item, SkipReason::MissingIds)?;
                continue;
            }

            let _span = info_span!("item", course = %item.course_id, lesson = %item.lesson_id)
                .entered();
            info!("Processing {item}");
            let (course_name, videos) = self.extractor.extract(&item.course_id, &item.lesson_id);
            self.pacer.pause();

            let course_name = match course_name {
                Some(name) if !videos.is_empty() => name,
                Some(name) => {
                    warn!("No recording for '{name}' ({item}), skipping it");
                    self.skip(item, SkipReason::NoVideos)?;
                    continue;
                }
                None => {
                    warn!("No course name for {item}, skipping it");
                    self.skip(item, SkipReason::NoCourseName)?;
                    continue;
                }
            };
            info!("{} recordings found for '{course_name}'", videos.len());

            let mut occurrences: HashMap<(String, String), u32> = HashMap::new();
            for video in videos {
                let count = occurrences
                    .entry((video.record_date.clone(), video.record_method.clone()))
                    .or_default();
                let occurrence = *count;
                *count += 1;

                let key = EntryKey {
                    course_id: item.course_id.clone(),
                    lesson_id: item.lesson_id.clone(),
                    record_date: video.record_date.clone(),
                    record_method: video.record_method.clone(),
                    occurrence,
                };

                if let Some(job) = self.prepare(&item, &course_name, video, key)? {
                    send_channel
                        .send(job)
                        .into_diagnostic()
                        .wrap_err("Could not send message")?;
                }
            }

            debug!("Iteration completed. Waiting for next work item");
        }

        debug!("All iterations completed. Stopping the actor.");
        Ok(())
    }
}

impl<'a> ExtractActor<'a> {
    pub fn new(
        extractor: &'a Extractor<'a>,
        pacer: &'a dyn Pacer,
        ledger: Option<&'a Sqlite>,
        out_dir: &'a Path,
        ext: Extension,
        dry_run: bool,
        report_channel: Sender<Outcome>,
    ) -> Self {
        Self {
            extractor,
            pacer,
            ledger,
            out_dir,
            ext,
            dry_run,
            planned: HashSet::new(),
            report_channel,
            receive_channel: None,
            send_channel: None,
        }
    }

    fn skip(&self, item: Arc<WorkItem>, reason: SkipReason) -> Result<()> {
        self.report(Outcome::Skipped { item, reason })
    }

    fn report(&self, outcome: Outcome) -> Result<()> {
        self.report_channel
            .send(outcome)
            .into_diagnostic()
            .wrap_err("Could not send outcome")
    }

    /// Turn a recording into a download job, claiming its output path.
    ///
    /// Return `None` when there is nothing to download: the recording is
    /// already in the ledger, this is a dry run, or its path could not be
    /// claimed. These cases are reported directly.
    fn prepare(
        &mut self,
        item: &Arc<WorkItem>,
        course_name: &str,
        video: VideoEntry,
        key: EntryKey,
    ) -> Result<Option<DownloadJob>> {
        if let Some(path) = self.already_downloaded(&key) {
            info!("'{}' already downloaded, skipping it", path.display());
            self.report(Outcome::Video(DownloadOutcome {
                item: item.clone(),
                path,
                status: VideoStatus::AlreadyDownloaded,
            }))?;
            return Ok(None);
        }

        let folder = self.out_dir.join(folder_name(&video.record_date, course_name));
        let base = base_name(&video.record_date, course_name, &video.record_method);

        if self.dry_run {
            let path = allocate(&folder, &base, self.ext, &self.planned)?;
            self.planned.insert(path.clone());
            info!("Would download {} to '{}'", video.download_url, path.display());
            self.report(Outcome::Video(DownloadOutcome {
                item: item.clone(),
                path,
                status: VideoStatus::Planned,
            }))?;
            return Ok(None);
        }

        let claimed = std::fs::create_dir_all(&folder)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not create {}", folder.display()))
            .and_then(|_| Ok(claim(&folder, &base, self.ext)?));

        match claimed {
            Ok(path) => {
                debug!("Claimed '{}' for {}", path.display(), video.download_url);
                Ok(Some(DownloadJob {
                    item: item.clone(),
                    video,
                    key,
                    path,
                }))
            }
            Err(err) => {
                let path = folder.join(format!("{base}{}", self.ext.with_dot()));
                warn!("Could not reserve '{}': {err:?}", path.display());
                self.report(Outcome::Video(DownloadOutcome {
                    item: item.clone(),
                    path,
                    status: VideoStatus::Failed(Error::Miette(err).to_string()),
                }))?;
                Ok(None)
            }
        }
    }

    /// Path of the recording if the ledger knows it and the file is still there.
    ///
    /// An unreadable ledger only costs a new download.
    fn already_downloaded(&self, key: &EntryKey) -> Option<PathBuf> {
        let ledger = self.ledger?;

        match ledger.lookup(key) {
            Ok(path) => path.filter(|path| path.exists()),
            Err(err) => {
                warn!("Could not check the ledger, downloading again: {err:?}");
                None
            }
        }
    }
}
