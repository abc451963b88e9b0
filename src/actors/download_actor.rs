use crossbeam_channel::{Receiver, Sender};
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{debug, error, info, warn};

use crate::{
    database::{Ledger, Sqlite},
    outside::{Cookies, Downloader},
    pacing::Pacer,
};

use super::{Actor, DownloadJob, DownloadOutcome, Outcome, VideoStatus};

/// Download the claimed recordings. Several of them run concurrently.
#[derive(Debug)]
pub struct DownloadActor<'a> {
    id: usize,
    downloader: &'a dyn Downloader,
    cookies: &'a Cookies,
    pacer: &'a dyn Pacer,
    ledger: Option<&'a Sqlite>,

    receive_channel: Option<Receiver<DownloadJob>>,
    send_channel: Option<Sender<Outcome>>,
}

impl Actor<DownloadJob, Outcome> for DownloadActor<'_> {
    fn set_receive_channel(&mut self, channel: Receiver<DownloadJob>) {
        self.receive_channel = Some(channel);
    }

    fn set_send_channel(&mut self, channel: Sender<Outcome>) {
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

        debug!("{}: Actor started, waiting for a recording", self.id);

        for DownloadJob {
            item,
            video,
            key,
            path,
        } in receive_channel
        {
            info!(
                "{}: Downloading '{}' into '{}'",
                self.id,
                video.segment_title,
                path.display()
            );

            let fetched = self
                .downloader
                .fetch(&video.download_url, self.cookies, &path)
                .map_err(|err| {
                    err.wrap_err_with(|| format!("Could not download {}", video.download_url))
                });
            let status = match fetched {
                Ok(bytes) => {
                    info!("{}: Downloaded '{}' ({bytes} bytes)", self.id, path.display());
                    if let Some(ledger) = self.ledger {
                        if let Err(err) = ledger.record(&key, &path) {
                            warn!("{}: Could not update the ledger: {err:?}", self.id);
                        }
                    }
                    VideoStatus::Downloaded { bytes }
                }
                Err(err) => {
                    error!("{}: Could not download '{}': {err}", self.id, path.display());

                    // Release the claimed name, nothing was written to it
                    if let Err(rm_err) = std::fs::remove_file(&path) {
                        warn!("{}: Could not remove placeholder: {rm_err}", self.id);
                    }
                    VideoStatus::Failed(err.to_string())
                }
            };
            self.pacer.pause();

            send_channel
                .send(Outcome::Video(DownloadOutcome { item, path, status }))
                .into_diagnostic()
                .wrap_err("Could not send message")?;

            debug!("{}: Iteration completed. Waiting for next recording", self.id);
        }

        debug!("{}: All iterations completed. Stopping the actor.", self.id);
        Ok(())
    }
}

impl<'a> DownloadActor<'a> {
    pub fn new(
        id: usize,
        downloader: &'a dyn Downloader,
        cookies: &'a Cookies,
        pacer: &'a dyn Pacer,
        ledger: Option<&'a Sqlite>,
    ) -> Self {
        Self {
            id,
            downloader,
            cookies,
            pacer,
            ledger,
            receive_channel: None,
            send_channel: None,
        }
    }
}
