mod download_actor;
mod extract_actor;
mod message;

use std::{path::Path, thread};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
pub use download_actor::DownloadActor;
pub use extract_actor::ExtractActor;
pub use message::*;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{error, info};

use crate::{
    database::Sqlite,
    extract::Extractor,
    outside::{Cookies, Downloader},
    pacing::Pacer,
    report::RunReport,
    types::{Extension, WorkItem},
};

pub trait Actor<From, To> {
    fn set_receive_channel(&mut self, channel: Receiver<From>);

    fn set_send_channel(&mut self, channel: Sender<To>);

    fn run(self) -> Result<()>;
}

pub fn connect_actors<From, Shared, To>(
    from: &mut dyn Actor<From, Shared>,
    to: &mut dyn Actor<Shared, To>,
    (send, receive): (Sender<Shared>, Receiver<Shared>),
) {
    from.set_send_channel(send);
    to.set_receive_channel(receive);
}

/// Everything the pipeline stages borrow for the duration of a run
#[derive(Debug)]
pub struct Pipeline<'a> {
    pub extractor: &'a Extractor<'a>,
    pub downloader: &'a dyn Downloader,
    pub cookies: &'a Cookies,
    pub pacer: &'a dyn Pacer,
    pub ledger: Option<&'a Sqlite>,
    pub out_dir: &'a Path,
    pub ext: Extension,
    /// Number of concurrent downloads
    pub workers: usize,
    /// Plan the output paths without downloading
    pub dry_run: bool,
}

impl Pipeline<'_> {
    /// Process all the work items and collect what happened to each of them.
    ///
    /// Skipped items and failed downloads are part of the report,
    /// only a broken pipeline is an error.
    pub fn run(&self, items: Vec<WorkItem>) -> Result<RunReport> {
        let workers = self.workers.max(1);

        thread::scope(|scope| -> Result<RunReport> {
            let (report_send, output) = unbounded();

            // Initialize the actors
            let mut extract_actor = ExtractActor::new(
                self.extractor,
                self.pacer,
                self.ledger,
                self.out_dir,
                self.ext,
                self.dry_run,
                report_send.clone(),
            );
            let mut dl_actors: Vec<_> = (0..workers)
                .map(|id| {
                    DownloadActor::new(id, self.downloader, self.cookies, self.pacer, self.ledger)
                })
                .collect();

            // Connect the actors together
            let (input, receive) = unbounded();
            extract_actor.set_receive_channel(receive);

            let (send, receive) = bounded(workers);
            for dl_actor in &mut dl_actors {
                connect_actors(
                    &mut extract_actor,
                    dl_actor,
                    (send.clone(), receive.clone()),
                );
                dl_actor.set_send_channel(report_send.clone());
            }

            // Only the actors may keep the channels open
            drop((send, receive));
            drop(report_send);

            // Start the actors
            let mut handles = Vec::with_capacity(workers + 1);
            handles.push(
                thread::Builder::new()
                    .name("extract".to_owned())
                    .spawn_scoped(scope, move || extract_actor.run())
                    .into_diagnostic()
                    .wrap_err("Could not start the extract actor")?,
            );
            for (id, dl_actor) in dl_actors.into_iter().enumerate() {
                handles.push(
                    thread::Builder::new()
                        .name(format!("dl-{id}"))
                        .spawn_scoped(scope, move || dl_actor.run())
                        .into_diagnostic()
                        .wrap_err("Could not start a download actor")?,
                );
            }

            // Fill the input channel with all the tasks, in source order
            for item in items {
                input
                    .send(item)
                    .into_diagnostic()
                    .wrap_err("Could not send work item")?;
            }

            // Drop the input to indicate the end of the input data
            drop(input);

            // Collect until every actor has stopped
            let mut report = RunReport::default();
            for outcome in output {
                report.push(outcome);
            }

            for handle in handles {
                let name = handle.thread().name().unwrap_or("actor").to_owned();
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        error!("Actor {name} stopped early: {err:?}");
                        return Err(err.wrap_err(format!("Actor {name} failed")));
                    }
                    Err(_) => return Err(miette!("Actor {name} panicked")),
                }
            }

            info!("All tasks completed");
            Ok(report)
        })
    }
}
