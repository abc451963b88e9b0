mod actors;
mod cli;
mod database;
mod extract;
mod io;
mod logging;
mod outside;
mod pacing;
mod report;
mod result;
mod settings;
mod types;
mod utils;
mod worklist;

use clap::Parser;
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, warn};

use crate::{
    actors::Pipeline,
    cli::Args,
    database::{Ledger, Sqlite},
    extract::{CssRowFields, Extractor, PageSelectors},
    logging::init_logging,
    outside::{Cookies, HttpDownloader, HttpPages, PageProvider, SnapshotPages},
    pacing::{FixedDelay, NoDelay, Pacer},
    settings::Settings,
    worklist::load_work_items,
};

fn main() -> Result<()> {
    // Initialize the environment & CLI
    let args = Args::parse();
    init_logging(args.log_level)?;

    let settings = Settings::load(args.config.as_deref())?.merge_args(&args);

    // Make sure the needed directories are created
    std::fs::create_dir_all(&args.out)
        .into_diagnostic()
        .wrap_err("Could not create out directory")?;
    if let Some(p) = args.ledger.as_ref().and_then(|p| p.parent()) {
        std::fs::create_dir_all(p)
            .into_diagnostic()
            .wrap_err("Could not create ledger parent directories")?;
    }

    let cookies = load_cookies(&args)?;
    if cookies.is_empty() {
        warn!("No session cookie given, protected recordings will fail to download");
    } else {
        info!("{} session cookies loaded", cookies.len());
    }

    let pages: Box<dyn PageProvider> = match &args.pages_dir {
        Some(dir) => Box::new(SnapshotPages::new(dir)),
        None => Box::new(HttpPages::new(settings.page_url_template.clone(), &cookies)?),
    };
    let extractor = Extractor::new(
        pages.as_ref(),
        PageSelectors::new(&settings.selectors)?,
        Box::new(CssRowFields::new(&settings.selectors)?),
        settings.course_name_prefix.clone(),
    )
    .with_timeout(settings.render_timeout(), settings.poll_interval());
    let downloader = HttpDownloader::new(settings.chunk_size)?;
    let pacer: Box<dyn Pacer> = if settings.delay().is_zero() {
        Box::new(NoDelay)
    } else {
        Box::new(FixedDelay::new(settings.delay()))
    };

    let ledger = args
        .ledger
        .as_deref()
        .map(Sqlite::read_or_create)
        .transpose()
        .wrap_err("Could not create or read ledger file")?;
    if let Some(ledger) = &ledger {
        info!("{} recordings already downloaded", ledger.count()?);
    }

    let items = load_work_items(&args.worklist, settings.header_rows);
    if items.is_empty() {
        warn!("No work item loaded, nothing to do");
        return Ok(());
    }
    info!("{} work items loaded", items.len());

    let report = Pipeline {
        extractor: &extractor,
        downloader: &downloader,
        cookies: &cookies,
        pacer: pacer.as_ref(),
        ledger: ledger.as_ref(),
        out_dir: &args.out,
        ext: settings.extension,
        workers: settings.workers,
        dry_run: args.dry_run,
    }
    .run(items)?;

    report.log_summary();
    Ok(())
}

/// Load the session cookies from the command line or the cookie export
fn load_cookies(args: &Args) -> Result<Cookies> {
    if let Some(header) = &args.cookies {
        Ok(Cookies::parse(header))
    } else if let Some(path) = &args.cookie_file {
        Cookies::from_json_file(path)
    } else {
        Ok(Cookies::default())
    }
}
