use std::path::PathBuf;

use clap::Parser;

use crate::types::Extension;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("LESSONREC_", $v)
    };
}

/// Bulk exporter for recorded lessons.
/// Read the lessons of a work-list export, find their recordings on the
/// record management view and download all of them.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The path to the work-list CSV export (3 leading rows, then a header row)
    #[arg(env=arg_env!("WORKLIST"))]
    pub worklist: PathBuf,

    /// The path to the output directory
    #[arg(long, default_value = "videos", env=arg_env!("OUT"))]
    pub out: PathBuf,

    /// The path to a TOML configuration file
    #[arg(long, env=arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// The session cookies, as a `Cookie` header value: `name1=value1; name2=value2`
    #[arg(long, env=arg_env!("COOKIES"), conflicts_with = "cookie_file")]
    pub cookies: Option<String>,

    /// The path to a JSON cookie export of a logged-in browser session
    #[arg(long, env=arg_env!("COOKIE_FILE"))]
    pub cookie_file: Option<PathBuf>,

    /// Read the rendered pages from this directory (`<course_id>_<lesson_id>.html`)
    /// instead of fetching them
    #[arg(long, env=arg_env!("PAGES_DIR"))]
    pub pages_dir: Option<PathBuf>,

    /// The path to the ledger file, remembering the recordings already downloaded.
    /// Without it, every run downloads everything again
    #[arg(long, env=arg_env!("LEDGER"))]
    pub ledger: Option<PathBuf>,

    /// Number of concurrent downloads
    #[arg(long, env=arg_env!("WORKERS"))]
    pub workers: Option<usize>,

    /// Pause in milliseconds after every page navigation and download
    #[arg(long, env=arg_env!("DELAY_MS"))]
    pub delay_ms: Option<u64>,

    /// How long to wait, in seconds, for a page to show its recordings
    #[arg(long, env=arg_env!("TIMEOUT_SECS"))]
    pub timeout_secs: Option<u64>,

    /// The file extension to use for the output files
    #[arg(long, value_enum, env=arg_env!("EXT"))]
    pub ext: Option<Extension>,

    /// Only list the recordings and where they would be saved, download nothing
    #[arg(long, env=arg_env!("DRY_RUN"))]
    pub dry_run: bool,

    /// Maximum level of the log messages
    #[arg(long, default_value_t = tracing::Level::INFO, env=arg_env!("LOG_LEVEL"))]
    pub log_level: tracing::Level,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn cookie_sources_are_exclusive() {
        let res = Args::try_parse_from([
            "lessonrec",
            "c.csv",
            "--cookies",
            "a=b",
            "--cookie-file",
            "cookies.json",
        ]);
        assert!(res.is_err());
    }
}
