use std::{path::Path, time::Duration};

use config::{Config, Environment, File, FileFormat};
use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;

use crate::{cli::Args, outside::DEFAULT_CHUNK_SIZE, types::Extension};

/// Root of the application layout, the management view lives in its 4th block
const ROOT: &str = "body > div:nth-of-type(1) > div > div:nth-of-type(2) > div";

/// CSS selectors locating the data on the record management view
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    /// Element holding the course name, e.g. "课程名称：Python编程入门"
    pub course_name: String,
    /// The recordings table
    pub table: String,
    /// Rows of the recordings table, relative to the table
    pub rows: String,
    /// Download link of a row, its `href` is used
    pub link: String,
    /// "start ~ end" time range of a row
    pub time_range: String,
    /// Recording method of a row
    pub method: String,
    /// Segment title of a row
    pub title: String,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            course_name: format!(
                "{ROOT} > div:nth-of-type(2) > p:nth-of-type(1) > span:nth-of-type(1)"
            ),
            table: format!("{ROOT} > div:nth-of-type(4) > div > div:nth-of-type(3) > table"),
            rows: "tbody > tr".to_owned(),
            link: "td:nth-of-type(9) > div > a".to_owned(),
            time_range: "td:nth-of-type(5) > div > span".to_owned(),
            method: "td:nth-of-type(4) > div".to_owned(),
            title: "td:nth-of-type(2) > div".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// URL of the management view, with `{course_id}` and `{lesson_id}` placeholders
    pub page_url_template: String,
    /// Number of non-data rows at the top of the work-list
    pub header_rows: usize,
    /// Number of concurrent downloads
    pub workers: usize,
    /// Pause after every page navigation and download
    pub delay_ms: u64,
    /// How long to wait for the page elements to appear
    pub render_timeout_secs: u64,
    /// How often to check the page while waiting
    pub poll_interval_ms: u64,
    pub chunk_size: usize,
    pub extension: Extension,
    /// Label preceding the course name in its element
    pub course_name_prefix: String,
    pub selectors: SelectorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_url_template: "https://console.eeo.cn/saas/school/index.html#/singlePage/\
                CourseManagement/recordLessonManagement?courseId={course_id}\
                &lessonId={lesson_id}&record=true&live=true"
                .to_owned(),
            header_rows: 3,
            workers: 2,
            delay_ms: 3000,
            render_timeout_secs: 15,
            poll_interval_ms: 500,
            chunk_size: DEFAULT_CHUNK_SIZE,
            extension: Extension::Mp4,
            course_name_prefix: "课程名称：".to_owned(),
            selectors: SelectorSettings::default(),
        }
    }
}

impl Settings {
    /// Load the settings from the optional TOML file, then from the
    /// `LESSONREC__*` environment variables (`LESSONREC__SELECTORS__ROWS`, ...).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder
            .add_source(
                Environment::with_prefix("LESSONREC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .into_diagnostic()
            .wrap_err("Could not load configuration")?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err("Invalid configuration")
    }

    /// Command line values take precedence over the configuration
    pub fn merge_args(mut self, args: &Args) -> Self {
        if let Some(workers) = args.workers {
            self.workers = workers;
        }
        if let Some(delay_ms) = args.delay_ms {
            self.delay_ms = delay_ms;
        }
        if let Some(timeout) = args.timeout_secs {
            self.render_timeout_secs = timeout;
        }
        if let Some(ext) = args.ext {
            self.extension = ext;
        }
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
