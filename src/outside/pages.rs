use std::{
    fmt::Debug,
    path::{Path, PathBuf},
};

use miette::{Context, IntoDiagnostic};
use reqwest::{blocking::Client, header::COOKIE};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::{
    io::sanitize,
    result::{Error, Result},
};

use super::Cookies;

/// A DOM-queryable snapshot of the record management view of one lesson
pub struct RenderedPage {
    html: Html,
}

impl RenderedPage {
    pub fn parse(document: &str) -> Self {
        Self {
            html: Html::parse_document(document),
        }
    }

    /// First element matching the selector, in document order
    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }
}

/// Interface for getting the rendered management view of a lesson.
///
/// Each call is a fresh navigation: calling it again after a delay
/// may return a page with more content loaded.
pub trait PageProvider: Sync + Debug {
    fn render(&self, course_id: &str, lesson_id: &str) -> Result<RenderedPage>;
}

/// Fill the `{course_id}` and `{lesson_id}` placeholders of a URL template
pub fn page_url(template: &str, course_id: &str, lesson_id: &str) -> String {
    template
        .replace("{course_id}", course_id)
        .replace("{lesson_id}", lesson_id)
}

/// Fetch the management view over HTTP with the session cookies.
///
/// The endpoint must serve the page with its dynamic content
/// already rendered, e.g. a pre-rendering proxy in front of the platform.
#[derive(Debug)]
pub struct HttpPages {
    client: Client,
    url_template: String,
    cookie_header: Option<String>,
}

impl HttpPages {
    pub fn new(url_template: String, cookies: &Cookies) -> Result<Self> {
        let client = Client::builder()
            .build()
            .into_diagnostic()
            .wrap_err("Could not build HTTP client")?;

        Ok(Self {
            client,
            url_template,
            cookie_header: cookies.header_value(),
        })
    }
}

impl PageProvider for HttpPages {
    fn render(&self, course_id: &str, lesson_id: &str) -> Result<RenderedPage> {
        let url = page_url(&self.url_template, course_id, lesson_id);
        debug!("Fetching page {url}");

        let mut request = self.client.get(&url);
        if let Some(cookie) = &self.cookie_header {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not fetch {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .into_diagnostic()
            .wrap_err("Could not read page body")?;
        Ok(RenderedPage::parse(&body))
    }
}

/// Read pages saved from a browser session.
///
/// The page of a lesson is expected at `<dir>/<course_id>_<lesson_id>.html`.
#[derive(Debug)]
pub struct SnapshotPages {
    dir: PathBuf,
}

impl SnapshotPages {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn page_path(&self, course_id: &str, lesson_id: &str) -> PathBuf {
        self.dir
            .join(sanitize(&format!("{course_id}_{lesson_id}.html")))
    }
}

impl PageProvider for SnapshotPages {
    fn render(&self, course_id: &str, lesson_id: &str) -> Result<RenderedPage> {
        let path = self.page_path(course_id, lesson_id);
        debug!("Reading page {}", path.display());

        let document = std::fs::read_to_string(&path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read page snapshot {}", path.display()))?;
        Ok(RenderedPage::parse(&document))
    }
}

/// In-memory pages keyed by `(course_id, lesson_id)`
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StaticPages {
    pages: std::collections::HashMap<(String, String), String>,
    renders: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticPages {
    pub fn with(mut self, course_id: &str, lesson_id: &str, document: String) -> Self {
        self.pages
            .insert((course_id.to_owned(), lesson_id.to_owned()), document);
        self
    }

    pub fn renders(&self) -> usize {
        self.renders.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl PageProvider for StaticPages {
    fn render(&self, course_id: &str, lesson_id: &str) -> Result<RenderedPage> {
        self.renders
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.pages
            .get(&(course_id.to_owned(), lesson_id.to_owned()))
            .map(|document| RenderedPage::parse(document))
            .ok_or_else(|| crate::result::err_msg(format!("No page for {course_id}/{lesson_id}")))
    }
}
