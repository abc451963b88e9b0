use std::{
    fmt::Debug,
    time::{Duration, Instant},
};

use miette::miette;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

use crate::{
    io::sanitize,
    outside::{PageProvider, RenderedPage},
    result::{Error, Result},
    settings::SelectorSettings,
    types::VideoEntry,
};

fn parse_selector(name: &str, css: &str) -> miette::Result<Selector> {
    Selector::parse(css).map_err(|err| miette!("Invalid {name} selector '{css}': {err:?}"))
}

/// Strategy reading the four fields of one recordings table row.
///
/// Any accessor may fail with [`Error::RowParse`] when the row
/// does not have the field.
pub trait RowFields: Sync + Debug {
    /// Download URL of the recording
    fn link_field(&self, row: ElementRef<'_>) -> Result<String>;

    /// "start ~ end" recording time range
    fn time_range_field(&self, row: ElementRef<'_>) -> Result<String>;

    /// How the lesson was recorded (classroom, live, ...)
    fn method_field(&self, row: ElementRef<'_>) -> Result<String>;

    /// Title of the recording segment
    fn title_field(&self, row: ElementRef<'_>) -> Result<String>;
}

/// Read the row fields with CSS selectors, relative to the row
#[derive(Debug)]
pub struct CssRowFields {
    link: Selector,
    time_range: Selector,
    method: Selector,
    title: Selector,
}

impl CssRowFields {
    pub fn new(selectors: &SelectorSettings) -> miette::Result<Self> {
        Ok(Self {
            link: parse_selector("link", &selectors.link)?,
            time_range: parse_selector("time range", &selectors.time_range)?,
            method: parse_selector("method", &selectors.method)?,
            title: parse_selector("title", &selectors.title)?,
        })
    }

    fn text(row: ElementRef<'_>, selector: &Selector, field: &'static str) -> Result<String> {
        row.select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_owned())
            .ok_or(Error::RowParse(field))
    }
}

impl RowFields for CssRowFields {
    fn link_field(&self, row: ElementRef<'_>) -> Result<String> {
        row.select(&self.link)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_owned)
            .ok_or(Error::RowParse("link"))
    }

    fn time_range_field(&self, row: ElementRef<'_>) -> Result<String> {
        Self::text(row, &self.time_range, "time range")
    }

    fn method_field(&self, row: ElementRef<'_>) -> Result<String> {
        Self::text(row, &self.method, "method")
    }

    fn title_field(&self, row: ElementRef<'_>) -> Result<String> {
        Self::text(row, &self.title, "title")
    }
}

/// Selectors for the parts of the page that are not row fields
#[derive(Debug)]
pub struct PageSelectors {
    course_name: Selector,
    table: Selector,
    rows: Selector,
}

impl PageSelectors {
    pub fn new(selectors: &SelectorSettings) -> miette::Result<Self> {
        Ok(Self {
            course_name: parse_selector("course name", &selectors.course_name)?,
            table: parse_selector("table", &selectors.table)?,
            rows: parse_selector("rows", &selectors.rows)?,
        })
    }
}

/// Extract the recordings of a lesson from its rendered management view
#[derive(Debug)]
pub struct Extractor<'a> {
    pages: &'a dyn PageProvider,
    selectors: PageSelectors,
    fields: Box<dyn RowFields + 'a>,
    course_name_prefix: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a> Extractor<'a> {
    pub fn new(
        pages: &'a dyn PageProvider,
        selectors: PageSelectors,
        fields: Box<dyn RowFields + 'a>,
        course_name_prefix: String,
    ) -> Self {
        Self {
            pages,
            selectors,
            fields,
            course_name_prefix,
            timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Bound the wait for the page elements to appear
    pub fn with_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Get the course name and the recordings of a lesson.
    ///
    /// A page that cannot be rendered, or whose elements do not appear
    /// in time, gives `(None, [])`.
    pub fn extract(&self, course_id: &str, lesson_id: &str) -> (Option<String>, Vec<VideoEntry>) {
        match self.wait_for_page(course_id, lesson_id) {
            Ok(page) => self.extract_from(&page),
            Err(err) => {
                warn!("No usable page for course {course_id} / lesson {lesson_id}: {err}");
                (None, vec![])
            }
        }
    }

    /// Render the page until it shows both the course name and the
    /// recordings table. At least one render is always done.
    fn wait_for_page(&self, course_id: &str, lesson_id: &str) -> Result<RenderedPage> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let page = self.pages.render(course_id, lesson_id)?;
            if self.is_ready(&page) {
                return Ok(page);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::RenderTimeout(self.timeout));
            }

            debug!("Page not ready yet, waiting");
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn is_ready(&self, page: &RenderedPage) -> bool {
        page.select_first(&self.selectors.course_name).is_some()
            && page.select_first(&self.selectors.table).is_some()
    }

    /// Extract from an already rendered page.
    ///
    /// Without a course name, no recording is usable: `(None, [])`.
    /// Rows missing a field are skipped, the others are kept in page order.
    pub fn extract_from(&self, page: &RenderedPage) -> (Option<String>, Vec<VideoEntry>) {
        let Some(course_name) = self.course_name(page) else {
            warn!("Course name not found on the page");
            return (None, vec![]);
        };

        let Some(table) = page.select_first(&self.selectors.table) else {
            return (Some(course_name), vec![]);
        };

        let mut videos = vec![];
        for (idx, row) in table.select(&self.selectors.rows).enumerate() {
            match self.parse_row(row) {
                Ok(video) => videos.push(video),
                Err(err) => warn!("Skipping row {} of '{course_name}': {err}", idx + 1),
            }
        }

        (Some(course_name), videos)
    }

    fn course_name(&self, page: &RenderedPage) -> Option<String> {
        let text: String = page
            .select_first(&self.selectors.course_name)?
            .text()
            .collect();

        let text = if self.course_name_prefix.is_empty() {
            text
        } else {
            text.replace(&self.course_name_prefix, "")
        };

        let name = sanitize(&text);
        (!name.is_empty()).then_some(name)
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Result<VideoEntry> {
        let download_url = self.fields.link_field(row)?;
        let time_range = self.fields.time_range_field(row)?;
        let record_method = sanitize(&self.fields.method_field(row)?);
        let segment_title = sanitize(&self.fields.title_field(row)?);

        Ok(VideoEntry {
            download_url,
            record_date: record_date(&time_range),
            record_method,
            segment_title,
        })
    }
}

/// "2024-07-15 10:29:08 ~ 2024-07-15 12:29:05" -> "2024-07-15"
fn record_date(time_range: &str) -> String {
    let time_range = time_range.trim();
    let date = time_range
        .split_once(' ')
        .map_or(time_range, |(date, _)| date);
    sanitize(date)
}

#[cfg(test)]
pub mod fixtures {
    use std::time::Duration;

    use crate::{outside::PageProvider, settings::SelectorSettings};

    use super::{CssRowFields, Extractor, PageSelectors};

    pub fn selectors() -> SelectorSettings {
        SelectorSettings {
            course_name: "#course-name".to_owned(),
            table: "#records".to_owned(),
            ..SelectorSettings::default()
        }
    }

    /// A recordings table row, laid out like the management view
    pub fn row(link: Option<&str>, time_range: &str, method: &str, title: &str) -> String {
        let link = link.map_or_else(
            || "<span>-</span>".to_owned(),
            |href| format!(r#"<a href="{href}">下载</a>"#),
        );
        format!(
            "<tr>\
                <td>1</td>\
                <td><div>{title}</div></td>\
                <td></td>\
                <td><div>{method}</div></td>\
                <td><div><span>{time_range}</span></div></td>\
                <td></td><td></td><td></td>\
                <td><div>{link}</div></td>\
            </tr>"
        )
    }

    pub fn page(course_name: Option<&str>, rows: &[String]) -> String {
        let course = course_name.map_or_else(String::new, |name| {
            format!(r#"<p id="course-name">课程名称：{name}</p>"#)
        });
        format!(
            r#"<html><body>{course}<table id="records">
                <thead><tr><th>序号</th></tr></thead>
                <tbody>{}</tbody>
            </table></body></html>"#,
            rows.concat()
        )
    }

    pub fn extractor(pages: &dyn PageProvider) -> Extractor<'_> {
        let selectors = selectors();
        Extractor::new(
            pages,
            PageSelectors::new(&selectors).unwrap(),
            Box::new(CssRowFields::new(&selectors).unwrap()),
            "课程名称：".to_owned(),
        )
        .with_timeout(Duration::ZERO, Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{fixtures::*, *};
    use crate::outside::StaticPages;

    const TIME: &str = "2024-07-15 10:29:08 ~ 2024-07-15 12:29:05";

    #[test]
    fn record_date_is_the_first_token() {
        assert_eq!(record_date(TIME), "2024-07-15");
        assert_eq!(record_date("2024-07-15"), "2024-07-15");
        assert_eq!(record_date(""), "");
    }

    #[test]
    fn rows_are_extracted_in_order() {
        let pages = StaticPages::default().with(
            "C1",
            "L1",
            page(
                Some(" Python编程入门 "),
                &[
                    row(Some("http://x/1.mp4"), TIME, "教室", "片段 1"),
                    row(Some("http://x/2.mp4"), "2024-07-16 08:00:00 ~ x", "录制:现场", "片段/2"),
                ],
            ),
        );

        let (name, videos) = extractor(&pages).extract("C1", "L1");

        assert_eq!(name.as_deref(), Some("Python编程入门"));
        assert_eq!(
            videos,
            vec![
                VideoEntry {
                    download_url: "http://x/1.mp4".into(),
                    record_date: "2024-07-15".into(),
                    record_method: "教室".into(),
                    segment_title: "片段 1".into(),
                },
                VideoEntry {
                    download_url: "http://x/2.mp4".into(),
                    record_date: "2024-07-16".into(),
                    record_method: "录制_现场".into(),
                    segment_title: "片段_2".into(),
                },
            ]
        );
    }

    #[test]
    fn broken_row_does_not_stop_the_others() {
        let pages = StaticPages::default().with(
            "C1",
            "L1",
            page(
                Some("Math"),
                &[
                    row(Some("http://x/1.mp4"), TIME, "教室", "1"),
                    row(None, TIME, "教室", "2"),
                    row(Some("http://x/3.mp4"), TIME, "教室", "3"),
                ],
            ),
        );

        let (_, videos) = extractor(&pages).extract("C1", "L1");

        let titles: Vec<_> = videos.iter().map(|v| v.segment_title.as_str()).collect();
        assert_eq!(titles, ["1", "3"]);
    }

    #[test]
    fn empty_table_gives_the_name_only() {
        let pages = StaticPages::default().with("C1", "L1", page(Some("Math"), &[]));

        let (name, videos) = extractor(&pages).extract("C1", "L1");
        assert_eq!(name.as_deref(), Some("Math"));
        assert!(videos.is_empty());
    }

    #[test]
    fn missing_course_name_gives_nothing() {
        let pages = StaticPages::default().with(
            "C1",
            "L1",
            page(None, &[row(Some("http://x/1.mp4"), TIME, "教室", "1")]),
        );
        let extractor = extractor(&pages);

        assert_eq!(extractor.extract("C1", "L1"), (None, vec![]));

        let rendered = RenderedPage::parse(&page(
            None,
            &[row(Some("http://x/1.mp4"), TIME, "教室", "1")],
        ));
        assert_eq!(extractor.extract_from(&rendered), (None, vec![]));
    }

    #[test]
    fn blank_course_name_counts_as_missing() {
        let pages = StaticPages::default().with("C1", "L1", page(Some("  "), &[]));
        assert_eq!(extractor(&pages).extract("C1", "L1"), (None, vec![]));
    }

    #[test]
    fn render_failure_gives_nothing() {
        let pages = StaticPages::default();
        assert_eq!(extractor(&pages).extract("C9", "L9"), (None, vec![]));
    }

    /// Serves the given documents one after the other, repeating the last one
    #[derive(Debug)]
    struct LoadingPages(Mutex<Vec<String>>);

    impl PageProvider for LoadingPages {
        fn render(&self, _: &str, _: &str) -> Result<RenderedPage> {
            let mut documents = self.0.lock().unwrap();
            let document = if documents.len() > 1 {
                documents.remove(0)
            } else {
                documents[0].clone()
            };
            Ok(RenderedPage::parse(&document))
        }
    }

    #[test]
    fn waits_until_the_page_is_loaded() {
        let loading = "<html><body><p>Loading...</p></body></html>".to_owned();
        let pages = LoadingPages(Mutex::new(vec![
            loading.clone(),
            loading,
            page(Some("Math"), &[row(Some("http://x/1.mp4"), TIME, "教室", "1")]),
        ]));
        let extractor = extractor(&pages)
            .with_timeout(Duration::from_secs(5), Duration::from_millis(1));

        let (name, videos) = extractor.extract("C1", "L1");
        assert_eq!(name.as_deref(), Some("Math"));
        assert_eq!(videos.len(), 1);
    }

    #[test]
    fn wait_is_bounded() {
        let pages = StaticPages::default().with("C1", "L1", "<html></html>".to_owned());
        let extractor = extractor(&pages)
            .with_timeout(Duration::from_millis(30), Duration::from_millis(5));

        let start = Instant::now();
        assert_eq!(extractor.extract("C1", "L1"), (None, vec![]));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(pages.renders() >= 2);
    }

    #[test]
    fn default_selectors_match_the_management_view() {
        let document = format!(
            r#"<html><body>
            <div id="app"><div>
                <div class="nav"></div>
                <div><div>
                    <div class="crumbs"></div>
                    <div><p><span>课程名称：Math</span><span>ID</span></p></div>
                    <div class="filters"></div>
                    <div><div>
                        <div></div>
                        <div></div>
                        <div><table><tbody>{}</tbody></table></div>
                    </div></div>
                </div></div>
            </div></div>
            </body></html>"#,
            row(Some("http://x/1.mp4"), TIME, "教室", "片段1")
        );
        let pages = StaticPages::default().with("C1", "L1", document);
        let selectors = SelectorSettings::default();
        let extractor = Extractor::new(
            &pages,
            PageSelectors::new(&selectors).unwrap(),
            Box::new(CssRowFields::new(&selectors).unwrap()),
            "课程名称：".to_owned(),
        )
        .with_timeout(Duration::ZERO, Duration::ZERO);

        let (name, videos) = extractor.extract("C1", "L1");
        assert_eq!(name.as_deref(), Some("Math"));
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].record_method, "教室");
        assert_eq!(videos[0].segment_title, "片段1");
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let selectors = SelectorSettings {
            link: "td:nth-of-type(".to_owned(),
            ..SelectorSettings::default()
        };
        assert!(CssRowFields::new(&selectors).is_err());
    }
}
