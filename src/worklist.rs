use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{debug, error, warn};

use crate::types::WorkItem;

const LESSON_ID: &str = "课节ID";
const COURSE_ID: &str = "课程ID";
const LESSON_NAME: &str = "课节名称";
const COURSE_NAME: &str = "课程名称";
const START_TIME: &str = "开课时间";

/// Load the work-list CSV export.
///
/// Never fails: an unreadable or malformed file is logged
/// and results in an empty work queue.
pub fn load_work_items(path: &Path, header_rows: usize) -> Vec<WorkItem> {
    let items = File::open(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not open work-list {}", path.display()))
        .and_then(|file| read_work_items(file, header_rows));

    match items {
        Ok(items) => items,
        Err(err) => {
            error!("Could not load the work-list: {err:?}");
            vec![]
        }
    }
}

/// Read the work items from a CSV source.
///
/// The first `header_rows` lines are not data, blank ones included.
/// The following row is the header and every row after it is a record keyed
/// by the header names. Columns missing from a record default to an empty string.
pub fn read_work_items<R: Read>(reader: R, header_rows: usize) -> Result<Vec<WorkItem>> {
    let mut reader = BufReader::new(reader);
    let mut line = vec![];
    for _ in 0..header_rows {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .into_diagnostic()
            .wrap_err("Could not read the leading rows")?;
        if read == 0 {
            break;
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or_else(|| miette!("The work-list has no header row"))?
        .into_diagnostic()
        .wrap_err("Could not read the header row")?;
    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim_start_matches('\u{feff}').trim().to_owned(), idx))
        .collect();
    debug!("Work-list columns: {:?}", header.iter().collect::<Vec<_>>());

    for required in [COURSE_ID, LESSON_ID] {
        if !columns.contains_key(required) {
            warn!("Work-list has no '{required}' column");
        }
    }

    let mut items = vec![];
    for (line, record) in records.enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("Skipping unreadable work-list record {}: {err}", line + 1);
                continue;
            }
        };

        let get = |column: &str| {
            columns
                .get(column)
                .and_then(|&idx| record.get(idx))
                .map_or_else(String::new, |s| s.trim().to_owned())
        };

        items.push(WorkItem {
            course_id: get(COURSE_ID),
            lesson_id: get(LESSON_ID),
            lesson_name: get(LESSON_NAME),
            course_name_hint: get(COURSE_NAME),
            start_time: get(START_TIME),
        });
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const EXPORT: &str = indoc! {"
        学校课节导出
        导出时间,2024-07-20
        ,
        课节ID,课程ID,课节名称,课程名称,开课时间
        L1,C1,Intro,Math,2024-07-01
    "};

    #[test]
    fn reads_records_after_the_skipped_rows() {
        let items = read_work_items(EXPORT.as_bytes(), 3).unwrap();

        assert_eq!(
            items,
            vec![WorkItem {
                course_id: "C1".into(),
                lesson_id: "L1".into(),
                lesson_name: "Intro".into(),
                course_name_hint: "Math".into(),
                start_time: "2024-07-01".into(),
            }]
        );
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let with_bom = format!("\u{feff}{EXPORT}");
        let items = read_work_items(with_bom.as_bytes(), 3).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].lesson_id, "L1");
    }

    #[test]
    fn blank_leading_rows_are_counted() {
        let csv = "学校课节导出\n\n导出时间,2024\n课节ID,课程ID,课节名称,课程名称,开课时间\n\
                   L1,C1,Intro,Math,2024-07-01\nL2,C1,Loops,Math,2024-07-08\n";
        let items = read_work_items(csv.as_bytes(), 3).unwrap();

        let ids: Vec<_> = items
            .iter()
            .map(|item| (item.course_id.as_str(), item.lesson_id.as_str()))
            .collect();
        assert_eq!(ids, [("C1", "L1"), ("C1", "L2")]);
    }

    #[test]
    fn missing_columns_default_to_empty() {
        let csv = indoc! {"
            a
            b
            c
            课程ID,课节ID
            C1, L1
            C2
        "};
        let items = read_work_items(csv.as_bytes(), 3).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].lesson_id, "L1");
        assert_eq!(items[0].start_time, "");
        assert_eq!(items[1].course_id, "C2");
        assert_eq!(items[1].lesson_id, "");
        assert!(!items[1].is_actionable());
    }

    #[test]
    fn source_order_is_kept() {
        let csv = indoc! {"
            x
            x
            x
            课节ID,课程ID
            L3,C1
            L1,C1
            L2,C2
        "};
        let ids: Vec<_> = read_work_items(csv.as_bytes(), 3)
            .unwrap()
            .into_iter()
            .map(|item| item.lesson_id)
            .collect();
        assert_eq!(ids, ["L3", "L1", "L2"]);
    }

    #[test]
    fn no_header_row_is_an_error() {
        let csv = "a\nb\nc\n";
        assert!(read_work_items(csv.as_bytes(), 3).is_err());
    }

    #[test]
    fn unreadable_source_yields_an_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_work_items(&dir.path().join("missing.csv"), 3).is_empty());

        let path = dir.path().join("short.csv");
        std::fs::write(&path, "only one line\n").unwrap();
        assert!(load_work_items(&path, 3).is_empty());
    }
}
