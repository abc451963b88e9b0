use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use indoc::indoc;
use miette::{Context, IntoDiagnostic, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::utils::MutexUtils;

use super::{EntryKey, Ledger};

#[derive(Debug)]
pub struct Sqlite {
    conn: Mutex<Connection>,
}

impl Ledger for Sqlite {
    fn read_or_create(p: &Path) -> Result<Self> {
        let conn = Connection::open(p)
            .into_diagnostic()
            .wrap_err("Could not open sqlite file")?;

        Self::with_connection(conn)
    }

    fn lookup(&self, key: &EntryKey) -> Result<Option<PathBuf>> {
        self.conn.with_lock(|conn| {
            let path: Option<String> = conn
                .query_row(
                    indoc! {"
                        SELECT path FROM downloads
                        WHERE course_id = ? AND lesson_id = ?
                            AND record_date = ? AND record_method = ?
                            AND occurrence = ?"},
                    params![
                        key.course_id,
                        key.lesson_id,
                        key.record_date,
                        key.record_method,
                        key.occurrence
                    ],
                    |row| row.get(0),
                )
                .optional()
                .into_diagnostic()
                .wrap_err("Could not query download row")?;

            Ok(path.map(PathBuf::from))
        })
    }

    fn record(&self, key: &EntryKey, path: &Path) -> Result<()> {
        debug!("Recording {key:?} as downloaded");
        self.conn.with_lock(|conn| {
            conn.execute(
                indoc! {"
                    INSERT INTO downloads
                        (course_id, lesson_id, record_date, record_method, occurrence, path)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT (course_id, lesson_id, record_date, record_method, occurrence)
                    DO UPDATE SET path = excluded.path"},
                params![
                    key.course_id,
                    key.lesson_id,
                    key.record_date,
                    key.record_method,
                    key.occurrence,
                    path.to_string_lossy()
                ],
            )
            .into_diagnostic()
            .wrap_err("Could not insert download row")?;
            Ok(())
        })
    }

    fn count(&self) -> Result<usize> {
        self.conn.with_lock(|conn| {
            conn.query_row("SELECT COUNT(*) FROM downloads", [], |row| row.get(0))
                .into_diagnostic()
        })
    }
}

impl Sqlite {
    fn with_connection(conn: Connection) -> Result<Self> {
        let ledger = Self {
            conn: Mutex::new(conn),
        };

        ledger
            .create_tables()
            .wrap_err("Could not create tables")?;

        Ok(ledger)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().into_diagnostic()?)
    }

    /// Create the tables if they do not already exist
    fn create_tables(&self) -> Result<()> {
        self.conn.with_lock(|conn| {
            conn.execute_batch(indoc! {"
                BEGIN;
                CREATE TABLE IF NOT EXISTS downloads (
                    course_id       TEXT NOT NULL,
                    lesson_id       TEXT NOT NULL,
                    record_date     TEXT NOT NULL,
                    record_method   TEXT NOT NULL,
                    occurrence      INTEGER NOT NULL,
                    path            TEXT NOT NULL,

                    PRIMARY KEY (course_id, lesson_id, record_date, record_method, occurrence)
                );
                COMMIT;"})
                .into_diagnostic()
        })
    }
}
