mod sqlite;

use std::path::{Path, PathBuf};

use miette::Result;

pub use sqlite::Sqlite;

/// Identity of one recording across runs.
///
/// `occurrence` tells apart the entries of the same lesson that share
/// their date and recording method (segments of one recording session),
/// in the order the management view lists them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub course_id: String,
    pub lesson_id: String,
    pub record_date: String,
    pub record_method: String,
    pub occurrence: u32,
}

/// A trait for remembering which recordings have already been downloaded.
///
/// This lets a repeated run skip what it already has instead of
/// downloading it again under a new name.
pub trait Ledger: Sync {
    /// Open the ledger at the given path or create it if it does not exist.
    ///
    /// If the file does exist but is not a valid ledger,
    /// an error **should** be returned.
    fn read_or_create(p: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Return where the recording was saved, if it has been downloaded before
    fn lookup(&self, key: &EntryKey) -> Result<Option<PathBuf>>;

    /// Remember that the recording has been downloaded to `path`.
    ///
    /// Recording an already known entry overwrites its path.
    fn record(&self, key: &EntryKey, path: &Path) -> Result<()>;

    /// Count the number of recordings in the ledger
    fn count(&self) -> Result<usize>;
}
