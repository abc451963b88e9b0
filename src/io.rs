use std::{
    collections::HashSet,
    fs::OpenOptions,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

use crate::{
    result::{bail, Result},
    types::Extension,
};

/// Characters that cannot appear in a file name on at least one of the supported OS
const ILLEGAL_CHARS: &str = r#"[\\/*?:"<>|\x00-\x1f\x7f]"#;

fn illegal_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ILLEGAL_CHARS).expect("hardcoded regex is valid"))
}

/// Device names Windows reserves, whatever the extension
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Replace every character illegal in file names by `_` and trim the result.
///
/// Trailing dots are dropped and reserved device names get a `_` suffix,
/// so the name is also valid on Windows.
pub fn sanitize(name: &str) -> String {
    let replaced = illegal_chars().replace_all(name, "_");
    let trimmed = replaced
        .trim()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace());

    let stem_len = trimmed.find('.').unwrap_or(trimmed.len());
    let (stem, rest) = trimmed.split_at(stem_len);
    if RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        format!("{stem}_{rest}")
    } else {
        trimmed.to_owned()
    }
}

/// Name of the folder holding the recordings of one lesson day
pub fn folder_name(record_date: &str, course_name: &str) -> String {
    format!("{record_date}_{course_name}")
}

/// File name of a recording, without collision suffix nor extension
pub fn base_name(record_date: &str, course_name: &str, record_method: &str) -> String {
    format!("{record_date}_{course_name}_{record_method}")
}

/// Candidate path number `n`: `<base><ext>` for 0, `<base>_<n><ext>` after that
fn candidate(out_dir: &Path, base: &str, extension: Extension, n: u32) -> PathBuf {
    let dot_ext = extension.with_dot();
    if n == 0 {
        out_dir.join(format!("{base}{dot_ext}"))
    } else {
        out_dir.join(format!("{base}_{n}{dot_ext}"))
    }
}

/// Find the first path that does not exist yet in the directory
/// and is not one of the `planned` paths.
///
/// This only checks for existence: two concurrent callers may get the same
/// path. Use [`claim`] when the path will be written concurrently.
pub fn allocate(
    out_dir: &Path,
    base: &str,
    extension: Extension,
    planned: &HashSet<PathBuf>,
) -> Result<PathBuf> {
    for n in 0u32.. {
        let output = candidate(out_dir, base, extension, n);
        if !output.exists() && !planned.contains(&output) {
            return Ok(output);
        }
    }

    bail("Code is broken or you have really REALLY too much files with the same name")
}

/// Atomically reserve an unused path by creating an empty placeholder file on it.
///
/// The placeholder is created with an exclusive-create open, so concurrent
/// callers can never be handed the same path.
/// The caller owns the placeholder: it must either overwrite or remove it.
pub fn claim(out_dir: &Path, base: &str, extension: Extension) -> Result<PathBuf> {
    for n in 0u32.. {
        let output = candidate(out_dir, base, extension, n);
        match OpenOptions::new().write(true).create_new(true).open(&output) {
            Ok(_) => return Ok(output),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }

    bail("Code is broken or you have really REALLY too much files with the same name")
}
