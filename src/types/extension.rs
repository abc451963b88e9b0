use clap::ValueEnum;
use serde::Deserialize;

/// Container format of the downloaded recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    Mp4,
    Mkv,
    Flv,
}

impl Extension {
    /// Return the extension with the leading dot.
    /// e.g. ".ext"
    pub fn with_dot(self) -> &'static str {
        match self {
            Extension::Mp4 => ".mp4",
            Extension::Mkv => ".mkv",
            Extension::Flv => ".flv",
        }
    }
}

impl Default for Extension {
    fn default() -> Self {
        Self::Mp4
    }
}
