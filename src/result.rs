use std::{fmt::Display, time::Duration};

use miette::miette;

/// Errors that stay contained at the level they occur.
/// Anything else travels as a [`miette::Report`].
#[derive(Debug)]
pub enum Error {
    /// The rendered page never showed the expected elements in time
    RenderTimeout(Duration),

    /// A table row is missing one of its positional fields
    RowParse(&'static str),

    /// The server answered with a non-success status code
    HttpStatus(u16),

    Miette(miette::Report),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RenderTimeout(timeout) => {
                write!(f, "Page elements did not appear within {timeout:?}")
            }
            Error::RowParse(field) => write!(f, "Row has no {field} field"),
            Error::HttpStatus(code) => write!(f, "Server answered with status {code}"),
            Error::Miette(report) => {
                let chain: Vec<String> = report.chain().map(ToString::to_string).collect();
                write!(f, "{}", chain.join(": "))
            }
        }
    }
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Miette(miette!("{err}"))
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::Miette(err) => err,
            err => miette!("{err}"),
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn err_msg<D: Display>(msg: D) -> Error {
    Error::Miette(miette!("{msg}"))
}

pub fn bail<T, D: Display>(msg: D) -> Result<T> {
    Err(err_msg(msg))
}
