use std::{
    fmt::Debug,
    io::{Read, Write},
    path::Path,
    time::Duration,
};

use miette::{Context, IntoDiagnostic};
use reqwest::{blocking::Client, header::COOKIE};
use tracing::{debug, error};

use crate::result::{err_msg, Error, Result};

use super::Cookies;

pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interface for retrieving a recording to local storage
pub trait Downloader: Sync + Debug {
    /// Download the resource at `url` into `dest` using the session cookies.
    /// Return the number of bytes written.
    ///
    /// `dest` must never be left holding a partial file: either the whole
    /// body is written to it or it is not touched at all.
    fn fetch(&self, url: &str, cookies: &Cookies, dest: &Path) -> Result<u64>;

    /// Same as [`Downloader::fetch`] but only report whether it succeeded.
    /// Errors are logged and never propagated.
    fn download(&self, url: &str, cookies: &Cookies, dest: &Path) -> bool {
        match self.fetch(url, cookies, dest) {
            Ok(_) => true,
            Err(err) => {
                error!("Could not download {url}: {err}");
                false
            }
        }
    }
}

/// Stream downloads over HTTP, chunk by chunk
#[derive(Debug)]
pub struct HttpDownloader {
    client: Client,
    chunk_size: usize,
}

impl HttpDownloader {
    pub fn new(chunk_size: usize) -> Result<Self> {
        Self::with_connect_timeout(chunk_size, CONNECT_TIMEOUT)
    }

    /// Only connecting is bounded: recordings can take a long time to transfer
    pub fn with_connect_timeout(chunk_size: usize, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(None)
            .connect_timeout(connect_timeout)
            .build()
            .into_diagnostic()
            .wrap_err("Could not build HTTP client")?;

        Ok(Self {
            client,
            chunk_size: chunk_size.max(1),
        })
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str, cookies: &Cookies, dest: &Path) -> Result<u64> {
        let mut request = self.client.get(url);
        if let Some(cookie) = cookies.header_value() {
            request = request.header(COOKIE, cookie);
        }

        let mut response = request
            .send()
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not request {url}"))?;

        // Nothing may be written before the status is known to be good
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        // Stream into a sibling temporary file, then move it in place
        let dir = dest
            .parent()
            .ok_or_else(|| err_msg(format!("{} has no parent directory", dest.display())))?;
        let mut part = tempfile::Builder::new()
            .prefix(".part-")
            .tempfile_in(dir)
            .into_diagnostic()
            .wrap_err("Could not create temporary download file")?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut written = 0u64;
        loop {
            let n = response
                .read(&mut buf)
                .into_diagnostic()
                .wrap_err("Could not read response body")?;
            if n == 0 {
                break;
            }

            part.write_all(&buf[..n])
                .into_diagnostic()
                .wrap_err("Could not write to temporary download file")?;
            written += n as u64;
        }
        part.flush()?;

        part.persist(dest)
            .map_err(|err| err.error)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not move download to {}", dest.display()))?;

        debug!("{written} bytes written to {}", dest.display());
        Ok(written)
    }
}
