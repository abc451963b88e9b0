mod cookies;
mod http;
mod pages;

pub use cookies::Cookies;
pub use http::{Downloader, HttpDownloader, DEFAULT_CHUNK_SIZE};
#[cfg(test)]
pub use pages::StaticPages;
pub use pages::{HttpPages, PageProvider, RenderedPage, SnapshotPages};
