//! Offline asset cache.
//!
//! A request/response cache kept apart from the conversion pipeline: it shares
//! no state with a run and is driven by its own caller. Assets listed in a
//! manifest are fetched once at install time and served from disk afterwards.
//!
//! ```text
//! install ──▶ fetch every manifest URL ──▶ all ok? ──▶ store all (undone on failure)
//! lookup  ──▶ cache hit? ──yes──▶ cached response
//!                        └─no──▶ network (optionally stored)
//! ```
//!
//! The cache name carries a version suffix. Renaming it is the only
//! invalidation mechanism; caches under older names stay on disk.

pub mod store;
pub mod worker;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use store::{CacheStorage, DiskCache};
pub use worker::{HttpFetcher, OfflineCacheWorker};

/// Versioned name of the asset cache.
pub const DEFAULT_CACHE_NAME: &str = "pdf2png-cache-v1";

/// Static assets of the web front end: entry point, page, script, web app
/// manifest and the PDF library it loads. Relative entries need a base URL.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/app.js",
    "/manifest.json",
    "https://cdnjs.cloudflare.com/ajax/libs/pdf.js/3.9.179/pdf.min.js",
];

/// [`DEFAULT_MANIFEST`] as owned URLs.
pub fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|url| url.to_string()).collect()
}

/// Errors raised by the cache worker and its storage.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("Fetching '{url}' returned HTTP {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Corrupt cache entry at {path}: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    #[error("Cache task failed: {0}")]
    Task(String),
}

/// A response as stored in, and served from, the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// URL the response was fetched from.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Narrow storage contract of the cache proxy.
pub trait CacheProxy: Send + Sync {
    /// The stored response for `url`, if any.
    fn lookup(&self, url: &str) -> Result<Option<CachedResponse>, CacheError>;

    /// Store `response` under `url`, replacing any previous entry.
    fn store(&self, url: &str, response: &CachedResponse) -> Result<(), CacheError>;

    /// Drop the entry for `url`. Removing a missing entry is not an error.
    fn remove(&self, url: &str) -> Result<(), CacheError>;
}

/// Network side of the cache proxy.
pub trait AssetFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<CachedResponse, CacheError>>;
}
