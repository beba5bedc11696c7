//! The cache worker: install a manifest, then answer fetches cache-first.

use super::{AssetFetcher, CacheError, CacheProxy, CachedResponse};
use futures::future::{try_join_all, BoxFuture};
pub use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for a single asset fetch.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Installs a fixed asset list into a cache and serves requests from it.
pub struct OfflineCacheWorker {
    cache_name: String,
    manifest: Vec<String>,
    cache: Arc<dyn CacheProxy>,
    fetcher: Arc<dyn AssetFetcher>,
    populate_on_miss: bool,
}

impl OfflineCacheWorker {
    pub fn new(
        cache_name: impl Into<String>,
        manifest: Vec<String>,
        cache: Arc<dyn CacheProxy>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            manifest,
            cache,
            fetcher,
            populate_on_miss: false,
        }
    }

    /// Also store successful network responses for URLs missing from the
    /// cache. Off by default: only the manifest is ever cached.
    pub fn populate_on_miss(mut self, enabled: bool) -> Self {
        self.populate_on_miss = enabled;
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    /// Fetch every manifest asset and store them.
    ///
    /// All or nothing: if any fetch fails or answers with a non-2xx status,
    /// nothing is stored and the first error is returned. A failed store
    /// puts back every entry written before it.
    pub async fn install(&self) -> Result<usize, CacheError> {
        info!(
            "Installing {} assets into '{}'",
            self.manifest.len(),
            self.cache_name
        );

        let fetches = self.manifest.iter().map(|url| async move {
            let response = self.fetcher.fetch(url).await?;
            if !response.is_success() {
                return Err(CacheError::BadStatus {
                    url: url.clone(),
                    status: response.status,
                });
            }
            Ok((url.clone(), response))
        });
        let entries = try_join_all(fetches).await?;
        let count = entries.len();

        let cache = Arc::clone(&self.cache);
        blocking(move || store_all(cache.as_ref(), &entries)).await?;

        info!("Cache '{}' installed", self.cache_name);
        Ok(count)
    }

    /// Answer a request: cached response if present, network otherwise.
    pub async fn handle_fetch(&self, url: &str) -> Result<CachedResponse, CacheError> {
        let cache = Arc::clone(&self.cache);
        let key = url.to_string();
        match blocking(move || cache.lookup(&key)).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            // An unreadable entry behaves like a miss.
            Err(e) => warn!("Ignoring cache entry for {}: {}", url, e),
        }

        debug!("Cache miss: {}", url);
        let response = self.fetcher.fetch(url).await?;
        if self.populate_on_miss && response.is_success() {
            let cache = Arc::clone(&self.cache);
            let key = url.to_string();
            let stored = response.clone();
            blocking(move || cache.store(&key, &stored)).await?;
        }
        Ok(response)
    }
}

/// Run cache I/O on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, CacheError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CacheError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
}

/// Store every entry or none of them.
fn store_all(cache: &dyn CacheProxy, entries: &[(String, CachedResponse)]) -> Result<(), CacheError> {
    let mut touched: Vec<(&str, Option<CachedResponse>)> = Vec::with_capacity(entries.len());
    for (url, response) in entries {
        touched.push((url.as_str(), cache.lookup(url).ok().flatten()));
        if let Err(e) = cache.store(url, response) {
            warn!("Storing {} failed, undoing {} entries: {}", url, touched.len(), e);
            for (url, previous) in touched.into_iter().rev() {
                let undo = match previous {
                    Some(ref old) => cache.store(url, old),
                    None => cache.remove(url),
                };
                if let Err(undo_err) = undo {
                    warn!("Could not undo {}: {}", url, undo_err);
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

/// [`AssetFetcher`] over HTTP.
///
/// Relative manifest entries such as `/index.html` are resolved against the
/// base URL; absolute URLs are fetched as-is.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Option<Url>,
}

impl HttpFetcher {
    pub fn new(base: Option<Url>, timeout: Duration) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Fetch {
                url: base.as_ref().map_or_else(String::new, Url::to_string),
                reason: e.to_string(),
            })?;
        Ok(Self { client, base })
    }

    /// Resolve a manifest entry to an absolute URL.
    pub fn resolve(&self, url: &str) -> Result<Url, CacheError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(_) => {
                let base = self.base.as_ref().ok_or_else(|| CacheError::Fetch {
                    url: url.to_string(),
                    reason: "relative URL without a base URL".into(),
                })?;
                base.join(url).map_err(|e| CacheError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<CachedResponse, CacheError>> {
        Box::pin(async move {
            let target = self.resolve(url)?;
            let fetch_err = |e: reqwest::Error| CacheError::Fetch {
                url: target.to_string(),
                reason: e.to_string(),
            };

            let response = self
                .client
                .get(target.clone())
                .send()
                .await
                .map_err(fetch_err)?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes().await.map_err(fetch_err)?.to_vec();

            debug!("GET {} → {} ({} bytes)", target, status, body.len());
            Ok(CachedResponse {
                url: url.to_string(),
                status,
                content_type,
                body,
            })
        })
    }
}
