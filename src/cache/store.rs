//! On-disk cache storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<cache name>/<key>.json   response metadata
//! <root>/<cache name>/<key>.body   response body
//! ```
//!
//! `<key>` is the URL-safe base64 of the request URL. Both files are written
//! through a temp file and a rename; the body lands before the metadata, so
//! a metadata file always has its body next to it.

use super::{CacheError, CacheProxy, CachedResponse};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root directory holding every named cache.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform cache directory:
    ///
    /// - **macOS**: `~/Library/Caches/pdf2png/`
    /// - **Linux**: `~/.cache/pdf2png/`
    /// - **Windows**: `%LOCALAPPDATA%\pdf2png\`
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
            .unwrap_or_else(std::env::temp_dir)
            .join("pdf2png")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (creating if needed) the cache called `name`.
    pub fn open(&self, name: &str) -> Result<DiskCache, CacheError> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(DiskCache { dir })
    }

    /// Whether a cache called `name` exists.
    pub fn has(&self, name: &str) -> bool {
        self.root.join(name).is_dir()
    }

    /// Names of all caches, sorted.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::Io {
                path: self.root.clone(),
                source,
            })?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl Default for CacheStorage {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

/// One named cache directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key(url: &str) -> String {
        URL_SAFE_NO_PAD.encode(url.as_bytes())
    }

    fn meta_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(url)))
    }

    fn body_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.body", Self::key(url)))
    }

    /// URLs of every stored response, sorted.
    pub fn urls(&self) -> Result<Vec<String>, CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut urls = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if let Some(url) = URL_SAFE_NO_PAD
                .decode(stem)
                .ok()
                .and_then(|b| String::from_utf8(b).ok())
            {
                urls.push(url);
            }
        }
        urls.sort();
        Ok(urls)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl CacheProxy for DiskCache {
    fn lookup(&self, url: &str) -> Result<Option<CachedResponse>, CacheError> {
        let meta_path = self.meta_path(url);
        let meta = match std::fs::read(&meta_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: meta_path,
                    source,
                })
            }
        };

        let mut response: CachedResponse =
            serde_json::from_slice(&meta).map_err(|e| CacheError::Corrupt {
                path: meta_path.clone(),
                detail: e.to_string(),
            })?;

        let body_path = self.body_path(url);
        response.body = std::fs::read(&body_path).map_err(|e| CacheError::Corrupt {
            path: body_path,
            detail: format!("missing body: {e}"),
        })?;

        debug!("Cache hit: {}", url);
        Ok(Some(response))
    }

    fn store(&self, url: &str, response: &CachedResponse) -> Result<(), CacheError> {
        let meta = serde_json::to_vec_pretty(response).map_err(|e| CacheError::Corrupt {
            path: self.meta_path(url),
            detail: e.to_string(),
        })?;

        self.write_atomic(&self.body_path(url), &response.body)?;
        self.write_atomic(&self.meta_path(url), &meta)?;

        debug!("Cached {} ({} bytes)", url, response.body.len());
        Ok(())
    }

    fn remove(&self, url: &str) -> Result<(), CacheError> {
        // Metadata first, so a half-removed entry reads as a miss.
        for path in [self.meta_path(url), self.body_path(url)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }
        debug!("Evicted {}", url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".into()),
            body: body.to_vec(),
        }
    }

    #[test]
    fn store_then_lookup() {
        let root = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(root.path()).open("c-v1").unwrap();

        cache.store("/index.html", &response("/index.html", b"<html>")).unwrap();
        let hit = cache.lookup("/index.html").unwrap().unwrap();
        assert_eq!(hit.body, b"<html>");
        assert_eq!(hit.content_type.as_deref(), Some("text/html"));

        assert!(cache.lookup("/missing").unwrap().is_none());
    }

    #[test]
    fn store_replaces_previous_entry() {
        let root = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(root.path()).open("c-v1").unwrap();
        cache.store("/app.js", &response("/app.js", b"old")).unwrap();
        cache.store("/app.js", &response("/app.js", b"new")).unwrap();
        assert_eq!(cache.lookup("/app.js").unwrap().unwrap().body, b"new");
        assert_eq!(cache.urls().unwrap(), ["/app.js"]);
    }

    #[test]
    fn remove_drops_entry() {
        let root = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(root.path()).open("c-v1").unwrap();
        cache.store("/a", &response("/a", b"a")).unwrap();

        cache.remove("/a").unwrap();
        assert!(cache.lookup("/a").unwrap().is_none());
        assert!(cache.urls().unwrap().is_empty());
        cache.remove("/never-stored").unwrap();
    }

    #[test]
    fn missing_body_is_corrupt() {
        let root = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(root.path()).open("c-v1").unwrap();
        cache.store("/x", &response("/x", b"x")).unwrap();
        std::fs::remove_file(cache.body_path("/x")).unwrap();
        assert!(matches!(cache.lookup("/x"), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn storage_lists_named_caches() {
        let root = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(root.path().join("caches"));
        assert!(storage.keys().unwrap().is_empty());

        storage.open("pdf2png-cache-v2").unwrap();
        storage.open("pdf2png-cache-v1").unwrap();
        assert!(storage.has("pdf2png-cache-v1"));
        assert!(!storage.has("pdf2png-cache-v3"));
        assert_eq!(
            storage.keys().unwrap(),
            ["pdf2png-cache-v1", "pdf2png-cache-v2"]
        );
    }
}
