//! Content-addressed on-disk cache for reference photos.
//!
//! Each URL maps to `ref_<12 hex of sha256(url)>.jpg` in the cache directory.
//! Entries are never evicted. Concurrent fetches of the same URL share one
//! download through a per-key lock.

use crate::collaborators::Downloader;
use crate::util::{short_hash, write_atomic};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const CACHE_KEY_CHARS: usize = 12;

pub struct ReferenceCache {
    dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReferenceCache {
    pub fn new(dir: impl Into<PathBuf>, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            dir: dir.into(),
            downloader,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Cache path for `url`, whether or not it has been fetched yet.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("ref_{}.jpg", short_hash(url, CACHE_KEY_CHARS)))
    }

    /// Local path of the image at `url`, downloading it on first use.
    pub async fn fetch(&self, url: &str) -> anyhow::Result<PathBuf> {
        let parsed = url::Url::parse(url)
            .map_err(|e| anyhow::anyhow!("invalid reference URL '{}': {}", url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("unsupported URL scheme '{}' for {}", parsed.scheme(), url);
        }

        let path = self.path_for(url);
        let key = short_hash(url, CACHE_KEY_CHARS);
        let entry = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = entry.lock().await;
            self.fetch_locked(url, &path).await
        };

        let mut in_flight = self.in_flight.lock().await;
        // Map plus our clone: nobody else is waiting on this key.
        if Arc::strong_count(&entry) == 2 {
            in_flight.remove(&key);
        }
        drop(in_flight);

        result.map(|()| path)
    }

    async fn fetch_locked(&self, url: &str, path: &Path) -> anyhow::Result<()> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(url, path = %path.display(), "reference cache hit");
            return Ok(());
        }

        let bytes = self.downloader.download(url).await?;
        if bytes.is_empty() {
            anyhow::bail!("empty download from {}", url);
        }
        write_atomic(path, &bytes)?;
        tracing::debug!(url, path = %path.display(), bytes = bytes.len(), "cached reference");
        Ok(())
    }
}
