//! Stock-photo search (Unsplash, then Pexels) and plain HTTP downloads.

use crate::collaborators::Downloader;
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use std::time::Duration;

pub const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";
pub const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";

const SEARCH_TIMEOUT_SECS: u64 = 15;
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;
const ORIENTATION: &str = "portrait";

/// A search result not yet downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct StockHit {
    pub url: String,
    pub source: &'static str,
    pub photographer: String,
    pub description: String,
}

pub trait ImageSearch: Send + Sync {
    /// Up to `count` hits. Provider failures are logged and yield fewer hits.
    fn search<'a>(&'a self, query: &'a str, count: usize) -> BoxFuture<'a, Vec<StockHit>>;
}

// ── provider payloads ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UnsplashResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
    #[serde(default)]
    alt_description: Option<String>,
    user: UnsplashUser,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    regular: String,
}

#[derive(Deserialize)]
struct UnsplashUser {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
    #[serde(default)]
    alt: Option<String>,
    #[serde(default)]
    photographer: String,
}

#[derive(Deserialize)]
struct PexelsSrc {
    large: String,
}

fn unsplash_hits(body: &str) -> anyhow::Result<Vec<StockHit>> {
    let parsed: UnsplashResponse = serde_json::from_str(body)?;
    Ok(parsed
        .results
        .into_iter()
        .map(|photo| StockHit {
            url: photo.urls.regular,
            source: "unsplash",
            photographer: photo.user.name,
            description: photo.alt_description.unwrap_or_default(),
        })
        .collect())
}

fn pexels_hits(body: &str) -> anyhow::Result<Vec<StockHit>> {
    let parsed: PexelsResponse = serde_json::from_str(body)?;
    Ok(parsed
        .photos
        .into_iter()
        .map(|photo| StockHit {
            url: photo.src.large,
            source: "pexels",
            photographer: photo.photographer,
            description: photo.alt.unwrap_or_default(),
        })
        .collect())
}

// ── search ──────────────────────────────────────────────────────────────────

pub struct StockPhotoSearch {
    http: reqwest::Client,
    unsplash_key: Option<String>,
    pexels_key: Option<String>,
}

impl StockPhotoSearch {
    pub fn new(unsplash_key: Option<String>, pexels_key: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            http,
            unsplash_key: unsplash_key.filter(|k| !k.trim().is_empty()),
            pexels_key: pexels_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.unsplash_key.is_some() || self.pexels_key.is_some()
    }

    async fn get(&self, url: &str, auth: String, query: &str, count: usize) -> anyhow::Result<String> {
        let response = self
            .http
            .get(url)
            .query(&[
                ("query", query),
                ("per_page", &count.to_string()),
                ("orientation", ORIENTATION),
            ])
            .header("Authorization", auth)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn search_all(&self, query: &str, count: usize) -> Vec<StockHit> {
        let mut hits = Vec::new();

        if let Some(key) = &self.unsplash_key {
            let result = self
                .get(UNSPLASH_SEARCH_URL, format!("Client-ID {}", key), query, count)
                .await
                .and_then(|body| unsplash_hits(&body));
            match result {
                Ok(found) => hits.extend(found),
                Err(err) => tracing::warn!(provider = "unsplash", error = %err, "stock search failed"),
            }
        }

        if let Some(key) = &self.pexels_key {
            if hits.len() < count {
                let needed = count - hits.len();
                let result = self
                    .get(PEXELS_SEARCH_URL, key.clone(), query, needed)
                    .await
                    .and_then(|body| pexels_hits(&body));
                match result {
                    Ok(found) => hits.extend(found),
                    Err(err) => tracing::warn!(provider = "pexels", error = %err, "stock search failed"),
                }
            }
        }

        hits.truncate(count);
        hits
    }
}

impl ImageSearch for StockPhotoSearch {
    fn search<'a>(&'a self, query: &'a str, count: usize) -> BoxFuture<'a, Vec<StockHit>> {
        self.search_all(query, count).boxed()
    }
}

// ── downloads ───────────────────────────────────────────────────────────────

pub struct HttpDownloader {
    http: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { http })
    }
}

impl Downloader for HttpDownloader {
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
        async move {
            let response = self.http.get(url).send().await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        }
        .boxed()
    }
}
