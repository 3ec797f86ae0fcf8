//! Photo analysis plus reference gathering.

use crate::analysis::Analyzed;
use crate::collaborators::{Reference, Scout, ScoutReport};
use crate::gemini::PhotoAnalyst;
use crate::references::ReferenceCache;
use crate::stock::ImageSearch;
use futures::future::{BoxFuture, FutureExt};
use std::path::Path;
use std::sync::Arc;

/// Extra search hits requested so a few failed downloads don't leave us short.
const SEARCH_SLACK: usize = 2;

pub trait PhotoAnalyzer: Send + Sync {
    fn analyze<'a>(&'a self, photo: &'a Path) -> BoxFuture<'a, Analyzed>;
}

impl PhotoAnalyzer for PhotoAnalyst {
    fn analyze<'a>(&'a self, photo: &'a Path) -> BoxFuture<'a, Analyzed> {
        PhotoAnalyst::analyze(self, photo).boxed()
    }
}

pub struct PhotoScout {
    analyzer: Arc<dyn PhotoAnalyzer>,
    search: Arc<dyn ImageSearch>,
    cache: Arc<ReferenceCache>,
    count: usize,
}

impl PhotoScout {
    pub fn new(
        analyzer: Arc<dyn PhotoAnalyzer>,
        search: Arc<dyn ImageSearch>,
        cache: Arc<ReferenceCache>,
        count: usize,
    ) -> Self {
        Self {
            analyzer,
            search,
            cache,
            count,
        }
    }

    async fn run(&self, photo: &Path, vibe: Option<&str>) -> ScoutReport {
        let analysis = self.analyzer.analyze(photo).await;
        let query = match &analysis {
            Analyzed::Parsed(parsed) => parsed.reference_query(vibe),
            Analyzed::Defaulted { .. } => {
                crate::analysis::PhotoAnalysis::default().reference_query(vibe)
            }
        };
        tracing::info!(query = %query, "searching for reference photos");

        let mut references = Vec::new();
        if self.count == 0 {
            return ScoutReport {
                references,
                analysis,
            };
        }

        let hits = self.search.search(&query, self.count + SEARCH_SLACK).await;
        if hits.is_empty() {
            tracing::warn!(query = %query, "no reference photos found");
        }

        for hit in hits {
            if references.len() >= self.count {
                break;
            }
            match self.cache.fetch(&hit.url).await {
                Ok(path) => {
                    tracing::debug!(
                        source = hit.source,
                        photographer = %hit.photographer,
                        "reference {}",
                        references.len() + 1
                    );
                    references.push(Reference {
                        path,
                        source: hit.source.to_string(),
                        photographer: hit.photographer,
                        query: query.clone(),
                    });
                }
                Err(err) => {
                    tracing::warn!(url = %crate::util::truncate(&hit.url, 60), error = %err, "reference download failed")
                }
            }
        }

        ScoutReport {
            references,
            analysis,
        }
    }
}

impl Scout for PhotoScout {
    fn scout<'a>(&'a self, photo: &'a Path, vibe: Option<&'a str>) -> BoxFuture<'a, ScoutReport> {
        self.run(photo, vibe).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PhotoAnalysis;
    use crate::collaborators::Downloader;
    use crate::stock::StockHit;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedAnalyzer(Analyzed);

    impl PhotoAnalyzer for FixedAnalyzer {
        fn analyze<'a>(&'a self, _photo: &'a Path) -> BoxFuture<'a, Analyzed> {
            let analyzed = self.0.clone();
            async move { analyzed }.boxed()
        }
    }

    #[derive(Default)]
    struct FakeSearch {
        hits: Vec<StockHit>,
        requests: Mutex<Vec<(String, usize)>>,
    }

    impl ImageSearch for FakeSearch {
        fn search<'a>(&'a self, query: &'a str, count: usize) -> BoxFuture<'a, Vec<StockHit>> {
            self.requests.lock().unwrap().push((query.to_string(), count));
            let hits = self.hits.iter().take(count).cloned().collect();
            async move { hits }.boxed()
        }
    }

    /// Fails for URLs containing "broken".
    struct PickyDownloader(AtomicUsize);

    impl Downloader for PickyDownloader {
        fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            let ok = !url.contains("broken");
            async move {
                if ok {
                    Ok(b"jpeg".to_vec())
                } else {
                    anyhow::bail!("404")
                }
            }
            .boxed()
        }
    }

    fn hit(url: &str) -> StockHit {
        StockHit {
            url: url.to_string(),
            source: "unsplash",
            photographer: "Ana".into(),
            description: String::new(),
        }
    }

    fn scout(dir: &TempDir, analysis: Analyzed, hits: Vec<StockHit>, count: usize) -> (PhotoScout, Arc<FakeSearch>) {
        let search = Arc::new(FakeSearch {
            hits,
            ..FakeSearch::default()
        });
        let cache = Arc::new(ReferenceCache::new(
            dir.path(),
            Arc::new(PickyDownloader(AtomicUsize::new(0))),
        ));
        let scout = PhotoScout::new(Arc::new(FixedAnalyzer(analysis)), search.clone(), cache, count);
        (scout, search)
    }

    #[tokio::test]
    async fn skips_failed_downloads_and_stops_at_count() {
        let dir = TempDir::new().unwrap();
        let hits = vec![
            hit("https://x.test/1.jpg"),
            hit("https://x.test/broken.jpg"),
            hit("https://x.test/2.jpg"),
            hit("https://x.test/3.jpg"),
            hit("https://x.test/4.jpg"),
        ];
        let (scout, search) = scout(&dir, Analyzed::Parsed(PhotoAnalysis::default()), hits, 3);
        let report = scout.scout(Path::new("me.jpg"), None).await;

        assert_eq!(report.references.len(), 3);
        assert_eq!(search.requests.lock().unwrap()[0].1, 5);
        assert!(report.references.iter().all(|r| r.path.exists()));
        assert_eq!(report.references[0].query, "professional portrait photography");
    }

    #[tokio::test]
    async fn vibe_drives_the_query() {
        let dir = TempDir::new().unwrap();
        let analysis = PhotoAnalysis {
            gender: "female".into(),
            ..PhotoAnalysis::default()
        };
        let (scout, search) = scout(&dir, Analyzed::Parsed(analysis), Vec::new(), 3);
        let report = scout.scout(Path::new("me.jpg"), Some("coffee_shop")).await;

        assert!(report.references.is_empty());
        assert_eq!(
            search.requests.lock().unwrap()[0].0,
            "professional portrait coffee shop female photography"
        );
    }

    #[tokio::test]
    async fn defaulted_analysis_still_searches() {
        let dir = TempDir::new().unwrap();
        let (scout, search) = scout(
            &dir,
            Analyzed::Defaulted {
                reason: "bad json".into(),
            },
            vec![hit("https://x.test/1.jpg")],
            3,
        );
        let report = scout.scout(Path::new("me.jpg"), None).await;

        assert!(matches!(report.analysis, Analyzed::Defaulted { .. }));
        assert_eq!(report.references.len(), 1);
        assert_eq!(search.requests.lock().unwrap()[0].0, "professional portrait photography");
    }
}
