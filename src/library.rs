//! Prompt library: the pipeline's learning store.
//!
//! Prompts whose images passed the quality gate are kept in a single JSON
//! document so later jobs can start from proven wording:
//!
//! ```json
//! {"prompts": [], "patterns": {}}
//! ```
//!
//! `prompts` is kept sorted by score (highest first) and capped at
//! [`LIBRARY_CAPACITY`]. `patterns` maps an issue or pose key to a prompt
//! fragment; it is curated by hand and never written here.
//!
//! # Concurrency
//!
//! Every write is a full load-modify-save of the document. [`LearningStore`]
//! serializes that cycle with an in-process mutex plus an exclusive advisory
//! lock on `<library>.lock`, so concurrent jobs (or processes) never lose
//! each other's records.

use crate::util::{short_hash, write_atomic};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Records retained after every write.
pub const LIBRARY_CAPACITY: usize = 100;

const PROMPT_HASH_CHARS: usize = 8;
const LOCK_TIMEOUT_SECS: u64 = 5;
const LOCK_RETRY_MS: u64 = 50;

const DEFAULT_PATTERNS: [&str; 4] = [
    "Shot on iPhone 15 Pro Max, f/1.78, natural depth-of-field bokeh",
    "Natural skin texture with visible pores, slight asymmetry in expression",
    "Warm color grading, not perfectly neutral, slightly shifted toward golden tones",
    "Include subtle environmental reflections in eyes",
];

/// A prompt that produced a passing image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub prompt: String,
    pub score: f64,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub photo_description: String,
    /// Short content hash for display and dedup hints; not unique
    #[serde(default)]
    pub prompt_hash: String,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryDocument {
    #[serde(default)]
    pub prompts: Vec<PromptRecord>,
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,
}

impl LibraryDocument {
    /// Append, re-rank, and drop whatever falls below the capacity line.
    /// The sort is stable, so equal scores keep insertion order.
    fn insert_ranked(&mut self, record: PromptRecord, capacity: usize) {
        self.prompts.push(record);
        self.prompts.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.prompts.truncate(capacity);
    }
}

struct LibraryLock {
    file: std::fs::File,
}

impl Drop for LibraryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Handle to the on-disk prompt library. Share it as `Arc<LearningStore>`.
pub struct LearningStore {
    path: PathBuf,
    quality_threshold: f64,
    capacity: usize,
    writer: Mutex<()>,
}

impl LearningStore {
    /// Open (creating if needed) the library at `path`.
    pub fn open(path: impl Into<PathBuf>, quality_threshold: f64) -> anyhow::Result<Self> {
        let store = Self {
            path: path.into(),
            quality_threshold,
            capacity: LIBRARY_CAPACITY,
            writer: Mutex::new(()),
        };
        store.ensure_exists()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_exists(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        let content = serde_json::to_string_pretty(&LibraryDocument::default())?;
        write_atomic(&self.path, content.as_bytes())
    }

    fn lock(&self, exclusive: bool) -> anyhow::Result<LibraryLock> {
        let lock_path = self.path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        loop {
            let result = if exclusive {
                FileExt::try_lock_exclusive(&file)
            } else {
                FileExt::try_lock_shared(&file)
            };
            match result {
                Ok(()) => break,
                Err(err) => {
                    if err.kind() != ErrorKind::WouldBlock {
                        return Err(err.into());
                    }
                    if start.elapsed() >= Duration::from_secs(LOCK_TIMEOUT_SECS) {
                        return Err(anyhow::anyhow!(
                            "Timed out waiting for prompt library lock ({}s)",
                            LOCK_TIMEOUT_SECS
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(LOCK_RETRY_MS));
                }
            }
        }

        Ok(LibraryLock { file })
    }

    fn load(&self) -> anyhow::Result<LibraryDocument> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(LibraryDocument::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Load for a write. A corrupt document is moved aside rather than
    /// silently overwritten.
    fn load_for_write(&self) -> anyhow::Result<LibraryDocument> {
        match self.load() {
            Ok(doc) => Ok(doc),
            Err(err) if err.downcast_ref::<serde_json::Error>().is_some() => {
                let backup = self.path.with_extension("json.corrupt");
                fs::rename(&self.path, &backup)?;
                tracing::warn!(
                    error = %err,
                    backup = %backup.display(),
                    "prompt library was corrupted; starting a fresh one"
                );
                Ok(LibraryDocument::default())
            }
            Err(err) => Err(err),
        }
    }

    /// Read-only snapshot of the whole document.
    pub fn snapshot(&self) -> anyhow::Result<LibraryDocument> {
        let _lock = self.lock(false)?;
        self.load()
    }

    /// Record a prompt that passed the gate. Holds the single-writer section
    /// for the whole load-modify-save cycle.
    pub fn record(
        &self,
        prompt: &str,
        score: f64,
        scenario: &str,
        photo_description: &str,
    ) -> anyhow::Result<PromptRecord> {
        if !score.is_finite() {
            return Err(anyhow::anyhow!("refusing to record non-finite score {}", score));
        }

        let record = PromptRecord {
            prompt: prompt.to_string(),
            score,
            scenario: scenario.to_string(),
            photo_description: photo_description.to_string(),
            prompt_hash: short_hash(prompt, PROMPT_HASH_CHARS),
            recorded_at: Some(Utc::now()),
        };

        let _guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _lock = self.lock(true)?;

        let mut doc = self.load_for_write()?;
        doc.insert_ranked(record.clone(), self.capacity);
        let content = serde_json::to_string_pretty(&doc)?;
        write_atomic(&self.path, content.as_bytes())?;

        tracing::debug!(
            scenario,
            score,
            prompt_hash = %record.prompt_hash,
            stored = doc.prompts.len(),
            "recorded successful prompt"
        );
        Ok(record)
    }

    /// Passing prompts whose scenario contains `scenario` (case-insensitive;
    /// empty matches all), best first, at most `limit`.
    pub fn query(&self, scenario: &str, limit: usize) -> anyhow::Result<Vec<PromptRecord>> {
        let doc = self.snapshot()?;
        let needle = scenario.to_lowercase();

        let mut matches: Vec<PromptRecord> = doc
            .prompts
            .into_iter()
            .filter(|p| needle.is_empty() || p.scenario.to_lowercase().contains(&needle))
            .filter(|p| p.score >= self.quality_threshold)
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        Ok(matches)
    }

    /// Proven prompt fragments for a lighting issue and pose, falling back to
    /// general realism fragments when neither key is known.
    pub fn enhancement_patterns(&self, lighting_issue: &str, pose_type: &str) -> Vec<String> {
        let patterns = self.snapshot().map(|doc| doc.patterns).unwrap_or_default();

        let found: Vec<String> = [lighting_issue, pose_type]
            .iter()
            .filter(|key| !key.is_empty())
            .filter_map(|key| patterns.get(*key).cloned())
            .collect();

        if found.is_empty() {
            DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect()
        } else {
            found
        }
    }

    /// [`record`](Self::record) on the blocking pool. Waiting for the file
    /// lock sleeps the calling thread, so async callers go through here.
    pub async fn record_async(
        self: &Arc<Self>,
        prompt: String,
        score: f64,
        scenario: String,
        photo_description: String,
    ) -> anyhow::Result<PromptRecord> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            store.record(&prompt, score, &scenario, &photo_description)
        })
        .await
        .map_err(|e| anyhow::anyhow!("prompt library write task failed: {}", e))?
    }

    /// [`query`](Self::query) on the blocking pool.
    pub async fn query_async(
        self: &Arc<Self>,
        scenario: String,
        limit: usize,
    ) -> anyhow::Result<Vec<PromptRecord>> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.query(&scenario, limit))
            .await
            .map_err(|e| anyhow::anyhow!("prompt library read task failed: {}", e))?
    }

    /// [`enhancement_patterns`](Self::enhancement_patterns) on the blocking pool.
    pub async fn enhancement_patterns_async(
        self: &Arc<Self>,
        lighting_issue: String,
        pose_type: String,
    ) -> Vec<String> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            store.enhancement_patterns(&lighting_issue, &pose_type)
        })
        .await
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "prompt library read task failed");
            DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect()
        })
    }

    pub fn len(&self) -> usize {
        self.snapshot().map(|doc| doc.prompts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
