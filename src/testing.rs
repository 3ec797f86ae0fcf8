//! Scripted collaborators for unit tests.

use crate::analysis::Analyzed;
use crate::backoff::InfraError;
use crate::collaborators::{
    Downloader, DraftRequest, Evaluator, GenerationRequest, Generator, PostProcessor,
    PromptDrafter, Reference, Scout, ScoutReport,
};
use crate::quality::{Evaluation, ScoreCard};
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn passing(overall: f64) -> Evaluation {
    Evaluation::Scored(ScoreCard {
        realism: overall,
        identity_match: overall,
        naturalness: overall,
        attractiveness: overall,
        ai_detection_risk: 2.0,
        enhancement_quality: overall,
        overall,
        issues: Vec::new(),
        fix_suggestions: Vec::new(),
        reported_verdict: Some("PASS".into()),
    })
}

pub fn failing(issues: &[&str]) -> Evaluation {
    Evaluation::Scored(ScoreCard {
        overall: 4.0,
        ai_detection_risk: 6.0,
        issues: issues.iter().map(|s| s.to_string()).collect(),
        fix_suggestions: vec!["add natural skin texture".into()],
        reported_verdict: Some("FAIL".into()),
        ..ScoreCard::pessimistic()
    })
}

pub fn reference(name: &str) -> Reference {
    Reference {
        path: PathBuf::from(format!("refs/{}.jpg", name)),
        source: "unsplash".into(),
        photographer: "Test Photographer".into(),
        query: "portrait".into(),
    }
}

/// Pops scripted results; once the script runs out, repeats the fallback.
struct Script<T> {
    queue: Mutex<VecDeque<T>>,
    fallback: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Script<T> {
    fn next(&self) -> T {
        let mut queue = self.queue.lock().unwrap();
        queue.pop_front().unwrap_or_else(|| (self.fallback)())
    }
}

pub struct ScriptedGenerator {
    script: Script<Result<Option<Vec<u8>>, InfraError>>,
    calls: AtomicUsize,
    temperatures: Mutex<Vec<f32>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn build(
        queue: Vec<Result<Option<Vec<u8>>, InfraError>>,
        fallback: Box<dyn Fn() -> Result<Option<Vec<u8>>, InfraError> + Send + Sync>,
    ) -> Self {
        Self {
            script: Script {
                queue: Mutex::new(queue.into()),
                fallback,
            },
            calls: AtomicUsize::new(0),
            temperatures: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always_image() -> Self {
        Self::build(Vec::new(), Box::new(|| Ok(Some(b"generated-jpeg".to_vec()))))
    }

    pub fn never_image() -> Self {
        Self::build(Vec::new(), Box::new(|| Ok(None)))
    }

    /// Plays `results` in order, then keeps producing images.
    pub fn sequence(results: Vec<Result<Option<Vec<u8>>, InfraError>>) -> Self {
        Self::build(results, Box::new(|| Ok(Some(b"generated-jpeg".to_vec()))))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn temperatures(&self) -> Vec<f32> {
        self.temperatures.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest<'a>,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, InfraError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.temperatures.lock().unwrap().push(request.temperature);
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        let result = self.script.next();
        async move { result }.boxed()
    }
}

pub struct ScriptedEvaluator {
    script: Script<Result<Evaluation, InfraError>>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn always(evaluation: Evaluation) -> Self {
        Self {
            script: Script {
                queue: Mutex::new(VecDeque::new()),
                fallback: Box::new(move || Ok(evaluation.clone())),
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// Plays `evaluations` in order, then keeps failing.
    pub fn sequence(evaluations: Vec<Evaluation>) -> Self {
        Self::results(evaluations.into_iter().map(Ok).collect())
    }

    /// Like [`sequence`](Self::sequence), with transport errors in the mix.
    pub fn results(results: Vec<Result<Evaluation, InfraError>>) -> Self {
        Self {
            script: Script {
                queue: Mutex::new(results.into()),
                fallback: Box::new(|| Ok(failing(&["script exhausted"]))),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Evaluator for ScriptedEvaluator {
    fn compare<'a>(
        &'a self,
        _photo: &'a Path,
        _generated: &'a [u8],
    ) -> BoxFuture<'a, Result<Evaluation, InfraError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.script.next();
        async move { result }.boxed()
    }
}

/// Drafts `"draft N"` prompts and appends `" [revised]"` on rewrite.
#[derive(Default)]
pub struct RecordingDrafter {
    drafts: AtomicUsize,
    rewrites: AtomicUsize,
    fix_inputs: Mutex<Vec<Vec<String>>>,
    reference_counts: Mutex<Vec<usize>>,
    pub fail_drafts: bool,
    pub fail_rewrites: bool,
}

impl RecordingDrafter {
    pub fn failing_drafts() -> Self {
        Self {
            fail_drafts: true,
            ..Self::default()
        }
    }

    pub fn failing_rewrites() -> Self {
        Self {
            fail_rewrites: true,
            ..Self::default()
        }
    }

    pub fn drafts(&self) -> usize {
        self.drafts.load(Ordering::SeqCst)
    }

    pub fn rewrites(&self) -> usize {
        self.rewrites.load(Ordering::SeqCst)
    }

    pub fn fix_inputs(&self) -> Vec<Vec<String>> {
        self.fix_inputs.lock().unwrap().clone()
    }

    pub fn reference_counts(&self) -> Vec<usize> {
        self.reference_counts.lock().unwrap().clone()
    }
}

impl PromptDrafter for RecordingDrafter {
    fn draft<'a>(&'a self, request: DraftRequest<'a>) -> BoxFuture<'a, anyhow::Result<String>> {
        let n = self.drafts.fetch_add(1, Ordering::SeqCst);
        self.reference_counts
            .lock()
            .unwrap()
            .push(request.references.len());
        let fail = self.fail_drafts;
        async move {
            if fail {
                anyhow::bail!("drafting unavailable");
            }
            Ok(format!("draft {}", n + 1))
        }
        .boxed()
    }

    fn rewrite<'a>(
        &'a self,
        _photo: &'a Path,
        prompt: &'a str,
        fix_inputs: &'a [String],
        _vibe: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        self.rewrites.fetch_add(1, Ordering::SeqCst);
        self.fix_inputs.lock().unwrap().push(fix_inputs.to_vec());
        let fail = self.fail_rewrites;
        async move {
            if fail {
                anyhow::bail!("rewrite unavailable");
            }
            Ok(format!("{} [revised]", prompt))
        }
        .boxed()
    }
}

pub struct FixedScout {
    pub references: Vec<Reference>,
    pub analysis: Analyzed,
}

impl FixedScout {
    pub fn with_references(count: usize) -> Self {
        Self {
            references: (0..count).map(|i| reference(&format!("ref{}", i))).collect(),
            analysis: Analyzed::Parsed(crate::analysis::PhotoAnalysis::default()),
        }
    }
}

impl Scout for FixedScout {
    fn scout<'a>(&'a self, _photo: &'a Path, _vibe: Option<&'a str>) -> BoxFuture<'a, ScoutReport> {
        let report = ScoutReport {
            references: self.references.clone(),
            analysis: self.analysis.clone(),
        };
        async move { report }.boxed()
    }
}

/// Writes images straight to their destination.
pub struct DiskPostProcessor;

impl PostProcessor for DiskPostProcessor {
    fn finalize<'a>(
        &'a self,
        image: Vec<u8>,
        destination: &'a Path,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>> {
        async move {
            crate::util::write_atomic(destination, &image)?;
            Ok(destination.to_path_buf())
        }
        .boxed()
    }
}

pub struct CountingDownloader {
    body: Vec<u8>,
    calls: AtomicUsize,
}

impl CountingDownloader {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Downloader for CountingDownloader {
    fn download<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self.body.clone();
        async move {
            // Yield so concurrent callers actually overlap.
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(body)
        }
        .boxed()
    }
}
