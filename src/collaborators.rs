//! Contracts for the services the pipeline drives.
//!
//! The orchestrator only sees these traits; the Gemini, stock-photo and
//! filesystem implementations live in their own modules and tests swap in
//! scripted fakes.

use crate::analysis::{Analyzed, PhotoAnalysis};
use crate::backoff::InfraError;
use crate::job::Mode;
use crate::quality::Evaluation;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

/// A downloaded professional photo used as a lighting/composition reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub path: PathBuf,
    /// Stock provider the photo came from (`unsplash`, `pexels`, ...)
    pub source: String,
    pub photographer: String,
    /// Search query that surfaced the photo
    pub query: String,
}

/// What scouting produced for a job. References may be empty.
#[derive(Debug, Clone)]
pub struct ScoutReport {
    pub references: Vec<Reference>,
    pub analysis: Analyzed,
}

pub trait Scout: Send + Sync {
    /// Analyze the photo and collect references. Never fails; problems
    /// degrade to fewer references or a defaulted analysis.
    fn scout<'a>(&'a self, photo: &'a Path, vibe: Option<&'a str>) -> BoxFuture<'a, ScoutReport>;
}

/// Inputs for the first prompt of a variation.
#[derive(Debug, Clone, Copy)]
pub struct DraftRequest<'a> {
    pub photo: &'a Path,
    pub references: &'a [Reference],
    pub mode: Mode,
    pub vibe: Option<&'a str>,
    pub analysis: &'a PhotoAnalysis,
    /// Learning-store partition to pull precedent prompts from
    pub scenario: &'a str,
}

pub trait PromptDrafter: Send + Sync {
    fn draft<'a>(&'a self, request: DraftRequest<'a>) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Rewrite `prompt` so the next image avoids every entry in `fix_inputs`.
    fn rewrite<'a>(
        &'a self,
        photo: &'a Path,
        prompt: &'a str,
        fix_inputs: &'a [String],
        vibe: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub photo: &'a Path,
    pub prompt: &'a str,
    pub references: &'a [Reference],
    pub temperature: f32,
}

pub trait Generator: Send + Sync {
    /// `Ok(None)` means the model answered without a usable image; `Err` is
    /// an infrastructure failure the caller may retry.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest<'a>,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, InfraError>>;
}

pub trait Evaluator: Send + Sync {
    /// Judge `generated` against the original photo. Unparseable judgments
    /// come back as [`Evaluation::Defaulted`], never as `Err`.
    fn compare<'a>(
        &'a self,
        photo: &'a Path,
        generated: &'a [u8],
    ) -> BoxFuture<'a, Result<Evaluation, InfraError>>;
}

pub trait PostProcessor: Send + Sync {
    /// Persist the final image at (or near) `destination`; returns the path written.
    fn finalize<'a>(
        &'a self,
        image: Vec<u8>,
        destination: &'a Path,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>>;
}

pub trait Downloader: Send + Sync {
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>>;
}
