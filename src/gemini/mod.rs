//! Gemini-backed analysis, drafting, generation and evaluation.

pub mod client;
pub mod prompts;

pub use client::{GeminiClient, Part};

use crate::analysis::{Analyzed, PhotoAnalysis};
use crate::backoff::{BackoffPolicy, InfraError};
use crate::collaborators::{
    DraftRequest, Evaluator, GenerationRequest, Generator, PromptDrafter, Reference,
};
use crate::config::Config;
use crate::library::LearningStore;
use crate::quality::Evaluation;
use futures::future::{BoxFuture, FutureExt};
use std::path::Path;
use std::sync::Arc;

/// Past prompts quoted into each draft.
const PAST_PROMPT_LIMIT: usize = 2;

/// Model ids for each role. The evaluator runs on a different model than
/// the generator so it doesn't share its blind spots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Models {
    pub prompt: String,
    pub image: String,
    pub quality: String,
}

impl Models {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prompt: config.prompt_model.clone(),
            image: config.image_model.clone(),
            quality: config.quality_model.clone(),
        }
    }
}

/// The user's photo followed by whichever references are readable.
async fn photo_with_references(photo: &Path, references: &[Reference]) -> anyhow::Result<Vec<Part>> {
    let mut parts = vec![Part::image_file(photo).await?];
    for reference in references {
        match Part::image_file(&reference.path).await {
            Ok(part) => parts.push(part),
            Err(err) => tracing::debug!(error = %err, "skipping unreadable reference"),
        }
    }
    Ok(parts)
}

fn infra_from_io(err: anyhow::Error) -> InfraError {
    InfraError::Fatal(err.to_string())
}

// ── analysis ────────────────────────────────────────────────────────────────

/// Structured photo analysis on the prompt model.
pub struct PhotoAnalyst {
    client: GeminiClient,
    model: String,
    backoff: BackoffPolicy,
}

impl PhotoAnalyst {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Never fails: unreadable photos, exhausted retries and bad JSON all
    /// come back as [`Analyzed::Defaulted`].
    pub async fn analyze(&self, photo: &Path) -> Analyzed {
        let image = match Part::image_file(photo).await {
            Ok(part) => part,
            Err(err) => {
                return Analyzed::Defaulted {
                    reason: err.to_string(),
                }
            }
        };
        let parts = [image, Part::text(prompts::analyze_photo(&crate::styles::menu()))];

        match self
            .backoff
            .run("analyze_photo", || self.client.generate_text(&self.model, &parts))
            .await
        {
            Ok(text) => Analyzed::from_response(&text),
            Err(err) => {
                tracing::warn!(error = %err, "photo analysis failed, continuing with defaults");
                Analyzed::Defaulted {
                    reason: err.to_string(),
                }
            }
        }
    }
}

// ── drafting ────────────────────────────────────────────────────────────────

pub struct GeminiDrafter {
    client: GeminiClient,
    model: String,
    store: Arc<LearningStore>,
}

impl GeminiDrafter {
    pub fn new(client: GeminiClient, model: impl Into<String>, store: Arc<LearningStore>) -> Self {
        Self {
            client,
            model: model.into(),
            store,
        }
    }

    async fn instruction(&self, request: &DraftRequest<'_>) -> String {
        let analysis: &PhotoAnalysis = request.analysis;
        let past = self
            .store
            .query_async(request.scenario.to_string(), PAST_PROMPT_LIMIT)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "could not read prompt library");
                Vec::new()
            });
        let patterns = self
            .store
            .enhancement_patterns_async(analysis.lighting.quality.clone(), analysis.pose.clone())
            .await;
        let style = analysis
            .style_category
            .as_deref()
            .and_then(crate::styles::find)
            .map(|preset| preset.instruction);

        prompts::draft_prompt(
            &prompts::draft_task(request.vibe, request.references.len()),
            &analysis.describe(),
            style,
            &past,
            &patterns,
        )
    }
}

impl PromptDrafter for GeminiDrafter {
    fn draft<'a>(&'a self, request: DraftRequest<'a>) -> BoxFuture<'a, anyhow::Result<String>> {
        async move {
            let mut parts = photo_with_references(request.photo, request.references).await?;
            parts.push(Part::text(self.instruction(&request).await));

            let text = self.client.generate_text(&self.model, &parts).await?;
            let text = text.trim();
            if text.is_empty() {
                anyhow::bail!("prompt model returned an empty draft");
            }
            Ok(text.to_string())
        }
        .boxed()
    }

    fn rewrite<'a>(
        &'a self,
        photo: &'a Path,
        prompt: &'a str,
        fix_inputs: &'a [String],
        vibe: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        async move {
            let parts = [
                Part::image_file(photo).await?,
                Part::text(prompts::rewrite_prompt(prompt, fix_inputs, vibe)),
            ];
            let text = self.client.generate_text(&self.model, &parts).await?;
            Ok(text.trim().to_string())
        }
        .boxed()
    }
}

// ── generation ──────────────────────────────────────────────────────────────

pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Generator for GeminiGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest<'a>,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, InfraError>> {
        async move {
            let mut parts = photo_with_references(request.photo, request.references)
                .await
                .map_err(infra_from_io)?;
            parts.push(Part::text(request.prompt));
            self.client
                .generate_image(&self.model, &parts, request.temperature)
                .await
        }
        .boxed()
    }
}

// ── evaluation ──────────────────────────────────────────────────────────────

/// Forensic comparison on the quality model.
pub struct GeminiEvaluator {
    client: GeminiClient,
    model: String,
}

impl GeminiEvaluator {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Evaluator for GeminiEvaluator {
    fn compare<'a>(
        &'a self,
        photo: &'a Path,
        generated: &'a [u8],
    ) -> BoxFuture<'a, Result<Evaluation, InfraError>> {
        async move {
            let original = Part::image_file(photo).await.map_err(infra_from_io)?;
            let parts = [
                Part::jpeg(generated.to_vec()),
                original,
                Part::text(prompts::COMPARE_PHOTOS),
            ];
            let text = self.client.generate_text(&self.model, &parts).await?;
            Ok(Evaluation::from_response(&text))
        }
        .boxed()
    }
}
