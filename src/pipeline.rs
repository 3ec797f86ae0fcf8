//! Job orchestration: scout once, then draft, retry and finalize each
//! variation in order.

use crate::analysis::Analyzed;
use crate::backoff::BackoffPolicy;
use crate::collaborators::{DraftRequest, Evaluator, Generator, PostProcessor, PromptDrafter, Scout};
use crate::job::{Job, JobReport};
use crate::library::LearningStore;
use crate::quality::QualityGate;
use crate::retry::RetryController;
use std::sync::Arc;
use tracing::Instrument;

/// References handed to the prompt drafter.
pub const DRAFT_REFERENCES: usize = 3;
/// References sent along with the generation request.
pub const GENERATION_REFERENCES: usize = 2;

/// Everything the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub scout: Arc<dyn Scout>,
    pub drafter: Arc<dyn PromptDrafter>,
    pub generator: Arc<dyn Generator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub post_processor: Arc<dyn PostProcessor>,
}

pub struct Pipeline {
    scout: Arc<dyn Scout>,
    drafter: Arc<dyn PromptDrafter>,
    post_processor: Arc<dyn PostProcessor>,
    retry: RetryController,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, store: Arc<LearningStore>, gate: QualityGate) -> Self {
        let retry = RetryController::new(
            collaborators.drafter.clone(),
            collaborators.generator,
            collaborators.evaluator,
            store,
            gate,
        );
        Self {
            scout: collaborators.scout,
            drafter: collaborators.drafter,
            post_processor: collaborators.post_processor,
            retry,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.retry = self.retry.with_backoff(backoff);
        self
    }

    /// Run a job to completion. Never fails: a variation that can't be
    /// drafted, never passes the gate, or can't be saved is skipped, and
    /// the report says how many made it.
    pub async fn run(&self, job: &Job) -> JobReport {
        tracing::info!(
            job_id = %job.id,
            mode = %job.mode,
            variations = job.num_variations,
            max_retries = job.max_retries,
            "starting job"
        );

        let scouted = self.scout.scout(&job.photo, job.vibe.as_deref()).await;
        if let Analyzed::Defaulted { reason } = &scouted.analysis {
            tracing::warn!(job_id = %job.id, reason = %reason, "using default photo analysis");
        }
        let analysis = scouted.analysis.into_analysis();
        let references = scouted.references;
        tracing::info!(job_id = %job.id, references = references.len(), "scouting finished");

        let draft_refs = &references[..references.len().min(DRAFT_REFERENCES)];
        let generation_refs = &references[..references.len().min(GENERATION_REFERENCES)];
        let scenario = job.scenario();

        let mut outputs = Vec::new();
        let mut attempts_spent = 0;

        for variation_index in 0..job.num_variations {
            let span = tracing::info_span!("variation", job_id = %job.id, variation = variation_index + 1);

            let finalized = async {
                let request = DraftRequest {
                    photo: &job.photo,
                    references: draft_refs,
                    mode: job.mode,
                    vibe: job.vibe.as_deref(),
                    analysis: &analysis,
                    scenario: &scenario,
                };
                let prompt = match self.drafter.draft(request).await {
                    Ok(prompt) => prompt,
                    Err(err) => {
                        tracing::warn!(error = %err, "prompt drafting failed, skipping variation");
                        return (0, None);
                    }
                };

                let outcome = self
                    .retry
                    .attempt_variation(job, &analysis, generation_refs, variation_index, prompt)
                    .await;
                let used = outcome.attempts_used();

                let Some(image) = outcome.image else {
                    tracing::warn!(attempts = used, "no attempt passed the quality gate");
                    return (used, None);
                };

                let destination = job.output_path(variation_index);
                match self.post_processor.finalize(image, &destination).await {
                    Ok(path) => {
                        tracing::info!(path = %path.display(), attempts = used, "variation complete");
                        (used, Some(path))
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "post-processing failed, skipping variation");
                        (used, None)
                    }
                }
            }
            .instrument(span)
            .await;

            attempts_spent += finalized.0;
            outputs.extend(finalized.1);
        }

        let report = JobReport {
            job_id: job.id.clone(),
            outputs,
            requested: job.num_variations,
            attempts_spent,
        };
        tracing::info!(
            job_id = %job.id,
            status = ?report.status(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            attempts = report.attempts_spent,
            "job finished"
        );
        report
    }
}
