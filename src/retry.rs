//! Per-variation generate/evaluate/rewrite loop.
//!
//! A variation gets `max_retries + 1` attempts. Each attempt generates one
//! image from the current prompt and runs it through the [`QualityGate`].
//! A failing image feeds its fix suggestions and issues back into a prompt
//! rewrite before the next attempt. Transport failures are retried inside an
//! attempt by the [`BackoffPolicy`] and only cost an attempt once that
//! budget is exhausted.

use crate::analysis::PhotoAnalysis;
use crate::backoff::BackoffPolicy;
use crate::collaborators::{Evaluator, GenerationRequest, Generator, PromptDrafter, Reference};
use crate::job::Job;
use crate::library::LearningStore;
use crate::quality::{GateDecision, QualityGate};
use std::sync::Arc;

const BASE_TEMPERATURE: f32 = 0.75;
const TEMPERATURE_STEP: f32 = 0.05;

/// Sampling temperature for a variation, so successive variations diverge.
pub fn temperature_for(variation_index: u32) -> f32 {
    BASE_TEMPERATURE + TEMPERATURE_STEP * variation_index as f32
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The generator produced nothing usable (or gave up on transport errors)
    NoImage,
    /// The evaluator could not be reached
    Unevaluated,
    Judged(GateDecision),
}

/// One pass of the loop. Discarded when the variation finishes.
#[derive(Debug, Clone)]
pub struct VariationAttempt {
    /// 0-based attempt number within the variation
    pub index: u32,
    pub prompt: String,
    pub outcome: AttemptOutcome,
}

/// Result of [`RetryController::attempt_variation`].
#[derive(Debug, Clone)]
pub struct VariationOutcome {
    /// Bytes of the first image that passed the gate
    pub image: Option<Vec<u8>>,
    pub attempts: Vec<VariationAttempt>,
}

impl VariationOutcome {
    pub fn attempts_used(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn passed(&self) -> bool {
        self.image.is_some()
    }
}

pub struct RetryController {
    drafter: Arc<dyn PromptDrafter>,
    generator: Arc<dyn Generator>,
    evaluator: Arc<dyn Evaluator>,
    store: Arc<LearningStore>,
    gate: QualityGate,
    backoff: BackoffPolicy,
}

impl RetryController {
    pub fn new(
        drafter: Arc<dyn PromptDrafter>,
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
        store: Arc<LearningStore>,
        gate: QualityGate,
    ) -> Self {
        Self {
            drafter,
            generator,
            evaluator,
            store,
            gate,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run the attempt loop for one variation, starting from `prompt`.
    ///
    /// Returns as soon as an image passes the gate, after recording its
    /// prompt in the learning store. Returns no image when every attempt
    /// failed.
    pub async fn attempt_variation(
        &self,
        job: &Job,
        analysis: &PhotoAnalysis,
        references: &[Reference],
        variation_index: u32,
        prompt: String,
    ) -> VariationOutcome {
        let attempt_count = job.attempts_per_variation();
        let temperature = temperature_for(variation_index);
        let scenario = job.scenario();
        let mut current_prompt = prompt;
        let mut attempts = Vec::new();

        for attempt_index in 0..attempt_count {
            let request = GenerationRequest {
                photo: &job.photo,
                prompt: &current_prompt,
                references,
                temperature,
            };

            let generated = match self
                .backoff
                .run("generate", || self.generator.generate(&request))
                .await
            {
                Ok(Some(bytes)) if !bytes.is_empty() => Some(bytes),
                Ok(_) => {
                    tracing::info!(
                        job_id = %job.id,
                        variation = variation_index + 1,
                        attempt = attempt_index + 1,
                        "generator returned no image"
                    );
                    None
                }
                Err(err) => {
                    tracing::warn!(
                        job_id = %job.id,
                        variation = variation_index + 1,
                        attempt = attempt_index + 1,
                        error = %err,
                        "generation failed"
                    );
                    None
                }
            };

            let Some(image) = generated else {
                attempts.push(VariationAttempt {
                    index: attempt_index,
                    prompt: current_prompt.clone(),
                    outcome: AttemptOutcome::NoImage,
                });
                continue;
            };

            let evaluation = match self
                .backoff
                .run("evaluate", || self.evaluator.compare(&job.photo, &image))
                .await
            {
                Ok(evaluation) => evaluation,
                Err(err) => {
                    tracing::warn!(
                        job_id = %job.id,
                        variation = variation_index + 1,
                        attempt = attempt_index + 1,
                        error = %err,
                        "quality check failed"
                    );
                    attempts.push(VariationAttempt {
                        index: attempt_index,
                        prompt: current_prompt.clone(),
                        outcome: AttemptOutcome::Unevaluated,
                    });
                    continue;
                }
            };

            let decision = self.gate.decide(&evaluation);
            tracing::info!(
                job_id = %job.id,
                variation = variation_index + 1,
                attempt = attempt_index + 1,
                verdict = ?decision.verdict,
                overall = decision.overall,
                ai_detection_risk = decision.ai_detection_risk,
                defaulted = evaluation.is_defaulted(),
                "quality gate"
            );

            if decision.verdict.is_pass() {
                if let Err(err) = self
                    .store
                    .record_async(
                        current_prompt.clone(),
                        decision.overall,
                        scenario.clone(),
                        analysis.describe(),
                    )
                    .await
                {
                    tracing::warn!(job_id = %job.id, error = %err, "could not record prompt");
                }
                attempts.push(VariationAttempt {
                    index: attempt_index,
                    prompt: current_prompt,
                    outcome: AttemptOutcome::Judged(decision),
                });
                return VariationOutcome {
                    image: Some(image),
                    attempts,
                };
            }

            let fix_inputs = decision.fix_inputs.clone();
            attempts.push(VariationAttempt {
                index: attempt_index,
                prompt: current_prompt.clone(),
                outcome: AttemptOutcome::Judged(decision),
            });

            if attempt_index + 1 < attempt_count {
                match self
                    .drafter
                    .rewrite(&job.photo, &current_prompt, &fix_inputs, job.vibe.as_deref())
                    .await
                {
                    Ok(rewritten) if !rewritten.trim().is_empty() => current_prompt = rewritten,
                    Ok(_) => {
                        tracing::warn!(job_id = %job.id, "prompt rewrite came back empty, reusing prompt")
                    }
                    Err(err) => {
                        tracing::warn!(job_id = %job.id, error = %err, "prompt rewrite failed, reusing prompt")
                    }
                }
            }
        }

        VariationOutcome {
            image: None,
            attempts,
        }
    }
}
