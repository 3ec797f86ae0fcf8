//! glowup library crate
//!
//! Quality-gated photo enhancement: scout references, draft a prompt,
//! generate, have a separate model judge the result, and rewrite the prompt
//! until the image passes or the attempt budget runs out. Prompts that pass
//! are kept in a prompt library so later jobs start from proven wording.

pub mod analysis;
pub mod backoff;
pub mod collaborators;
pub mod config;
pub mod gemini;
pub mod job;
pub mod library;
mod parse;
pub mod pipeline;
pub mod post;
pub mod quality;
pub mod references;
pub mod retry;
pub mod scout;
pub mod stock;
pub mod styles;
pub mod util;

#[cfg(test)]
mod testing;

pub use job::{Job, JobReport, JobStatus, Mode};
pub use pipeline::{Collaborators, Pipeline};
pub use quality::{Evaluation, QualityGate, ScoreCard, Verdict};
