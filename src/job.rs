//! Enhancement jobs and their run reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// What the pipeline should do with the photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Keep the scene, improve lighting, skin, framing
    Enhance,
    /// Re-stage the same person in a different setting
    Vibe,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Enhance => "enhance",
            Mode::Vibe => "vibe",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enhancement request. Immutable once the pipeline starts.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub photo: PathBuf,
    pub mode: Mode,
    pub vibe: Option<String>,
    pub num_variations: u32,
    pub max_retries: u32,
    pub output_dir: PathBuf,
}

impl Job {
    /// New job with a fresh short id. A non-empty vibe switches to vibe mode.
    pub fn new(
        photo: impl Into<PathBuf>,
        vibe: Option<String>,
        num_variations: u32,
        max_retries: u32,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let vibe = vibe
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let mode = if vibe.is_some() { Mode::Vibe } else { Mode::Enhance };
        Self {
            id: new_job_id(),
            photo: photo.into(),
            mode,
            vibe,
            num_variations,
            max_retries,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Learning-store partition for prompts produced by this job.
    pub fn scenario(&self) -> String {
        match self.vibe.as_deref() {
            Some(vibe) => format!("{}_vibe", vibe),
            None => "default_enhance".to_string(),
        }
    }

    /// Where the final image of `variation_index` (0-based) is written.
    pub fn output_path(&self, variation_index: u32) -> PathBuf {
        self.output_dir
            .join(format!("{}_enhanced_{}.jpg", self.id, variation_index + 1))
    }

    /// Attempts each variation may spend: the initial try plus retries.
    pub fn attempts_per_variation(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Every requested variation produced an output
    Complete,
    /// Some but not all variations produced an output
    Partial,
    /// No variation produced an output
    Failed,
}

/// What a finished job produced.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    /// Output paths in variation order (failed variations leave no entry)
    pub outputs: Vec<PathBuf>,
    pub requested: u32,
    /// Generation attempts spent across all variations
    pub attempts_spent: u32,
}

impl JobReport {
    pub fn succeeded(&self) -> u32 {
        self.outputs.len() as u32
    }

    pub fn failed(&self) -> u32 {
        self.requested.saturating_sub(self.succeeded())
    }

    pub fn status(&self) -> JobStatus {
        match self.succeeded() {
            0 => JobStatus::Failed,
            n if n >= self.requested => JobStatus::Complete,
            _ => JobStatus::Partial,
        }
    }

    /// Output paths relative to `root`, for serving under a results prefix.
    pub fn relative_outputs(&self, root: &Path) -> Vec<PathBuf> {
        self.outputs
            .iter()
            .map(|p| p.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| p.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vibe_selects_mode_and_scenario() {
        let job = Job::new("me.jpg", Some("coffee_shop".into()), 2, 1, "out");
        assert_eq!(job.mode, Mode::Vibe);
        assert_eq!(job.scenario(), "coffee_shop_vibe");

        let job = Job::new("me.jpg", Some("  ".into()), 2, 1, "out");
        assert_eq!(job.mode, Mode::Enhance);
        assert_eq!(job.scenario(), "default_enhance");
    }

    #[test]
    fn job_ids_are_short_and_unique() {
        let a = Job::new("a.jpg", None, 1, 0, "out");
        let b = Job::new("a.jpg", None, 1, 0, "out");
        assert_eq!(a.id.len(), 8);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn output_paths_are_one_based() {
        let job = Job::new("a.jpg", None, 2, 0, "out").with_id("abcd1234");
        assert_eq!(job.output_path(0), PathBuf::from("out/abcd1234_enhanced_1.jpg"));
        assert_eq!(job.attempts_per_variation(), 1);
    }

    #[test]
    fn report_status_distinguishes_outcomes() {
        let mut report = JobReport {
            job_id: "j".into(),
            outputs: vec![],
            requested: 3,
            attempts_spent: 6,
        };
        assert_eq!(report.status(), JobStatus::Failed);
        report.outputs.push(PathBuf::from("out/j_enhanced_1.jpg"));
        assert_eq!(report.status(), JobStatus::Partial);
        assert_eq!(report.failed(), 2);
        report.outputs.push(PathBuf::from("out/j_enhanced_2.jpg"));
        report.outputs.push(PathBuf::from("out/j_enhanced_3.jpg"));
        assert_eq!(report.status(), JobStatus::Complete);
        assert_eq!(
            report.relative_outputs(Path::new("out"))[0],
            PathBuf::from("j_enhanced_1.jpg")
        );
    }
}
