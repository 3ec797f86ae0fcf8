//! glowup - quality-gated photo enhancement
//!
//! Turns an everyday phone photo into a few realistic, better-lit versions,
//! rejecting anything that looks AI-generated.

use anyhow::Result;
use clap::{Parser, Subcommand};
use glowup::config::{self, Config};
use glowup::gemini::{GeminiClient, GeminiDrafter, GeminiEvaluator, GeminiGenerator, Models, PhotoAnalyst};
use glowup::library::LearningStore;
use glowup::post::FilePostProcessor;
use glowup::references::ReferenceCache;
use glowup::scout::PhotoScout;
use glowup::stock::{HttpDownloader, StockPhotoSearch};
use glowup::{Collaborators, Job, JobStatus, Pipeline, QualityGate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "glowup",
    about = "Realistic AI photo enhancement with an independent quality gate",
    version
)]
struct Args {
    /// Store the Gemini API key in the system keychain
    #[arg(long)]
    setup: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enhance a photo, or re-stage it with --vibe
    Enhance {
        photo: PathBuf,

        /// Target setting, e.g. coffee_shop or rooftop_bar
        #[arg(long)]
        vibe: Option<String>,

        /// Variations to produce (1-4)
        #[arg(short = 'n', long)]
        variations: Option<u32>,

        /// Extra attempts per variation after a failed quality check
        #[arg(long)]
        max_retries: Option<u32>,

        /// Results root; each job writes into <output-dir>/<job_id>/
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List learned prompts, best first
    Prompts {
        /// Case-insensitive scenario filter, e.g. default_enhance or beach_vibe
        #[arg(long, default_value = "")]
        scenario: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    if args.setup {
        return config::setup_api_key_interactive();
    }

    let config = Config::load();
    match args.command {
        Some(Command::Enhance {
            photo,
            vibe,
            variations,
            max_retries,
            output_dir,
        }) => {
            let output_root = output_dir.unwrap_or_else(|| config.output_dir.clone());
            enhance(
                &config,
                &photo,
                vibe,
                variations.unwrap_or(config.num_variations),
                max_retries.unwrap_or(config.max_retries),
                &output_root,
            )
            .await
        }
        Some(Command::Prompts { scenario, limit }) => list_prompts(&config, scenario, limit).await,
        None => Err(anyhow::anyhow!(
            "Nothing to do. Try 'glowup enhance <photo>' or 'glowup --help'."
        )),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("glowup=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn enhance(
    config: &Config,
    photo: &Path,
    vibe: Option<String>,
    variations: u32,
    max_retries: u32,
    output_root: &Path,
) -> Result<()> {
    if !photo.is_file() {
        return Err(anyhow::anyhow!("Photo not found: {}", photo.display()));
    }
    let api_key = config.get_api_key().ok_or_else(|| {
        anyhow::anyhow!("No Gemini API key configured. Run 'glowup --setup' or set GEMINI_API_KEY.")
    })?;

    let mut job = Job::new(
        photo,
        vibe,
        Config::clamp_variations(variations),
        max_retries,
        output_root,
    );
    job.output_dir = output_root.join(&job.id);

    let original = stage_original(&job, photo).await?;
    job.photo = original.clone();

    let store = Arc::new(LearningStore::open(
        &config.prompt_library_path,
        config.quality_threshold,
    )?);
    let pipeline = build_pipeline(config, &api_key, store, output_root)?;
    let report = pipeline.run(&job).await;

    let summary = serde_json::json!({
        "job_id": report.job_id,
        "status": report.status(),
        "original": original.strip_prefix(output_root).unwrap_or(&original),
        "images": report.relative_outputs(output_root),
        "count": report.succeeded(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if report.status() == JobStatus::Failed {
        return Err(anyhow::anyhow!(
            "No variation passed the quality gate after {} attempt(s).",
            report.attempts_spent
        ));
    }
    Ok(())
}

/// Copy the user's photo into the job directory as `<job_id>_original.<ext>`.
async fn stage_original(job: &Job, photo: &Path) -> Result<PathBuf> {
    let ext = photo
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    let destination = job.output_dir.join(format!("{}_original.{}", job.id, ext));

    tokio::fs::create_dir_all(&job.output_dir).await?;
    tokio::fs::copy(photo, &destination)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to copy {}: {}", photo.display(), e))?;
    Ok(destination)
}

fn build_pipeline(
    config: &Config,
    api_key: &str,
    store: Arc<LearningStore>,
    output_root: &Path,
) -> Result<Pipeline> {
    let client = GeminiClient::new(api_key)?;
    let models = Models::from_config(config);

    let search = StockPhotoSearch::new(config.unsplash_api_key.clone(), config.pexels_api_key.clone())?;
    if !search.is_configured() {
        tracing::warn!("no UNSPLASH_API_KEY or PEXELS_API_KEY set; running without references");
    }
    let cache = ReferenceCache::new(output_root.join("_ref_cache"), Arc::new(HttpDownloader::new()?));
    let scout = PhotoScout::new(
        Arc::new(PhotoAnalyst::new(client.clone(), models.prompt.clone())),
        Arc::new(search),
        Arc::new(cache),
        config.num_scout_refs,
    );

    let collaborators = Collaborators {
        scout: Arc::new(scout),
        drafter: Arc::new(GeminiDrafter::new(client.clone(), models.prompt, store.clone())),
        generator: Arc::new(GeminiGenerator::new(client.clone(), models.image)),
        evaluator: Arc::new(GeminiEvaluator::new(client, models.quality)),
        post_processor: Arc::new(FilePostProcessor),
    };
    Ok(Pipeline::new(collaborators, store, QualityGate::from_config(config)))
}

async fn list_prompts(config: &Config, scenario: String, limit: usize) -> Result<()> {
    let store = Arc::new(LearningStore::open(
        &config.prompt_library_path,
        config.quality_threshold,
    )?);
    let prompts = store.query_async(scenario, limit).await?;
    println!("{}", serde_json::to_string_pretty(&prompts)?);
    Ok(())
}
