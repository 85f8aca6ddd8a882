//! ClaimGuard CLI

mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use claimguard_core::{
    evaluate, ClaimIntake, CollaboratorOutputs, ExifMetadataReader, MetadataReader, PolicyTerms,
};
use claimguard_runtime::{
    ClaimPipeline, ClaimSubmission, ImageLabeler, LlmProvider, RuntimeConfig, StaticLabeler,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::report::ClaimReport;

#[derive(Parser)]
#[command(name = "claimguard")]
#[command(about = "Evaluate photo-backed insurance claims: approve, reject, or flag for review")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a claim against the live collaborators
    Evaluate {
        /// Path to the claim image
        #[arg(short, long)]
        image: PathBuf,

        /// Claimant's description of the loss
        #[arg(short, long)]
        narrative: String,

        /// Date coverage began (YYYY-MM-DD)
        #[arg(long)]
        policy_start: String,

        /// Date the loss occurred (YYYY-MM-DD)
        #[arg(long)]
        date_of_loss: String,

        /// Allowed days between capture date and date of loss
        #[arg(short, long, default_value = "2")]
        threshold: u32,

        /// Runtime configuration file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use these labels instead of calling the vision service (comma-separated)
        #[arg(long)]
        labels: Option<String>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the capture metadata embedded in an image
    Metadata {
        /// Path to the image
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Decide a claim offline from collaborator outputs already in hand
    Decide {
        /// Path to the claim image
        #[arg(short, long)]
        image: PathBuf,

        /// Claimant's description of the loss
        #[arg(short, long)]
        narrative: String,

        /// Date coverage began (YYYY-MM-DD)
        #[arg(long)]
        policy_start: String,

        /// Date the loss occurred (YYYY-MM-DD)
        #[arg(long)]
        date_of_loss: String,

        /// Allowed days between capture date and date of loss
        #[arg(short, long, default_value = "2")]
        threshold: u32,

        /// Collaborator outputs file with `labels`, `summary`, `key_facts` (YAML or JSON)
        #[arg(short, long)]
        outputs: Option<PathBuf>,

        /// Image labels (comma-separated), replacing any in the outputs file
        #[arg(long)]
        labels: Option<String>,

        /// Summarizer response text file
        #[arg(long)]
        summary_file: Option<PathBuf>,

        /// Key-fact extractor response file
        #[arg(long)]
        key_facts_file: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Evaluate {
            image,
            narrative,
            policy_start,
            date_of_loss,
            threshold,
            config,
            labels,
            format,
        } => {
            let submission = ClaimSubmission {
                image_path: image,
                user_narrative: narrative,
                policy_start_date: policy_start,
                date_of_loss,
                allowed_day_threshold: threshold,
            };
            cmd_evaluate(submission, config.as_deref(), labels, format).await
        }
        Commands::Metadata { image } => cmd_metadata(&image),
        Commands::Decide {
            image,
            narrative,
            policy_start,
            date_of_loss,
            threshold,
            outputs,
            labels,
            summary_file,
            key_facts_file,
            format,
        } => {
            let policy = PolicyTerms::parse(&policy_start, &date_of_loss, threshold)
                .context("Invalid policy dates")?;
            let intake = ClaimIntake::new(image, narrative, policy)?;

            let mut collaborator_outputs = match outputs {
                Some(path) => load_outputs(&path)?,
                None => CollaboratorOutputs::default(),
            };
            if let Some(labels) = labels {
                collaborator_outputs.labels = split_labels(&labels);
            }
            if let Some(path) = summary_file {
                collaborator_outputs.summary = read_text(&path)?;
            }
            if let Some(path) = key_facts_file {
                collaborator_outputs.key_facts = read_text(&path)?;
            }

            cmd_decide(intake, &collaborator_outputs, format)
        }
    }
}

async fn cmd_evaluate(
    submission: ClaimSubmission,
    config_path: Option<&Path>,
    labels: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let config = match config_path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    }
    .with_env()
    .context("Invalid CLAIMGUARD_* environment override")?;

    let labeler: Arc<dyn ImageLabeler> = match labels {
        Some(labels) => Arc::new(StaticLabeler::new(split_labels(&labels))),
        None => vision_labeler(&config)?,
    };

    let pipeline = ClaimPipeline::builder()
        .labeler(labeler)
        .provider(text_provider()?)
        .config(config)
        .build()?;

    tracing::info!(image = %submission.image_path.display(), "Evaluating claim");
    let outcome = pipeline
        .evaluate(submission)
        .await
        .context("Claim evaluation failed")?;

    match format {
        OutputFormat::Text => print!("{}", ClaimReport::from_outcome(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&outcome)?),
    }

    Ok(())
}

#[cfg(feature = "google")]
fn vision_labeler(config: &RuntimeConfig) -> Result<Arc<dyn ImageLabeler>> {
    use claimguard_runtime::GoogleVisionLabeler;

    let labeler = GoogleVisionLabeler::from_env()
        .context("Vision labeling needs GOOGLE_API_KEY (or pass --labels)")?
        .with_max_results(config.labeler.max_results)
        .with_timeout(config.timeouts.labeler);
    Ok(Arc::new(labeler))
}

#[cfg(not(feature = "google"))]
fn vision_labeler(_config: &RuntimeConfig) -> Result<Arc<dyn ImageLabeler>> {
    anyhow::bail!("Built without the `google` feature; pass --labels to label offline")
}

#[cfg(feature = "google")]
fn text_provider() -> Result<Arc<dyn LlmProvider>> {
    use claimguard_runtime::GeminiProvider;

    let provider = GeminiProvider::from_env().context("Text model needs GOOGLE_API_KEY")?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "google"))]
fn text_provider() -> Result<Arc<dyn LlmProvider>> {
    anyhow::bail!("Built without the `google` feature; no text model provider available")
}

/// Important EXIF fields for one image.
#[derive(Serialize)]
struct MetadataView {
    date_time_original: Option<String>,
    make: Option<String>,
    model: Option<String>,
    gps_present: bool,
}

fn cmd_metadata(image: &Path) -> Result<()> {
    let bytes =
        std::fs::read(image).with_context(|| format!("Failed to read image {}", image.display()))?;
    let metadata = ExifMetadataReader::new().read(&bytes);

    let view = MetadataView {
        date_time_original: metadata
            .capture_timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        make: metadata.camera_make,
        model: metadata.camera_model,
        gps_present: metadata.gps_present,
    };

    if view.date_time_original.is_none() && view.make.is_none() && !view.gps_present {
        tracing::warn!(image = %image.display(), "No EXIF metadata found in this image");
    }

    println!("EXIF Data (Important Fields)\n{}", "=".repeat(50));
    println!("DateTimeOriginal: {}", view.date_time_original.as_deref().unwrap_or("-"));
    println!("Make:             {}", view.make.as_deref().unwrap_or("-"));
    println!("Model:            {}", view.model.as_deref().unwrap_or("-"));
    println!("GPS present:      {}", if view.gps_present { "yes" } else { "no" });

    Ok(())
}

fn cmd_decide(intake: ClaimIntake, outputs: &CollaboratorOutputs, format: OutputFormat) -> Result<()> {
    let image_path = intake.image_path().to_path_buf();
    let image = std::fs::read(&image_path)
        .with_context(|| format!("Failed to read image {}", image_path.display()))?;

    let record = evaluate(intake, &image, &ExifMetadataReader::new(), outputs)?;

    match format {
        OutputFormat::Text => print!("{}", ClaimReport::new(&record)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&record)?),
    }

    Ok(())
}

fn load_outputs(path: &Path) -> Result<CollaboratorOutputs> {
    let content = read_text(path)?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse collaborator outputs {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn split_labels(labels: &str) -> Vec<String> {
    labels
        .split(',')
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}
