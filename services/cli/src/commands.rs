use crate::RunOutcome;
use brazil_race_classifier::config::{AppConfig, ConfigError};
use brazil_race_classifier::error::AppError;
use brazil_race_classifier::fetch::Fetcher;
use brazil_race_classifier::sources::{normalize_state, SourceCatalog};
use brazil_race_classifier::storage::{self, BucketName, ObjectStore};
use brazil_race_classifier::workflows::candidates::CandidateIngestor;
use brazil_race_classifier::workflows::cleaning::{
    CleanRequest, CleaningPipeline, CleaningSchema, DEFAULT_FILTER_COLUMN, DEFAULT_OUTPUT_NAME,
    DEFAULT_SCHEMA_PATH, DEFAULT_STATES,
};
use brazil_race_classifier::workflows::indigenous_names::{
    self, IndigenousNamesScraper, NamesRequest, DEFAULT_ISA_URL,
};
use brazil_race_classifier::workflows::photos::PhotoIngestor;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Catalog key under `sources:` that overrides the ISA page URL.
const ISA_SOURCE_KEY: &str = "isa_peoples";

#[derive(Args, Debug)]
pub(crate) struct CandidatesArgs {
    /// Bucket name or gs://bucket for raw candidates (defaults to BRC_RAW_BUCKET)
    #[arg(long)]
    pub(crate) bucket: Option<String>,
    /// GCP project billed for storage requests (defaults to BRC_PROJECT)
    #[arg(long)]
    pub(crate) project: Option<String>,
    /// Only process these years (e.g. 2016 2020 2024)
    #[arg(long, num_args = 1..)]
    pub(crate) years: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct PhotosArgs {
    /// Bucket name or gs://bucket for photos (defaults to BRC_PHOTOS_BUCKET)
    #[arg(long)]
    pub(crate) bucket: Option<String>,
    /// GCP project billed for storage requests (defaults to BRC_PROJECT)
    #[arg(long)]
    pub(crate) project: Option<String>,
    /// Only process these years
    #[arg(long, num_args = 1..)]
    pub(crate) years: Vec<String>,
    /// Only process these states (e.g. AC AM SP)
    #[arg(long, num_args = 1..)]
    pub(crate) states: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct CleanArgs {
    /// Path to the YAML cleaning schema
    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    pub(crate) schema: PathBuf,
    /// GCP project billed for storage requests (defaults to BRC_PROJECT)
    #[arg(long)]
    pub(crate) project: Option<String>,
    /// Raw candidates bucket (defaults to BRC_RAW_BUCKET)
    #[arg(long)]
    pub(crate) raw_bucket: Option<String>,
    /// Processed candidates bucket (defaults to BRC_PROCESSED_BUCKET)
    #[arg(long)]
    pub(crate) processed_bucket: Option<String>,
    /// Object name of the cleaned dataset in the processed bucket
    #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
    pub(crate) output_name: String,
    /// States kept in the cleaned data (defaults to the Legal Amazon states)
    #[arg(long, num_args = 1.., default_values = DEFAULT_STATES)]
    pub(crate) states: Vec<String>,
    /// Keep rows from every state
    #[arg(long, conflicts_with = "states")]
    pub(crate) all_states: bool,
    /// Cleaned column holding the state code
    #[arg(long, default_value = DEFAULT_FILTER_COLUMN)]
    pub(crate) filter_column: String,
}

#[derive(Args, Debug)]
pub(crate) struct IndigenousNamesArgs {
    /// GCP project billed for storage requests (defaults to BRC_PROJECT)
    #[arg(long)]
    pub(crate) project: Option<String>,
    /// Processed bucket (defaults to BRC_PROCESSED_BUCKET)
    #[arg(long)]
    pub(crate) processed_bucket: Option<String>,
    /// Object name, without extension, of the names list
    #[arg(long, default_value = indigenous_names::DEFAULT_OUTPUT_NAME)]
    pub(crate) output_name: String,
    /// ISA page with the peoples table (defaults to the catalog entry, then the public page)
    #[arg(long)]
    pub(crate) isa_url: Option<String>,
    /// Also write the names list into this directory
    #[arg(long)]
    pub(crate) local_dir: Option<PathBuf>,
}

fn resolve_bucket(
    flag: Option<String>,
    fallback: &Option<String>,
    setting: &'static str,
    env_var: &'static str,
) -> Result<BucketName, AppError> {
    let raw = flag
        .or_else(|| fallback.clone())
        .ok_or(ConfigError::Missing { setting, env_var })?;
    Ok(BucketName::parse(&raw)?)
}

fn object_store(
    config: &AppConfig,
    project: Option<String>,
) -> Result<Arc<dyn ObjectStore>, AppError> {
    let project = project.or_else(|| config.gcp.project.clone());
    Ok(storage::from_config(
        &config.storage,
        &config.http,
        project.as_deref(),
    )?)
}

/// Accepts both `--states AC AM` and `--states "AC AM"`.
pub(crate) fn split_states(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split_whitespace())
        .map(normalize_state)
        .collect()
}

fn outcome(has_failures: bool) -> RunOutcome {
    if has_failures {
        RunOutcome::CompletedWithFailures
    } else {
        RunOutcome::Completed
    }
}

pub(crate) async fn run_candidates(
    config: &AppConfig,
    catalog_path: &Path,
    args: CandidatesArgs,
) -> Result<RunOutcome, AppError> {
    let catalog = SourceCatalog::load(catalog_path)?;
    let bucket = resolve_bucket(args.bucket, &config.gcp.raw_bucket, "--bucket", "BRC_RAW_BUCKET")?;
    let store = object_store(config, args.project)?;
    let ingestor = CandidateIngestor::new(Fetcher::new(&config.http)?, store);

    let run = ingestor.run(&catalog, &bucket, &args.years).await;
    if run.uploaded.is_empty() && !run.has_failures() {
        println!("No candidate URLs to process (check --years or config).");
        return Ok(RunOutcome::Completed);
    }

    for year in &run.uploaded {
        println!("gs://{bucket}/{} ({} rows)", year.object_key, year.rows);
    }
    for failure in &run.failures {
        println!("FAILED {}: {}", failure.step, failure.error);
    }
    Ok(outcome(run.has_failures()))
}

pub(crate) async fn run_photos(
    config: &AppConfig,
    catalog_path: &Path,
    args: PhotosArgs,
) -> Result<RunOutcome, AppError> {
    let catalog = SourceCatalog::load(catalog_path)?;
    let bucket = resolve_bucket(
        args.bucket,
        &config.gcp.photos_bucket,
        "--bucket",
        "BRC_PHOTOS_BUCKET",
    )?;
    let store = object_store(config, args.project)?;
    let ingestor = PhotoIngestor::new(Fetcher::new(&config.http)?, store);

    let states = split_states(&args.states);
    let run = ingestor.run(&catalog, &bucket, &args.years, &states).await?;
    for batch in &run.batches {
        println!(
            "gs://{bucket}/{}/{}/ ({} photos)",
            batch.year, batch.state, batch.uploaded
        );
    }
    for failure in &run.failures {
        println!("FAILED {}: {}", failure.step, failure.error);
    }
    info!(photos = run.uploaded(), failures = run.failures.len(), "photo download finished");
    Ok(outcome(run.has_failures()))
}

pub(crate) async fn run_clean(config: &AppConfig, args: CleanArgs) -> Result<RunOutcome, AppError> {
    let schema = CleaningSchema::load(&args.schema).map_err(|err| AppError::Workflow(err.into()))?;
    let request = CleanRequest {
        raw_bucket: resolve_bucket(
            args.raw_bucket,
            &config.gcp.raw_bucket,
            "--raw-bucket",
            "BRC_RAW_BUCKET",
        )?,
        processed_bucket: resolve_bucket(
            args.processed_bucket,
            &config.gcp.processed_bucket,
            "--processed-bucket",
            "BRC_PROCESSED_BUCKET",
        )?,
        output_name: args.output_name,
        states: if args.all_states {
            Vec::new()
        } else {
            split_states(&args.states)
        },
        filter_column: args.filter_column,
    };
    let pipeline = CleaningPipeline::new(object_store(config, args.project)?);

    let run = pipeline.run(&schema, &request).await?;
    for year in &run.years {
        println!(
            "{} -> {} of {} rows kept",
            year.source_key, year.rows_kept, year.rows_read
        );
    }
    println!(
        "gs://{}/{} ({} rows)",
        request.processed_bucket, run.object_key, run.rows
    );
    Ok(RunOutcome::Completed)
}

pub(crate) async fn run_indigenous_names(
    config: &AppConfig,
    catalog_path: &Path,
    args: IndigenousNamesArgs,
) -> Result<RunOutcome, AppError> {
    let isa_url = match args.isa_url {
        Some(url) => url,
        None => catalog_isa_url(catalog_path)?,
    };
    let request = NamesRequest {
        isa_url,
        processed_bucket: resolve_bucket(
            args.processed_bucket,
            &config.gcp.processed_bucket,
            "--processed-bucket",
            "BRC_PROCESSED_BUCKET",
        )?,
        output_name: args.output_name,
        local_dir: args.local_dir,
    };
    let store = object_store(config, args.project)?;
    let scraper = IndigenousNamesScraper::new(Fetcher::new(&config.http)?, store);

    let run = scraper.run(&request).await?;
    println!(
        "gs://{}/{} ({} names from {} peoples)",
        request.processed_bucket, run.object_key, run.names, run.peoples
    );
    if let Some(path) = &run.local_path {
        println!("{}", path.display());
    }
    Ok(RunOutcome::Completed)
}

/// The catalog is optional for this command; a missing file falls back to
/// the public ISA page.
fn catalog_isa_url(catalog_path: &Path) -> Result<String, AppError> {
    if !catalog_path.exists() {
        return Ok(DEFAULT_ISA_URL.to_string());
    }
    let catalog = SourceCatalog::load(catalog_path)?;
    Ok(catalog
        .sources
        .get(ISA_SOURCE_KEY)
        .cloned()
        .unwrap_or_else(|| DEFAULT_ISA_URL.to_string()))
}

pub(crate) fn run_validate_sources(catalog_path: &Path) -> Result<RunOutcome, AppError> {
    let catalog = SourceCatalog::load(catalog_path)?;
    let report = catalog.validate();

    for issue in &report.issues {
        println!("{issue}");
    }
    println!(
        "{}: {} URLs checked, {} issue(s)",
        catalog_path.display(),
        report.urls_checked,
        report.issues.len()
    );
    Ok(outcome(!report.is_valid()))
}
