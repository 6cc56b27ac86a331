use crate::commands::{
    run_candidates, run_clean, run_indigenous_names, run_photos, run_validate_sources,
    CandidatesArgs, CleanArgs, IndigenousNamesArgs, PhotosArgs,
};
use crate::server;
use crate::RunOutcome;
use brazil_race_classifier::config::AppConfig;
use brazil_race_classifier::error::AppError;
use brazil_race_classifier::sources::DEFAULT_CATALOG_PATH;
use brazil_race_classifier::telemetry;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "brc",
    about = "Brazil Race Classifier: download TSE candidate data and prepare it in cloud storage",
    version
)]
pub(crate) struct Cli {
    /// Path to the YAML catalog of TSE URLs
    #[arg(long, global = true, default_value = DEFAULT_CATALOG_PATH)]
    pub(crate) config: PathBuf,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Download the yearly candidate archives and upload the raw CSVs
    Candidates(CandidatesArgs),
    /// Download candidate photos per year and state and upload each image
    Photos(PhotosArgs),
    /// Clean the raw CSVs with the schema and upload one filtered dataset
    Clean(CleanArgs),
    /// Scrape indigenous people names from the ISA peoples table
    IndigenousNames(IndigenousNamesArgs),
    /// Inspect the URL catalog
    Sources {
        #[command(subcommand)]
        command: SourcesCommand,
    },
    /// Start the HTTP service
    Serve(ServeArgs),
}

#[derive(Subcommand, Debug)]
pub(crate) enum SourcesCommand {
    /// Check that the catalog parses, keys are unique and every URL is valid
    Validate,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<RunOutcome, AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Candidates(args) => run_candidates(&config, &cli.config, args).await,
        Command::Photos(args) => run_photos(&config, &cli.config, args).await,
        Command::Clean(args) => run_clean(&config, args).await,
        Command::IndigenousNames(args) => run_indigenous_names(&config, &cli.config, args).await,
        Command::Sources {
            command: SourcesCommand::Validate,
        } => run_validate_sources(&cli.config),
        Command::Serve(args) => server::run(config, args)
            .await
            .map(|()| RunOutcome::Completed),
    }
}
