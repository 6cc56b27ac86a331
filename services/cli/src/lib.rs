mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use brazil_race_classifier::error::AppError;

/// How a command finished when it did not return an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Some years, states or catalog entries failed; the process exits 1.
    CompletedWithFailures,
}

pub async fn run() -> Result<RunOutcome, AppError> {
    cli::run().await
}
