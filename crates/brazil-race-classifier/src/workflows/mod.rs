pub mod candidates;
pub mod cleaning;
pub mod indigenous_names;
pub mod photos;
pub mod text_encoding;

use crate::fetch::FetchError;
use crate::sources::SourceCatalogError;
use crate::storage::StorageError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sources(#[from] SourceCatalogError),
    #[error(transparent)]
    Schema(#[from] cleaning::SchemaError),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("target file '{member}' not found in the zip archive")]
    MissingMember { member: String },
    #[error("cannot derive the candidates CSV name from {url}")]
    UnrecognizedArchive { url: String },
    #[error("no CSV found under gs://{bucket}/{prefix}")]
    NoCsv { bucket: String, prefix: String },
    #[error("column '{column}' is not present in the cleaned data")]
    MissingColumn { column: String },
    #[error("unable to read the peoples table: {0}")]
    Html(String),
    #[error("{0}")]
    NothingToDo(String),
}

/// A unit of work (a year, a year/state pair) that failed without stopping
/// the rest of the run.
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

impl StepFailure {
    pub(crate) fn new(step: impl Into<String>, error: &WorkflowError) -> Self {
        Self {
            step: step.into(),
            error: error.to_string(),
        }
    }
}
