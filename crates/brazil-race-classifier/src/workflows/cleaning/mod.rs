//! Schema-driven cleaning of the raw candidate CSVs into one processed,
//! state-filtered dataset.

mod schema;
mod table;
mod transforms;

pub use schema::{
    CleaningSchema, ColumnSpec, DataType, OutputMeta, SchemaError, SchemaMeta, Transform,
    DEFAULT_SCHEMA_PATH,
};
pub use table::{Cell, Table, NA_MARKERS};
pub use transforms::{apply, apply_all, coerce};

use super::text_encoding::{decode, encode, tse_encoding};
use super::WorkflowError;
use crate::storage::{BucketName, ObjectStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_OUTPUT_NAME: &str = "candidates_clean_all.csv";
pub const DEFAULT_FILTER_COLUMN: &str = "state";
/// Legal Amazon states.
pub const DEFAULT_STATES: [&str; 9] = ["AC", "AM", "AP", "MA", "MT", "PA", "RO", "RR", "TO"];

/// Selects the schema's source columns (absent ones become all-missing),
/// applies transforms then the dtype, and renames to the target names.
pub fn clean_with_schema(table: &Table, schema: &CleaningSchema) -> Table {
    let mut cleaned = Vec::with_capacity(schema.columns.len());
    for (source, spec) in schema.columns.iter() {
        transforms::warn_unknown(source, &spec.transforms);
        let cells: Vec<Cell> = match table.column_index(source) {
            Some(index) => table
                .rows()
                .iter()
                .map(|row| {
                    let cell = apply_all(row[index].clone(), &spec.transforms);
                    match &spec.dtype {
                        Some(dtype) => coerce(cell, dtype),
                        None => cell,
                    }
                })
                .collect(),
            None => {
                warn!(column = source, "source column missing, filling with empty values");
                vec![Cell::Missing; table.len()]
            }
        };
        cleaned.push((spec.target_name(source).to_string(), cells));
    }
    Table::from_columns(cleaned)
}

#[derive(Debug, Clone)]
pub struct CleanRequest {
    pub raw_bucket: BucketName,
    pub processed_bucket: BucketName,
    pub output_name: String,
    /// Empty keeps every row.
    pub states: Vec<String>,
    pub filter_column: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanedYear {
    pub prefix: String,
    pub source_key: String,
    pub rows_read: usize,
    pub rows_kept: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanRun {
    pub years: Vec<CleanedYear>,
    pub rows: usize,
    pub object_key: String,
}

#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    store: Arc<dyn ObjectStore>,
}

impl CleaningPipeline {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn run(
        &self,
        schema: &CleaningSchema,
        request: &CleanRequest,
    ) -> Result<CleanRun, WorkflowError> {
        let output_encoding = schema.output_encoding()?;
        let listing = self
            .store
            .list(&request.raw_bucket, None, Some("/"))
            .await?;
        let states: HashSet<&str> = request.states.iter().map(String::as_str).collect();

        let mut combined = Table::default();
        let mut years = Vec::with_capacity(listing.prefixes.len());
        for prefix in &listing.prefixes {
            let (source_key, raw) = self.read_year_table(&request.raw_bucket, prefix).await?;
            let rows_read = raw.len();
            let mut cleaned = clean_with_schema(&raw, schema);

            if !states.is_empty() {
                let column = cleaned.column_index(&request.filter_column).ok_or_else(|| {
                    WorkflowError::MissingColumn {
                        column: request.filter_column.clone(),
                    }
                })?;
                cleaned.retain_rows(column, |cell| {
                    !cell.is_missing() && states.contains(cell.to_string().as_str())
                });
            }

            info!(prefix = %prefix, key = %source_key, rows_read, rows_kept = cleaned.len(), "year cleaned");
            years.push(CleanedYear {
                prefix: prefix.clone(),
                source_key,
                rows_read,
                rows_kept: cleaned.len(),
            });
            combined.append(cleaned);
        }

        if years.is_empty() {
            return Err(WorkflowError::NothingToDo(
                "No data found to process. Check your raw bucket or schema.".to_string(),
            ));
        }

        let csv = combined.to_csv_string()?;
        self.store
            .put(
                &request.processed_bucket,
                &request.output_name,
                encode(&csv, output_encoding),
                mime::TEXT_CSV.as_ref(),
            )
            .await?;
        info!(
            bucket = %request.processed_bucket,
            key = %request.output_name,
            rows = combined.len(),
            "cleaned candidates uploaded"
        );

        Ok(CleanRun {
            years,
            rows: combined.len(),
            object_key: request.output_name.clone(),
        })
    }

    /// Reads `<prefix>candidates_<year>.csv`, or the first CSV under the
    /// prefix when the canonical object is absent.
    pub async fn read_year_table(
        &self,
        bucket: &BucketName,
        prefix: &str,
    ) -> Result<(String, Table), WorkflowError> {
        let year = prefix.trim_matches('/');
        let canonical = format!("{prefix}candidates_{year}.csv");

        let key = if self.store.exists(bucket, &canonical).await? {
            canonical
        } else {
            let listing = self.store.list(bucket, Some(prefix), None).await?;
            listing
                .objects
                .into_iter()
                .find(|name| name.to_ascii_lowercase().ends_with(".csv"))
                .ok_or_else(|| WorkflowError::NoCsv {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                })?
        };

        let bytes = self.store.get(bucket, &key).await?;
        let table = Table::from_csv_text(&decode(&bytes, tse_encoding()))?;
        Ok((key, table))
    }
}
