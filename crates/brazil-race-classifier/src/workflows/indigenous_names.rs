//! Indigenous people names scraped from the ISA "Quadro Geral dos Povos"
//! table, used as a lexicon when labelling candidate names.

use super::WorkflowError;
use crate::fetch::Fetcher;
use crate::storage::{BucketName, ObjectStore};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::info;

pub const DEFAULT_ISA_URL: &str = "https://pib.socioambiental.org/pt/Quadro_Geral_dos_Povos";
pub const DEFAULT_OUTPUT_NAME: &str = "isa_names";

const INDEX_COLUMN: &str = "#";
const NAME_COLUMN: &str = "Nomes";
const ALTERNATIVES_COLUMN: &str = "Outros nomes ou grafias";

/// One numbered row of the peoples table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeopleRow {
    pub name: String,
    pub alternatives: Option<String>,
}

fn parenthesised() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\((.*?)\)").expect("valid parentheses pattern"))
}

fn selector(css: &'static str) -> Result<Selector, WorkflowError> {
    Selector::parse(css).map_err(|err| WorkflowError::Html(format!("bad selector {css}: {err:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads the first table of the page and keeps rows whose `#` cell is numeric.
pub fn parse_peoples_table(html: &str) -> Result<Vec<PeopleRow>, WorkflowError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let header_selector = selector("th")?;
    let cell_selector = selector("td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| WorkflowError::Html("no table found on the page".to_string()))?;

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for row in table.select(&row_selector) {
        if header.is_none() {
            let names: Vec<String> = row.select(&header_selector).map(cell_text).collect();
            if !names.is_empty() {
                header = Some(names);
            }
            continue;
        }
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    let header = header.ok_or_else(|| WorkflowError::Html("table has no header row".to_string()))?;
    let position = |column: &str| {
        header
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| WorkflowError::MissingColumn {
                column: column.to_string(),
            })
    };
    let index = position(INDEX_COLUMN)?;
    let name = position(NAME_COLUMN)?;
    let alternatives = position(ALTERNATIVES_COLUMN)?;

    Ok(rows
        .into_iter()
        .filter(|cells| {
            cells
                .get(index)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .is_some_and(f64::is_finite)
        })
        .map(|cells| PeopleRow {
            name: cells.get(name).cloned().unwrap_or_default(),
            alternatives: cells
                .get(alternatives)
                .filter(|value| !value.trim().is_empty())
                .cloned(),
        })
        .collect())
}

fn normalize(raw: &str) -> String {
    deunicode::deunicode(&raw.trim().to_lowercase())
}

/// Lower-cased ASCII names. Parenthesised fragments count as names of their
/// own and are removed from the main name.
pub fn extract_names(rows: &[PeopleRow]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut keep = |name: &str| {
        let name = name.trim();
        if !name.is_empty() {
            names.insert(name.to_string());
        }
    };

    for row in rows {
        let name = normalize(&row.name);
        for fragment in parenthesised().captures_iter(&name) {
            keep(&fragment[1]);
        }
        keep(&parenthesised().replace_all(&name, ""));

        if let Some(alternatives) = &row.alternatives {
            for alternative in alternatives.split(',') {
                keep(&normalize(alternative));
            }
        }
    }

    names
}

pub fn names_csv(names: &BTreeSet<String>) -> Result<Vec<u8>, WorkflowError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["name"])?;
    for name in names {
        writer.write_record([name])?;
    }
    writer
        .into_inner()
        .map_err(|err| WorkflowError::Io(err.into_error()))
}

#[derive(Debug, Clone)]
pub struct NamesRequest {
    pub isa_url: String,
    pub processed_bucket: BucketName,
    pub output_name: String,
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamesRun {
    pub peoples: usize,
    pub names: usize,
    pub object_key: String,
    pub local_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IndigenousNamesScraper {
    fetcher: Fetcher,
    store: Arc<dyn ObjectStore>,
}

impl IndigenousNamesScraper {
    pub fn new(fetcher: Fetcher, store: Arc<dyn ObjectStore>) -> Self {
        Self { fetcher, store }
    }

    pub async fn run(&self, request: &NamesRequest) -> Result<NamesRun, WorkflowError> {
        let page = self.fetcher.fetch_text(&request.isa_url).await?;
        let rows = parse_peoples_table(&page)?;
        let names = extract_names(&rows);
        info!(peoples = rows.len(), names = names.len(), "indigenous names extracted");

        let body = names_csv(&names)?;
        let object_key = format!("{}.csv", request.output_name);

        let local_path = match &request.local_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = dir.join(&object_key);
                tokio::fs::write(&path, &body).await?;
                Some(path)
            }
            None => None,
        };

        self.store
            .put(
                &request.processed_bucket,
                &object_key,
                body,
                mime::TEXT_CSV.as_ref(),
            )
            .await?;
        info!(bucket = %request.processed_bucket, key = %object_key, "indigenous names uploaded");

        Ok(NamesRun {
            peoples: rows.len(),
            names: names.len(),
            object_key,
            local_path,
        })
    }
}
