//! The TSE source catalog (`configs/tse_urls.yaml`).
//!
//! The catalog maps logical keys (election year, data category) to URLs on the
//! TSE open-data portal. It is edited by hand and only ever read at runtime.

mod unique_map;
mod validation;

pub use unique_map::UniqueMap;
pub use validation::{is_brazilian_state, SourceIssue, ValidationReport, BRAZILIAN_STATES};

use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Placeholder substituted with a state code in photo URL templates.
pub const STATE_PLACEHOLDER: &str = "{UF}";

pub const DEFAULT_CATALOG_PATH: &str = "configs/tse_urls.yaml";

#[derive(Debug, thiserror::Error)]
pub enum SourceCatalogError {
    #[error("failed to read source catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid source catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDefaults {
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(flatten)]
    pub unknown: UniqueMap<serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoSources {
    /// Overrides `defaults.states` for photo downloads when present.
    #[serde(default)]
    pub states: Option<Vec<String>>,
    /// Year -> URL template containing `{UF}`.
    #[serde(default)]
    pub templates: UniqueMap<String>,
    #[serde(flatten)]
    pub unknown: UniqueMap<serde_yaml::Value>,
}

/// Keys the catalog does not use are kept in `unknown` fields rather than
/// rejected, and reported by [`SourceCatalog::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceCatalog {
    #[serde(default)]
    pub defaults: CatalogDefaults,
    /// Year -> candidate ZIP URL.
    #[serde(default)]
    pub candidates: UniqueMap<String>,
    #[serde(default)]
    pub photos: PhotoSources,
    /// Free-form named URLs (e.g. the ISA peoples table).
    #[serde(default)]
    pub sources: UniqueMap<String>,
    #[serde(flatten)]
    pub unknown: UniqueMap<serde_yaml::Value>,
}

impl SourceCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SourceCatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SourceCatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, SourceCatalogError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> ValidationReport {
        validation::validate(self)
    }

    /// Candidate URLs sorted by year, restricted to `years` when it is non-empty.
    pub fn candidate_urls(&self, years: &[String]) -> Vec<(String, String)> {
        select_years(&self.candidates, years)
    }

    /// Photo templates sorted by year, restricted to `years` when it is non-empty.
    pub fn photo_templates(&self, years: &[String]) -> Vec<(String, String)> {
        select_years(&self.photos.templates, years)
    }

    /// States for photo downloads: `photos.states`, else `defaults.states`,
    /// upper-cased and narrowed to `only` when it is non-empty.
    pub fn photo_states(&self, only: &[String]) -> Vec<String> {
        let configured = self
            .photos
            .states
            .as_ref()
            .unwrap_or(&self.defaults.states);
        let wanted: Vec<String> = only.iter().map(|state| normalize_state(state)).collect();

        configured
            .iter()
            .map(|state| normalize_state(state))
            .filter(|state| wanted.is_empty() || wanted.contains(state))
            .collect()
    }
}

fn select_years(map: &UniqueMap<String>, years: &[String]) -> Vec<(String, String)> {
    let wanted: Vec<&str> = years.iter().map(|year| year.trim()).collect();
    let mut selected: Vec<(String, String)> = map
        .iter()
        .filter(|(year, _)| wanted.is_empty() || wanted.contains(year))
        .map(|(year, url)| (year.to_string(), url.to_string()))
        .collect();
    selected.sort_by(|a, b| a.0.cmp(&b.0));
    selected
}

pub fn normalize_state(state: &str) -> String {
    state.trim().to_ascii_uppercase()
}

/// Fills the `{UF}` placeholder of a photo template.
pub fn render_photo_url(template: &str, state: &str) -> String {
    template.replace(STATE_PLACEHOLDER, state)
}

fn candidate_stem_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"consulta_cand_(\d{4})").expect("candidate stem pattern is valid")
    })
}

/// `consulta_cand_<year>` as found in a TSE candidates archive URL.
pub fn candidate_archive_stem(url: &str) -> Option<&str> {
    candidate_stem_pattern()
        .find(url)
        .map(|found| found.as_str())
}

/// Year embedded in a TSE candidates archive URL.
pub fn candidate_archive_year(url: &str) -> Option<&str> {
    candidate_stem_pattern()
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|year| year.as_str())
}

/// Name of the per-scope CSV inside a candidates archive, e.g.
/// `consulta_cand_2024_BRASIL.csv`.
pub fn candidate_member_name(url: &str, scope: &str) -> Option<String> {
    candidate_archive_stem(url).map(|stem| format!("{stem}_{}.csv", scope.to_ascii_uppercase()))
}
