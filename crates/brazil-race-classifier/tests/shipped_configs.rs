//! The configuration files committed under `configs/` must stay loadable and
//! valid: the YAML parses, keys are unique and every URL is well formed.

use brazil_race_classifier::sources::{SourceCatalog, SourceCatalogError};
use brazil_race_classifier::workflows::cleaning::CleaningSchema;

const TSE_URLS: &str = include_str!("../../../configs/tse_urls.yaml");
const CLEANING_SCHEMA: &str = include_str!("../../../configs/cleaning_schema.yaml");

#[test]
fn shipped_catalog_is_valid() {
    let catalog = SourceCatalog::from_yaml_str(TSE_URLS).expect("catalog parses");
    let report = catalog.validate();
    assert!(report.is_valid(), "catalog issues: {:?}", report.issues);
    assert!(report.urls_checked >= catalog.candidates.len() + catalog.photos.templates.len());
}

#[test]
fn shipped_catalog_covers_every_photo_year_with_candidates() {
    let catalog = SourceCatalog::from_yaml_str(TSE_URLS).expect("catalog parses");
    for year in catalog.photos.templates.keys() {
        assert!(
            catalog.candidates.contains_key(year),
            "photos for {year} have no candidate table"
        );
    }
    assert_eq!(catalog.photo_states(&[]).len(), 9);
}

#[test]
fn shipped_schema_loads_and_keeps_state_column() {
    let schema = CleaningSchema::from_yaml_str(CLEANING_SCHEMA).expect("schema parses");
    assert!(schema.target_columns().contains(&"state"));
    schema.output_encoding().expect("known encoding");
}

#[test]
fn duplicate_catalog_keys_fail_to_parse() {
    let duplicated = format!("{TSE_URLS}\ncandidates:\n  2030: https://example.org/consulta_cand_2030.zip\n");
    let error = SourceCatalog::from_yaml_str(&duplicated).expect_err("duplicate top-level key");
    assert!(matches!(error, SourceCatalogError::Yaml(_)));
}
