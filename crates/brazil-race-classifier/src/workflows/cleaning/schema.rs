use crate::sources::UniqueMap;
use crate::workflows::text_encoding;
use encoding_rs::Encoding;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCHEMA_PATH: &str = "configs/cleaning_schema.yaml";

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read cleaning schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid cleaning schema YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Schema has no 'columns' section.")]
    NoColumns,
    #[error("columns '{first}' and '{second}' both map to '{target}'")]
    DuplicateTarget {
        target: String,
        first: String,
        second: String,
    },
    #[error("unknown output encoding '{0}'")]
    UnknownEncoding(String),
}

/// Column types a cleaned column can be coerced to. Unrecognized names leave
/// the column untouched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum DataType {
    String,
    Int,
    Float,
    Bool,
    Other(String),
}

impl From<String> for DataType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Self::String,
            "int" | "int64" | "integer" => Self::Int,
            "float" | "float64" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            _ => Self::Other(value),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTransform {
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawTransform")]
pub enum Transform {
    Lower,
    Upper,
    Strip,
    Unidecode,
    Cast(DataType),
    Unknown(String),
}

impl From<RawTransform> for Transform {
    fn from(raw: RawTransform) -> Self {
        let op = raw.op.unwrap_or_default();
        match op.trim().to_ascii_lowercase().as_str() {
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "strip" => Self::Strip,
            "unidecode" => Self::Unidecode,
            "cast" => Self::Cast(DataType::from(raw.to.unwrap_or_default())),
            _ => Self::Unknown(op),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnSpec {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub dtype: Option<DataType>,
    #[serde(default)]
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputMeta {
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for OutputMeta {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
        }
    }
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaMeta {
    #[serde(default)]
    pub output: OutputMeta,
}

/// Column selection, renaming and per-column transforms for the raw
/// candidates CSVs. Output column order follows the schema.
#[derive(Debug, Clone, Deserialize)]
pub struct CleaningSchema {
    #[serde(default)]
    pub meta: SchemaMeta,
    #[serde(default)]
    pub columns: UniqueMap<ColumnSpec>,
}

impl CleaningSchema {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_yaml::from_str(raw)?;
        schema.check()?;
        Ok(schema)
    }

    fn check(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns);
        }
        let mut seen: Vec<(&str, &str)> = Vec::with_capacity(self.columns.len());
        for (source, spec) in self.columns.iter() {
            let target = spec.target_name(source);
            if let Some((_, first)) = seen.iter().find(|(existing, _)| *existing == target) {
                return Err(SchemaError::DuplicateTarget {
                    target: target.to_string(),
                    first: first.to_string(),
                    second: source.to_string(),
                });
            }
            seen.push((target, source));
        }
        self.output_encoding()?;
        Ok(())
    }

    pub fn output_encoding(&self) -> Result<&'static Encoding, SchemaError> {
        text_encoding::resolve(&self.meta.output.encoding)
            .ok_or_else(|| SchemaError::UnknownEncoding(self.meta.output.encoding.clone()))
    }

    /// Output column names in schema order.
    pub fn target_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|(source, spec)| spec.target_name(source))
            .collect()
    }
}

impl ColumnSpec {
    pub fn target_name<'a>(&'a self, source: &'a str) -> &'a str {
        self.target.as_deref().unwrap_or(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
meta:
  output:
    encoding: latin-1
columns:
  SG_UF:
    target: state
    dtype: string
    transforms:
      - op: strip
      - op: upper
  NR_IDADE_DATA_POSSE:
    target: age
    transforms:
      - op: cast
        to: int
  NM_CANDIDATO:
    transforms:
      - op: Unidecode
      - op: titlecase
"#;

    #[test]
    fn parses_ordered_columns_and_transforms() {
        let schema = CleaningSchema::from_yaml_str(SCHEMA).expect("schema parses");
        assert_eq!(schema.target_columns(), vec!["state", "age", "NM_CANDIDATO"]);

        let name = schema.columns.get("NM_CANDIDATO").expect("column present");
        assert_eq!(
            name.transforms,
            vec![Transform::Unidecode, Transform::Unknown("titlecase".to_string())]
        );
        let age = schema.columns.get("NR_IDADE_DATA_POSSE").expect("column present");
        assert_eq!(age.transforms, vec![Transform::Cast(DataType::Int)]);
        assert!(age.dtype.is_none());

        assert_eq!(
            schema.output_encoding().expect("encoding"),
            encoding_rs::WINDOWS_1252
        );
    }

    #[test]
    fn schema_without_columns_is_rejected() {
        let error = CleaningSchema::from_yaml_str("meta: {}\n").expect_err("no columns");
        assert!(matches!(error, SchemaError::NoColumns));
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let error = CleaningSchema::from_yaml_str(
            "columns:\n  SG_UF:\n    target: state\n  SG_UE:\n    target: state\n",
        )
        .expect_err("duplicate target");
        match error {
            SchemaError::DuplicateTarget { first, second, .. } => {
                assert_eq!((first.as_str(), second.as_str()), ("SG_UF", "SG_UE"));
            }
            other => panic!("expected duplicate target, got {other:?}"),
        }
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let error = CleaningSchema::from_yaml_str(
            "meta:\n  output:\n    encoding: ebcdic-ish\ncolumns:\n  A: {}\n",
        )
        .expect_err("bad encoding");
        assert!(matches!(error, SchemaError::UnknownEncoding(_)));
    }

    #[test]
    fn unknown_dtype_is_preserved() {
        let dtype: DataType = serde_yaml::from_str("category").expect("parses");
        assert_eq!(dtype, DataType::Other("category".to_string()));
    }
}
