//! Raw candidate registrations: one TSE archive per election year, re-emitted
//! as a comma-separated Latin-1 CSV under `<year>/candidates_<year>.csv`.

use super::text_encoding::{decode, encode, tse_encoding};
use super::{StepFailure, WorkflowError};
use crate::fetch::Fetcher;
use crate::sources::{candidate_member_name, SourceCatalog};
use crate::storage::{BucketName, ObjectStore};
use serde::Serialize;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::{error, info};

/// The archives carry one CSV per state plus a nationwide one.
pub const NATIONWIDE_SCOPE: &str = "BRASIL";

#[derive(Debug, Clone, Serialize)]
pub struct UploadedYear {
    pub year: String,
    pub object_key: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CandidateRun {
    pub uploaded: Vec<UploadedYear>,
    pub failures: Vec<StepFailure>,
}

impl CandidateRun {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub fn raw_object_key(year: &str) -> String {
    format!("{year}/candidates_{year}.csv")
}

#[derive(Debug, Clone)]
pub struct CandidateIngestor {
    fetcher: Fetcher,
    store: Arc<dyn ObjectStore>,
}

impl CandidateIngestor {
    pub fn new(fetcher: Fetcher, store: Arc<dyn ObjectStore>) -> Self {
        Self { fetcher, store }
    }

    /// Processes every selected year. A failing year is logged and recorded
    /// but does not stop the others.
    pub async fn run(
        &self,
        catalog: &SourceCatalog,
        bucket: &BucketName,
        years: &[String],
    ) -> CandidateRun {
        let selected = catalog.candidate_urls(years);
        let total = selected.len();
        let mut run = CandidateRun::default();

        for (index, (year, url)) in selected.into_iter().enumerate() {
            info!(year = %year, progress = %format!("{}/{}", index + 1, total), "downloading candidates data");
            match self.ingest_year(bucket, &year, &url).await {
                Ok(uploaded) => {
                    info!(year = %year, rows = uploaded.rows, key = %uploaded.object_key, "candidates uploaded");
                    run.uploaded.push(uploaded);
                }
                Err(err) => {
                    error!(year = %year, error = %err, "error processing year");
                    run.failures.push(StepFailure::new(year, &err));
                }
            }
        }

        run
    }

    pub async fn ingest_year(
        &self,
        bucket: &BucketName,
        year: &str,
        url: &str,
    ) -> Result<UploadedYear, WorkflowError> {
        let member = candidate_member_name(url, NATIONWIDE_SCOPE).ok_or_else(|| {
            WorkflowError::UnrecognizedArchive {
                url: url.to_string(),
            }
        })?;

        let archive = self.fetcher.fetch_bytes(url).await?;
        let raw_csv = extract_member(&archive, &member)?;
        let (body, rows) = transcode_candidates_csv(&raw_csv)?;

        let object_key = raw_object_key(year);
        self.store
            .put(bucket, &object_key, body, mime::TEXT_CSV.as_ref())
            .await?;

        Ok(UploadedYear {
            year: year.to_string(),
            object_key,
            rows,
        })
    }
}

fn extract_member(archive: &[u8], member: &str) -> Result<Vec<u8>, WorkflowError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut file = match zip.by_name(member) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(WorkflowError::MissingMember {
                member: member.to_string(),
            })
        }
        Err(err) => return Err(err.into()),
    };

    let mut contents = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Converts a TSE export (`;`-separated, Latin-1) into a `,`-separated Latin-1
/// CSV. Returns the bytes and the number of data rows.
pub fn transcode_candidates_csv(raw: &[u8]) -> Result<(Vec<u8>, usize), WorkflowError> {
    let text = decode(raw, tse_encoding());
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::with_capacity(text.len()));

    let mut records = 0usize;
    for record in reader.records() {
        writer.write_record(&record?)?;
        records += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| WorkflowError::Io(err.into_error()))?;
    let utf8 = String::from_utf8_lossy(&bytes);
    Ok((encode(&utf8, tse_encoding()), records.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in members {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .expect("start member");
            writer.write_all(body).expect("write member");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn transcodes_semicolons_and_keeps_latin1() {
        let raw = encode(
            "\"SG_UF\";\"NM_CANDIDATO\"\n\"AC\";\"JOSÉ; DA SILVA\"\n\"PA\";\"MARIA\"\n",
            tse_encoding(),
        );
        let (body, rows) = transcode_candidates_csv(&raw).expect("transcodes");
        assert_eq!(rows, 2);
        assert_eq!(
            decode(&body, tse_encoding()),
            "SG_UF,NM_CANDIDATO\nAC,JOSÉ; DA SILVA\nPA,MARIA\n"
        );
        assert!(body.contains(&0xC9), "É stays a single Latin-1 byte");
    }

    #[test]
    fn extract_member_reports_missing_file() {
        let archive = zip_with(&[("consulta_cand_2020_AC.csv", b"x")]);
        let error =
            extract_member(&archive, "consulta_cand_2020_BRASIL.csv").expect_err("missing member");
        match error {
            WorkflowError::MissingMember { member } => {
                assert_eq!(member, "consulta_cand_2020_BRASIL.csv")
            }
            other => panic!("expected missing member, got {other:?}"),
        }
    }

    #[test]
    fn extract_member_reads_requested_file() {
        let archive = zip_with(&[
            ("consulta_cand_2020_AC.csv", b"ac"),
            ("consulta_cand_2020_BRASIL.csv", b"brasil"),
        ]);
        let body = extract_member(&archive, "consulta_cand_2020_BRASIL.csv").expect("member");
        assert_eq!(body, b"brasil");
    }

    #[test]
    fn raw_object_key_is_year_scoped() {
        assert_eq!(raw_object_key("2024"), "2024/candidates_2024.csv");
    }
}
