//! Candidate photos: one TSE archive per (year, state), each image uploaded
//! individually under `<year>/<UF>/<file>.jpg`.

use super::{StepFailure, WorkflowError};
use crate::fetch::Fetcher;
use crate::sources::{render_photo_url, SourceCatalog};
use crate::storage::{BucketName, ObjectStore};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const PHOTO_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Extracted photos waiting for upload.
const MEMBER_QUEUE: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct PhotoBatch {
    pub year: String,
    pub state: String,
    pub uploaded: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PhotoRun {
    pub batches: Vec<PhotoBatch>,
    pub failures: Vec<StepFailure>,
}

impl PhotoRun {
    pub fn uploaded(&self) -> usize {
        self.batches.iter().map(|batch| batch.uploaded).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PhotoIngestor {
    fetcher: Fetcher,
    store: Arc<dyn ObjectStore>,
}

impl PhotoIngestor {
    pub fn new(fetcher: Fetcher, store: Arc<dyn ObjectStore>) -> Self {
        Self { fetcher, store }
    }

    pub async fn run(
        &self,
        catalog: &SourceCatalog,
        bucket: &BucketName,
        years: &[String],
        states: &[String],
    ) -> Result<PhotoRun, WorkflowError> {
        let templates = catalog.photo_templates(years);
        if templates.is_empty() {
            return Err(WorkflowError::NothingToDo(
                "No photo templates to process (check --years or config).".to_string(),
            ));
        }
        let states = catalog.photo_states(states);
        if states.is_empty() {
            return Err(WorkflowError::NothingToDo(
                "No states to process (check --states or config).".to_string(),
            ));
        }

        let mut run = PhotoRun::default();
        for (year, template) in &templates {
            for state in &states {
                info!(year = %year, state = %state, "downloading photos");
                let url = render_photo_url(template, state);
                match self.ingest_batch(bucket, year, state, &url).await {
                    Ok(uploaded) => {
                        info!(year = %year, state = %state, uploaded, "photos uploaded");
                        run.batches.push(PhotoBatch {
                            year: year.clone(),
                            state: state.clone(),
                            uploaded,
                        });
                    }
                    Err(err) => {
                        error!(year = %year, state = %state, error = %err, "error downloading photos");
                        run.failures
                            .push(StepFailure::new(format!("{year}/{state}"), &err));
                    }
                }
            }
        }

        Ok(run)
    }

    /// Spools the archive to disk, then uploads its images one member at a
    /// time. Decompression runs on the blocking pool and hands members over
    /// a bounded channel.
    pub async fn ingest_batch(
        &self,
        bucket: &BucketName,
        year: &str,
        state: &str,
        url: &str,
    ) -> Result<usize, WorkflowError> {
        let spooled = self.fetcher.download_to_tempfile(url).await?;
        let archive = spooled.reopen()?;
        let prefix = format!("{year}/{state}");
        let (tx, mut rx) = mpsc::channel(MEMBER_QUEUE);
        let extraction = tokio::task::spawn_blocking(move || {
            let result = extract_photos(archive, &prefix, &tx);
            drop(spooled);
            result
        });

        let mut uploaded = 0usize;
        while let Some(PhotoMember { object_key, body }) = rx.recv().await {
            let content_type = mime_guess::from_path(&object_key).first_or_octet_stream();
            self.store
                .put(bucket, &object_key, body, content_type.as_ref())
                .await?;
            debug!(key = %object_key, "photo uploaded");
            uploaded += 1;
        }

        extraction
            .await
            .map_err(|err| WorkflowError::Io(std::io::Error::other(err)))??;
        Ok(uploaded)
    }
}

#[derive(Debug)]
struct PhotoMember {
    object_key: String,
    body: Vec<u8>,
}

/// Blocking: reads every image member of the archive and sends it as
/// `<prefix>/<basename>`. Stops quietly once the receiver is gone.
fn extract_photos(
    file: File,
    prefix: &str,
    tx: &mpsc::Sender<PhotoMember>,
) -> Result<(), WorkflowError> {
    let mut archive = zip::ZipArchive::new(file)?;
    for index in 0..archive.len() {
        let mut member = archive.by_index(index)?;
        if member.is_dir() || !is_photo(member.name()) {
            continue;
        }
        let object_key = format!("{prefix}/{}", clean_basename(member.name()));
        let mut body = Vec::with_capacity(usize::try_from(member.size()).unwrap_or(0));
        member.read_to_end(&mut body)?;
        if tx.blocking_send(PhotoMember { object_key, body }).is_err() {
            break;
        }
    }
    Ok(())
}

fn is_photo(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PHOTO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Strips directories from an archive member name and normalizes `.jpeg` /
/// `.JPG` to `.jpg`.
pub fn clean_basename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let lower = base.to_ascii_lowercase();
    for ext in [".jpeg", ".jpg"] {
        if lower.ends_with(ext) {
            return format!("{}.jpg", &base[..base.len() - ext.len()]);
        }
    }
    base.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_basename_strips_dirs_and_normalizes_jpeg() {
        assert_eq!(clean_basename("fotos/AC/FAC010001.JPEG"), "FAC010001.jpg");
        assert_eq!(clean_basename("FAC010002.JPG"), "FAC010002.jpg");
        assert_eq!(clean_basename("dir\\FAC010003.jpg"), "FAC010003.jpg");
        assert_eq!(clean_basename("nested/FAC010004.png"), "FAC010004.png");
    }

    #[test]
    fn only_images_are_photos() {
        assert!(is_photo("a/b/FAC1.JPG"));
        assert!(is_photo("FAC1.png"));
        assert!(!is_photo("leia-me.pdf"));
        assert!(!is_photo("jpg"));
    }

    fn archive_file(members: &[(&str, &[u8])]) -> File {
        let mut writer = zip::ZipWriter::new(tempfile::tempfile().expect("temp archive"));
        for (name, body) in members {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .expect("start member");
            std::io::Write::write_all(&mut writer, body).expect("write member");
        }
        writer.finish().expect("finish zip")
    }

    #[test]
    fn extract_photos_sends_images_under_prefix() {
        let file = archive_file(&[
            ("fotos/FAC1.JPEG", b"a"),
            ("leia-me.pdf", b"b"),
            ("FAC2.png", b"c"),
        ]);
        let (tx, mut rx) = mpsc::channel(4);
        extract_photos(file, "2020/AC", &tx).expect("archive reads");
        drop(tx);

        let mut keys = Vec::new();
        while let Some(member) = rx.blocking_recv() {
            keys.push(member.object_key);
        }
        assert_eq!(keys, vec!["2020/AC/FAC1.jpg", "2020/AC/FAC2.png"]);
    }

    #[test]
    fn extract_photos_stops_when_uploads_stop() {
        let file = archive_file(&[("FAC1.jpg", b"a"), ("FAC2.jpg", b"b")]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        extract_photos(file, "2020/AC", &tx).expect("closed channel is not an error");
    }
}
