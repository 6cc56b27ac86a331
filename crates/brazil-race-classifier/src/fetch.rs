use crate::config::HttpConfig;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download file from {url}. Status code: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to buffer download from {url}: {source}")]
    Spool {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// HTTP client for the public TSE and ISA endpoints.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        let body = response.bytes().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        debug!(url, bytes = body.len(), "download complete");
        Ok(body.to_vec())
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }

    /// Streams the body into a temp file so large archives never sit in memory.
    /// The file is deleted when the returned handle is dropped.
    pub async fn download_to_tempfile(&self, url: &str) -> Result<NamedTempFile, FetchError> {
        let spool_error = |source: std::io::Error| FetchError::Spool {
            url: url.to_string(),
            source,
        };

        let mut response = self.get(url).await?;
        let mut file = tempfile::Builder::new()
            .prefix("tse_zip_")
            .suffix(".zip")
            .tempfile()
            .map_err(spool_error)?;

        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })? {
            file.write_all(&chunk).map_err(spool_error)?;
            written += chunk.len();
        }
        file.flush().map_err(spool_error)?;

        debug!(url, bytes = written, path = %file.path().display(), "download spooled");
        Ok(file)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Read;

    fn fetcher() -> Fetcher {
        Fetcher::new(&HttpConfig::default()).expect("client builds")
    }

    #[tokio::test]
    async fn fetch_bytes_returns_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/file.zip");
                then.status(200).body("payload");
            })
            .await;

        let body = fetcher()
            .fetch_bytes(&server.url("/file.zip"))
            .await
            .expect("download succeeds");
        assert_eq!(body, b"payload");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.zip");
                then.status(404);
            })
            .await;

        let error = fetcher()
            .fetch_text(&server.url("/missing.zip"))
            .await
            .expect_err("404 is an error");
        match error {
            FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 404),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_to_tempfile_spools_the_body() {
        let server = MockServer::start_async().await;
        let payload = vec![7u8; 64 * 1024];
        server
            .mock_async(|when, then| {
                when.method(GET).path("/big.zip");
                then.status(200).body(payload.clone());
            })
            .await;

        let file = fetcher()
            .download_to_tempfile(&server.url("/big.zip"))
            .await
            .expect("download succeeds");
        let mut contents = Vec::new();
        std::fs::File::open(file.path())
            .expect("temp file exists")
            .read_to_end(&mut contents)
            .expect("temp file readable");
        assert_eq!(contents, payload);

        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists(), "temp file removed on drop");
    }
}
