use super::{BucketName, ObjectListing, ObjectStore, StorageError};
use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Google Cloud Storage through the JSON API, authenticated with a bearer token
/// (for example `gcloud auth print-access-token`).
pub struct GcsObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
    project: Option<String>,
}

impl std::fmt::Debug for GcsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsObjectStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(default)]
    prefixes: Vec<String>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

impl GcsObjectStore {
    /// Requests share the timeout and user agent of `http`, so a stalled
    /// upload or listing fails instead of hanging the run.
    pub fn new(
        endpoint: &str,
        token: String,
        project: Option<String>,
        http: &HttpConfig,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| StorageError::Backend(format!("invalid endpoint '{endpoint}': {err}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(StorageError::Backend(format!(
                "endpoint '{endpoint}' cannot carry a path"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(http.timeout)
            .user_agent(http.user_agent.clone())
            .build()
            .map_err(|err| StorageError::Backend(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint,
            token,
            project,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if let Some(project) = &self.project {
            url.query_pairs_mut().append_pair("userProject", project);
        }
        url
    }

    fn object_url(&self, bucket: &BucketName, key: &str) -> Url {
        self.url(&["storage", "v1", "b", bucket.as_str(), "o", key])
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<Response, StorageError> {
        self.authorized(builder)
            .send()
            .await
            .map_err(|err| StorageError::Backend(format!("{operation}: {err}")))
    }

    async fn status_error(operation: &'static str, response: Response) -> StorageError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StorageError::Status {
            operation,
            status,
            body,
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(
        &self,
        bucket: &BucketName,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", bucket.as_str(), "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        let size = body.len();
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let response = self.send("upload", request).await?;
        if !response.status().is_success() {
            return Err(Self::status_error("upload", response).await);
        }

        debug!(bucket = %bucket, key, bytes = size, "uploaded object");
        Ok(())
    }

    async fn get(&self, bucket: &BucketName, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut url = self.object_url(bucket, key);
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.send("download", self.client.get(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            status if status.is_success() => response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|err| StorageError::Backend(format!("download: {err}"))),
            _ => Err(Self::status_error("download", response).await),
        }
    }

    async fn exists(&self, bucket: &BucketName, key: &str) -> Result<bool, StorageError> {
        let url = self.object_url(bucket, key);
        let response = self.send("metadata", self.client.get(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::status_error("metadata", response).await),
        }
    }

    async fn list(
        &self,
        bucket: &BucketName,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<ObjectListing, StorageError> {
        let mut listing = ObjectListing::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&["storage", "v1", "b", bucket.as_str(), "o"]);
            {
                let mut query = url.query_pairs_mut();
                if let Some(prefix) = prefix {
                    query.append_pair("prefix", prefix);
                }
                if let Some(delimiter) = delimiter {
                    query.append_pair("delimiter", delimiter);
                }
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.send("list", self.client.get(url)).await?;
            if !response.status().is_success() {
                return Err(Self::status_error("list", response).await);
            }
            let page: ListPage = response
                .json()
                .await
                .map_err(|err| StorageError::Backend(format!("list: {err}")))?;

            listing
                .objects
                .extend(page.items.into_iter().map(|item| item.name));
            listing.prefixes.extend(page.prefixes);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(listing.normalize())
    }
}
