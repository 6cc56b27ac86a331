use super::{BucketName, ObjectListing, ObjectStore, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Buckets as directories under `root`: `<root>/<bucket>/<key>`.
/// Handy for offline runs and for tests.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn bucket_dir(&self, bucket: &BucketName) -> PathBuf {
        self.root.join(bucket.as_str())
    }

    fn object_path(&self, bucket: &BucketName, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if key.is_empty() || escapes {
            return Err(StorageError::Backend(format!(
                "object key '{key}' is not a relative path"
            )));
        }
        Ok(self.bucket_dir(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        bucket: &BucketName,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn get(&self, bucket: &BucketName, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, bucket: &BucketName, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(bucket, key)?;
        Ok(tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false))
    }

    async fn list(
        &self,
        bucket: &BucketName,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<ObjectListing, StorageError> {
        let bucket_dir = self.bucket_dir(bucket);
        let mut keys = Vec::new();
        collect_keys(&bucket_dir, &bucket_dir, &mut keys).await?;

        let prefix = prefix.unwrap_or("");
        let mut listing = ObjectListing::default();
        for key in keys.into_iter().filter(|key| key.starts_with(prefix)) {
            let rest = &key[prefix.len()..];
            match delimiter.and_then(|delim| rest.find(delim).map(|idx| idx + delim.len())) {
                Some(end) => listing.prefixes.push(format!("{prefix}{}", &rest[..end])),
                None => listing.objects.push(key),
            }
        }

        Ok(listing.normalize())
    }
}

/// Walks `dir` and records every file as a `/`-separated key relative to `base`.
async fn collect_keys(base: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), StorageError> {
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            if let Ok(relative) = path.strip_prefix(base) {
                let key = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> BucketName {
        BucketName::parse("gs://raw").expect("bucket")
    }

    #[tokio::test]
    async fn put_then_get_roundtrips_nested_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path());
        store
            .put(&bucket(), "2020/AC/photo.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .expect("put succeeds");

        assert!(dir.path().join("raw/2020/AC/photo.jpg").is_file());
        assert_eq!(
            store.get(&bucket(), "2020/AC/photo.jpg").await.expect("get"),
            vec![1, 2, 3]
        );
        assert!(store.exists(&bucket(), "2020/AC/photo.jpg").await.expect("exists"));
        assert!(!store.exists(&bucket(), "2020/AC/other.jpg").await.expect("exists"));
    }

    #[tokio::test]
    async fn list_groups_by_delimiter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path());
        for key in [
            "2016/candidates_2016.csv",
            "2020/candidates_2020.csv",
            "2020/extra/notes.csv",
            "README.txt",
        ] {
            store
                .put(&bucket(), key, b"x".to_vec(), "text/plain")
                .await
                .expect("put");
        }

        let top = store
            .list(&bucket(), None, Some("/"))
            .await
            .expect("list");
        assert_eq!(top.prefixes, vec!["2016/", "2020/"]);
        assert_eq!(top.objects, vec!["README.txt"]);

        let nested = store
            .list(&bucket(), Some("2020/"), None)
            .await
            .expect("list");
        assert_eq!(
            nested.objects,
            vec!["2020/candidates_2020.csv", "2020/extra/notes.csv"]
        );
    }

    #[tokio::test]
    async fn missing_bucket_lists_empty_and_get_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path());
        let listing = store.list(&bucket(), None, Some("/")).await.expect("list");
        assert_eq!(listing, ObjectListing::default());

        let error = store.get(&bucket(), "nope.csv").await.expect_err("missing");
        assert!(matches!(error, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_bucket() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path());
        let error = store
            .put(&bucket(), "../outside.csv", Vec::new(), "text/csv")
            .await
            .expect_err("escape rejected");
        assert!(matches!(error, StorageError::Backend(_)));
    }
}
