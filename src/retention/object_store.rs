//! Object Store Contract
//!
//! The narrow surface the pipeline needs from a bucketed blob store. Production
//! deployments talk to an S3-compatible store (MinIO) through `S3ObjectStore`.
//! `FsObjectStore` serves frames from a shared directory and the in-memory store
//! backs tests and single-node runs.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::TryStreamExt;
use object_store::ObjectStore as RemoteStore;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{PutPayload, RetryConfig};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStat {
    Exists { size: u64 },
    NotFound,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<()>;

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    /// Deleting an absent object succeeds.
    async fn delete(&self, bucket: &str, path: &str) -> Result<()>;

    /// Paths under `prefix`, sorted.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    async fn stat(&self, bucket: &str, path: &str) -> Result<ObjectStat>;

    /// Copies within one bucket. Stores with a server-side copy override this.
    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        let bytes = self.get(bucket, from).await?;
        self.put(bucket, to, bytes).await
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<(String, String), Vec<u8>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(bucket: &str, path: &str) -> (String, String) {
        (bucket.to_string(), path.trim_start_matches('/').to_string())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects.insert(Self::key(bucket, path), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.objects
            .get(&Self::key(bucket, path))
            .map(|entry| entry.value().clone())
            .with_context(|| format!("object {}/{} not found", bucket, path))
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        self.objects.remove(&Self::key(bucket, path));
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_start_matches('/');
        let mut paths: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket && entry.key().1.starts_with(prefix))
            .map(|entry| entry.key().1.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn stat(&self, bucket: &str, path: &str) -> Result<ObjectStat> {
        Ok(match self.objects.get(&Self::key(bucket, path)) {
            Some(entry) => ObjectStat::Exists {
                size: entry.value().len() as u64,
            },
            None => ObjectStat::NotFound,
        })
    }
}

/// Buckets are directories under `root`; object paths are relative file paths.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if bucket.is_empty() || bucket.contains('/') || escapes {
            bail!("refusing object path {}/{}", bucket, path);
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<()> {
        let full = self.resolve(bucket, path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .with_context(|| format!("writing {}", full.display()))
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(bucket, path)?;
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("reading {}", full.display()))
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        let full = self.resolve(bucket, path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {}", full.display())),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_root = self.resolve(bucket, "")?;
        let prefix = prefix.trim_start_matches('/');
        let mut paths = Vec::new();
        let mut pending = vec![bucket_root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
            };

            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                let Ok(relative) = entry_path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if relative.starts_with(prefix) {
                    paths.push(relative);
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    async fn stat(&self, bucket: &str, path: &str) -> Result<ObjectStat> {
        let full = self.resolve(bucket, path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok(ObjectStat::Exists { size: meta.len() }),
            Ok(_) => Ok(ObjectStat::NotFound),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ObjectStat::NotFound),
            Err(e) => Err(e).with_context(|| format!("stat {}", full.display())),
        }
    }
}

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    /// Falls back to the `AWS_*` environment when unset.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
}

/// Path-style S3 client. One underlying client per bucket, built on first use.
pub struct S3ObjectStore {
    settings: S3Settings,
    clients: DashMap<String, Arc<AmazonS3>>,
}

impl S3ObjectStore {
    pub fn new(settings: S3Settings) -> Self {
        Self {
            settings,
            clients: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    fn client(&self, bucket: &str) -> Result<Arc<AmazonS3>> {
        if let Some(client) = self.clients.get(bucket) {
            return Ok(client.value().clone());
        }
        if bucket.is_empty() || bucket.contains('/') {
            bail!("invalid bucket name {:?}", bucket);
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_endpoint(&self.settings.endpoint)
            .with_region(&self.settings.region)
            .with_bucket_name(bucket)
            .with_allow_http(self.settings.allow_http)
            .with_retry(RetryConfig {
                max_retries: 2,
                retry_timeout: Duration::from_secs(10),
                ..Default::default()
            });
        if let Some(key) = &self.settings.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &self.settings.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let client = Arc::new(
            builder
                .build()
                .with_context(|| format!("building S3 client for bucket {}", bucket))?,
        );
        self.clients.insert(bucket.to_string(), client.clone());
        tracing::debug!(
            "S3 client ready for bucket {} at {}",
            bucket,
            self.settings.endpoint
        );
        Ok(client)
    }

    /// Rejects empty, `.` and `..` segments.
    fn location(path: &str) -> Result<ObjectPath> {
        ObjectPath::parse(path.trim_start_matches('/'))
            .with_context(|| format!("refusing object path {}", path))
    }
}

fn is_not_found(e: &object_store::Error) -> bool {
    matches!(e, object_store::Error::NotFound { .. })
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<()> {
        let location = Self::location(path)?;
        self.client(bucket)?
            .put(&location, PutPayload::from(bytes))
            .await
            .with_context(|| format!("uploading {}/{}", bucket, path))?;
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let location = Self::location(path)?;
        let object = self
            .client(bucket)?
            .get(&location)
            .await
            .with_context(|| format!("fetching {}/{}", bucket, path))?;
        let bytes = object
            .bytes()
            .await
            .with_context(|| format!("reading {}/{}", bucket, path))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        let location = Self::location(path)?;
        match self.client(bucket)?.delete(&location).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {}/{}", bucket, path)),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_start_matches('/');
        // Listing is per path segment; list the enclosing directory and filter.
        let directory = match prefix.rfind('/') {
            Some(idx) => Some(Self::location(&prefix[..idx])?),
            None => None,
        };

        let objects: Vec<_> = self
            .client(bucket)?
            .list(directory.as_ref())
            .try_collect()
            .await
            .with_context(|| format!("listing {}/{}", bucket, prefix))?;

        let mut paths: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .filter(|path| path.starts_with(prefix))
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn stat(&self, bucket: &str, path: &str) -> Result<ObjectStat> {
        let location = Self::location(path)?;
        match self.client(bucket)?.head(&location).await {
            Ok(meta) => Ok(ObjectStat::Exists {
                size: meta.size as u64,
            }),
            Err(e) if is_not_found(&e) => Ok(ObjectStat::NotFound),
            Err(e) => Err(e).with_context(|| format!("stat {}/{}", bucket, path)),
        }
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        let source = Self::location(from)?;
        let target = Self::location(to)?;
        self.client(bucket)?
            .copy(&source, &target)
            .await
            .with_context(|| format!("copying {}/{} to {}", bucket, from, to))
    }
}
