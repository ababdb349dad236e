//! History of analysis records, keyed by content fingerprint.
//!
//! The pipeline reads history before analyzing and writes every new record
//! back. Records are deterministic for a given text, so concurrent writers
//! for one fingerprint may overwrite each other freely.
//!
//! Two stores ship: [`MemoryHistory`] for a long-lived process and
//! [`FileHistory`], which keeps one JSON file per record so history survives
//! across CLI invocations. [`open_store`] picks one from [`HistoryConfig`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use thiserror::Error;

use termscope_core::{AnalysisRecord, Fingerprint};

use crate::config::HistoryConfig;

/// Default number of records listed.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Upper bound on one listing.
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),

    #[error("stored record unreadable: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// A non-stale record for the fingerprint, if any.
    async fn get_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Arc<AnalysisRecord>>, HistoryError>;

    async fn put(&self, record: Arc<AnalysisRecord>) -> Result<(), HistoryError>;

    /// Most recent records first, at most `limit` (clamped to [1, 100]).
    async fn list_recent(&self, limit: usize) -> Result<Vec<Arc<AnalysisRecord>>, HistoryError>;
}

/// Whether a record generated at `generated_at` has outlived `ttl` at `now`.
pub fn is_stale(generated_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now.signed_duration_since(generated_at) > ttl,
        Err(_) => false,
    }
}

pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIST_LIMIT)
}

/// In-process history backed by a moka cache with a TTL.
pub struct MemoryHistory {
    cache: Cache<String, Arc<AnalysisRecord>>,
    ttl: Duration,
}

impl MemoryHistory {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache, ttl }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn get_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Arc<AnalysisRecord>>, HistoryError> {
        let key = fingerprint.as_str();
        let Some(record) = self.cache.get(key).await else {
            return Ok(None);
        };
        if is_stale(record.generated_at, self.ttl, Utc::now()) {
            self.cache.invalidate(key).await;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn put(&self, record: Arc<AnalysisRecord>) -> Result<(), HistoryError> {
        self.cache
            .insert(record.content_fingerprint.as_str().to_string(), record)
            .await;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Arc<AnalysisRecord>>, HistoryError> {
        let now = Utc::now();
        let mut records: Vec<Arc<AnalysisRecord>> = self
            .cache
            .iter()
            .map(|(_, record)| record)
            .filter(|record| !is_stale(record.generated_at, self.ttl, now))
            .collect();
        records.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| a.content_fingerprint.as_str().cmp(b.content_fingerprint.as_str()))
        });
        records.truncate(clamp_limit(limit));
        Ok(records)
    }
}

/// History persisted under a directory as `<fingerprint>.json` files.
///
/// Each record is written to a temporary file and renamed into place, so a
/// reader sees either the old record or the new one.
pub struct FileHistory {
    dir: PathBuf,
    max_entries: u64,
    ttl: Duration,
}

impl FileHistory {
    /// Open (and create if needed) a history directory.
    pub fn open(dir: impl Into<PathBuf>, max_entries: u64, ttl: Duration) -> Result<Self, HistoryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, e))?;
        Ok(Self { dir, max_entries, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint.as_str()))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<AnalysisRecord>, HistoryError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| HistoryError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    /// Paths of stored records with their modification times.
    async fn entries(&self) -> Result<Vec<(PathBuf, SystemTime)>, HistoryError> {
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| unavailable(&self.dir, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| unavailable(&self.dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => SystemTime::UNIX_EPOCH,
            };
            entries.push((path, modified));
        }
        Ok(entries)
    }

    /// Drop the least recently written files beyond `max_entries`.
    async fn prune(&self) -> Result<(), HistoryError> {
        let mut entries = self.entries().await?;
        let limit = usize::try_from(self.max_entries).unwrap_or(usize::MAX);
        if entries.len() <= limit {
            return Ok(());
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        let excess = entries.len() - limit;
        for (path, _) in entries.into_iter().take(excess) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to prune history entry");
            }
        }
        Ok(())
    }
}

fn unavailable(path: &Path, error: std::io::Error) -> HistoryError {
    HistoryError::Unavailable(format!("{}: {}", path.display(), error))
}

#[async_trait]
impl HistoryStore for FileHistory {
    async fn get_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Arc<AnalysisRecord>>, HistoryError> {
        let path = self.record_path(fingerprint);
        let Some(record) = self.read_record(&path).await? else {
            return Ok(None);
        };
        if is_stale(record.generated_at, self.ttl, Utc::now()) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::debug!(path = %path.display(), error = %e, "Stale history entry not removed");
            }
            return Ok(None);
        }
        Ok(Some(Arc::new(record)))
    }

    async fn put(&self, record: Arc<AnalysisRecord>) -> Result<(), HistoryError> {
        let path = self.record_path(&record.content_fingerprint);
        let staged = path.with_extension(format!("json.{}.tmp", std::process::id()));
        let bytes = serde_json::to_vec(&*record)
            .map_err(|e| HistoryError::Corrupt(format!("{}: {}", path.display(), e)))?;

        tokio::fs::write(&staged, bytes)
            .await
            .map_err(|e| unavailable(&staged, e))?;
        if let Err(e) = tokio::fs::rename(&staged, &path).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(unavailable(&path, e));
        }
        self.prune().await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Arc<AnalysisRecord>>, HistoryError> {
        let now = Utc::now();
        let mut records = Vec::new();
        for (path, _) in self.entries().await? {
            match self.read_record(&path).await {
                Ok(Some(record)) if !is_stale(record.generated_at, self.ttl, now) => {
                    records.push(Arc::new(record));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable history entry"),
            }
        }
        records.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| a.content_fingerprint.as_str().cmp(b.content_fingerprint.as_str()))
        });
        records.truncate(clamp_limit(limit));
        Ok(records)
    }
}

/// The store named by the configuration: files under `path` when set,
/// otherwise the in-process cache.
pub fn open_store(config: &HistoryConfig) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    match &config.path {
        Some(path) => {
            let store = FileHistory::open(path, config.max_entries, config.ttl)?;
            tracing::debug!(path = %path.display(), "File history opened");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryHistory::from_config(config))),
    }
}
