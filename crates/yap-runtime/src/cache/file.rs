//! Filesystem cache driver
//!
//! Entries live at `<dir>/<group>/<hash>.json` as `{value, expires_at}`.
//! Expired entries are deleted when read, never swept.

use super::{expiry, is_expired, CacheDriver, CachedPayload};
use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use yap_core::group::slugify;

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    expires_at: Option<u64>,
}

pub struct FileDriver {
    dir: PathBuf,
}

impl FileDriver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        let slug = slugify(group);
        self.dir.join(if slug.is_empty() { "default".to_string() } else { slug })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let (group, hash) = key.split_once(':').unwrap_or(("", key));
        self.group_dir(group).join(format!("{}.json", slugify(hash)))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> RuntimeError {
    RuntimeError::Cache(format!("{}: {}", path.display(), err))
}

#[async_trait::async_trait]
impl CacheDriver for FileDriver {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedPayload>> {
        let path = self.entry_path(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let entry: FileEntry = serde_json::from_str(&raw)?;
        if is_expired(entry.expires_at) {
            debug!("Removing expired cache file {}", path.display());
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&path, e)),
            }
            return Ok(None);
        }
        Ok(Some(CachedPayload::new(entry.value, entry.expires_at)))
    }

    async fn set(&self, key: &str, payload: &str, ttl: u64) -> Result<()> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let entry = FileEntry {
            value: payload.to_string(),
            expires_at: expiry(ttl),
        };
        tokio::fs::write(&path, serde_json::to_vec(&entry)?)
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn flush(&self, group: Option<&str>) -> Result<()> {
        let target = match group {
            Some(group) => self.group_dir(group),
            None => self.dir.clone(),
        };
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&target, e)),
        }
    }
}
