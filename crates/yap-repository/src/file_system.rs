//! File system based repository implementation
//!
//! One document per group, named after the group: `<group>.json`,
//! `<group>.yaml` or `<group>.yml`. Documents are written as JSON.

use crate::document::GroupDocument;
use crate::error::{RepositoryError, RepositoryResult};
use crate::traits::GroupRepository;
use async_trait::async_trait;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Directory of group documents
pub struct FileSystemRepository {
    root_path: PathBuf,
}

impl FileSystemRepository {
    /// Open an existing directory
    pub fn new<P: AsRef<Path>>(root_path: P) -> RepositoryResult<Self> {
        let path = root_path.as_ref();

        if !path.is_dir() {
            return Err(RepositoryError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let abs_path = path
            .absolutize()
            .map_err(|e| RepositoryError::Other(format!("Failed to absolutize path: {}", e)))?
            .to_path_buf();

        Ok(Self { root_path: abs_path })
    }

    /// Open a directory, creating it first when missing
    pub async fn create<P: AsRef<Path>>(root_path: P) -> RepositoryResult<Self> {
        fs::create_dir_all(root_path.as_ref()).await?;
        Self::new(root_path)
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Path a group's document is written to
    pub fn document_path(&self, group: &str) -> PathBuf {
        self.root_path.join(format!("{}.json", group))
    }

    async fn find(&self, group: &str) -> Option<PathBuf> {
        for ext in EXTENSIONS {
            let path = self.root_path.join(format!("{}.{}", group, ext));
            if fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        None
    }

    async fn read(path: &Path) -> RepositoryResult<GroupDocument> {
        let content = fs::read_to_string(path).await?;
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => GroupDocument::from_yaml(&content),
            _ => GroupDocument::from_json(&content),
        }
    }

    fn is_document(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }
}

#[async_trait]
impl GroupRepository for FileSystemRepository {
    async fn load(&self, group: &str) -> RepositoryResult<GroupDocument> {
        let path = self
            .find(group)
            .await
            .ok_or_else(|| RepositoryError::NotFound {
                group: group.to_string(),
            })?;
        debug!("Loading group document {}", path.display());
        Self::read(&path).await
    }

    async fn load_all(&self) -> RepositoryResult<Vec<GroupDocument>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.root_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && Self::is_document(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read(&path).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!("Skipping unreadable group document {}: {}", path.display(), e),
            }
        }
        Ok(documents)
    }

    async fn exists(&self, group: &str) -> bool {
        self.find(group).await.is_some()
    }

    async fn save(&self, document: &GroupDocument) -> RepositoryResult<()> {
        let group = document.group()?;
        let path = self.document_path(group.as_str());
        fs::write(&path, document.to_json_pretty()?).await?;
        debug!("Saved group document {}", path.display());
        Ok(())
    }
}
