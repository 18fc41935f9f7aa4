//! Local file session store
//!
//! One pretty-printed JSON document per session id in a single directory.
//! Writes go to a temp file first and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use super::{SessionStore, shallow_merge, take_mirror};
use crate::types::{DocflowError, Result, ResultExt};

const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `id`; rejects ids that could leave the directory
    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id.len() <= MAX_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DocflowError::Session(format!("Invalid session id '{}'", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn write(&self, path: &Path, value: &Value) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(format!("Failed to create {}", self.dir.display()))?;

        let content = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .with_context(format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Value>> {
        let path = self.path_for(id)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, id: &str, value: Value) -> Result<()> {
        let path = self.path_for(id)?;
        self.write(&path, &value).await
    }

    async fn update(&self, id: &str, patch: Value) -> Result<()> {
        // No chat-log here; the mirror entry is dropped
        let (fields, _mirror) = take_mirror(patch);
        if fields.is_empty() {
            return Ok(());
        }
        let current = self.get(id).await?;
        let path = self.path_for(id)?;
        self.write(&path, &shallow_merge(current, fields)).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted session file {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
