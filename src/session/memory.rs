//! In-process session store

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{MirrorEntry, SessionStore, shallow_merge, take_mirror};
use crate::types::Result;

/// Session store held in memory; keeps mirrored entries per session
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    documents: DashMap<String, Value>,
    mirrored: DashMap<String, Vec<MirrorEntry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries mirrored for `id`, oldest first
    pub fn mirrored(&self, id: &str) -> Vec<MirrorEntry> {
        self.mirrored
            .get(id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.documents.get(id).map(|doc| doc.value().clone()))
    }

    async fn set(&self, id: &str, value: Value) -> Result<()> {
        self.documents.insert(id.to_string(), value);
        Ok(())
    }

    async fn update(&self, id: &str, patch: Value) -> Result<()> {
        let (fields, mirror) = take_mirror(patch);
        if let Some(entry) = mirror {
            self.mirrored.entry(id.to_string()).or_default().push(entry);
        }
        if fields.is_empty() {
            return Ok(());
        }
        let current = self.documents.remove(id).map(|(_, doc)| doc);
        self.documents
            .insert(id.to_string(), shallow_merge(current, fields));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.mirrored.remove(id);
        Ok(self.documents.remove(id).is_some())
    }

    fn supports_mirroring(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
