//! Snapshot-file similarity index.
//!
//! The whole index lives in one JSON file (`index.json`) inside the
//! backend's directory: unit text, metadata, and the embedding vector for
//! each entry. Opening the backend loads the file if it exists, otherwise
//! an empty snapshot is created and persisted immediately — the file's
//! existence is the "already initialized" marker.
//!
//! Every add rewrites the full snapshot through a temp file and an atomic
//! rename, so a crash mid-flush leaves the persisted index in either the
//! pre-add or post-add state, never partially written. Search is
//! brute-force cosine similarity over all entries.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::{cosine_similarity, Embedder};
use crate::model::ContentUnit;

use super::{IndexBackend, MetadataFilter};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: String,
    text: String,
    metadata: serde_json::Map<String, serde_json::Value>,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    model: String,
    entries: Vec<IndexEntry>,
}

/// File-backed brute-force similarity index.
pub struct FlatIndex {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<IndexEntry>>,
}

impl FlatIndex {
    /// Load the index from `dir`, or create an empty one and persist it.
    pub fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let index_path = dir.join(INDEX_FILE);
        let entries = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)
                .with_context(|| format!("Failed to read index file: {}", index_path.display()))?;
            let snapshot: IndexSnapshot = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse index file: {}", index_path.display()))?;
            if snapshot.model != embedder.model_name() {
                warn!(
                    index = %index_path.display(),
                    persisted = %snapshot.model,
                    configured = %embedder.model_name(),
                    "embedding model changed since the index was built"
                );
            }
            info!(
                index = %index_path.display(),
                entries = snapshot.entries.len(),
                "loaded existing index"
            );
            snapshot.entries
        } else {
            info!(index = %index_path.display(), "creating new index");
            let index = Self {
                dir: dir.to_path_buf(),
                embedder: embedder.clone(),
                entries: RwLock::new(Vec::new()),
            };
            index.flush(&[])?;
            return Ok(index);
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            embedder,
            entries: RwLock::new(entries),
        })
    }

    /// Write the full snapshot through a temp file and an atomic rename.
    fn flush(&self, entries: &[IndexEntry]) -> Result<()> {
        let snapshot = IndexSnapshot {
            model: self.embedder.model_name().to_string(),
            entries: entries.to_vec(),
        };
        let content = serde_json::to_string(&snapshot)?;

        let final_path = self.dir.join(INDEX_FILE);
        let tmp_path = self.dir.join(format!("{}.tmp", INDEX_FILE));
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write index file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("Failed to replace index file: {}", final_path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl IndexBackend for FlatIndex {
    async fn add(&self, units: &[ContentUnit]) -> Result<()> {
        if units.is_empty() {
            warn!(index = %self.dir.display(), "no units provided to add");
            return Ok(());
        }

        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != units.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                units.len()
            );
        }

        let mut entries = self.entries.write().unwrap();
        for (unit, vector) in units.iter().zip(vectors) {
            entries.push(IndexEntry {
                id: Uuid::new_v4().to_string(),
                text: unit.text.clone(),
                metadata: unit.metadata.clone(),
                embedding: vector,
            });
        }
        self.flush(&entries)?;
        info!(
            index = %self.dir.display(),
            added = units.len(),
            total = entries.len(),
            "added units to index"
        );
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ContentUnit>> {
        {
            let entries = self.entries.read().unwrap();
            if entries.is_empty() {
                debug!(index = %self.dir.display(), "index is empty; nothing to search");
                return Ok(Vec::new());
            }
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response for query"))?;

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(f64, ContentUnit)> = entries
            .iter()
            .map(|entry| {
                let unit = ContentUnit {
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                };
                let score = cosine_similarity(&query_vec, &entry.embedding) as f64;
                (score, unit)
            })
            .filter(|(_, unit)| filter.map(|f| f.matches(unit)).unwrap_or(true))
            .collect();

        // Stable sort keeps insertion order among equal scores, so repeated
        // searches return identical orderings.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, unit)| unit).collect())
    }

    async fn reset(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.clear();
        self.flush(&entries)?;
        info!(index = %self.dir.display(), "index reset");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }

    async fn all_units(&self) -> Result<Vec<ContentUnit>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .iter()
            .map(|entry| ContentUnit {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect())
    }
}
